//! Plain-text export of a completed analysis.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::analysis::AnalysisResult;

const RULE: &str = "============================================================";

/// Header fields printed above the scores.
#[derive(Debug, Clone, Copy)]
pub struct ReportHeader<'a> {
    pub job_id: &'a str,
    pub startup_name: Option<&'a str>,
    pub generated_at: DateTime<Utc>,
}

/// Download name for a job's report.
pub fn report_filename(job_id: &str) -> String {
    format!("analysis-{}.txt", job_id)
}

/// Renders `result` as a plain-text report.
///
/// Nested section values are flattened to dotted keys, one per line.
pub fn render_text(header: &ReportHeader<'_>, result: &AnalysisResult) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "PITCH DECK ANALYSIS REPORT");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Job ID:    {}", header.job_id);
    let _ = writeln!(out, "Startup:   {}", header.startup_name.unwrap_or("(not provided)"));
    let _ = writeln!(out, "Generated: {}", header.generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Overall Score: {}/100", format_number(result.overall_score));

    for (section, values) in result.sections() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", section.title());
        let _ = writeln!(out, "{}", "-".repeat(section.title().len()));

        if values.is_empty() {
            let note = if result.is_defaulted(section) {
                "(not provided by the analysis)"
            } else {
                "(no data)"
            };
            let _ = writeln!(out, "{}", note);
            continue;
        }

        let mut lines = Vec::new();
        for (key, value) in values {
            flatten(key, value, &mut lines);
        }
        for (key, value) in lines {
            let _ = writeln!(out, "{}: {}", key, value);
        }
    }

    if let Some(report) = result
        .generated_report
        .as_deref()
        .filter(|r| !r.trim().is_empty())
    {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "DETAILED REPORT");
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "{}", report.trim_end());
    }

    out
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten(&format!("{}.{}", prefix, key), nested, out);
            }
        }
        Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => {
            for (i, nested) in items.iter().enumerate() {
                flatten(&format!("{}.{}", prefix, i), nested, out);
            }
        }
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(scalar_text).collect();
            out.push((prefix.to_string(), joined.join(", ")));
        }
        other => out.push((prefix.to_string(), scalar_text(other))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::Object(map) if map.is_empty() => "-".to_string(),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
