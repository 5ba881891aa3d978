use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AnalysisError;
use crate::sanitize::{truncate_for_log, MAX_ECHOED_BODY};

/// Metric name to value, as returned by the model.
pub type SectionMap = Map<String, Value>;

/// Named sub-sections of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PitchAnalysis,
    MarketResearch,
    FinancialAnalysis,
    WebsiteAnalysis,
    InvestmentStrategy,
    DueDiligence,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::PitchAnalysis,
        Section::MarketResearch,
        Section::FinancialAnalysis,
        Section::WebsiteAnalysis,
        Section::InvestmentStrategy,
        Section::DueDiligence,
    ];

    /// Sections compared between decks.
    pub const CORE: [Section; 3] = [
        Section::PitchAnalysis,
        Section::MarketResearch,
        Section::FinancialAnalysis,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::PitchAnalysis => "pitch_analysis",
            Self::MarketResearch => "market_research",
            Self::FinancialAnalysis => "financial_analysis",
            Self::WebsiteAnalysis => "website_analysis",
            Self::InvestmentStrategy => "investment_strategy",
            Self::DueDiligence => "due_diligence",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::PitchAnalysis => "Pitch Analysis",
            Self::MarketResearch => "Market Research",
            Self::FinancialAnalysis => "Financial Analysis",
            Self::WebsiteAnalysis => "Website Analysis",
            Self::InvestmentStrategy => "Investment Strategy",
            Self::DueDiligence => "Due Diligence",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Structured scoring report produced for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Expected in 0..=100; range is checked by the pipeline, not here.
    pub overall_score: f64,
    #[serde(default)]
    pub pitch_analysis: SectionMap,
    #[serde(default)]
    pub market_research: SectionMap,
    #[serde(default)]
    pub financial_analysis: SectionMap,
    #[serde(default)]
    pub website_analysis: SectionMap,
    #[serde(default)]
    pub investment_strategy: SectionMap,
    #[serde(default)]
    pub due_diligence: SectionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_report: Option<String>,
    /// Sections the model left out (or sent as null) that were filled with `{}`.
    #[serde(default)]
    pub defaulted_sections: Vec<Section>,
}

impl AnalysisResult {
    /// Result for a corpus without any extractable text.
    pub fn empty_input() -> Self {
        Self {
            overall_score: 0.0,
            pitch_analysis: SectionMap::new(),
            market_research: SectionMap::new(),
            financial_analysis: SectionMap::new(),
            website_analysis: SectionMap::new(),
            investment_strategy: SectionMap::new(),
            due_diligence: SectionMap::new(),
            generated_report: Some(
                "No text could be extracted from the submitted documents, so no analysis was performed."
                    .to_string(),
            ),
            defaulted_sections: Section::ALL.to_vec(),
        }
    }

    pub fn section(&self, section: Section) -> &SectionMap {
        match section {
            Section::PitchAnalysis => &self.pitch_analysis,
            Section::MarketResearch => &self.market_research,
            Section::FinancialAnalysis => &self.financial_analysis,
            Section::WebsiteAnalysis => &self.website_analysis,
            Section::InvestmentStrategy => &self.investment_strategy,
            Section::DueDiligence => &self.due_diligence,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut SectionMap {
        match section {
            Section::PitchAnalysis => &mut self.pitch_analysis,
            Section::MarketResearch => &mut self.market_research,
            Section::FinancialAnalysis => &mut self.financial_analysis,
            Section::WebsiteAnalysis => &mut self.website_analysis,
            Section::InvestmentStrategy => &mut self.investment_strategy,
            Section::DueDiligence => &mut self.due_diligence,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = (Section, &SectionMap)> {
        Section::ALL.into_iter().map(move |s| (s, self.section(s)))
    }

    pub fn is_defaulted(&self, section: Section) -> bool {
        self.defaulted_sections.contains(&section)
    }

    pub fn score_in_range(&self) -> bool {
        self.overall_score.is_finite() && (0.0..=100.0).contains(&self.overall_score)
    }
}

/// Parses a model reply into an [`AnalysisResult`].
///
/// Only `overall_score` is required. Absent or null sections become `{}` and
/// are recorded in `defaulted_sections`.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let json_str = extract_json(text).ok_or_else(|| {
        AnalysisError::MalformedResponse(format!(
            "no JSON object in response: {}",
            truncate_for_log(text, MAX_ECHOED_BODY)
        ))
    })?;

    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        AnalysisError::MalformedResponse(format!(
            "invalid JSON ({}): {}",
            e,
            truncate_for_log(json_str, MAX_ECHOED_BODY)
        ))
    })?;

    let Value::Object(mut object) = value else {
        return Err(AnalysisError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            value_kind(&value)
        )));
    };

    let overall_score = parse_score(object.remove("overall_score"))?;

    let generated_report = match object.remove("generated_report") {
        None | Some(Value::Null) => None,
        Some(Value::String(report)) => Some(report),
        Some(other) => Some(other.to_string()),
    };

    let mut result = AnalysisResult {
        overall_score,
        pitch_analysis: SectionMap::new(),
        market_research: SectionMap::new(),
        financial_analysis: SectionMap::new(),
        website_analysis: SectionMap::new(),
        investment_strategy: SectionMap::new(),
        due_diligence: SectionMap::new(),
        generated_report,
        defaulted_sections: Vec::new(),
    };

    for section in Section::ALL {
        match object.remove(section.key()) {
            None | Some(Value::Null) => result.defaulted_sections.push(section),
            Some(Value::Object(map)) => *result.section_mut(section) = map,
            Some(other) => {
                return Err(AnalysisError::MalformedResponse(format!(
                    "section '{}' must be an object, got {}",
                    section,
                    value_kind(&other)
                )));
            }
        }
    }

    if !result.defaulted_sections.is_empty() {
        tracing::debug!(
            defaulted = ?result.defaulted_sections,
            "Model omitted analysis sections"
        );
    }

    Ok(result)
}

fn parse_score(value: Option<Value>) -> Result<f64, AnalysisError> {
    match value {
        None | Some(Value::Null) => Err(AnalysisError::IncompleteResponse(
            "response has no overall_score".to_string(),
        )),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            AnalysisError::MalformedResponse(format!("overall_score {} is not representable", n))
        }),
        // Some models quote numbers even in JSON mode.
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            AnalysisError::MalformedResponse(format!("overall_score '{}' is not a number", s))
        }),
        Some(other) => Err(AnalysisError::MalformedResponse(format!(
            "overall_score must be a number, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Returns the first balanced JSON object in `response`, skipping any
/// surrounding prose or code fences. Braces inside strings are ignored.
pub(crate) fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    // Unbalanced: hand the remainder to serde so the error names the problem.
    Some(&response[start..])
}
