use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::reader::{push_unit, DocumentReader};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const SLIDE_SUFFIX: &str = ".xml";

pub struct PptxReader;

impl PptxReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PptxReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentReader for PptxReader {
    fn read(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("reader.pptx").entered();

        let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ProcessError::extraction("PPTX", format!("failed to open archive: {}", e)))?;

        extract_presentation_text(&mut archive)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pptx)
    }
}

/// Slide entries sorted by their numeric suffix, so slide10 follows slide9.
fn slide_entries<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Vec<(u32, String)> {
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix(SLIDE_PREFIX)?
                .strip_suffix(SLIDE_SUFFIX)?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);
    slides
}

fn extract_presentation_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ProcessError> {
    let slides = slide_entries(archive);
    let mut text = String::new();

    for (number, name) in &slides {
        let mut entry = archive.by_name(name).map_err(|e| {
            ProcessError::extraction("PPTX", format!("failed to open slide {}: {}", number, e))
        })?;

        let mut xml = String::new();
        entry.read_to_string(&mut xml).map_err(|e| {
            ProcessError::extraction("PPTX", format!("failed to read slide {}: {}", number, e))
        })?;

        let slide_text = parse_slide_xml(&xml).map_err(|message| {
            ProcessError::extraction("PPTX", format!("slide {}: {}", number, message))
        })?;
        push_unit(&mut text, &slide_text);
    }

    tracing::debug!(slides = slides.len(), chars = text.len(), "Extracted PPTX text");
    Ok(text)
}

/// Appends the text a `&name;` or `&#N;` reference stands for.
fn push_reference(line: &mut String, reference: &BytesRef<'_>) -> Result<(), String> {
    if let Some(ch) = reference
        .resolve_char_ref()
        .map_err(|e| format!("invalid character reference: {}", e))?
    {
        line.push(ch);
        return Ok(());
    }

    let name = reference
        .decode()
        .map_err(|e| format!("invalid entity name: {}", e))?;
    match resolve_predefined_entity(&name) {
        Some(value) => line.push_str(value),
        None => {
            tracing::debug!("Keeping unknown entity &{}; as written", name);
            line.push('&');
            line.push_str(&name);
            line.push(';');
        }
    }
    Ok(())
}

/// Collects `a:t` runs of a slide, one line per `a:p` paragraph.
fn parse_slide_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    // Runs are split mid-sentence, so inter-run whitespace must survive.
    reader.config_mut().trim_text(false);

    let mut text = String::new();
    let mut line = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::Empty(ref e)) => {
                // <a:br/> is a soft line break inside a paragraph.
                if e.local_name().as_ref() == b"br" {
                    line.push(' ');
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        text.push_str(trimmed);
                        text.push('\n');
                    }
                    line.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e
                        .decode()
                        .map_err(|err| format!("invalid text encoding: {}", err))?;
                    line.push_str(&decoded);
                }
            }
            // Entity and character references arrive separately from the text around them.
            Ok(Event::GeneralRef(r)) => {
                if in_text_element {
                    push_reference(&mut line, &r)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
    }

    // Text outside any paragraph (malformed but seen in the wild).
    let trailing = line.trim();
    if !trailing.is_empty() {
        text.push_str(trailing);
        text.push('\n');
    }

    Ok(text)
}
