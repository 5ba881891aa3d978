//! Fixture builders for documents and submissions.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use deckscore::{IncomingDocument, Submission};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

/// The reply used throughout the lifecycle tests.
pub const ROUND_TRIP_REPLY: &str = r#"{"overall_score": 72, "pitch_analysis": {"clarity": 8}, "market_research": {}, "financial_analysis": {}}"#;

/// Builds a single-page PDF whose page shows `text`.
pub fn build_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF fixture");
    bytes
}

/// Builds a PPTX archive; `slides[i]` becomes `ppt/slides/slide{i+1}.xml`.
pub fn build_pptx(slides: &[&[&str]]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .start_file("[Content_Types].xml", options)
        .expect("Failed to start content types entry");
    writer
        .write_all(b"<?xml version=\"1.0\"?><Types/>")
        .expect("Failed to write content types entry");

    for (index, paragraphs) in slides.iter().enumerate() {
        writer
            .start_file(format!("ppt/slides/slide{}.xml", index + 1), options)
            .expect("Failed to start slide entry");
        writer
            .write_all(slide_xml(paragraphs).as_bytes())
            .expect("Failed to write slide entry");
    }

    writer
        .finish()
        .expect("Failed to finish PPTX fixture")
        .into_inner()
}

fn slide_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
        .collect();
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
            "<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" ",
            "xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">",
            "<p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>",
            "</p:spTree></p:cSld></p:sld>"
        ),
        body
    )
}

/// Builder for a submission, starting with the label `"Acme"` and no files.
pub struct SubmissionBuilder {
    label: String,
    documents: Vec<IncomingDocument>,
}

impl SubmissionBuilder {
    pub fn new() -> Self {
        Self {
            label: "Acme".to_string(),
            documents: Vec::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn pdf(mut self, filename: &str, text: &str) -> Self {
        self.documents.push(IncomingDocument::new(
            filename,
            Some("application/pdf"),
            build_pdf(text),
        ));
        self
    }

    pub fn pptx(mut self, filename: &str, slides: &[&[&str]]) -> Self {
        self.documents.push(IncomingDocument::new(
            filename,
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            build_pptx(slides),
        ));
        self
    }

    pub fn file(mut self, filename: &str, content_type: Option<&str>, bytes: &[u8]) -> Self {
        self.documents
            .push(IncomingDocument::new(filename, content_type, bytes.to_vec()));
        self
    }

    pub fn build(self) -> Submission {
        Submission {
            label: self.label,
            documents: self.documents,
        }
    }
}

impl Default for SubmissionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
