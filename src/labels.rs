//! Printable allergen labels in Markdown, PDF and DOCX.
//!
//! One label per product: name, allergens present (or an explicit "none"
//! line) and possible traces when there are any.

use crate::analysis::{AllergenReport, Product};
use printpdf::*;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const ALLERGENS_HEADING: &str = "Allergènes présents";
pub const TRACES_HEADING: &str = "Traces éventuelles";
pub const NO_ALLERGEN: &str = "Aucun allergène détecté";
const DOCUMENT_TITLE: &str = "Étiquettes allergènes";
const REGULATION_FOOTER: &str = "Règlement UE 1169/2011";

/// Label output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    Markdown,
    Pdf,
    Docx,
}

impl LabelFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Render a report to the requested format.
pub fn render_labels(report: &AllergenReport, format: LabelFormat) -> Result<Vec<u8>, String> {
    match format {
        LabelFormat::Markdown => Ok(render_markdown(report).into_bytes()),
        LabelFormat::Pdf => render_pdf(report),
        LabelFormat::Docx => render_docx(report),
    }
}

fn allergen_line(product: &Product) -> String {
    if product.allergens.is_empty() {
        NO_ALLERGEN.to_string()
    } else {
        product.allergens.join(", ")
    }
}

fn generated_on() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

fn render_markdown(report: &AllergenReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", DOCUMENT_TITLE));
    output.push_str(&format!("*{} - {}*\n\n---\n\n", REGULATION_FOOTER, generated_on()));

    for product in &report.products {
        output.push_str(&format!("## {}\n\n", product.name));
        output.push_str(&format!("**{} :** {}\n", ALLERGENS_HEADING, allergen_line(product)));
        if !product.traces.is_empty() {
            output.push_str(&format!(
                "\n*{} : {}*\n",
                TRACES_HEADING,
                product.traces.join(", ")
            ));
        }
        output.push_str("\n---\n\n");
    }

    output
}

fn render_pdf(report: &AllergenReport) -> Result<Vec<u8>, String> {
    let page_width = Mm(210.0);
    let page_height = Mm(297.0);
    let (doc, page1, layer1) = PdfDocument::new(DOCUMENT_TITLE, page_width, page_height, "Layer 1");

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| format!("Failed to add font: {}", e))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| format!("Failed to add font: {}", e))?;

    let mut current_layer = doc.get_page(page1).get_layer(layer1);
    let top = Mm(280.0);
    let mut y_pos = top;
    let line_height = Mm(6.0);
    let margin_left = Mm(15.0);
    let page_bottom = Mm(20.0);

    current_layer.use_text(DOCUMENT_TITLE, 16.0, margin_left, y_pos, &font_bold);
    y_pos -= Mm(6.0);
    current_layer.use_text(
        format!("{} - {}", REGULATION_FOOTER, generated_on()),
        9.0,
        margin_left,
        y_pos,
        &font,
    );
    y_pos -= Mm(10.0);

    for product in &report.products {
        // Keep a label's header on the same page as its first line.
        if y_pos < page_bottom + Mm(25.0) {
            let (new_page, new_layer) = doc.add_page(page_width, page_height, "Layer 1");
            current_layer = doc.get_page(new_page).get_layer(new_layer);
            y_pos = top;
        }

        current_layer.use_text(&product.name, 13.0, margin_left, y_pos, &font_bold);
        y_pos -= line_height;

        let mut lines = vec![(format!("{} :", ALLERGENS_HEADING), true)];
        lines.extend(wrap_text(&allergen_line(product), 85).into_iter().map(|l| (l, false)));
        if !product.traces.is_empty() {
            lines.push((format!("{} :", TRACES_HEADING), true));
            lines.extend(
                wrap_text(&product.traces.join(", "), 85)
                    .into_iter()
                    .map(|l| (l, false)),
            );
        }

        for (line, bold) in lines {
            if y_pos < page_bottom {
                let (new_page, new_layer) = doc.add_page(page_width, page_height, "Layer 1");
                current_layer = doc.get_page(new_page).get_layer(new_layer);
                y_pos = top;
            }
            let face = if bold { &font_bold } else { &font };
            current_layer.use_text(line, 10.0, margin_left, y_pos, face);
            y_pos -= line_height;
        }

        y_pos -= Mm(6.0);
    }

    doc.save_to_bytes()
        .map_err(|e| format!("Failed to save PDF: {}", e))
}

/// Simple word wrapping for PDF text.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= max_chars {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

fn render_docx(report: &AllergenReport) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let content_types = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;
        let document = generate_docx_document(report);

        for (name, content) in [
            ("[Content_Types].xml", content_types),
            ("_rels/.rels", rels),
            ("word/document.xml", document.as_str()),
        ] {
            zip.start_file(name, options)
                .map_err(|e| format!("Failed to create {}: {}", name, e))?;
            zip.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write {}: {}", name, e))?;
        }

        zip.finish()
            .map_err(|e| format!("Failed to finalize DOCX: {}", e))?;
    }

    Ok(buffer)
}

fn docx_paragraph(text: &str, bold: bool, italic: bool) -> String {
    let mut props = String::new();
    if bold {
        props.push_str("<w:b/>");
    }
    if italic {
        props.push_str("<w:i/>");
    }
    format!(
        r#"<w:p><w:r><w:rPr>{}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        props,
        escape_xml(text)
    )
}

fn generate_docx_document(report: &AllergenReport) -> String {
    let mut paragraphs = String::new();

    paragraphs.push_str(&docx_paragraph(DOCUMENT_TITLE, true, false));
    paragraphs.push_str(&docx_paragraph(
        &format!("{} - {}", REGULATION_FOOTER, generated_on()),
        false,
        true,
    ));
    paragraphs.push_str("<w:p/>");

    for product in &report.products {
        paragraphs.push_str(&docx_paragraph(&product.name, true, false));
        paragraphs.push_str(&docx_paragraph(
            &format!("{} : {}", ALLERGENS_HEADING, allergen_line(product)),
            false,
            false,
        ));
        if !product.traces.is_empty() {
            paragraphs.push_str(&docx_paragraph(
                &format!("{} : {}", TRACES_HEADING, product.traces.join(", ")),
                false,
                true,
            ));
        }
        paragraphs.push_str("<w:p/>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    {}
  </w:body>
</w:document>"#,
        paragraphs
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
