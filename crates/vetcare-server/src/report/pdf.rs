//! PDF rendering for [`MedicalReport`] via `printpdf`.

use std::io::BufWriter;

use printpdf::*;

use super::{MedicalReport, ReportLine};
use crate::error::LifecycleError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const TOP_MM: f32 = 280.0;
const BOTTOM_MM: f32 = 18.0;
const LEFT_MM: f32 = 20.0;
const INDENT_MM: f32 = 25.0;
const LINE_MM: f32 = 4.5;
const BODY_PT: f32 = 9.0;
// Average Helvetica glyph width at BODY_PT.
const CHAR_WIDTH_MM: f32 = 1.6;
// Helvetica at 9pt fits roughly this many characters between the margins.
const WRAP_CHARS: usize = 100;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Writes lines top to bottom, starting a new page when the cursor reaches
/// the bottom margin.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter<'_> {
    fn ensure_room(&mut self, height: f32) {
        if self.y - height < BOTTOM_MM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP_MM;
        }
    }

    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.ensure_room(LINE_MM);
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.y -= LINE_MM;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    /// Renders a report line wrapped to the page width. Linked lines get a
    /// URI annotation over every wrapped row.
    fn report_line(&mut self, line: &ReportLine, font: &IndirectFontRef) {
        for row in wrap_text(&line.text, WRAP_CHARS) {
            self.ensure_room(LINE_MM);
            if let Some(ref url) = line.link {
                let width = (row.chars().count() as f32 * CHAR_WIDTH_MM)
                    .min(PAGE_WIDTH_MM - INDENT_MM - LEFT_MM);
                let rect = Rect::new(
                    Mm(INDENT_MM),
                    Mm(self.y - 1.2),
                    Mm(INDENT_MM + width),
                    Mm(self.y + 3.2),
                );
                self.layer.add_link_annotation(LinkAnnotation::new(
                    rect,
                    None,
                    None,
                    Actions::uri(url.to_string()),
                    None,
                ));
            }
            self.line(&row, BODY_PT, INDENT_MM, font);
        }
        self.gap(1.0);
    }
}

/// Renders the report to PDF bytes.
pub fn render(report: &MedicalReport) -> std::result::Result<Vec<u8>, LifecycleError> {
    let (doc, page1, layer1) = PdfDocument::new(
        &report.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| LifecycleError::report(format!("PDF font error: {e}")))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| LifecycleError::report(format!("PDF font error: {e}")))?,
    };

    {
        let mut writer = PageWriter {
            doc: &doc,
            layer: doc.get_page(page1).get_layer(layer1),
            y: TOP_MM,
        };

        // Header
        writer.line(&report.title, 14.0, LEFT_MM, &fonts.bold);
        writer.gap(1.5);
        writer.line(
            &format!("Generated: {}", report.generated_at),
            8.0,
            LEFT_MM,
            &fonts.regular,
        );
        writer.gap(4.0);

        // Visit summary
        writer.line("VISIT SUMMARY", 11.0, LEFT_MM, &fonts.bold);
        writer.gap(1.5);
        for (label, value) in &report.summary {
            let text = format!("{label}: {value}");
            for row in wrap_text(&text, WRAP_CHARS) {
                writer.line(&row, BODY_PT, INDENT_MM, &fonts.regular);
            }
        }

        for section in report.sections() {
            writer.gap(4.0);
            writer.ensure_room(LINE_MM * 3.0);
            writer.line(&section.title.to_uppercase(), 11.0, LEFT_MM, &fonts.bold);
            writer.gap(1.5);
            for line in &section.lines {
                writer.report_line(line, &fonts.regular);
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| LifecycleError::report(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| LifecycleError::report(format!("PDF buffer error: {e}")))
}

/// Greedy word wrap. Words longer than a row are split across rows.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            if current_len > 0 && current_len + 1 + piece.len() > max_chars {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(piece);
            current_len += piece.len();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
