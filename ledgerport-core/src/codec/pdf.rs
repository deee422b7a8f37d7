//! PDF report export
//!
//! A landscape table: title, generation stamp, record count, then one row per
//! record. The header row repeats on every page.

use std::io::BufWriter;

use printpdf::*;

use super::header_of;
use crate::domain::result::{Error, Result};
use crate::domain::Record;

// US Letter, landscape (mm)
const PAGE_W: f32 = 279.4;
const PAGE_H: f32 = 215.9;
const MARGIN: f32 = 15.0;
const ROW_H: f32 = 5.5;
const FONT_SIZE: f32 = 8.0;
const TITLE_SIZE: f32 = 14.0;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

/// Cut `text` so it fits in `width` mm, marking the cut with "..."
fn fit(text: &str, width: f32, size: f32) -> String {
    if approx_text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = ((width / (size * 0.18)) as usize).saturating_sub(3);
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn pdf_err<E: std::fmt::Debug>(e: E) -> Error {
    Error::serialize(format!("PDF generation failed: {:?}", e))
}

struct TableWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    y: f32,
}

impl TableWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let font_bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
        Ok(Self {
            doc,
            font,
            font_bold,
            page,
            layer,
            y: MARGIN,
        })
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.doc
            .get_page(self.page)
            .get_layer(self.layer)
            .use_text(s, size, Mm(x), Mm(PAGE_H - self.y), font);
    }

    fn rule(&self) {
        let layer = self.doc.get_page(self.page).get_layer(self.layer);
        layer.set_outline_thickness(0.5);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(PAGE_H - self.y)), false),
                (Point::new(Mm(PAGE_W - MARGIN), Mm(PAGE_H - self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn row(&mut self, cells: &[String], width: f32, bold: bool) {
        let mut x = MARGIN;
        for cell in cells {
            self.text(&fit(cell, width - 1.5, FONT_SIZE), x, FONT_SIZE, bold);
            x += width;
        }
        self.y += ROW_H;
    }

    fn header_row(&mut self, header: &[String], width: f32) {
        self.row(header, width, true);
        self.y -= ROW_H - 1.5;
        self.rule();
        self.y += ROW_H - 1.5;
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.page = page;
        self.layer = layer;
        self.y = MARGIN;
    }

    fn into_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(pdf_err)?;
        buf.into_inner().map_err(pdf_err)
    }
}

pub fn serialize(records: &[Record], title: &str) -> Result<Vec<u8>> {
    let title = if title.is_empty() { "Expense Export" } else { title };
    let header = header_of(records);
    let width = (PAGE_W - 2.0 * MARGIN) / header.len().max(1) as f32;

    let mut pdf = TableWriter::new(title)?;
    pdf.y += TITLE_SIZE * 0.35;
    pdf.text(title, MARGIN, TITLE_SIZE, true);
    pdf.y += 7.0;
    let stamp = chrono::Local::now().format("Generated %Y-%m-%d %H:%M").to_string();
    pdf.text(&format!("{} - {} records", stamp, records.len()), MARGIN, FONT_SIZE, false);
    pdf.y += 8.0;
    pdf.header_row(&header, width);

    for record in records {
        if pdf.y + ROW_H > PAGE_H - MARGIN {
            pdf.new_page();
            pdf.header_row(&header, width);
        }
        let cells: Vec<String> = header
            .iter()
            .map(|k| record.get(k).map(ToString::to_string).unwrap_or_default())
            .collect();
        pdf.row(&cells, width, false);
    }
    pdf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_truncates_long_text() {
        assert_eq!(fit("short", 50.0, FONT_SIZE), "short");
        let cut = fit(&"x".repeat(200), 20.0, FONT_SIZE);
        assert!(cut.ends_with("..."));
        assert!(cut.len() < 200);
    }

    #[test]
    fn test_renders_multi_page_document() {
        let records: Vec<Record> = (0..120)
            .map(|i| {
                Record::new()
                    .with("merchant_name", format!("Vendor {}", i))
                    .with("grand_total", i)
            })
            .collect();
        let bytes = serialize(&records, "Test Report").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
