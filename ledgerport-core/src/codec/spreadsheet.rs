//! Excel codec
//!
//! Reading goes through calamine (xlsx and legacy xls). Writing produces a
//! single-sheet SpreadsheetML workbook with inline strings.

use std::io::{Cursor, Write};

use calamine::{Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::header_of;
use crate::domain::record::{parse_decimal, parse_iso_date};
use crate::domain::result::{Error, Result};
use crate::domain::{Record, Value};

const SHEET_NAME: &str = "Expenses";

/// Excel stores dates as days since 1899-12-30
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn float_value(f: f64) -> Value {
    parse_decimal(&f.to_string()).map_or(Value::Null, Value::Number)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) => {
            parse_iso_date(s).map_or_else(|| Value::Text(s.clone()), Value::Date)
        }
        Data::Float(f) => float_value(*f),
        Data::Int(i) => Value::Number(Decimal::from(*i)),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).map_or(Value::Null, Value::Date),
        Data::DurationIso(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn header_name(cell: &Data, col: usize) -> String {
    let name = cell_value(cell).to_string();
    if name.trim().is_empty() {
        format!("Column{}", col + 1)
    } else {
        name
    }
}

/// First sheet only. Rows are zipped against the header by column index;
/// cells past the end of a short row read as null.
pub fn parse(bytes: &[u8], skip_rows: usize) -> Result<Vec<Record>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::parse(format!("Failed to open spreadsheet: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::parse("Spreadsheet has no sheets"))?
        .map_err(|e| Error::parse(format!("Failed to read first sheet: {}", e)))?;

    let mut rows = range.rows().skip(skip_rows);
    let header: Vec<String> = match rows.next() {
        Some(row) => row.iter().enumerate().map(|(i, c)| header_name(c, i)).collect(),
        None => return Ok(Vec::new()),
    };

    let records = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).map_or(Value::Null, cell_value)))
                .collect()
        })
        .collect();
    Ok(records)
}

fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

fn write_cell(xml: &mut String, reference: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Number(d) => {
            xml.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, d));
        }
        Value::Bool(b) => {
            xml.push_str(&format!("<c r=\"{}\" t=\"b\"><v>{}</v></c>", reference, u8::from(*b)));
        }
        other => {
            xml.push_str(&format!(
                "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                reference,
                escape_xml(&other.to_string())
            ));
        }
    }
}

fn sheet_xml(header: &[String], records: &[Record]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    let columns: Vec<String> = (0..header.len()).map(column_letters).collect();

    xml.push_str("<row r=\"1\">");
    for (col, name) in header.iter().enumerate() {
        write_cell(&mut xml, &format!("{}1", columns[col]), &Value::text(name.as_str()));
    }
    xml.push_str("</row>");

    for (idx, record) in records.iter().enumerate() {
        let row = idx + 2;
        xml.push_str(&format!("<row r=\"{}\">", row));
        for (col, name) in header.iter().enumerate() {
            if let Some(value) = record.get(name) {
                write_cell(&mut xml, &format!("{}{}", columns[col], row), value);
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
</Types>";

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
</Relationships>";

fn workbook_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
        SHEET_NAME
    )
}

pub fn serialize(records: &[Record]) -> Result<Vec<u8>> {
    let header = header_of(records);
    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(&header, records)),
    ];

    let zip_err = |e: zip::result::ZipError| Error::serialize(format!("Failed to build workbook: {}", e));
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in &parts {
        zip.start_file(*name, options).map_err(zip_err)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish().map_err(zip_err)?.into_inner())
}
