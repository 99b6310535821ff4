use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

// header text -> cell value; empty cells are absent
pub type DecodedRow = Map<String, Value>;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("not a readable spreadsheet: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("not a readable CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    pub fn from_file_name(name: Option<&str>) -> Self {
        match name {
            Some(n) if n.to_ascii_lowercase().ends_with(".csv") => SheetFormat::Csv,
            _ => SheetFormat::Workbook,
        }
    }
}

pub fn decode_file(path: &Path, format: SheetFormat) -> Result<Vec<DecodedRow>, DecodeError> {
    let bytes = std::fs::read(path)?;
    match format {
        SheetFormat::Csv => decode_csv(&bytes),
        // CSV has no magic bytes: text that calamine rejects is read as CSV.
        SheetFormat::Workbook => match decode(&bytes) {
            Err(DecodeError::Workbook(_)) if std::str::from_utf8(&bytes).is_ok() => {
                decode_csv(&bytes)
            }
            other => other,
        },
    }
}

/// Decode the first sheet of a workbook.
pub fn decode(bytes: &[u8]) -> Result<Vec<DecodedRow>, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers = HeaderNames::build(header_row.iter().map(header_text));

    let mut out = Vec::new();
    for row in rows {
        let mut mapped = Map::new();
        for (col_idx, cell) in row.iter().enumerate() {
            let Some(header) = headers.get(col_idx) else {
                continue;
            };
            if let Some(value) = cell_to_value(cell) {
                mapped.insert(header.to_string(), value);
            }
        }
        if !mapped.is_empty() {
            out.push(mapped);
        }
    }
    Ok(out)
}

pub fn decode_csv(bytes: &[u8]) -> Result<Vec<DecodedRow>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = HeaderNames::build(reader.headers()?.iter().map(|h| h.to_string()));

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut mapped = Map::new();
        for (col_idx, field) in record.iter().enumerate() {
            let Some(header) = headers.get(col_idx) else {
                continue;
            };
            if !field.is_empty() {
                mapped.insert(header.to_string(), Value::String(field.to_string()));
            }
        }
        if !mapped.is_empty() {
            out.push(mapped);
        }
    }
    Ok(out)
}

// Blank headers become `__EMPTY`; repeats get `_1`, `_2`, ...
struct HeaderNames {
    names: Vec<String>,
}

impl HeaderNames {
    fn build(raw: impl Iterator<Item = String>) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut names = Vec::new();
        for text in raw {
            let base = if text.is_empty() {
                "__EMPTY".to_string()
            } else {
                text
            };
            let name = match seen.get(&base).copied() {
                None => base,
                Some(mut n) => {
                    let candidate = loop {
                        n += 1;
                        let c = format!("{}_{}", base, n);
                        if !seen.contains_key(&c) {
                            break c;
                        }
                    };
                    seen.insert(base, n);
                    candidate
                }
            };
            seen.entry(name.clone()).or_insert(0);
            names.push(name);
        }
        HeaderNames { names }
    }

    fn get(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(|s| s.as_str())
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    let value = match cell {
        Data::Empty => return None,
        Data::String(s) if s.is_empty() => return None,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => json!(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                json!(*f as i64)
            } else {
                json!(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        // Raw serial number, the way spreadsheets store dates.
        Data::DateTime(dt) => json!(dt.as_f64()),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    };
    Some(value)
}
