//! Spreadsheet files flattened into an in-memory cell grid.
//!
//! Layout inference works on this grid so the xlsx and csv paths share one
//! representation.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::ExtractError;

/// A single cell, reduced to what layout inference needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Numeric view of the cell. Text cells are parsed leniently:
    /// `$1,234.5` and `(500)` (negative) both count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => parse_lenient_number(text),
            Self::Empty => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        }
    }
}

/// One worksheet as a dense row-major grid.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }
}

/// Load every worksheet of a spreadsheet file. CSV files load as a single
/// sheet named after the file stem.
pub fn load_workbook(path: &Path) -> Result<Vec<Sheet>, ExtractError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if extension == "csv" {
        return load_csv(path).map(|sheet| vec![sheet]);
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| {
        ExtractError::unavailable(format!(
            "cannot open workbook '{}': {e}",
            path.display()
        ))
    })?;

    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name).map_err(|e| {
            ExtractError::unavailable(format!(
                "cannot read sheet '{name}' of '{}': {e}",
                path.display()
            ))
        })?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();
        sheets.push(Sheet { name, rows });
    }

    if sheets.is_empty() {
        return Err(ExtractError::unavailable(format!(
            "workbook '{}' contains no sheets",
            path.display()
        )));
    }

    Ok(sheets)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::Bool(value) => Cell::Number(if *value { 1.0 } else { 0.0 }),
        Data::String(text) => {
            if text.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(text.clone())
            }
        }
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Cell::Text(text.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

fn load_csv(path: &Path) -> Result<Sheet, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            ExtractError::unavailable(format!("cannot open csv '{}': {e}", path.display()))
        })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            ExtractError::unavailable(format!("cannot parse csv '{}': {e}", path.display()))
        })?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let trimmed = field.trim();
                    if trimmed.is_empty() {
                        Cell::Empty
                    } else if let Some(number) = parse_lenient_number(trimmed) {
                        Cell::Number(number)
                    } else {
                        Cell::Text(trimmed.to_owned())
                    }
                })
                .collect(),
        );
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("sheet")
        .to_owned();

    Ok(Sheet { name, rows })
}

/// Parse numbers the way finance spreadsheets write them: currency symbols,
/// thousands separators, and parentheses for negatives.
fn parse_lenient_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (body, negate) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    };

    let cleaned: String = body
        .chars()
        .filter(|ch| !matches!(ch, '$' | '€' | '£' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .map(|value| if negate { -value } else { value })
}
