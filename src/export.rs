use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::models::{FieldValue, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// `[export]` in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Joins list values inside one CSV cell
    pub list_delimiter: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            list_delimiter: "; ".to_string(),
        }
    }
}

/// Union of field names in first-seen order, internal `_` fields left out
pub fn columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for name in record.names() {
            if !name.starts_with('_') && !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn cell(value: Option<&FieldValue>, delimiter: &str) -> String {
    match value {
        Some(FieldValue::Text(text)) => text.clone(),
        Some(FieldValue::List(items)) => items.join(delimiter),
        Some(FieldValue::Null) | None => String::new(),
    }
}

pub fn to_csv(records: &[Record], settings: &ExportSettings) -> Result<String, ExportError> {
    let columns = columns(records);
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| cell(record.get(column), &settings.list_delimiter))
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn to_json(records: &[Record]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn export(records: &[Record], format: ExportFormat, settings: &ExportSettings) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => to_json(records),
        ExportFormat::Csv => to_csv(records, settings),
    }
}

/// Reads CSV written by `to_csv`; empty cells come back as null
pub fn read_csv(text: &str) -> Result<Vec<Record>, ExportError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| {
                let value = if value.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(value.to_string())
                };
                (name, value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}
