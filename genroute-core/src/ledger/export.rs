use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GenrouteError, GenrouteResult};
use crate::models::UsageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = GenrouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(GenrouteError::ValidationError(format!(
                "unknown export format '{}', expected csv or json",
                other
            ))),
        }
    }
}

const CSV_HEADERS: [&str; 10] = [
    "id",
    "timestamp",
    "provider",
    "task_type",
    "model",
    "success",
    "tokens",
    "cost",
    "duration_ms",
    "error",
];

pub(crate) fn render(records: &[UsageRecord], format: ExportFormat) -> GenrouteResult<String> {
    match format {
        ExportFormat::Csv => Ok(render_csv(records)),
        ExportFormat::Json => serde_json::to_string_pretty(records)
            .map_err(|e| GenrouteError::ExportFailed(e.to_string())),
    }
}

fn render_csv(records: &[UsageRecord]) -> String {
    let mut output = String::new();
    output.push_str(&CSV_HEADERS.join(","));
    output.push('\n');

    for record in records {
        let row = [
            record.id.to_string(),
            record.timestamp.to_rfc3339(),
            escape_field(&record.provider),
            escape_field(&record.task_type),
            escape_field(record.model.as_deref().unwrap_or("")),
            record.success.to_string(),
            record.tokens.to_string(),
            record.cost.to_string(),
            record.duration_ms.to_string(),
            escape_field(record.error.as_deref().unwrap_or("")),
        ];
        output.push_str(&row.join(","));
        output.push('\n');
    }

    output
}

fn escape_field(field: &str) -> String {
    let needs_quoting =
        field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r');

    if needs_quoting {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
