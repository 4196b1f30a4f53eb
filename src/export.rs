//! Rendering of the visible set for download.

use crate::error::Result;
use crate::types::Event;
use serde::{Deserialize, Serialize};

const CSV_HEADER: &str = "ID,Title,Description,Type,Severity,Source,Timestamp,Acknowledged";

/// Output format for `EventStore::export_visible`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Render events in order.
pub fn render(events: &[&Event], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(events)?),
        ExportFormat::Csv => Ok(render_csv(events)),
    }
}

fn render_csv(events: &[&Event]) -> String {
    let mut out = String::from(CSV_HEADER);
    for event in events {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}",
            event.id.0,
            quote(&event.title),
            quote(&event.description),
            event.event_type,
            event.severity,
            quote(&event.source),
            event.timestamp.0,
            event.acknowledged,
        ));
    }
    out
}

/// Quote a free-text field, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
