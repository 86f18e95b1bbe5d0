//! Parser for the tabular service's `.csvp` responses.
//!
//! The first line carries column names with units and is skipped without
//! validation. Columns are positional: `time` first, then one column per
//! requested variable in the order the query asked for them.

use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::TransportError;
use crate::series::RawObservationTable;

/// Decodes a response body into a time-sorted [`RawObservationTable`] whose
/// columns are named by `columns`.
///
/// Empty cells and `NaN` become missing values.
///
/// # Errors
///
/// Returns [`TransportError::Parse`] if a row has the wrong number of fields,
/// a timestamp is not RFC 3339, or a cell is not numeric.
pub fn parse_table(
    body: &str,
    columns: &[String],
    source_url: &str,
) -> Result<RawObservationTable, TransportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let expected = columns.len() + 1;
    let mut table = RawObservationTable::new(columns.iter().cloned());

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TransportError::parse(source_url, e.to_string()))?;
        // Header is line 1.
        let line = line + 2;
        if record.len() != expected {
            return Err(TransportError::parse(
                source_url,
                format!("line {line}: expected {expected} fields, found {}", record.len()),
            ));
        }

        let time = parse_time(&record[0]).ok_or_else(|| {
            TransportError::parse(source_url, format!("line {line}: bad timestamp '{}'", &record[0]))
        })?;

        let mut values = Vec::with_capacity(columns.len());
        for field in record.iter().skip(1) {
            let value = parse_value(field).map_err(|_| {
                TransportError::parse(source_url, format!("line {line}: non-numeric value '{field}'"))
            })?;
            values.push(value);
        }
        table.push_row(time, values);
    }

    table.sort_by_time();
    debug!(rows = table.len(), url = source_url, "Parsed tabular response");
    Ok(table)
}

fn parse_time(field: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(field.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_value(field: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let value: f64 = field.parse()?;
    Ok(value.is_finite().then_some(value))
}
