//! QARTOD flag masking.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::series::RawObservationTable;

/// QARTOD "fail". Every other flag value is accepted as-is.
pub const QC_FAIL: f64 = 4.0;

/// Counts gathered while masking one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskReport {
    /// Data rows that found a QC row with the same timestamp.
    pub joined_rows: usize,
    /// Values set to missing because their flag was [`QC_FAIL`].
    pub failed_values: usize,
}

/// Inner-joins `data` and `qc` on timestamp and sets `data[data_col]` to
/// missing wherever `qc[qc_col]` is the fail code.
///
/// Without a QC table the data passes through untouched.
pub fn mask(
    data: &RawObservationTable,
    qc: Option<&RawObservationTable>,
    mapping: &[(&str, &str)],
) -> RawObservationTable {
    mask_with_report(data, qc, mapping).0
}

/// [`mask`], also returning how many rows joined and how many values failed.
pub fn mask_with_report(
    data: &RawObservationTable,
    qc: Option<&RawObservationTable>,
    mapping: &[(&str, &str)],
) -> (RawObservationTable, MaskReport) {
    let Some(qc) = qc else {
        let report = MaskReport {
            joined_rows: data.len(),
            failed_values: 0,
        };
        return (data.clone(), report);
    };

    // First QC row wins when a timestamp repeats.
    let mut qc_rows = HashMap::with_capacity(qc.len());
    for (row, time) in qc.index().iter().enumerate() {
        qc_rows.entry(*time).or_insert(row);
    }

    let names: Vec<&str> = data.column_names().collect();
    let mut joined = RawObservationTable::new(names.iter().copied());
    let mut paired = Vec::with_capacity(data.len());
    for (row, time) in data.index().iter().enumerate() {
        if let Some(&qc_row) = qc_rows.get(time) {
            joined.push_row(*time, data.row(row));
            paired.push(qc_row);
        }
    }

    let mut failed_values = 0;
    for &(data_col, qc_col) in mapping {
        let Some(flags) = qc.column(qc_col) else {
            warn!(qc_col, "QC column absent from QC table, leaving data unmasked");
            continue;
        };
        let Some(values) = joined.column_mut(data_col) else {
            warn!(data_col, "Data column absent from data table, skipping its QC");
            continue;
        };
        for (value, &qc_row) in values.iter_mut().zip(&paired) {
            if flags[qc_row] == Some(QC_FAIL) && value.is_some() {
                *value = None;
                failed_values += 1;
            }
        }
    }

    let report = MaskReport {
        joined_rows: joined.len(),
        failed_values,
    };
    debug!(
        data_rows = data.len(),
        qc_rows = qc.len(),
        joined_rows = report.joined_rows,
        failed_values,
        "QC mask applied"
    );
    (joined, report)
}
