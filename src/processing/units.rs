use tracing::debug;

use crate::config::VariableSpec;
use crate::series::TimeTable;

/// Applies each variable's fixed unit correction in place.
///
/// Runs once, after QC masking; missing values stay missing.
pub fn apply_unit_conversions<T>(table: &mut TimeTable<T>, variables: &[VariableSpec]) {
    for var in variables {
        let Some(conversion) = var.conversion else {
            continue;
        };
        if let Some(values) = table.column_mut(&var.short_name) {
            let factor = conversion.factor();
            values.iter_mut().flatten().for_each(|v| *v *= factor);
            debug!(
                variable = %var.short_name,
                factor,
                units = conversion.target_units(),
                "Unit conversion applied"
            );
        }
    }
}
