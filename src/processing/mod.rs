//! Transformations between fetched tables and the exported grid.
//!
//! Stages run in a fixed order for each station: QC masking, unit
//! conversion, hourly resampling (with smoothing), gap filling, and trend
//! estimation. Every stage is a pure function of its inputs.

pub mod gapfill;
pub mod qc;
pub mod resample;
pub mod slope;
pub mod units;
pub mod utility;
pub mod window;

pub use gapfill::{GRID_LEN, fill_to_present, fill_to_present_at};
pub use qc::{MaskReport, QC_FAIL, mask, mask_with_report};
pub use resample::resample;
pub use slope::{SlopeEstimate, slope, slope_scale};
pub use units::apply_unit_conversions;
