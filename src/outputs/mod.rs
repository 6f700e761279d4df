//! Output files written next to the record store.
//!
//! # Submodules
//!
//! - [`json`]: Writes each theme's raw result array to
//!   `analysis_results_<theme>.json`

pub mod json;
