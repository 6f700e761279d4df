//! Per-theme result files.
//!
//! Each theme writes the full, pre-validation result array, records and
//! per-URL errors alike, so a run can be audited afterwards:
//!
//! ```text
//! output_dir/
//! ├── analysis_results_All.json
//! ├── analysis_results_Tech.json
//! └── records.jsonl
//! ```

use crate::models::SeedOutcome;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the result file for `theme` under `output_dir`.
pub fn theme_results_path(output_dir: &str, theme: &str) -> PathBuf {
    Path::new(output_dir).join(format!("analysis_results_{theme}.json"))
}

/// Write `outcomes` as pretty-printed JSON to `analysis_results_<theme>.json`.
#[instrument(level = "info", skip_all, fields(%output_dir, %theme))]
pub async fn write_theme_results(
    outcomes: &[SeedOutcome],
    output_dir: &str,
    theme: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(outcomes)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = theme_results_path(output_dir, theme);
    fs::write(&path, json).await?;
    info!(path = %path.display(), count = outcomes.len(), "Wrote theme results");
    Ok(path)
}
