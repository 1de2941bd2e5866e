//! CLI command implementations.

use std::path::PathBuf;

use anyhow::Result;

use crate::error::CliError;

mod info;
mod stream;
mod validate;

pub use info::run_info;
pub use stream::run_stream;
pub use validate::run_validate;

/// Load a calibration blob from the given file, falling back to the
/// built-in mock blob when no path is supplied.
fn load_calibration_blob(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            if !path.is_file() {
                return Err(CliError::calibration_not_found(path.display().to_string()).into());
            }
            tracing::info!(calibration = %path.display(), "Loading calibration blob");
            Ok(std::fs::read_to_string(path).map_err(CliError::Io)?)
        }
        None => {
            tracing::info!("Using built-in mock calibration");
            Ok(device::mock_calibration_blob())
        }
    }
}
