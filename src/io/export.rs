//! Parameter-name listings written next to the run output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::WarpError;

/// Listing file name for a model: `pars.txt` when the run has a single model,
/// `pars_<id>.txt` otherwise.
pub fn params_file_name(model_id: u32, model_count: usize) -> String {
    if model_count > 1 {
        format!("pars_{model_id}.txt")
    } else {
        "pars.txt".to_string()
    }
}

/// Write one parameter name per line to `dir/<file_name>`.
pub fn write_param_names(dir: &Path, file_name: &str, names: &[String]) -> Result<PathBuf, WarpError> {
    let path = dir.join(file_name);
    let file = File::create(&path).map_err(|e| WarpError::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    for name in names {
        writeln!(writer, "{name}").map_err(|e| WarpError::io(&path, e))?;
    }
    writer.flush().map_err(|e| WarpError::io(&path, e))?;
    Ok(path)
}
