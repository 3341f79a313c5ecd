//! Noise dictionaries: parameter name → value, read from the `noisefiles` location.
//!
//! `noisefiles` is a path prefix. Every `<prefix>*.json` file whose path mentions
//! one of the loaded pulsars is merged (sorted by path, later files win), as is
//! every `<prefix>*<psr>_noise.txt` file in the flat PAL2 format.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::WarpError;

const PAL2_SUFFIX: &str = "_noise.txt";

pub type NoiseDict = BTreeMap<String, f64>;

/// Read the noise dictionary for `pulsars` from the files under `prefix`.
pub fn get_noise_dict(pulsars: &[&str], prefix: &str) -> Result<NoiseDict, WarpError> {
    let (dir, file_prefix) = split_prefix(prefix);
    let entries = fs::read_dir(&dir).map_err(|source| WarpError::NoiseFileNotFound {
        path: dir.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| WarpError::io(&dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if name.starts_with(file_prefix) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut dict = NoiseDict::new();
    for path in files {
        let text = path.to_string_lossy().into_owned();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.ends_with(".json") && pulsars.iter().any(|p| text.contains(p)) {
            debug!(path = %path.display(), "reading JSON noise file");
            dict.extend(read_json_noise(&path)?);
        } else if let Some(psr) = pal2_pulsar(name, file_prefix, pulsars) {
            debug!(path = %path.display(), "reading PAL2 noise file");
            let body = fs::read_to_string(&path).map_err(|e| WarpError::io(&path, e))?;
            dict.extend(parse_pal2(&path, psr, &body)?);
        }
    }

    info!(count = dict.len(), prefix, "loaded noise dictionary");
    Ok(dict)
}

/// Loaded pulsar named by a `<prefix><psr>_noise.txt` file, if any.
fn pal2_pulsar<'a>(name: &str, file_prefix: &str, pulsars: &[&'a str]) -> Option<&'a str> {
    let stem = name.strip_prefix(file_prefix)?.strip_suffix(PAL2_SUFFIX)?;
    pulsars.iter().copied().find(|psr| stem.ends_with(psr))
}

/// `/a/b/run_` → (`/a/b`, `run_`); `/a/b/` → (`/a/b/`, ``).
fn split_prefix(prefix: &str) -> (PathBuf, &str) {
    if prefix.is_empty() || prefix.ends_with('/') {
        let dir = if prefix.is_empty() { "." } else { prefix };
        return (PathBuf::from(dir), "");
    }
    let path = Path::new(prefix);
    let file_prefix = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, file_prefix)
}

fn read_json_noise(path: &Path) -> Result<NoiseDict, WarpError> {
    let file = File::open(path).map_err(|e| WarpError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| WarpError::NoiseFileParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse a flat PAL2 noise file. Reading stops at the first line that is not a
/// recognised white- or red-noise entry.
pub fn parse_pal2(path: &Path, psr: &str, body: &str) -> Result<NoiseDict, WarpError> {
    let mut dict = NoiseDict::new();
    for line in body.lines() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else { break };

        let name = if line.contains("efac") {
            flagged(psr, key, "efac-", "efac")
        } else if line.contains("equad") {
            flagged(psr, key, "equad-", "log10_equad")
        } else if line.contains("jitter_q") {
            flagged(psr, key, "jitter_q-", "log10_ecorr")
        } else if line.contains("RN-Amplitude") {
            format!("{psr}_log10_A")
        } else if line.contains("RN-spectral-index") {
            format!("{psr}_gamma")
        } else {
            break;
        };

        let token = tokens.next().unwrap_or_default();
        let value = token.parse::<f64>().map_err(|_| WarpError::NoiseFileParse {
            path: path.to_path_buf(),
            message: format!("invalid value `{token}` for `{key}`"),
        })?;
        dict.insert(name, value);
    }
    Ok(dict)
}

fn flagged(psr: &str, key: &str, marker: &str, par: &str) -> String {
    let flag = key.rsplit(marker).next().unwrap_or(key);
    if flag.is_empty() {
        format!("{psr}_{par}")
    } else {
        format!("{psr}_{flag}_{par}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAL2: &str = "\
efac-PDFB_20CM 1.05
equad-PDFB_20CM -6.5
jitter_q-CASPSR_40CM -7.1
RN-Amplitude -13.2
RN-spectral-index 3.1
Something-else 4.0
efac-LATE 2.0
";

    #[test]
    fn pal2_names_and_early_stop() {
        let dict = parse_pal2(Path::new("J0437-4715_noise.txt"), "J0437-4715", PAL2).unwrap();
        assert_eq!(dict.get("J0437-4715_PDFB_20CM_efac"), Some(&1.05));
        assert_eq!(dict.get("J0437-4715_PDFB_20CM_log10_equad"), Some(&-6.5));
        assert_eq!(dict.get("J0437-4715_CASPSR_40CM_log10_ecorr"), Some(&-7.1));
        assert_eq!(dict.get("J0437-4715_log10_A"), Some(&-13.2));
        assert_eq!(dict.get("J0437-4715_gamma"), Some(&3.1));
        assert!(!dict.contains_key("J0437-4715_LATE_efac"));
        assert_eq!(dict.len(), 5);
    }

    #[test]
    fn pal2_bad_number_is_an_error() {
        let err = parse_pal2(Path::new("x"), "J1", "efac-A fast\n").unwrap_err();
        assert!(matches!(err, WarpError::NoiseFileParse { .. }));
    }

    #[test]
    fn prefix_split() {
        assert_eq!(split_prefix("/a/b/"), (PathBuf::from("/a/b/"), ""));
        assert_eq!(split_prefix("/a/b/run_"), (PathBuf::from("/a/b"), "run_"));
        assert_eq!(split_prefix("run_"), (PathBuf::from("."), "run_"));
    }

    #[test]
    fn json_files_merge_only_for_loaded_pulsars() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("J0437-4715_a.json"),
            r#"{"J0437-4715_PDFB_20CM_efac": 1.1, "shared": 1.0}"#,
        )
        .unwrap();
        fs::write(dir.path().join("J0437-4715_b.json"), r#"{"shared": 2.0}"#).unwrap();
        fs::write(dir.path().join("J1909-3744.json"), r#"{"J1909-3744_x": 9.0}"#).unwrap();
        fs::write(dir.path().join("J1909-3744_noise.txt"), "efac-A 1.3\n").unwrap();
        fs::write(dir.path().join("J0437-4715_noise.txt"), "RN-Amplitude -14\n").unwrap();

        let prefix = format!("{}/", dir.path().display());
        let dict = get_noise_dict(&["J0437-4715"], &prefix).unwrap();

        assert_eq!(dict.get("J0437-4715_PDFB_20CM_efac"), Some(&1.1));
        assert_eq!(dict.get("shared"), Some(&2.0));
        assert_eq!(dict.get("J0437-4715_log10_A"), Some(&-14.0));
        assert!(!dict.contains_key("J1909-3744_x"));
        assert!(!dict.contains_key("J1909-3744_A_efac"));
    }

    #[test]
    fn file_prefix_selects_pal2_and_json_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run_J1909-3744_noise.txt"), "efac-A 1.3\n").unwrap();
        fs::write(dir.path().join("run_J1909-3744.json"), r#"{"J1909-3744_x": 9.0}"#).unwrap();
        fs::write(dir.path().join("old_J1909-3744_noise.txt"), "efac-B 2.0\n").unwrap();

        let prefix = format!("{}/run_", dir.path().display());
        let dict = get_noise_dict(&["J1909-3744"], &prefix).unwrap();

        assert_eq!(dict.get("J1909-3744_A_efac"), Some(&1.3));
        assert_eq!(dict.get("J1909-3744_x"), Some(&9.0));
        assert!(!dict.contains_key("J1909-3744_B_efac"));
        assert_eq!(pal2_pulsar("run_J0437-4715_noise.txt", "run_", &["J0437-4715"]), Some("J0437-4715"));
        assert_eq!(pal2_pulsar("run_J0437-4715_noise.txt", "run_", &["J1909-3744"]), None);
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = get_noise_dict(&["J1"], "/definitely/not/here/").unwrap_err();
        assert!(matches!(err, WarpError::NoiseFileNotFound { .. }));
    }
}
