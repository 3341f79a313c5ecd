//! Pulsar timing data and the loader interface.
//!
//! The pipeline only needs a pulsar's name, its TOAs, per-TOA backend flags, the
//! fitted timing parameters and the native noise-model lines of its `.par` file.
//! [`Tempo2Loader`] reads exactly that subset of tempo2-style files; anything else
//! in the files is ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WarpError;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Par-file noise keywords that carry a flag selection (`KEY -flag value number`).
const FLAGGED_NOISE_KEYS: [&str; 8] = [
    "EFAC", "EQUAD", "ECORR", "T2EFAC", "T2EQUAD", "TNEF", "TNEQ", "TNECORR",
];

/// Par-file noise keywords without a selection (`KEY number`).
const PLAIN_NOISE_KEYS: [&str; 5] = ["TNRedAmp", "TNRedGam", "TNRedC", "TNDMAmp", "TNDMGam"];

/// TOA flags tried, in order, to name the backend of an observation.
const BACKEND_FLAGS: [&str; 3] = ["-f", "-group", "-be"];

/// One pulsar's timing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulsar {
    pub name: String,
    /// Times of arrival in seconds (MJD × 86400).
    pub toas: Vec<f64>,
    /// TOA uncertainties in seconds.
    pub toaerrs: Vec<f64>,
    /// Observing frequencies in MHz.
    pub freqs: Vec<f64>,
    /// Backend/system label of each TOA (empty when unflagged).
    pub backends: Vec<String>,
    /// Timing parameters marked for fitting in the `.par` file.
    pub fitpars: Vec<String>,
    /// Native noise-model lines of the `.par` file, keyed by their selection
    /// (e.g. `ECORR -f PDFB_20CM`). `None` when the source carries no such metadata.
    pub noise_metadata: Option<BTreeMap<String, f64>>,
    pub ephem: Option<String>,
    pub clock: Option<String>,
}

impl Pulsar {
    /// `(min, max)` TOA in seconds.
    pub fn toa_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.toas.iter().copied().filter(|t| t.is_finite());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Observation span in seconds.
    pub fn tspan(&self) -> f64 {
        self.toa_range().map(|(lo, hi)| hi - lo).unwrap_or(0.0)
    }

    /// Distinct backend labels, sorted.
    pub fn backend_names(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.backends.iter().filter(|b| !b.is_empty()).collect();
        set.into_iter().cloned().collect()
    }
}

/// Source of pulsar objects for matched `.par`/`.tim` files.
pub trait PulsarLoader {
    fn load(&self, par: &Path, tim: &Path, ephem: Option<&str>, clock: Option<&str>) -> Result<Pulsar, WarpError>;
}

/// Reader for the tempo2 `.par`/`.tim` subset described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tempo2Loader;

impl PulsarLoader for Tempo2Loader {
    fn load(&self, par: &Path, tim: &Path, ephem: Option<&str>, clock: Option<&str>) -> Result<Pulsar, WarpError> {
        let par_text = fs::read_to_string(par).map_err(|e| WarpError::io(par, e))?;
        let tim_text = fs::read_to_string(tim).map_err(|e| WarpError::io(tim, e))?;

        let par_info = parse_par(&par_text).map_err(|message| WarpError::PulsarLoad {
            path: par.to_path_buf(),
            message,
        })?;
        let toas = parse_tim(&tim_text).map_err(|message| WarpError::PulsarLoad {
            path: tim.to_path_buf(),
            message,
        })?;
        if toas.is_empty() {
            return Err(WarpError::PulsarLoad {
                path: tim.to_path_buf(),
                message: "no TOAs found".to_string(),
            });
        }

        Ok(Pulsar {
            name: par_info.name,
            toas: toas.iter().map(|t| t.mjd * SECONDS_PER_DAY).collect(),
            toaerrs: toas.iter().map(|t| t.err_us * 1e-6).collect(),
            freqs: toas.iter().map(|t| t.freq).collect(),
            backends: toas.into_iter().map(|t| t.backend).collect(),
            fitpars: par_info.fitpars,
            noise_metadata: Some(par_info.noise),
            ephem: ephem.map(str::to_string),
            clock: clock.map(str::to_string),
        })
    }
}

#[derive(Debug)]
struct ParInfo {
    name: String,
    fitpars: Vec<String>,
    noise: BTreeMap<String, f64>,
}

fn parse_par(text: &str) -> Result<ParInfo, String> {
    let mut names: BTreeMap<&str, String> = BTreeMap::new();
    let mut fitpars = Vec::new();
    let mut noise = BTreeMap::new();

    for (idx, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&key) = tokens.first() else { continue };
        if key.starts_with('#') || key == "C" {
            continue;
        }

        if matches!(key, "PSRJ" | "PSR" | "PSRB") {
            if let Some(name) = tokens.get(1) {
                names.insert(key, name.to_string());
            }
            continue;
        }

        if FLAGGED_NOISE_KEYS.contains(&key) {
            if tokens.len() < 4 {
                // Old-style global EFAC/EQUAD lines have no selection; keep them as-is.
                if let Some(value) = tokens.get(1).and_then(|v| v.parse::<f64>().ok()) {
                    noise.insert(key.to_string(), value);
                }
                continue;
            }
            let value = tokens[3]
                .parse::<f64>()
                .map_err(|_| format!("line {}: invalid {key} value `{}`", idx + 1, tokens[3]))?;
            noise.insert(format!("{key} {} {}", tokens[1], tokens[2]), value);
            continue;
        }

        if PLAIN_NOISE_KEYS.contains(&key) {
            if let Some(value) = tokens.get(1).and_then(|v| v.parse::<f64>().ok()) {
                noise.insert(key.to_string(), value);
            }
            continue;
        }

        if tokens.get(2) == Some(&"1") {
            fitpars.push(key.to_string());
        }
    }

    let name = ["PSRJ", "PSR", "PSRB"]
        .iter()
        .find_map(|k| names.remove(k))
        .ok_or_else(|| "no PSRJ/PSR/PSRB line".to_string())?;

    Ok(ParInfo { name, fitpars, noise })
}

#[derive(Debug)]
struct TimRow {
    freq: f64,
    mjd: f64,
    err_us: f64,
    backend: String,
}

fn parse_tim(text: &str) -> Result<Vec<TimRow>, String> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&first) = tokens.first() else { continue };
        if first.starts_with('#')
            || first == "C"
            || matches!(first, "FORMAT" | "MODE" | "TIME" | "EFAC" | "EQUAD" | "JUMP" | "INCLUDE" | "SKIP" | "NOSKIP" | "END")
        {
            continue;
        }
        if tokens.len() < 5 {
            return Err(format!("line {}: expected `file freq mjd err site [flags]`", idx + 1));
        }

        let number = |pos: usize, what: &str| {
            tokens[pos]
                .parse::<f64>()
                .map_err(|_| format!("line {}: invalid {what} `{}`", idx + 1, tokens[pos]))
        };
        let freq = number(1, "frequency")?;
        let mjd = number(2, "MJD")?;
        let err_us = number(3, "TOA error")?;

        let flags: Vec<(&str, &str)> = tokens[5..]
            .chunks(2)
            .filter_map(|pair| match pair {
                [flag, value] if flag.starts_with('-') => Some((*flag, *value)),
                _ => None,
            })
            .collect();
        let backend = BACKEND_FLAGS
            .iter()
            .find_map(|wanted| flags.iter().find(|(flag, _)| flag == wanted).map(|(_, v)| v.to_string()))
            .unwrap_or_default();

        rows.push(TimRow {
            freq,
            mjd,
            err_us,
            backend,
        });
    }
    Ok(rows)
}

/// Pulsar name implied by a data file name: `J0437-4715_ppta.par` → `J0437-4715`.
pub fn pulsar_name_from_path(path: &Path) -> String {
    let file = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = file.split('_').next().unwrap_or_default();
    stem.split('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAR: &str = "\
PSRJ           J0437-4715
F0             173.6879458121843 1 0.0000000000001
F1             -1.7283E-15 1 1e-20
PEPOCH         55000
RAJ            04:37:15.8 0
TNECORR -f PDFB_20CM 0.3
ECORR -f CASPSR_40CM 0.5
T2EFAC -f PDFB_20CM 1.1
TNRedAmp -13.5
";

    const TIM: &str = "\
FORMAT 1
C a comment
obs1.rf 1400.0 55000.000000000 1.2 pks -f PDFB_20CM -B 20CM
obs2.rf 3100.0 55100.500000000 0.8 pks -f CASPSR_40CM
obs3.rf 700.0  55400.250000000 2.0 pks -group PDFB_50CM
";

    #[test]
    fn tempo2_loader_reads_the_needed_subset() {
        let dir = tempfile::tempdir().unwrap();
        let par = dir.path().join("J0437-4715.par");
        let tim = dir.path().join("J0437-4715.tim");
        fs::write(&par, PAR).unwrap();
        fs::write(&tim, TIM).unwrap();

        let psr = Tempo2Loader.load(&par, &tim, Some("DE436"), None).unwrap();
        assert_eq!(psr.name, "J0437-4715");
        assert_eq!(psr.toas.len(), 3);
        assert_eq!(psr.fitpars, vec!["F0", "F1"]);
        assert_eq!(psr.backend_names(), vec!["CASPSR_40CM", "PDFB_20CM", "PDFB_50CM"]);
        assert!((psr.tspan() - 400.25 * SECONDS_PER_DAY).abs() < 1e-3);
        assert!((psr.toaerrs[0] - 1.2e-6).abs() < 1e-15);
        assert_eq!(psr.ephem.as_deref(), Some("DE436"));

        let noise = psr.noise_metadata.as_ref().unwrap();
        assert_eq!(noise.get("ECORR -f CASPSR_40CM"), Some(&0.5));
        assert_eq!(noise.get("TNECORR -f PDFB_20CM"), Some(&0.3));
        assert_eq!(noise.get("TNRedAmp"), Some(&-13.5));
    }

    #[test]
    fn par_without_name_is_rejected() {
        assert!(parse_par("F0 1.0 1\n").is_err());
    }

    #[test]
    fn malformed_toa_line_is_rejected() {
        let err = parse_tim("FORMAT 1\nobs1.rf 1400.0 not-a-date 1.0 pks\n").unwrap_err();
        assert!(err.contains("line 2"));
    }

    #[test]
    fn names_come_from_file_names() {
        assert_eq!(pulsar_name_from_path(Path::new("/d/J0437-4715_ppta.par")), "J0437-4715");
        assert_eq!(pulsar_name_from_path(Path::new("/d/J1909-3744.tim")), "J1909-3744");
        assert_eq!(pulsar_name_from_path(Path::new("B1855+09.dr2.par")), "B1855+09");
    }
}
