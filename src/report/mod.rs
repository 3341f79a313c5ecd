//! Formatted terminal output for a finished run.

use crate::assemble::{AssembledModel, EcorrPresence};
use crate::data::{LoadMode, PulsarSet};
use crate::domain::RunConfig;

/// Summary of the resolved run: label, pulsars and one line per model.
pub fn format_run_summary(run: &RunConfig, pulsars: &PulsarSet, models: &[AssembledModel]) -> String {
    let mut out = String::new();

    out.push_str("=== ewarp - noise model setup ===\n");
    out.push_str(&format!("Parameters: {}\n", run.input_path.display()));
    out.push_str(&format!("Label: {}\n", run.label));
    let mode = match pulsars.mode {
        LoadMode::Batch => "all pulsars".to_string(),
        LoadMode::Single { index } => format!("single pulsar #{index}"),
    };
    out.push_str(&format!("Mode: {mode}\n"));
    out.push_str(&format!(
        "Pulsars: n={} | Tspan={:.3} d\n",
        pulsars.pulsars.len(),
        pulsars.tspan / 86_400.0
    ));
    out.push_str(&format!("Output: {}\n", pulsars.directory.display()));

    out.push_str("\nModels:\n");
    for model in models {
        out.push_str(&format!(
            "- {:<3} {:<24} params={:<4} {}\n",
            model.model_id,
            truncate(&model.model_name, 24),
            model.param_names().len(),
            model.params_file.display()
        ));
    }

    if let Some(model) = models.first() {
        let with_ecorr: Vec<&str> = model
            .ecorr
            .iter()
            .filter(|(_, presence)| *presence == EcorrPresence::Present)
            .map(|(name, _)| name.as_str())
            .collect();
        if !with_ecorr.is_empty() {
            out.push_str(&format!("\nECORR in timing solution: {}\n", with_ecorr.join(", ")));
        }
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::models::Pta;

    #[test]
    fn summary_lists_every_model() {
        let mut run = RunConfig::new(Path::new("params.dat"));
        run.label = "noise_sn_fcpr_1.0".to_string();
        let pulsars = PulsarSet {
            pulsars: Vec::new(),
            tspan: 86_400.0 * 2.5,
            directory: PathBuf::from("/out/3_J0437-4715"),
            mode: LoadMode::Single { index: 3 },
        };
        let models = vec![AssembledModel {
            model_id: 0,
            model_name: "a rather long noise model name".to_string(),
            pta: Pta::new(Vec::new()),
            ecorr: vec![("J0437-4715".to_string(), EcorrPresence::Present)],
            params_file: PathBuf::from("/out/3_J0437-4715/pars.txt"),
        }];

        let text = format_run_summary(&run, &pulsars, &models);
        assert!(text.contains("Label: noise_sn_fcpr_1.0"));
        assert!(text.contains("Mode: single pulsar #3"));
        assert!(text.contains("Tspan=2.500 d"));
        assert!(text.contains("a rather long noise mod."));
        assert!(text.contains("params=0"));
        assert!(text.contains("ECORR in timing solution: J0437-4715"));
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 4), "abc.");
    }
}
