//! The configuration-to-model pipeline shared by the binary and the tests.
//!
//! parameter file -> resolved run -> pulsars (cache or source files) -> PTA per model

use std::path::Path;

use tracing::info;

use crate::assemble::{AssembledModel, init_pta};
use crate::config::{Override, load_params};
use crate::data::{PulsarLoader, PulsarSet, init_pulsars};
use crate::domain::RunConfig;
use crate::error::WarpError;
use crate::models::ModelCatalogue;

/// All outputs of one `ewarp` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub params: RunConfig,
    pub pulsars: PulsarSet,
    pub models: Vec<AssembledModel>,
}

/// Resolve a parameter file, load its pulsars and assemble every model.
pub fn run_analysis(
    prfile: &Path,
    overrides: &[Override],
    num: usize,
    catalogue: &dyn ModelCatalogue,
    loader: &dyn PulsarLoader,
) -> Result<RunOutput, WarpError> {
    info!(file = %prfile.display(), catalogue = catalogue.name(), "reading parameter file");
    let params = load_params(prfile, overrides, catalogue)?;
    info!(label = %params.label, models = params.models.len(), "parameters resolved");

    let pulsars = init_pulsars(&params, num, loader)?;
    info!(count = pulsars.pulsars.len(), tspan = pulsars.tspan, "pulsars ready");

    let models = init_pta(&params, &pulsars, catalogue)?;

    Ok(RunOutput {
        params,
        pulsars,
        models,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::data::cache::tests::{StubLoader, data_dir};
    use crate::data::{CACHE_DIR_NAME, LoadMode, cache_key};
    use crate::domain::Value;
    use crate::models::StandardModels;

    const NOISE_MODEL: &str = r#"{
        "model_name": "white noise + gwb",
        "common_signals": {"gwb": "hd"},
        "universal": {"efac": "by_backend", "spin_noise": "powerlaw"},
        "J0437-4715": {"efac": "vary"}
    }"#;

    struct Fixture {
        data: tempfile::TempDir,
        out: tempfile::TempDir,
        prfile: std::path::PathBuf,
    }

    fn fixture(pulsars: &[&str], body: &str) -> Fixture {
        let data = data_dir(pulsars);
        let out = tempfile::tempdir().unwrap();
        let noise = out.path().join("model.json");
        fs::write(&noise, NOISE_MODEL).unwrap();
        let prfile = out.path().join("params.dat");
        fs::write(
            &prfile,
            format!(
                "datadir: {}\nout: {}/run/\nnoise_model_file: {}\n{body}",
                data.path().display(),
                out.path().display(),
                noise.display()
            ),
        )
        .unwrap();
        Fixture { data, out, prfile }
    }

    #[test]
    fn batch_run_produces_one_pta_per_model() {
        let fx = fixture(
            &["J0437-4715", "J1909-3744"],
            "allpulsars: True\nssephem: DE436\n{0}\ntm: default\n{1}\ntm: none\nsn_fcpr: 0.1\n",
        );
        let loader = StubLoader::default();
        let overrides = [Override::new("sn_fcpr", Some(Value::Float(0.5)))];
        let run = run_analysis(&fx.prfile, &overrides, 0, &StandardModels::new(), &loader).unwrap();

        assert_eq!(run.params.label, "run_sn_fcpr_0.5");
        assert_eq!(run.pulsars.mode, LoadMode::Batch);
        assert_eq!(run.models.len(), 2);
        assert_eq!(run.models[0].model_name, "white noise + gwb");

        let names = run.models[1].param_names();
        assert!(names.contains(&"J0437-4715_efac".to_string()));
        assert!(names.contains(&"J1909-3744_CASPSR_40CM_efac".to_string()));
        assert!(names.contains(&"J1909-3744_red_noise_gamma".to_string()));
        assert!(names.contains(&"gw_log10_A".to_string()));

        let run_dir = fx.out.path().join("run");
        assert!(run_dir.join("pars_0.txt").exists());
        assert!(run_dir.join("pars_1.txt").exists());
        let key = cache_key(&["J0437-4715".to_string(), "J1909-3744".to_string()], "DE436");
        assert!(run_dir.join(CACHE_DIR_NAME).join(key).exists());
    }

    #[test]
    fn single_pulsar_run_writes_into_its_own_directory() {
        let fx = fixture(&["J0437-4715", "J1909-3744"], "allpulsars: False\n");
        let loader = StubLoader::default();
        let run = run_analysis(&fx.prfile, &[], 1, &StandardModels::new(), &loader).unwrap();

        assert_eq!(loader.calls.get(), 1);
        let dir = fx.out.path().join("run").join("1_J1909-3744");
        assert_eq!(run.pulsars.directory, dir);
        assert_eq!(run.models[0].params_file, dir.join("pars.txt"));
        let listing = fs::read_to_string(dir.join("pars.txt")).unwrap();
        assert!(listing.lines().any(|l| l == "J1909-3744_PDFB_20CM_efac"));
    }

    #[test]
    fn file_count_mismatch_stops_before_loading() {
        let fx = fixture(&["J0437-4715"], "allpulsars: True\n");
        fs::write(fx.data.path().join("J1909-3744.par"), "").unwrap();
        let loader = StubLoader::default();

        let err = run_analysis(&fx.prfile, &[], 0, &StandardModels::new(), &loader).unwrap_err();
        assert!(matches!(err, WarpError::DataFileCountMismatch { par: 2, tim: 1, .. }));
        assert_eq!(loader.calls.get(), 0);
    }
}
