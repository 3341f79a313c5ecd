//! Turn resolved model configurations and loaded pulsars into PTA models.
//!
//! Every pulsar model is the timing model, plus the common signals of the noise
//! model, plus the pulsar's own signal set (`universal` when it has none).

pub mod ecorr;

use tracing::{info, warn};

use crate::data::PulsarSet;
use crate::domain::{ModelConfig, RunConfig};
use crate::error::WarpError;
use crate::io::export::{params_file_name, write_param_names};
use crate::io::noise_files::get_noise_dict;
use crate::models::{BuildContext, ModelCatalogue, ParamTemplate, Prior, Pta, SignalModel, SignalTerm, TermKind};

pub use ecorr::{EcorrPresence, detect_ecorr};

const RIDGE_LOG10_VARIANCE: Prior = Prior::Uniform { min: -20.0, max: -10.0 };

/// One model of the run, ready for sampling.
#[derive(Debug, Clone)]
pub struct AssembledModel {
    pub model_id: u32,
    pub model_name: String,
    pub pta: Pta,
    pub ecorr: Vec<(String, EcorrPresence)>,
    /// Where the varying parameter names were written.
    pub params_file: std::path::PathBuf,
}

impl AssembledModel {
    pub fn param_names(&self) -> Vec<String> {
        self.pta.param_names()
    }
}

/// Timing-model term for a `tm` setting; `none` yields no term.
pub fn timing_model(tm: &str) -> Result<Option<SignalModel>, WarpError> {
    let term = match tm {
        "default" => SignalTerm::new("linear_timing_model", TermKind::TimingModel { ridge: false }, Vec::new()),
        "ridge_regression" => SignalTerm::new(
            "ridge",
            TermKind::TimingModel { ridge: true },
            vec![ParamTemplate::pulsar("ridge_log10_variance", RIDGE_LOG10_VARIANCE)],
        ),
        "none" => return Ok(None),
        other => {
            return Err(WarpError::InvalidField {
                key: "tm".to_string(),
                message: format!("unknown timing model `{other}` (expected default, ridge_regression or none)"),
            });
        }
    };
    Ok(Some(term.into()))
}

/// Build the PTA of every model of the run and write its parameter listing.
pub fn init_pta(
    run: &RunConfig,
    pulsars: &PulsarSet,
    catalogue: &dyn ModelCatalogue,
) -> Result<Vec<AssembledModel>, WarpError> {
    let mut assembled = Vec::with_capacity(run.models.len());
    for model in &run.models {
        let mut built = assemble_model(model, pulsars, catalogue)?;

        let file_name = params_file_name(model.model_id, run.models.len());
        let names = built.param_names();
        info!(model = model.model_id, params = ?names, "params order");
        built.params_file = write_param_names(&pulsars.directory, &file_name, &names)?;
        assembled.push(built);
    }
    Ok(assembled)
}

fn assemble_model(
    model: &ModelConfig,
    pulsars: &PulsarSet,
    catalogue: &dyn ModelCatalogue,
) -> Result<AssembledModel, WarpError> {
    let noise = model.noise_model()?;
    let registry = catalogue.registry();

    let tm = model.fields.get_str("tm").unwrap_or("default");
    let mut base = timing_model(tm)?.unwrap_or_default();

    let common_ctx = BuildContext {
        params: model,
        pulsar: None,
        tspan: pulsars.tspan,
    };
    for spec in noise.common_signals.iter() {
        base += registry.build_common(&spec.signal, &common_ctx, &spec.option)?;
    }

    let mut bound = Vec::with_capacity(pulsars.pulsars.len());
    let mut ecorr = Vec::with_capacity(pulsars.pulsars.len());
    for psr in &pulsars.pulsars {
        let presence = detect_ecorr(psr);
        if presence == EcorrPresence::Unknown {
            warn!(pulsar = %psr.name, "no native noise model available; ECORR presence unknown");
        }
        ecorr.push((psr.name.clone(), presence));

        let ctx = BuildContext {
            params: model,
            pulsar: Some(psr),
            tspan: pulsars.tspan,
        };
        let mut psr_model = base.clone();
        for spec in noise.signals_for(&psr.name).iter() {
            psr_model += registry.build_single(&spec.signal, &ctx, &spec.option)?;
        }
        bound.push(psr_model.bind(psr));
    }

    let mut pta = Pta::new(bound);

    if let Some(prefix) = model.fields.get_str("noisefiles") {
        let names = pulsars.names();
        let dict = get_noise_dict(&names, prefix)?;
        let set = pta.set_default_params(&dict);
        info!(model = model.model_id, count = set, "constant parameters set from noise files");
    }
    let unset = pta.unset_constants();
    if !unset.is_empty() {
        warn!(model = model.model_id, params = ?unset, "constant parameters without a value");
    }

    Ok(AssembledModel {
        model_id: model.model_id,
        model_name: noise.model_name.clone(),
        pta,
        ecorr,
        params_file: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use serde_json::json;

    use super::*;
    use crate::data::{LoadMode, Pulsar};
    use crate::domain::{NoiseModel, SignalSet, SignalSpec, Value};
    use crate::models::StandardModels;

    fn signals(entries: &[(&str, &str)]) -> SignalSet {
        SignalSet {
            entries: entries
                .iter()
                .map(|(signal, option)| SignalSpec {
                    signal: signal.to_string(),
                    option: json!(option),
                })
                .collect(),
        }
    }

    fn pulsar(name: &str, ecorr: bool) -> Pulsar {
        let noise: BTreeMap<String, f64> = if ecorr {
            BTreeMap::from([("ECORR -f A".to_string(), 0.1)])
        } else {
            BTreeMap::new()
        };
        Pulsar {
            name: name.to_string(),
            toas: vec![0.0, 100.0, 200.0],
            toaerrs: vec![1e-6; 3],
            freqs: vec![1400.0; 3],
            backends: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            fitpars: vec!["F0".to_string(), "F1".to_string()],
            noise_metadata: Some(noise),
            ephem: None,
            clock: None,
        }
    }

    fn run_with(noise: NoiseModel, model_fields: &[(&str, Value)], model_count: u32) -> RunConfig {
        let mut run = RunConfig::new(Path::new("params.dat"));
        for id in 0..model_count {
            let idx = run.open_model(id);
            let model = &mut run.models[idx];
            for (key, value) in StandardModels::new().priors() {
                model.fields.insert(key, value);
            }
            for (key, value) in model_fields {
                model.fields.insert(*key, value.clone());
            }
            model.noise = Some(noise.clone());
        }
        run
    }

    fn pulsar_set(dir: &Path) -> PulsarSet {
        PulsarSet {
            pulsars: vec![pulsar("J0437-4715", true), pulsar("J1909-3744", false)],
            tspan: 200.0,
            directory: dir.to_path_buf(),
            mode: LoadMode::Batch,
        }
    }

    fn noise_model() -> NoiseModel {
        let mut noise = NoiseModel {
            model_name: "white + red".to_string(),
            common_signals: signals(&[("gwb", "hd")]),
            universal: signals(&[("efac", "vary"), ("spin_noise", "powerlaw")]),
            noisemodel: BTreeMap::new(),
        };
        noise
            .noisemodel
            .insert("J0437-4715".to_string(), signals(&[("efac", "by_backend"), ("ecorr", "by_backend")]));
        noise
    }

    #[test]
    fn pulsar_models_combine_timing_common_and_own_signals() {
        let out = tempfile::tempdir().unwrap();
        let run = run_with(noise_model(), &[("tm", Value::from("default"))], 1);
        let models = init_pta(&run, &pulsar_set(out.path()), &StandardModels::new()).unwrap();

        assert_eq!(models.len(), 1);
        let pta = &models[0].pta;
        let terms: Vec<Vec<&str>> = pta
            .models()
            .iter()
            .map(|m| m.terms.iter().map(|t| t.name.as_str()).collect())
            .collect();
        assert_eq!(terms[0], vec!["linear_timing_model", "gwb", "efac", "ecorr"]);
        // Not listed in the noise model: universal signals.
        assert_eq!(terms[1], vec!["linear_timing_model", "gwb", "efac", "spin_noise"]);

        assert_eq!(
            models[0].param_names(),
            vec![
                "J0437-4715_A_efac",
                "J0437-4715_A_log10_ecorr",
                "J0437-4715_B_efac",
                "J0437-4715_B_log10_ecorr",
                "J1909-3744_efac",
                "J1909-3744_red_noise_gamma",
                "J1909-3744_red_noise_log10_A",
                "gw_gamma",
                "gw_log10_A",
            ]
        );
        assert_eq!(
            models[0].ecorr,
            vec![
                ("J0437-4715".to_string(), EcorrPresence::Present),
                ("J1909-3744".to_string(), EcorrPresence::Absent),
            ]
        );

        let listing = fs::read_to_string(out.path().join("pars.txt")).unwrap();
        assert_eq!(listing.lines().count(), 9);
        assert_eq!(models[0].params_file, out.path().join("pars.txt"));
    }

    #[test]
    fn ridge_timing_model_adds_variance_parameter() {
        let out = tempfile::tempdir().unwrap();
        let noise = NoiseModel {
            model_name: "tm only".to_string(),
            ..NoiseModel::default()
        };
        let run = run_with(noise, &[("tm", Value::from("ridge_regression"))], 2);
        let models = init_pta(&run, &pulsar_set(out.path()), &StandardModels::new()).unwrap();

        assert_eq!(
            models[1].param_names(),
            vec!["J0437-4715_ridge_log10_variance", "J1909-3744_ridge_log10_variance"]
        );
        let basis = models[1].pta.models()[0].terms[0].basis.as_ref().unwrap();
        assert_eq!(basis.shape(), (3, 3));
        assert!(out.path().join("pars_0.txt").exists());
        assert!(out.path().join("pars_1.txt").exists());
    }

    #[test]
    fn pulsar_without_noise_metadata_still_assembles() {
        let out = tempfile::tempdir().unwrap();
        let mut set = pulsar_set(out.path());
        set.pulsars[1].noise_metadata = None;
        let run = run_with(noise_model(), &[("tm", Value::from("default"))], 1);

        let models = init_pta(&run, &set, &StandardModels::new()).unwrap();
        assert_eq!(
            models[0].ecorr,
            vec![
                ("J0437-4715".to_string(), EcorrPresence::Present),
                ("J1909-3744".to_string(), EcorrPresence::Unknown),
            ]
        );
        assert!(models[0].param_names().contains(&"J1909-3744_efac".to_string()));
        assert!(out.path().join("pars.txt").exists());
    }

    #[test]
    fn tm_none_and_unknown_tm() {
        assert!(timing_model("none").unwrap().is_none());
        let err = timing_model("quadratic").unwrap_err();
        assert!(matches!(err, WarpError::InvalidField { key, .. } if key == "tm"));
    }

    #[test]
    fn unknown_signal_and_missing_noise_model_fail() {
        let out = tempfile::tempdir().unwrap();
        let mut noise = noise_model();
        noise.universal = signals(&[("chromatic_noise", "powerlaw")]);
        let run = run_with(noise, &[], 1);
        let err = init_pta(&run, &pulsar_set(out.path()), &StandardModels::new()).unwrap_err();
        assert!(matches!(err, WarpError::UnknownSignalType { signal, .. } if signal == "chromatic_noise"));

        let mut run = run_with(noise_model(), &[], 1);
        run.models[0].noise = None;
        let err = init_pta(&run, &pulsar_set(out.path()), &StandardModels::new()).unwrap_err();
        assert!(matches!(err, WarpError::MissingNoiseModel { model_id: 0 }));
    }

    #[test]
    fn constant_efac_comes_from_noise_files() {
        let out = tempfile::tempdir().unwrap();
        let noise_dir = tempfile::tempdir().unwrap();
        fs::write(noise_dir.path().join("J1909-3744_noise.txt"), "efac-X 1.3\n").unwrap();
        fs::write(
            noise_dir.path().join("J1909-3744.json"),
            r#"{"J1909-3744_efac": 1.2}"#,
        )
        .unwrap();

        let mut noise = noise_model();
        noise.noisemodel.clear();
        noise.common_signals = SignalSet::default();
        noise.universal = signals(&[("efac", "vary"), ("equad", "vary")]);
        let run = run_with(
            noise,
            &[
                ("tm", Value::from("none")),
                ("efacpr", Value::Float(-1.0)),
                ("noisefiles", Value::from(format!("{}/", noise_dir.path().display()))),
            ],
            1,
        );
        let models = init_pta(&run, &pulsar_set(out.path()), &StandardModels::new()).unwrap();

        assert_eq!(
            models[0].param_names(),
            vec!["J0437-4715_log10_equad", "J1909-3744_log10_equad"]
        );
        assert_eq!(models[0].pta.unset_constants(), vec!["J0437-4715_efac"]);
    }
}
