//! Noise-model JSON files.
//!
//! ```json
//! {
//!   "model_name": "white + red",
//!   "common_signals": {"gwb": "hd"},
//!   "universal": {"efac": "by_backend", "spin_noise": "powerlaw"},
//!   "J0437-4715": {"efac": "by_backend", "ecorr": "by_backend"}
//! }
//! ```
//!
//! The reserved keys are split out; every other key names a pulsar.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value as Json};
use tracing::info;

use crate::domain::{NoiseModel, RunConfig, SignalSet, SignalSpec};
use crate::error::WarpError;

const COMMON_SIGNALS: &str = "common_signals";
const UNIVERSAL: &str = "universal";
const MODEL_NAME: &str = "model_name";

/// Read a JSON file whose top level must be an object.
pub fn read_json_dict(path: &Path) -> Result<Map<String, Json>, WarpError> {
    let file = File::open(path).map_err(|source| WarpError::NoiseFileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Json = serde_json::from_reader(BufReader::new(file)).map_err(|e| WarpError::NoiseFileParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match value {
        Json::Object(map) => Ok(map),
        other => Err(WarpError::NoiseFileParse {
            path: path.to_path_buf(),
            message: format!("expected a JSON object at the top level, found {}", json_kind(&other)),
        }),
    }
}

/// Load a noise-model file and split out its reserved keys.
pub fn load_noise_model(path: &Path) -> Result<NoiseModel, WarpError> {
    let map = read_json_dict(path)?;
    noise_model_from_map(path, map)
}

/// Build a [`NoiseModel`] from an already-parsed JSON object.
pub fn noise_model_from_map(path: &Path, mut map: Map<String, Json>) -> Result<NoiseModel, WarpError> {
    let parse_err = |message: String| WarpError::NoiseFileParse {
        path: path.to_path_buf(),
        message,
    };

    let common = map
        .remove(COMMON_SIGNALS)
        .ok_or_else(|| parse_err(format!("missing `{COMMON_SIGNALS}`")))?;
    let universal = map
        .remove(UNIVERSAL)
        .ok_or_else(|| parse_err(format!("missing `{UNIVERSAL}`")))?;
    let model_name = match map.remove(MODEL_NAME) {
        Some(Json::String(name)) => name,
        Some(other) => return Err(parse_err(format!("`{MODEL_NAME}` must be a string, found {}", json_kind(&other)))),
        None => return Err(parse_err(format!("missing `{MODEL_NAME}`"))),
    };

    let common_signals = signal_set(COMMON_SIGNALS, common).map_err(parse_err)?;
    let universal = signal_set(UNIVERSAL, universal).map_err(parse_err)?;

    let mut noisemodel = BTreeMap::new();
    for (pulsar, entry) in map {
        let set = signal_set(&pulsar, entry).map_err(parse_err)?;
        noisemodel.insert(pulsar, set);
    }

    Ok(NoiseModel {
        model_name,
        common_signals,
        universal,
        noisemodel,
    })
}

fn signal_set(key: &str, value: Json) -> Result<SignalSet, String> {
    match value {
        Json::Object(entries) => Ok(SignalSet {
            entries: entries
                .into_iter()
                .map(|(signal, option)| SignalSpec { signal, option })
                .collect(),
        }),
        other => Err(format!("`{key}` must map signal types to options, found {}", json_kind(&other))),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Resolve the global `noise_model_file` and every model-specific one.
///
/// A model file replaces the global noise model for that model entirely.
pub fn read_modeldicts(run: &mut RunConfig) -> Result<(), WarpError> {
    if let Some(path) = run.globals.get_path("noise_model_file") {
        let noise = load_noise_model(&path)?;
        info!(path = %path.display(), model_name = %noise.model_name, "loaded general noise model");
        run.noise = Some(noise);
    }

    for model in &mut run.models {
        if let Some(path) = model.fields.get_path("noise_model_file") {
            let noise = load_noise_model(&path)?;
            info!(
                model = model.model_id,
                path = %path.display(),
                model_name = %noise.model_name,
                "loaded model-specific noise model"
            );
            model.noise = Some(noise);
        }
    }

    Ok(())
}
