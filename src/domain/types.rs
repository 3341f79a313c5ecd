//! Run and model namespaces produced by the parameter-file interpreter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::Value;
use crate::error::WarpError;

/// Key → value map holding the attributes of one namespace (global or per model).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: BTreeMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Insert only when the key is absent. Returns `true` if the value was stored.
    pub fn insert_if_absent(&mut self, key: &str, value: Value) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_str(key).map(PathBuf::from)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, WarpError> {
        self.get_str(key).ok_or_else(|| WarpError::MissingField {
            key: key.to_string(),
        })
    }
}

/// One signal entry of a noise model: signal type plus its flavour/option.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub signal: String,
    pub option: serde_json::Value,
}

/// Ordered set of signals; order decides the composition order of the terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    pub entries: Vec<SignalSpec>,
}

impl SignalSet {
    pub fn iter(&self) -> impl Iterator<Item = &SignalSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.signal.as_str()).collect()
    }
}

/// A resolved noise-model file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseModel {
    pub model_name: String,
    /// Signals shared by all pulsars.
    pub common_signals: SignalSet,
    /// Fallback signal set for pulsars without their own entry.
    pub universal: SignalSet,
    /// Per-pulsar signal sets keyed by pulsar name.
    pub noisemodel: BTreeMap<String, SignalSet>,
}

impl NoiseModel {
    /// Signal set for a pulsar, falling back to `universal`.
    pub fn signals_for(&self, pulsar: &str) -> &SignalSet {
        self.noisemodel.get(pulsar).unwrap_or(&self.universal)
    }
}

/// Per-model namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_id: u32,
    pub fields: Namespace,
    pub noise: Option<NoiseModel>,
    /// Red-noise-with-selections dictionary, when configured.
    pub rs_model: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ModelConfig {
    pub fn new(model_id: u32) -> Self {
        Self {
            model_id,
            fields: Namespace::new(),
            noise: None,
            rs_model: None,
        }
    }

    pub fn noise_model(&self) -> Result<&NoiseModel, WarpError> {
        self.noise.as_ref().ok_or(WarpError::MissingNoiseModel {
            model_id: self.model_id,
        })
    }
}

/// The global namespace plus every model block of one parameter file.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub globals: Namespace,
    pub noise: Option<NoiseModel>,
    /// Models in the order their blocks first appeared in the file.
    pub models: Vec<ModelConfig>,
    pub label: String,
}

impl RunConfig {
    pub fn new(input_path: &Path) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            globals: Namespace::new(),
            noise: None,
            models: Vec::new(),
            label: String::new(),
        }
    }

    pub fn model(&self, model_id: u32) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    pub fn model_ids(&self) -> Vec<u32> {
        self.models.iter().map(|m| m.model_id).collect()
    }

    /// Open a model block; re-opening an id resets it in place.
    pub fn open_model(&mut self, model_id: u32) -> usize {
        match self.models.iter().position(|m| m.model_id == model_id) {
            Some(idx) => {
                self.models[idx] = ModelConfig::new(model_id);
                idx
            }
            None => {
                self.models.push(ModelConfig::new(model_id));
                self.models.len() - 1
            }
        }
    }

    pub fn psrlist(&self) -> Vec<String> {
        self.globals
            .get("psrlist")
            .and_then(Value::as_list)
            .map(|items| items.iter().map(|v| v.to_string()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(signals: &[&str]) -> SignalSet {
        SignalSet {
            entries: signals
                .iter()
                .map(|s| SignalSpec {
                    signal: s.to_string(),
                    option: serde_json::Value::from("vary"),
                })
                .collect(),
        }
    }

    #[test]
    fn unlisted_pulsar_falls_back_to_universal() {
        let mut noise = NoiseModel {
            universal: set(&["efac", "spin_noise"]),
            ..NoiseModel::default()
        };
        noise.noisemodel.insert("J0437-4715".to_string(), set(&["efac", "ecorr"]));

        assert_eq!(noise.signals_for("J1909-3744"), &noise.universal);
        assert_eq!(noise.signals_for("J0437-4715").signal_names(), vec!["efac", "ecorr"]);
    }

    #[test]
    fn reopening_a_model_resets_it_in_place() {
        let mut run = RunConfig::new(Path::new("params.dat"));
        let first = run.open_model(3);
        run.models[first].fields.insert("tm", Value::from("none"));
        run.open_model(1);
        let again = run.open_model(3);

        assert_eq!(first, again);
        assert_eq!(run.model_ids(), vec![3, 1]);
        assert!(run.models[again].fields.is_empty());
    }
}
