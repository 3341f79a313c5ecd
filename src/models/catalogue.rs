//! Model catalogues: the keys they add to the parameter file, their default priors
//! and the builders that turn a noise-model entry into signal terms.

use std::collections::HashMap;

use crate::config::schema::FieldSchema;
use crate::data::Pulsar;
use crate::domain::{ModelConfig, Value};
use crate::error::WarpError;
use crate::models::signal::{Prior, SignalModel};

/// Everything a builder may read while constructing a term.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub params: &'a ModelConfig,
    /// The pulsar being modelled; `None` for common signals.
    pub pulsar: Option<&'a Pulsar>,
    /// Span used for Fourier frequency sampling, in seconds.
    pub tspan: f64,
}

impl BuildContext<'_> {
    /// Prior configured under `key` for this model.
    pub fn prior(&self, key: &str) -> Result<Prior, WarpError> {
        let value = self.value(key)?;
        Prior::from_value(key, value)
    }

    pub fn value(&self, key: &str) -> Result<&Value, WarpError> {
        self.params.fields.get(key).ok_or_else(|| WarpError::MissingField {
            key: key.to_string(),
        })
    }

    /// Non-negative integer setting, e.g. a number of Fourier components.
    pub fn count(&self, key: &str) -> Result<usize, WarpError> {
        let value = self.value(key)?;
        value
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| WarpError::InvalidField {
                key: key.to_string(),
                message: format!("expected a non-negative integer, got {value}"),
            })
    }
}

/// Builds the terms of one signal type for a given option (`"by_backend"`, `"hd"`, ...).
pub type SignalBuilder = Box<dyn Fn(&BuildContext<'_>, &serde_json::Value) -> Result<SignalModel, WarpError>>;

/// Signal builders by name, split into array-wide and per-pulsar signals.
#[derive(Default)]
pub struct SignalRegistry {
    common: HashMap<String, SignalBuilder>,
    single: HashMap<String, SignalBuilder>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_common<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&BuildContext<'_>, &serde_json::Value) -> Result<SignalModel, WarpError> + 'static,
    {
        self.common.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_single<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&BuildContext<'_>, &serde_json::Value) -> Result<SignalModel, WarpError> + 'static,
    {
        self.single.insert(name.to_string(), Box::new(builder));
    }

    pub fn build_common(
        &self,
        signal: &str,
        ctx: &BuildContext<'_>,
        option: &serde_json::Value,
    ) -> Result<SignalModel, WarpError> {
        let builder = self.common.get(signal).ok_or_else(|| WarpError::UnknownSignalType {
            scope: "common",
            signal: signal.to_string(),
        })?;
        builder(ctx, option)
    }

    pub fn build_single(
        &self,
        signal: &str,
        ctx: &BuildContext<'_>,
        option: &serde_json::Value,
    ) -> Result<SignalModel, WarpError> {
        let builder = self.single.get(signal).ok_or_else(|| WarpError::UnknownSignalType {
            scope: "single-pulsar",
            signal: signal.to_string(),
        })?;
        builder(ctx, option)
    }

    pub fn common_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.common.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn single_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.single.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for SignalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRegistry")
            .field("common", &self.common_names())
            .field("single", &self.single_names())
            .finish()
    }
}

/// A family of noise models usable from parameter files.
pub trait ModelCatalogue {
    fn name(&self) -> &str;

    /// Parameter-file keys this catalogue understands, on top of the base schema.
    fn label_attr_map(&self) -> FieldSchema;

    /// Default prior settings, applied to the global namespace when absent.
    fn priors(&self) -> Vec<(String, Value)>;

    fn registry(&self) -> &SignalRegistry;
}
