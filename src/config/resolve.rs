//! Override, default and clone passes applied after parsing.
//!
//! The passes run in a fixed order (see [`load_params`]):
//! parse → label → command-line overrides → defaults → noise-model files → clone.
//! Cloning runs last and never overwrites, so a value set in a model block always
//! wins over the global one.

use std::fs;
use std::path::{Component, Path};

use tracing::{debug, info};

use crate::config::parser::parse_params_file;
use crate::config::schema::FieldSchema;
use crate::domain::{RunConfig, Value};
use crate::error::WarpError;
use crate::io::noise_model::{read_json_dict, read_modeldicts};
use crate::models::ModelCatalogue;

/// A command-line option that may override a per-model parameter of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub name: String,
    pub value: Option<Value>,
}

impl Override {
    pub fn new(name: &str, value: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Parse a parameter file and run every resolution pass over it.
pub fn load_params(
    path: &Path,
    overrides: &[Override],
    catalogue: &dyn ModelCatalogue,
) -> Result<RunConfig, WarpError> {
    let mut schema = FieldSchema::base();
    schema.extend(catalogue.label_attr_map());

    let mut run = parse_params_file(path, &schema)?;
    run.label = run_label(run.globals.require_str("out")?);

    override_params_using_opts(&mut run, overrides);
    set_default_params(&mut run, catalogue)?;
    read_modeldicts(&mut run)?;
    clone_all_params_to_models(&mut run);

    Ok(run)
}

/// Base name of the normalized output path: `/out/noise/` → `noise`.
pub fn run_label(out: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(out).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    parts.pop().unwrap_or_default()
}

/// Overwrite model parameters that are also given on the command line.
///
/// Only parameters already present in a model block are overridden; each
/// override appends `_<name>_<value>` to the run label.
pub fn override_params_using_opts(run: &mut RunConfig, overrides: &[Override]) {
    for model in &mut run.models {
        for opt in overrides {
            let Some(value) = &opt.value else { continue };
            if !model.fields.contains(&opt.name) {
                continue;
            }
            model.fields.insert(opt.name.clone(), value.clone());
            run.label.push_str(&format!("_{}_{}", opt.name, value));
            info!(model = model.model_id, parameter = %opt.name, %value, "overriding parameter");
            info!(label = %run.label, "setting label");
        }
    }
}

/// Fill in defaults: hardcoded run flags, the pulsar list, catalogue priors and
/// per-model extras.
pub fn set_default_params(run: &mut RunConfig, catalogue: &dyn ModelCatalogue) -> Result<(), WarpError> {
    info!(file = %run.input_path.display(), "setting default parameters");
    let globals = &mut run.globals;

    globals.insert_if_absent("setupsamp", Value::Bool(false));

    match globals.get("psrlist").cloned() {
        Some(Value::Str(path)) => {
            let names = read_psrlist(Path::new(&path))?;
            info!(count = names.len(), "only using pulsars from psrlist");
            globals.insert("psrlist", Value::List(names.into_iter().map(Value::Str).collect()));
        }
        Some(other) => {
            return Err(WarpError::InvalidField {
                key: "psrlist".to_string(),
                message: format!("expected a single file path, got {other}"),
            });
        }
        None => {
            info!("using all available pulsars from .par/.tim directory");
            globals.insert("psrlist", Value::List(Vec::new()));
        }
    }

    if globals.insert_if_absent("tm", Value::from("default")) {
        info!("setting a default linear timing model");
    }
    if globals.insert_if_absent("inc_events", Value::Bool(true)) {
        info!("including transient events to specific pulsar models");
    }
    if globals.insert_if_absent("fref", Value::Float(1400.0)) {
        info!("setting reference radio frequency to 1400 MHz");
    }

    // Priors are shared by all models of a run.
    for (key, default) in catalogue.priors() {
        if globals.insert_if_absent(&key, default) {
            debug!(prior = %key, "using catalogue default prior");
        }
    }

    for model in &mut run.models {
        let rs_path = model
            .fields
            .get_str("rs_model")
            .or_else(|| run.globals.get_str("rs_model"))
            .map(str::to_string);
        model.rs_model = match rs_path {
            Some(path) => Some(read_json_dict(Path::new(&path))?),
            None => {
                info!(model = model.model_id, "not adding red noise with selections");
                None
            }
        };

        for key in ["custom_commonpsr", "custom_singlepsr"] {
            if !run.globals.contains(key) {
                model.fields.insert_if_absent(key, Value::from(""));
            }
        }
    }

    Ok(())
}

/// Copy every global parameter into every model that does not set it itself.
pub fn clone_all_params_to_models(run: &mut RunConfig) {
    for model in &mut run.models {
        for (key, value) in run.globals.iter() {
            model.fields.insert_if_absent(key, value.clone());
        }
        if model.noise.is_none() {
            model.noise = run.noise.clone();
        }
    }
}

/// Whitespace-separated pulsar names; `#` starts a comment.
fn read_psrlist(path: &Path) -> Result<Vec<String>, WarpError> {
    let text = fs::read_to_string(path).map_err(|e| WarpError::io(path, e))?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect())
}
