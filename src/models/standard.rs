//! The standard noise-model catalogue.
//!
//! Per-pulsar signals: `efac`, `equad`, `ecorr` (options `by_backend`, `none`, or
//! anything else for a single parameter), `spin_noise` and `dm_noise`
//! (`powerlaw`, `free_spectrum`, `none`). Common signal: `gwb` (`hd` for
//! Hellings-Downs correlations, otherwise uncorrelated).

use crate::config::schema::{FieldSchema, FieldSpec};
use crate::domain::{Value, ValueKind};
use crate::error::WarpError;
use crate::models::catalogue::{BuildContext, ModelCatalogue, SignalRegistry};
use crate::models::signal::{Correlation, ParamTemplate, Prior, SignalModel, SignalTerm, TermKind};

/// Free-spectrum `log10_rho` range.
const RHO_PRIOR: Prior = Prior::Uniform { min: -10.0, max: -4.0 };

/// Prior keys with their default settings.
const PRIOR_DEFAULTS: &[(&str, &[f64])] = &[
    ("efacpr", &[0.01, 10.0]),
    ("equadpr", &[-10.0, -4.0]),
    ("ecorrpr", &[-10.0, -4.0]),
    ("sn_lgA", &[-20.0, -6.0]),
    ("sn_gamma", &[0.0, 10.0]),
    ("dmn_lgA", &[-20.0, -6.0]),
    ("dmn_gamma", &[0.0, 10.0]),
    ("gwb_lgA", &[-20.0, -6.0]),
    ("gwb_gamma", &[0.0, 10.0]),
];

const DEFAULT_FOURIER_COMPONENTS: i64 = 30;

pub struct StandardModels {
    registry: SignalRegistry,
}

impl StandardModels {
    pub fn new() -> Self {
        let mut registry = SignalRegistry::new();
        registry.register_single("efac", |ctx, option| white_noise(ctx, option, "efac", "efac", "efacpr"));
        registry.register_single("equad", |ctx, option| {
            white_noise(ctx, option, "equad", "log10_equad", "equadpr")
        });
        registry.register_single("ecorr", |ctx, option| {
            white_noise(ctx, option, "ecorr", "log10_ecorr", "ecorrpr")
        });
        registry.register_single("spin_noise", |ctx, option| {
            red_process(ctx, option, "spin_noise", "red_noise", ("sn_lgA", "sn_gamma"))
        });
        registry.register_single("dm_noise", |ctx, option| {
            red_process(ctx, option, "dm_noise", "dm_gp", ("dmn_lgA", "dmn_gamma"))
        });
        registry.register_common("gwb", gwb);
        Self { registry }
    }
}

impl Default for StandardModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCatalogue for StandardModels {
    fn name(&self) -> &str {
        "standard"
    }

    fn label_attr_map(&self) -> FieldSchema {
        let mut schema = FieldSchema::new();
        for (key, _) in PRIOR_DEFAULTS {
            schema.insert(&format!("{key}:"), FieldSpec::new(key, &[ValueKind::Float]));
        }
        schema.insert("sn_fourier_comp:", FieldSpec::new("sn_fourier_comp", &[ValueKind::Int]));
        schema.insert("sn_fcpr:", FieldSpec::new("sn_fcpr", &[ValueKind::Float]));
        schema
    }

    fn priors(&self) -> Vec<(String, Value)> {
        let mut priors: Vec<(String, Value)> = PRIOR_DEFAULTS
            .iter()
            .map(|(key, range)| (key.to_string(), Value::from(range.to_vec())))
            .collect();
        priors.push(("sn_fourier_comp".to_string(), Value::Int(DEFAULT_FOURIER_COMPONENTS)));
        priors
    }

    fn registry(&self) -> &SignalRegistry {
        &self.registry
    }
}

fn option_str(option: &serde_json::Value) -> &str {
    option.as_str().unwrap_or_default()
}

fn white_noise(
    ctx: &BuildContext<'_>,
    option: &serde_json::Value,
    signal: &str,
    suffix: &str,
    prior_key: &str,
) -> Result<SignalModel, WarpError> {
    let option = option_str(option);
    if option == "none" {
        return Ok(SignalModel::new());
    }
    let prior = ctx.prior(prior_key)?;

    let backends = match (option, ctx.pulsar) {
        ("by_backend", Some(psr)) => psr.backend_names(),
        ("by_backend", None) => {
            return Err(WarpError::InvalidField {
                key: signal.to_string(),
                message: "`by_backend` needs a pulsar".to_string(),
            });
        }
        _ => Vec::new(),
    };
    let params = if backends.is_empty() {
        vec![ParamTemplate::pulsar(suffix, prior)]
    } else {
        backends
            .iter()
            .map(|backend| ParamTemplate::pulsar(format!("{backend}_{suffix}"), prior))
            .collect()
    };

    Ok(SignalTerm::new(signal, TermKind::WhiteNoise, params).into())
}

fn red_process(
    ctx: &BuildContext<'_>,
    option: &serde_json::Value,
    signal: &str,
    prefix: &str,
    (amp_key, gamma_key): (&str, &str),
) -> Result<SignalModel, WarpError> {
    let components = ctx.count("sn_fourier_comp")?;
    let kind = TermKind::FourierGp {
        components,
        tspan: ctx.tspan,
        correlation: None,
    };

    let params = match option_str(option) {
        "none" => return Ok(SignalModel::new()),
        "powerlaw" => vec![
            ParamTemplate::pulsar(format!("{prefix}_log10_A"), ctx.prior(amp_key)?),
            ParamTemplate::pulsar(format!("{prefix}_gamma"), ctx.prior(gamma_key)?),
        ],
        "free_spectrum" => (0..components)
            .map(|i| ParamTemplate::pulsar(format!("{prefix}_log10_rho_{i}"), RHO_PRIOR))
            .collect(),
        other => {
            return Err(WarpError::InvalidField {
                key: signal.to_string(),
                message: format!("unknown option `{other}` (expected powerlaw, free_spectrum or none)"),
            });
        }
    };

    Ok(SignalTerm::new(signal, kind, params).into())
}

fn gwb(ctx: &BuildContext<'_>, option: &serde_json::Value) -> Result<SignalModel, WarpError> {
    let correlation = match option_str(option) {
        "hd" => Correlation::HellingsDowns,
        _ => Correlation::Uncorrelated,
    };
    let kind = TermKind::FourierGp {
        components: ctx.count("sn_fourier_comp")?,
        tspan: ctx.tspan,
        correlation: Some(correlation),
    };
    let params = vec![
        ParamTemplate::common("gw_log10_A", ctx.prior("gwb_lgA")?),
        ParamTemplate::common("gw_gamma", ctx.prior("gwb_gamma")?),
    ];
    Ok(SignalTerm::new("gwb", kind, params).into())
}
