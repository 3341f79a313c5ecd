//! Signal terms and their composition into pulsar and array models.
//!
//! A [`SignalModel`] is an ordered sum of [`SignalTerm`]s that is not yet tied to a
//! pulsar. Binding it to a [`Pulsar`] names every parameter (`<psr>_<suffix>` for
//! per-pulsar parameters) and evaluates the bases the terms need. The bound models
//! of all pulsars form a [`Pta`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, AddAssign};

use nalgebra::DMatrix;

use crate::data::Pulsar;
use crate::domain::Value;
use crate::error::WarpError;
use crate::math::{design_matrix, fourier_basis, scaled_tm_basis};

/// Prior of one model parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prior {
    Uniform { min: f64, max: f64 },
    /// Fixed value. `None` until a noise dictionary provides it.
    Constant { value: Option<f64> },
}

impl Prior {
    /// Interpret a prior setting from the parameter file.
    ///
    /// A two-element list is a uniform range, a negative scalar marks a constant
    /// to be read from noise files, and any other scalar fixes the value.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, WarpError> {
        let invalid = |message: String| WarpError::InvalidField {
            key: key.to_string(),
            message,
        };
        match value {
            Value::List(items) => {
                let bounds: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                match bounds.as_deref() {
                    Some(&[min, max]) if min < max => Ok(Prior::Uniform { min, max }),
                    _ => Err(invalid(format!("expected `min max` with min < max, got {value}"))),
                }
            }
            scalar => match scalar.as_f64() {
                Some(x) if x < 0.0 => Ok(Prior::Constant { value: None }),
                Some(x) => Ok(Prior::Constant { value: Some(x) }),
                None => Err(invalid(format!("expected a number or a range, got {value}"))),
            },
        }
    }

    pub fn is_varying(&self) -> bool {
        matches!(self, Prior::Uniform { .. })
    }
}

/// Whether a parameter belongs to one pulsar or is shared by the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PerPulsar,
    Common,
}

/// Unbound parameter: its name suffix, prior and scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTemplate {
    pub suffix: String,
    pub prior: Prior,
    pub scope: Scope,
}

impl ParamTemplate {
    pub fn pulsar(suffix: impl Into<String>, prior: Prior) -> Self {
        Self {
            suffix: suffix.into(),
            prior,
            scope: Scope::PerPulsar,
        }
    }

    pub fn common(suffix: impl Into<String>, prior: Prior) -> Self {
        Self {
            suffix: suffix.into(),
            prior,
            scope: Scope::Common,
        }
    }

    fn name_for(&self, pulsar: &str) -> String {
        match self.scope {
            Scope::PerPulsar => format!("{pulsar}_{}", self.suffix),
            Scope::Common => self.suffix.clone(),
        }
    }
}

/// Inter-pulsar correlation of a common process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    Uncorrelated,
    HellingsDowns,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermKind {
    /// Linear timing model; `ridge` adds a variance hyper-parameter.
    TimingModel { ridge: bool },
    WhiteNoise,
    /// Gaussian process on a Fourier basis of `components` frequencies.
    FourierGp {
        components: usize,
        tspan: f64,
        correlation: Option<Correlation>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalTerm {
    pub name: String,
    pub kind: TermKind,
    pub params: Vec<ParamTemplate>,
}

impl SignalTerm {
    pub fn new(name: impl Into<String>, kind: TermKind, params: Vec<ParamTemplate>) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
        }
    }

    fn bind(&self, pulsar: &Pulsar) -> BoundTerm {
        let basis = match self.kind {
            TermKind::TimingModel { .. } => Some(scaled_tm_basis(&design_matrix(pulsar))),
            TermKind::WhiteNoise => None,
            TermKind::FourierGp { components, tspan, .. } => Some(fourier_basis(&pulsar.toas, components, tspan)),
        };
        BoundTerm {
            name: self.name.clone(),
            kind: self.kind,
            params: self
                .params
                .iter()
                .map(|p| Parameter {
                    name: p.name_for(&pulsar.name),
                    prior: p.prior,
                })
                .collect(),
            basis,
        }
    }
}

/// Ordered sum of signal terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalModel {
    terms: Vec<SignalTerm>,
}

impl SignalModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terms(&self) -> &[SignalTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn bind(&self, pulsar: &Pulsar) -> BoundModel {
        BoundModel {
            pulsar: pulsar.name.clone(),
            terms: self.terms.iter().map(|t| t.bind(pulsar)).collect(),
        }
    }
}

impl From<SignalTerm> for SignalModel {
    fn from(term: SignalTerm) -> Self {
        Self { terms: vec![term] }
    }
}

impl AddAssign for SignalModel {
    fn add_assign(&mut self, rhs: Self) {
        self.terms.extend(rhs.terms);
    }
}

impl Add for SignalModel {
    type Output = SignalModel;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

/// A named parameter of a bound model.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub prior: Prior,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundTerm {
    pub name: String,
    pub kind: TermKind,
    pub params: Vec<Parameter>,
    pub basis: Option<DMatrix<f64>>,
}

/// A signal model bound to one pulsar.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundModel {
    pub pulsar: String,
    pub terms: Vec<BoundTerm>,
}

impl BoundModel {
    pub fn params(&self) -> impl Iterator<Item = &Parameter> {
        self.terms.iter().flat_map(|t| t.params.iter())
    }
}

/// Every pulsar model of one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Pta {
    models: Vec<BoundModel>,
}

impl Pta {
    pub fn new(models: Vec<BoundModel>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &[BoundModel] {
        &self.models
    }

    /// Sorted, de-duplicated names of the varying parameters.
    pub fn param_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .models
            .iter()
            .flat_map(BoundModel::params)
            .filter(|p| p.prior.is_varying())
            .map(|p| p.name.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Constant parameters that still have no value.
    pub fn unset_constants(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .models
            .iter()
            .flat_map(BoundModel::params)
            .filter(|p| matches!(p.prior, Prior::Constant { value: None }))
            .map(|p| p.name.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Fill constant parameters from a noise dictionary. Returns how many were set.
    pub fn set_default_params(&mut self, values: &BTreeMap<String, f64>) -> usize {
        let mut count = 0;
        for term in self.models.iter_mut().flat_map(|m| m.terms.iter_mut()) {
            for param in &mut term.params {
                if let (Prior::Constant { value }, Some(v)) = (&mut param.prior, values.get(&param.name)) {
                    *value = Some(*v);
                    count += 1;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulsar(name: &str) -> Pulsar {
        Pulsar {
            name: name.to_string(),
            toas: vec![0.0, 50.0, 100.0],
            toaerrs: vec![1e-6; 3],
            freqs: vec![1400.0; 3],
            backends: vec!["A".to_string(); 3],
            fitpars: vec!["F0".to_string()],
            noise_metadata: None,
            ephem: None,
            clock: None,
        }
    }

    fn uniform() -> Prior {
        Prior::Uniform { min: 0.0, max: 1.0 }
    }

    #[test]
    fn prior_from_configuration_values() {
        assert_eq!(
            Prior::from_value("efacpr", &Value::from(vec![0.01, 10.0])).unwrap(),
            Prior::Uniform { min: 0.01, max: 10.0 }
        );
        assert_eq!(
            Prior::from_value("efacpr", &Value::Float(-1.0)).unwrap(),
            Prior::Constant { value: None }
        );
        assert_eq!(
            Prior::from_value("efacpr", &Value::Int(1)).unwrap(),
            Prior::Constant { value: Some(1.0) }
        );
        assert!(Prior::from_value("efacpr", &Value::from(vec![2.0, 1.0])).is_err());
        assert!(Prior::from_value("efacpr", &Value::from("wide")).is_err());
    }

    #[test]
    fn addition_keeps_term_order() {
        let a = SignalModel::from(SignalTerm::new("tm", TermKind::TimingModel { ridge: false }, vec![]));
        let b = SignalModel::from(SignalTerm::new("efac", TermKind::WhiteNoise, vec![]));
        let mut sum = a + b;
        sum += SignalModel::new();
        let names: Vec<&str> = sum.terms().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tm", "efac"]);
    }

    #[test]
    fn binding_names_pulsar_parameters_only() {
        let model = SignalModel::from(SignalTerm::new(
            "red",
            TermKind::FourierGp {
                components: 3,
                tspan: 100.0,
                correlation: Some(Correlation::HellingsDowns),
            },
            vec![
                ParamTemplate::pulsar("red_noise_log10_A", uniform()),
                ParamTemplate::common("gw_log10_A", uniform()),
            ],
        ));
        let bound = model.bind(&pulsar("J0437-4715"));
        let names: Vec<&str> = bound.params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["J0437-4715_red_noise_log10_A", "gw_log10_A"]);
        assert_eq!(bound.terms[0].basis.as_ref().unwrap().shape(), (3, 6));
    }

    #[test]
    fn pta_lists_varying_names_once_and_fills_constants() {
        let model = SignalModel::from(SignalTerm::new(
            "white",
            TermKind::WhiteNoise,
            vec![
                ParamTemplate::pulsar("A_efac", Prior::Constant { value: None }),
                ParamTemplate::pulsar("A_log10_equad", uniform()),
                ParamTemplate::common("gw_gamma", uniform()),
            ],
        ));
        let mut pta = Pta::new(vec![model.bind(&pulsar("J1")), model.bind(&pulsar("J0"))]);

        assert_eq!(pta.param_names(), vec!["J0_A_log10_equad", "J1_A_log10_equad", "gw_gamma"]);
        assert_eq!(pta.unset_constants(), vec!["J0_A_efac", "J1_A_efac"]);

        let values = BTreeMap::from([("J1_A_efac".to_string(), 1.2), ("unrelated".to_string(), 3.0)]);
        assert_eq!(pta.set_default_params(&values), 1);
        assert_eq!(pta.unset_constants(), vec!["J0_A_efac"]);
    }
}
