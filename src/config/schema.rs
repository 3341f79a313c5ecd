//! Field schema: every legal parameter-file key and the converters of its values.

use std::collections::BTreeMap;

use crate::domain::ValueKind;

/// Attribute name and value converters for one configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub attr: String,
    pub kinds: Vec<ValueKind>,
}

impl FieldSpec {
    pub fn new(attr: &str, kinds: &[ValueKind]) -> Self {
        Self {
            attr: attr.to_string(),
            kinds: kinds.to_vec(),
        }
    }
}

/// Mapping from textual key (e.g. `datadir:`) to its [`FieldSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    entries: BTreeMap<String, FieldSpec>,
}

const BASE_FIELDS: &[(&str, &str, ValueKind)] = &[
    ("datadir:", "datadir", ValueKind::Str),
    ("out:", "out", ValueKind::Str),
    ("overwrite:", "overwrite", ValueKind::Str),
    ("allpulsars:", "allpulsars", ValueKind::Bool),
    ("noisefiles:", "noisefiles", ValueKind::Str),
    ("noise_model_file:", "noise_model_file", ValueKind::Str),
    ("sampler:", "sampler", ValueKind::Str),
    ("dlogz:", "dlogz", ValueKind::Float),
    ("nsamp:", "nsamp", ValueKind::Int),
    ("nwalk:", "nwalk", ValueKind::Int),
    ("ntemp:", "ntemp", ValueKind::Int),
    ("setupsamp:", "setupsamp", ValueKind::Bool),
    ("psrlist:", "psrlist", ValueKind::Str),
    ("psrcachedir:", "psrcachedir", ValueKind::Str),
    ("psrcachefile:", "psrcachefile", ValueKind::Str),
    ("ssephem:", "ssephem", ValueKind::Str),
    ("clock:", "clock", ValueKind::Str),
    ("AMweight:", "AMweight", ValueKind::Int),
    ("DMweight:", "DMweight", ValueKind::Int),
    ("SCAMweight:", "SCAMweight", ValueKind::Int),
    ("custom_commonpsr:", "custom_commonpsr", ValueKind::Str),
    ("custom_singlepsr:", "custom_singlepsr", ValueKind::Str),
    ("tm:", "tm", ValueKind::Str),
    ("fref:", "fref", ValueKind::Float),
    ("inc_events:", "inc_events", ValueKind::Bool),
    ("rs_model:", "rs_model", ValueKind::Str),
];

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run-level keys understood independently of the model catalogue.
    pub fn base() -> Self {
        let mut schema = Self::new();
        for (key, attr, kind) in BASE_FIELDS {
            schema.insert(key, FieldSpec::new(attr, &[*kind]));
        }
        schema
    }

    pub fn insert(&mut self, key: &str, spec: FieldSpec) {
        self.entries.insert(key.to_string(), spec);
    }

    /// Add (or replace) every entry of `other`.
    pub fn extend(&mut self, other: FieldSchema) {
        self.entries.extend(other.entries);
    }

    /// Look up a row key. Both `datadir:` and `datadir` resolve to the same entry.
    pub fn lookup(&self, key: &str) -> Option<&FieldSpec> {
        if let Some(spec) = self.entries.get(key) {
            return Some(spec);
        }
        if key.ends_with(':') {
            return None;
        }
        self.entries.get(&format!("{key}:"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
