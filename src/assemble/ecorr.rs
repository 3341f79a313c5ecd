//! Does a pulsar's timing solution already carry ECORR terms?

use crate::data::Pulsar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcorrPresence {
    Present,
    Absent,
    /// The loader exposed no native noise model to inspect.
    Unknown,
}

pub fn detect_ecorr(pulsar: &Pulsar) -> EcorrPresence {
    match &pulsar.noise_metadata {
        None => EcorrPresence::Unknown,
        Some(noise) if noise.keys().any(|k| k.starts_with("ecorr") || k.starts_with("ECORR")) => {
            EcorrPresence::Present
        }
        Some(_) => EcorrPresence::Absent,
    }
}
