use std::path::PathBuf;

use thiserror::Error;

use crate::domain::ValueKind;

/// Process-boundary error: a message plus the exit code the binary returns.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised by the configuration-to-model pipeline.
#[derive(Error, Debug)]
pub enum WarpError {
    #[error("{}:{line}: unknown configuration key `{key}`", path.display())]
    UnknownField { path: PathBuf, line: usize, key: String },

    #[error("{}:{line}: cannot read `{token}` as {expected} for `{key}`", path.display())]
    FieldType {
        path: PathBuf,
        line: usize,
        key: String,
        token: String,
        expected: ValueKind,
    },

    #[error("{}:{line}: `{key}` takes at most {expected} values, got {got}", path.display())]
    FieldArity {
        path: PathBuf,
        line: usize,
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("{}:{line}: `{key}` has no value", path.display())]
    MissingValue { path: PathBuf, line: usize, key: String },

    #[error("required parameter `{key}` is not set")]
    MissingField { key: String },

    #[error("invalid value for `{key}`: {message}")]
    InvalidField { key: String, message: String },

    #[error("noise file '{}' not found: {source}", path.display())]
    NoiseFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("noise file '{}' is invalid: {message}", path.display())]
    NoiseFileParse { path: PathBuf, message: String },

    #[error(
        "there should be the same number of .par and .tim files in '{}' (found {par} .par, {tim} .tim)",
        datadir.display()
    )]
    DataFileCountMismatch { datadir: PathBuf, par: usize, tim: usize },

    #[error("could not load pulsars from cache '{}': {message}", path.display())]
    CacheLoad { path: PathBuf, message: String },

    #[error("failed to load pulsar from '{}': {message}", path.display())]
    PulsarLoad { path: PathBuf, message: String },

    #[error("pulsar number {index} is out of range ({count} pulsars available)")]
    PulsarIndexOutOfRange { index: usize, count: usize },

    #[error("no pulsars were loaded from '{}'", datadir.display())]
    NoPulsars { datadir: PathBuf },

    #[error("unknown {scope} signal type `{signal}`")]
    UnknownSignalType { scope: &'static str, signal: String },

    #[error("model {model_id} has no noise model (set `noise_model_file:`)")]
    MissingNoiseModel { model_id: u32 },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WarpError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WarpError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code used when this error reaches the process boundary.
    pub fn exit_code(&self) -> u8 {
        match self {
            WarpError::DataFileCountMismatch { .. }
            | WarpError::NoPulsars { .. }
            | WarpError::PulsarIndexOutOfRange { .. } => 3,
            WarpError::CacheLoad { .. } | WarpError::PulsarLoad { .. } | WarpError::Io { .. } => 4,
            _ => 2,
        }
    }
}

impl From<WarpError> for AppError {
    fn from(err: WarpError) -> Self {
        AppError::new(err.exit_code(), format!("Error - {err}"))
    }
}
