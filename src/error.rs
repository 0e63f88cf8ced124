//! Error types for facetrack-rs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting a controller up.
///
/// The per-frame loop never returns these; failures there degrade locally.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to start recognition workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Reasons a recognition result is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("recognizer failed: {0}")]
    Recognizer(String),

    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },

    #[error("label {index} is empty")]
    EmptyLabel { index: usize },

    #[error("recognizer panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, Error>;
