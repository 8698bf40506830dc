use derive_more::derive::Display;

/// Invalid configuration. Fatal at startup; never produced afterwards.
#[derive(Debug, Display)]
pub enum ConfigError {
    #[display("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
    #[display("failed to read configuration: {_0}")]
    Read(config::ConfigError),
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        ConfigError::Read(error)
    }
}

/// Registry mutation rejections, surfaced to the command caller.
#[derive(Debug, Display, PartialEq, Eq)]
pub enum RegistryError {
    #[display("target is already registered")]
    DuplicateTarget,
    #[display("target not found")]
    NotFound,
    #[display("invalid hostname: {_0}")]
    InvalidHostname(String),
}

impl std::error::Error for RegistryError {}

/// A failed check. Never fatal: the sweep folds every variant into an
/// Unknown outcome whose detail is the Display output below.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[display("timeout")]
    Timeout,
    #[display("network error: {_0}")]
    Network(String),
    #[display("{_0}")]
    Protocol(String),
    #[display("rate limited by data source")]
    RateLimited,
}

impl std::error::Error for CheckError {}

/// The notifier sink refused or failed to accept an event. Recovered by
/// re-evaluating against the unchanged notification baseline next sweep.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("dispatch failed: {_0}")]
pub struct DispatchError(pub String);

impl std::error::Error for DispatchError {}
