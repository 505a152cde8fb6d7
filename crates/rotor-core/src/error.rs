//! Error types shared by the rotor crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Decoding errors
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    #[error("Temporal invariant violated: {0}")]
    TemporalInvariantViolation(String),

    #[error("Certificate parse error: {0}")]
    CertificateParse(String),

    // Kubeconfig errors
    #[error("Kubeconfig generation failed: {0}")]
    GenerationFailed(String),

    #[error("Malformed kubeconfig: {0}")]
    MalformedKubeConfig(String),

    #[error("User index {index} out of range, kubeconfig has {available} users")]
    MissingUserIndex { index: usize, available: usize },

    // Remote errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is a missing remote object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the failure came from a deadline or a cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
