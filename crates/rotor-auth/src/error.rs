//! Login error type.

use crate::certificate::CertificateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("Callback listener failed: {0}")]
    Listener(#[source] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),
    #[error("Authorization callback state does not match the request")]
    StateMismatch,
    #[error("ID token nonce does not match the request")]
    NonceMismatch,
    #[error("Timed out {0}")]
    Timeout(&'static str),
    #[error("Login cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Certificate-based login failed: {0}")]
    Authentication(#[source] Box<LoginError>),
}

impl LoginError {
    pub(crate) fn authentication(cause: LoginError) -> Self {
        LoginError::Authentication(Box::new(cause))
    }

    /// Innermost error, looking through the login wrapper.
    pub fn root_cause(&self) -> &LoginError {
        match self {
            LoginError::Authentication(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), LoginError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), LoginError::Cancelled)
    }
}

impl From<LoginError> for rotor_core::Error {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Authentication(inner) => (*inner).into(),
            LoginError::Certificate(e) => rotor_core::Error::CertificateParse(e.to_string()),
            LoginError::Listener(e) => rotor_core::Error::Io(e),
            LoginError::Transport(e) => rotor_core::Error::Transport(e.to_string()),
            LoginError::Timeout(what) => rotor_core::Error::Timeout(what.to_string()),
            LoginError::Cancelled => rotor_core::Error::Cancelled,
            LoginError::InvalidConfig(msg) => rotor_core::Error::InvalidConfig(msg),
            e @ (LoginError::Discovery(_)
            | LoginError::IdentityProvider(_)
            | LoginError::StateMismatch
            | LoginError::NonceMismatch) => rotor_core::Error::IdentityProvider(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_through_wrapper() {
        let err = LoginError::authentication(LoginError::Timeout("waiting for callback"));
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "Certificate-based login failed: Timed out waiting for callback"
        );
    }

    #[test]
    fn test_core_mapping_unwraps() {
        let err: rotor_core::Error = LoginError::authentication(LoginError::Cancelled).into();
        assert!(matches!(err, rotor_core::Error::Cancelled));

        let err: rotor_core::Error = LoginError::StateMismatch.into();
        assert!(matches!(err, rotor_core::Error::IdentityProvider(_)));
    }
}
