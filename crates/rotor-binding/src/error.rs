use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingServiceError {
    #[error("Binding not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API Error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from binding service: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BindingServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BindingServiceError::NotFound(_))
    }
}

impl From<BindingServiceError> for rotor_core::Error {
    fn from(err: BindingServiceError) -> Self {
        match err {
            BindingServiceError::NotFound(id) => rotor_core::Error::NotFound(id),
            e @ (BindingServiceError::Http(_) | BindingServiceError::Api { .. }) => {
                rotor_core::Error::Transport(e.to_string())
            }
            BindingServiceError::InvalidResponse(msg) => rotor_core::Error::Serialization(msg),
            BindingServiceError::InvalidConfig(msg) => rotor_core::Error::InvalidConfig(msg),
        }
    }
}
