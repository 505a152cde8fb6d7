use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeconfigError {
    #[error("Error while generating kubeconfig from template: {0}")]
    GenerationFailed(#[source] serde_yaml::Error),

    #[error("Kubeconfig does not match expected format: expected {expected} at {path}, found {found}")]
    Malformed {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("User index {index} does not exist in kubeconfig template with {available} users")]
    MissingUserIndex { index: usize, available: usize },

    #[error("Could not serialize kubeconfig: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

impl From<KubeconfigError> for rotor_core::Error {
    fn from(err: KubeconfigError) -> Self {
        match err {
            KubeconfigError::GenerationFailed(e) => rotor_core::Error::GenerationFailed(e.to_string()),
            e @ KubeconfigError::Malformed { .. } => {
                rotor_core::Error::MalformedKubeConfig(e.to_string())
            }
            KubeconfigError::MissingUserIndex { index, available } => {
                rotor_core::Error::MissingUserIndex { index, available }
            }
            KubeconfigError::Serialize(e) => rotor_core::Error::Serialization(e.to_string()),
        }
    }
}
