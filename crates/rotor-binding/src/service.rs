//! Port to the service that issues bindings.

use crate::error::BindingServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A binding as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingSummary {
    pub binding_id: String,
}

/// A binding the service has just created.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedBinding {
    pub id: String,
    pub expires_at: DateTime<Utc>,
    pub kubeconfig: String,
}

impl std::fmt::Debug for IssuedBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedBinding")
            .field("id", &self.id)
            .field("expires_at", &self.expires_at)
            .field("kubeconfig", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait BindingService: Send + Sync {
    async fn list_bindings(
        &self,
        resource_id: &str,
    ) -> Result<Vec<BindingSummary>, BindingServiceError>;

    /// Issue a binding that lives for `ttl_seconds`.
    async fn create_binding(
        &self,
        resource_id: &str,
        ttl_seconds: i64,
    ) -> Result<IssuedBinding, BindingServiceError>;

    /// Fails with [`BindingServiceError::NotFound`] when the binding is already gone.
    async fn delete_binding(
        &self,
        resource_id: &str,
        binding_id: &str,
    ) -> Result<(), BindingServiceError>;
}
