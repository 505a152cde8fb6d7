//! Span creation for credential rotation operations.

use tracing::{Level, Span, span};

/// Attributes attached to rotation spans.
#[derive(Debug, Default)]
pub struct RotationAttributes {
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub resource_id: Option<String>,
    pub binding_id: Option<String>,
}

impl RotationAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_provider(
        mut self,
        issuer: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        self.issuer = Some(issuer.into());
        self.client_id = Some(client_id.into());
        self
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn binding(mut self, id: impl Into<String>) -> Self {
        self.binding_id = Some(id.into());
        self
    }
}

/// Create a span for an OIDC login or refresh.
pub fn login_span(attrs: &RotationAttributes, operation: &str) -> Span {
    span!(
        Level::INFO,
        "oidc.login",
        operation = operation,
        oidc.issuer = attrs.issuer.as_deref().unwrap_or(""),
        oidc.client_id = attrs.client_id.as_deref().unwrap_or(""),
    )
}

/// Create a span for a binding reconciliation step.
pub fn binding_span(attrs: &RotationAttributes, operation: &str) -> Span {
    span!(
        Level::INFO,
        "binding.reconcile",
        operation = operation,
        binding.resource_id = attrs.resource_id.as_deref().unwrap_or(""),
        binding.id = attrs.binding_id.as_deref().unwrap_or(""),
    )
}

/// Create a span for kubeconfig generation.
pub fn kubeconfig_span(user_index: usize, inject_inline: bool) -> Span {
    span!(
        Level::DEBUG,
        "kubeconfig.generate",
        kubeconfig.user_index = user_index,
        kubeconfig.inline = inject_inline,
    )
}
