//! One reconciliation pass against a binding service.

use crate::error::BindingServiceError;
use crate::ledger::{BindingRotationLedger, ReconcileOutcome};
use crate::service::BindingService;
use rotor_core::{Binding, ConnectionDetails, RotationPolicy, SharedClock};
use rotor_trace::{RotationAttributes, binding_span};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

pub const BINDING_ID_KEY: &str = "binding_id";
pub const CREATED_AT_KEY: &str = "created_at";
pub const EXPIRES_AT_KEY: &str = "expires_at";
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// New state of record after [`BindingRotator::rotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub bindings: Vec<Binding>,
    /// Credentials of the binding issued in this pass, if one was.
    pub connection_details: Option<ConnectionDetails>,
}

/// Keeps the bindings of one resource rotated.
pub struct BindingRotator {
    service: Arc<dyn BindingService>,
    ledger: BindingRotationLedger,
    clock: SharedClock,
    resource_id: String,
}

impl BindingRotator {
    pub fn new(
        service: Arc<dyn BindingService>,
        policy: RotationPolicy,
        clock: SharedClock,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            ledger: BindingRotationLedger::new(policy),
            clock,
            resource_id: resource_id.into(),
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn attributes(&self) -> RotationAttributes {
        RotationAttributes::new().resource(&self.resource_id)
    }

    /// Reconcile `bindings` with what the service currently knows.
    pub async fn observe(
        &self,
        bindings: Vec<Binding>,
    ) -> Result<ReconcileOutcome, BindingServiceError> {
        let span = binding_span(&self.attributes(), "observe");
        async {
            let listed = self.service.list_bindings(&self.resource_id).await?;
            let ids: HashSet<String> = listed.into_iter().map(|b| b.binding_id).collect();
            Ok::<_, BindingServiceError>(self.ledger.reconcile(bindings, &ids, self.clock.now()))
        }
        .instrument(span)
        .await
    }

    /// Observe, then issue a new binding if none is active.
    pub async fn rotate(
        &self,
        bindings: Vec<Binding>,
    ) -> Result<RotationOutcome, BindingServiceError> {
        let ReconcileOutcome {
            has_active,
            mut retained,
        } = self.observe(bindings).await?;

        if has_active {
            return Ok(RotationOutcome {
                bindings: retained,
                connection_details: None,
            });
        }

        let span = binding_span(&self.attributes(), "issue");
        let ttl = self.ledger.policy().ttl_seconds();
        let issued = self
            .service
            .create_binding(&self.resource_id, ttl)
            .instrument(span)
            .await?;

        let binding = self.ledger.record_issued(
            &mut retained,
            issued.id,
            self.clock.now(),
            issued.expires_at,
        );
        info!(
            resource_id = %self.resource_id,
            binding_id = %binding.id,
            expires_at = %binding.expires_at,
            "Issued binding"
        );

        let mut details = ConnectionDetails::new();
        details.insert(BINDING_ID_KEY.to_string(), binding.id.clone().into_bytes());
        details.insert(
            CREATED_AT_KEY.to_string(),
            binding.created_at.to_rfc3339().into_bytes(),
        );
        details.insert(
            EXPIRES_AT_KEY.to_string(),
            binding.expires_at.to_rfc3339().into_bytes(),
        );
        details.insert(KUBECONFIG_KEY.to_string(), issued.kubeconfig.into_bytes());

        Ok(RotationOutcome {
            bindings: retained,
            connection_details: Some(details),
        })
    }

    /// Delete every binding; already-deleted ones are skipped.
    pub async fn teardown(&self, bindings: &[Binding]) -> Result<(), BindingServiceError> {
        for binding in bindings {
            let span = binding_span(&self.attributes().binding(&binding.id), "delete");
            match self
                .service
                .delete_binding(&self.resource_id, &binding.id)
                .instrument(span)
                .await
            {
                Ok(()) => info!(binding_id = %binding.id, "Deleted binding"),
                Err(e) if e.is_not_found() => {
                    warn!(binding_id = %binding.id, "Binding already deleted")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
