//! Rotor Binding
//!
//! Rotation of externally issued credential bindings: the ledger that decides
//! which bindings stay active, the provisioning service port with its REST
//! adapter, and a rotator that drives one reconciliation pass.

pub mod error;
pub mod ledger;
pub mod provisioning;
pub mod rotator;
pub mod service;

pub use error::BindingServiceError;
pub use ledger::{BindingRotationLedger, ReconcileOutcome};
pub use provisioning::{ProvisioningClient, ProvisioningConfig};
pub use rotator::{BindingRotator, RotationOutcome};
pub use service::{BindingService, BindingSummary, IssuedBinding};
