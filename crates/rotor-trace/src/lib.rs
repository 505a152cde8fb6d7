//! Structured logging for rotor.
//!
//! Installs the `tracing` subscriber used by rotor binaries and provides
//! span constructors carrying credential-rotation attributes.

pub mod logging;
pub mod spans;

pub use logging::{LogFormat, LoggingConfig, TracerError, init_logging};
pub use spans::{RotationAttributes, binding_span, kubeconfig_span, login_span};
