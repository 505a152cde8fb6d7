//! Kubeconfig generation for rotor.
//!
//! Injects a bearer token into one user entry of a kubeconfig template and
//! remembers input hashes so unchanged inputs can skip regeneration.

pub mod document;
pub mod error;
pub mod injector;

pub use document::KubeconfigDocument;
pub use error::KubeconfigError;
pub use injector::{GenerateConfig, GenerateResult, KUBECONFIG_KEY, KubeconfigInjector, sha256};
