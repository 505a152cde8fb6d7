//! Integration test infrastructure for rotor.
//!
//! Provides an in-process identity provider and provisioning service built on
//! `wiremock`, plus JWT, PKCS#12 and kubeconfig fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use rotor_tests::FakeIdp;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let idp = FakeIdp::start().await;
//!     let login = idp.login().await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,rotor_auth=debug,rotor_binding=debug")),
        )
        .with_test_writer()
        .try_init();
}
