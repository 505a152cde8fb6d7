//! OIDC credential handling for rotor.
//!
//! This crate decides when an OIDC token must be rotated and obtains fresh
//! tokens through an authorization code login authenticated with a client
//! certificate over mutual TLS.

pub mod callback;
pub mod certificate;
pub mod config;
pub mod error;
pub mod judge;
pub mod jwt;
pub mod login;
pub mod oidc;
pub mod pkce;
pub mod renewal;

pub use certificate::{CertificateError, ClientIdentity, UserCertificate, parse_certificate};
pub use config::LoginConfig;
pub use error::LoginError;
pub use judge::{JudgeError, RotationJudge};
pub use jwt::{JwtClaims, JwtError, TemporalError};
pub use login::CertificateAuthLogin;
pub use oidc::{OAuthErrorResponse, OidcDiscoveryDocument, TokenEndpointResponse};
pub use pkce::{PkceChallenge, PkceMethod};
pub use renewal::{LoginPerformer, RenewalAssessment, assess, renew};
