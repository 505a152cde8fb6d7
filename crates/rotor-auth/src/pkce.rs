//! PKCE (RFC 7636) and random protocol parameters.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMethod {
    S256,
    Plain,
}

impl PkceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PkceMethod::S256 => "S256",
            PkceMethod::Plain => "plain",
        }
    }

    /// Pick the strongest method the provider advertises.
    ///
    /// `force` selects S256 even when the provider advertises nothing.
    pub fn negotiate(supported: &[String], force: bool) -> Option<Self> {
        let advertised = |name: &str| supported.iter().any(|m| m == name);
        if force || advertised("S256") {
            Some(PkceMethod::S256)
        } else if advertised("plain") {
            Some(PkceMethod::Plain)
        } else {
            None
        }
    }
}

/// Verifier and derived challenge for one authorization request.
#[derive(Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
    pub method: PkceMethod,
}

impl PkceChallenge {
    pub fn generate(method: PkceMethod) -> Self {
        Self::from_verifier(random_token(), method)
    }

    pub fn from_verifier(verifier: String, method: PkceMethod) -> Self {
        let challenge = match method {
            PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
            PkceMethod::Plain => verifier.clone(),
        };
        Self {
            verifier,
            challenge,
            method,
        }
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// 32 random bytes, base64url encoded without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
