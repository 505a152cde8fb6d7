//! Token injection into kubeconfig templates.

use crate::document::KubeconfigDocument;
use crate::error::KubeconfigError;
use rotor_core::ConnectionDetails;
use rotor_trace::kubeconfig_span;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Connection detail key under which the generated kubeconfig is published.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

const TOKEN_FIELD: &str = "token";

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn short_hash(hash: &[u8; 32]) -> String {
    hex::encode(&hash[..6])
}

/// Where and how the token is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Entry of `users` that receives the token.
    #[serde(default)]
    pub user_index: usize,

    /// Keep the entry's other credentials next to the token.
    #[serde(default)]
    pub inject_inline: bool,
}

impl GenerateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_index(mut self, index: usize) -> Self {
        self.user_index = index;
        self
    }

    pub fn with_inject_inline(mut self, inline: bool) -> Self {
        self.inject_inline = inline;
        self
    }
}

/// A generated kubeconfig and the hashes of the inputs it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateResult {
    pub source_kubeconfig_hash: [u8; 32],
    pub source_token_hash: [u8; 32],
    pub generated_kubeconfig: Vec<u8>,
    /// API server of the first cluster, empty if none is declared.
    pub server_url: String,
}

impl GenerateResult {
    pub fn connection_details(&self) -> ConnectionDetails {
        let mut details = ConnectionDetails::new();
        details.insert(KUBECONFIG_KEY.to_string(), self.generated_kubeconfig.clone());
        details
    }
}

/// Writes bearer tokens into kubeconfig templates and remembers the hashes of
/// the last inputs it was given.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigInjector {
    kubeconfig_hash: Option<[u8; 32]>,
    token_hash: Option<[u8; 32]>,
}

impl KubeconfigInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hashes(kubeconfig_hash: [u8; 32], token_hash: [u8; 32]) -> Self {
        Self {
            kubeconfig_hash: Some(kubeconfig_hash),
            token_hash: Some(token_hash),
        }
    }

    /// Restore from persisted hashes; slices that are not 32 bytes are ignored.
    pub fn from_stored(kubeconfig_hash: &[u8], token_hash: &[u8]) -> Self {
        Self {
            kubeconfig_hash: kubeconfig_hash.try_into().ok(),
            token_hash: token_hash.try_into().ok(),
        }
    }

    /// Whether both inputs hash to the remembered values.
    pub fn is_up_to_date(&self, kubeconfig: &[u8], token: &[u8]) -> bool {
        match (self.kubeconfig_hash, self.token_hash) {
            (Some(kubeconfig_hash), Some(token_hash)) => {
                kubeconfig_hash == sha256(kubeconfig) && token_hash == sha256(token)
            }
            _ => false,
        }
    }

    pub fn generate(
        &self,
        kubeconfig: &[u8],
        token: &[u8],
        config: &GenerateConfig,
    ) -> Result<GenerateResult, KubeconfigError> {
        let _span = kubeconfig_span(config.user_index, config.inject_inline).entered();

        let mut document = KubeconfigDocument::parse(kubeconfig)?;
        let user = document.user_mut(config.user_index)?;
        if !config.inject_inline {
            user.clear();
        }
        user.insert(
            Value::String(TOKEN_FIELD.to_string()),
            Value::String(String::from_utf8_lossy(token).into_owned()),
        );

        let generated_kubeconfig = document.to_yaml()?;
        let server_url = document.server_url().unwrap_or_default().to_string();

        let result = GenerateResult {
            source_kubeconfig_hash: sha256(kubeconfig),
            source_token_hash: sha256(token),
            generated_kubeconfig,
            server_url,
        };

        debug!(
            kubeconfig_hash = %short_hash(&result.source_kubeconfig_hash),
            token_hash = %short_hash(&result.source_token_hash),
            server = %result.server_url,
            "Generated kubeconfig"
        );

        Ok(result)
    }
}
