//! OIDC provider metadata and token endpoint payloads.

use crate::error::LoginError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OIDC discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl OidcDiscoveryDocument {
    /// Well-known configuration URL for `issuer_url`.
    pub fn well_known_url(issuer_url: &str) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            issuer_url.trim_end_matches('/')
        )
    }

    /// Fetch the discovery document published by `issuer_url`.
    pub async fn discover(client: &reqwest::Client, issuer_url: &str) -> Result<Self, LoginError> {
        let url = Self::well_known_url(issuer_url);
        debug!(url = %url, "Fetching OIDC discovery document");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoginError::Discovery(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoginError::Discovery(format!(
                "{url} returned {status}: {body}"
            )));
        }

        response
            .json::<Self>()
            .await
            .map_err(|e| LoginError::Discovery(format!("invalid document at {url}: {e}")))
    }

    pub fn supports_code_challenge(&self, method: &str) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == method)
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEndpointResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OAuth2 error body (RFC 6749 section 5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl std::fmt::Display for OAuthErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => f.write_str(&self.error),
        }
    }
}

/// Read a token endpoint reply, turning non-2xx statuses into provider errors.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
) -> Result<TokenEndpointResponse, LoginError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(oauth) => oauth.to_string(),
            Err(_) => format!("token endpoint returned {status}: {body}"),
        };
        return Err(LoginError::IdentityProvider(message));
    }

    Ok(response.json::<TokenEndpointResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_known_url() {
        assert_eq!(
            OidcDiscoveryDocument::well_known_url("https://idp.example/"),
            "https://idp.example/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_discovery_document_minimal() {
        let doc: OidcDiscoveryDocument = serde_json::from_value(json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
            "code_challenge_methods_supported": ["plain", "S256"]
        }))
        .unwrap();

        assert!(doc.supports_code_challenge("S256"));
        assert!(doc.jwks_uri.is_none());
        assert!(doc.scopes_supported.is_empty());
    }

    #[test]
    fn test_oauth_error_display() {
        let err: OAuthErrorResponse =
            serde_json::from_value(json!({"error": "invalid_grant", "error_description": "expired"}))
                .unwrap();
        assert_eq!(err.to_string(), "invalid_grant: expired");
    }
}
