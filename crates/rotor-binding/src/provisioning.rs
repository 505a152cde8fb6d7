//! REST adapter for the environment provisioning API.

use crate::error::BindingServiceError;
use crate::service::{BindingService, BindingSummary, IssuedBinding};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the provisioning API.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub base_url: String,

    /// Bearer token sent with every request.
    pub token: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl std::fmt::Debug for ProvisioningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ProvisioningConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), BindingServiceError> {
        if self.base_url.is_empty() {
            return Err(BindingServiceError::InvalidConfig(
                "base_url is required".into(),
            ));
        }
        if self.token.is_empty() {
            return Err(BindingServiceError::InvalidConfig("token is required".into()));
        }
        Ok(())
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    bindings: Vec<BindingSummary>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    metadata: Option<CreateMetadata>,
    #[serde(default)]
    credentials: Option<CreateCredentials>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateMetadata {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateCredentials {
    #[serde(default)]
    kubeconfig: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiExceptionResponse {
    error: ApiException,
}

#[derive(Debug, Deserialize)]
struct ApiException {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// [`BindingService`] backed by the provisioning REST API.
pub struct ProvisioningClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ProvisioningClient {
    pub fn new(config: &ProvisioningConfig) -> Result<Self, BindingServiceError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn bindings_url(&self, resource_id: &str) -> String {
        format!(
            "{}/provisioning/v1/environments/{}/bindings",
            self.base_url, resource_id
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }
}

/// Turn a non-success response into an error carrying the API message.
async fn api_error(res: Response) -> BindingServiceError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ApiExceptionResponse>(&body) {
        Ok(ApiExceptionResponse {
            error: ApiException { message, code: Some(code) },
        }) => format!("{message}, Code {code}"),
        Ok(ApiExceptionResponse { error }) => error.message,
        Err(_) if body.is_empty() => StatusCode::from_u16(status)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| status.to_string()),
        Err(_) => body,
    };

    BindingServiceError::Api { status, message }
}

#[async_trait]
impl BindingService for ProvisioningClient {
    async fn list_bindings(
        &self,
        resource_id: &str,
    ) -> Result<Vec<BindingSummary>, BindingServiceError> {
        let res = self
            .request(Method::GET, &self.bindings_url(resource_id))
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => {
                let list: ListResponse = res.json().await?;
                debug!(resource_id, count = list.bindings.len(), "Listed bindings");
                Ok(list.bindings)
            }
            StatusCode::NOT_FOUND => Err(BindingServiceError::NotFound(format!(
                "Environment {resource_id} not found"
            ))),
            _ => Err(api_error(res).await),
        }
    }

    async fn create_binding(
        &self,
        resource_id: &str,
        ttl_seconds: i64,
    ) -> Result<IssuedBinding, BindingServiceError> {
        let payload = json!({
            "parameters": {
                "expiration_seconds": ttl_seconds
            }
        });

        let res = self
            .request(Method::POST, &self.bindings_url(resource_id))
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(api_error(res).await);
        }

        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let body = res.bytes().await?;
        let created: CreateResponse = if body.is_empty() {
            CreateResponse::default()
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| BindingServiceError::InvalidResponse(e.to_string()))?
        };

        let metadata = created.metadata.unwrap_or_default();
        let id = location.or(metadata.id).ok_or_else(|| {
            BindingServiceError::InvalidResponse("binding id missing from response".into())
        })?;
        let expires_at = metadata.expires_at.ok_or_else(|| {
            BindingServiceError::InvalidResponse("expires_at missing from response".into())
        })?;
        let kubeconfig = created
            .credentials
            .and_then(|c| c.kubeconfig)
            .unwrap_or_default();

        debug!(resource_id, binding_id = %id, %expires_at, "Created binding");

        Ok(IssuedBinding {
            id,
            expires_at,
            kubeconfig,
        })
    }

    async fn delete_binding(
        &self,
        resource_id: &str,
        binding_id: &str,
    ) -> Result<(), BindingServiceError> {
        let url = format!("{}/{}", self.bindings_url(resource_id), binding_id);
        let res = self.request(Method::DELETE, &url).send().await?;

        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(BindingServiceError::NotFound(binding_id.to_string())),
            _ => Err(api_error(res).await),
        }
    }
}
