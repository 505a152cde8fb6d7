//! Login configuration.

use crate::error::LoginError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for certificate-based OIDC login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Issuer URL; discovery is fetched from its well-known path.
    pub issuer_url: String,

    /// OAuth2 client identifier registered with the provider.
    pub client_id: String,

    /// Scopes requested in addition to `openid`.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Candidate addresses for the redirect listener, tried in order.
    #[serde(default = "default_bind_addresses")]
    pub bind_addresses: Vec<String>,

    /// Host name used in the redirect URI.
    #[serde(default = "default_redirect_hostname")]
    pub redirect_hostname: String,

    /// Always send an S256 challenge, even if discovery does not advertise one.
    #[serde(default = "default_use_pkce")]
    pub use_pkce: bool,

    /// Overall deadline for one login, in seconds.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Per-request timeout for discovery and token calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Longest overall deadline accepted for one login.
pub const MAX_LOGIN_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn default_scopes() -> Vec<String> {
    vec!["email".to_string()]
}

fn default_bind_addresses() -> Vec<String> {
    vec!["127.0.0.1:8000".to_string()]
}

fn default_redirect_hostname() -> String {
    "localhost".to_string()
}

fn default_use_pkce() -> bool {
    true
}

fn default_login_timeout() -> u64 {
    20 * 60
}

fn default_request_timeout() -> u64 {
    30
}

impl LoginConfig {
    pub fn new(issuer_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            client_id: client_id.into(),
            scopes: default_scopes(),
            bind_addresses: default_bind_addresses(),
            redirect_hostname: default_redirect_hostname(),
            use_pkce: default_use_pkce(),
            login_timeout_secs: default_login_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_bind_addresses(mut self, addresses: Vec<String>) -> Self {
        self.bind_addresses = addresses;
        self
    }

    pub fn with_redirect_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.redirect_hostname = hostname.into();
        self
    }

    pub fn with_use_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    /// Set the login deadline, rounded up to whole seconds.
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.login_timeout_secs = timeout.as_secs().saturating_add(partial);
        self
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `openid` followed by the configured scopes, without duplicates.
    pub fn scope_param(&self) -> String {
        let mut scopes = vec!["openid"];
        for scope in &self.scopes {
            if !scopes.contains(&scope.as_str()) {
                scopes.push(scope.as_str());
            }
        }
        scopes.join(" ")
    }

    pub fn validate(&self) -> Result<(), LoginError> {
        if self.issuer_url.is_empty() {
            return Err(LoginError::InvalidConfig("issuer_url is required".into()));
        }
        if self.client_id.is_empty() {
            return Err(LoginError::InvalidConfig("client_id is required".into()));
        }
        if self.bind_addresses.is_empty() {
            return Err(LoginError::InvalidConfig(
                "at least one bind address is required".into(),
            ));
        }
        if self.login_timeout_secs == 0 {
            return Err(LoginError::InvalidConfig(
                "login timeout must be positive".into(),
            ));
        }
        if self.login_timeout() > MAX_LOGIN_TIMEOUT {
            return Err(LoginError::InvalidConfig(format!(
                "login timeout ({}s) exceeds the maximum of {}s",
                self.login_timeout_secs,
                MAX_LOGIN_TIMEOUT.as_secs()
            )));
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
