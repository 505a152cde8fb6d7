//! In-process identity provider and provisioning service.

use crate::fixtures::{IdTokenFixture, binding_list_json, created_binding_json, user_certificate};
use chrono::{DateTime, Utc};
use rotor_auth::{CertificateAuthLogin, LoginConfig, LoginError, PkceChallenge, PkceMethod};
use rotor_binding::{ProvisioningClient, ProvisioningConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Authorization code the fake provider hands out.
pub const AUTH_CODE: &str = "test-authorization-code";

/// Refresh token the fake provider accepts.
pub const VALID_REFRESH_TOKEN: &str = "refresh-1";

/// Refresh token issued when the provider rotates refresh tokens.
pub const ROTATED_REFRESH_TOKEN: &str = "refresh-2";

pub const PROVISIONING_TOKEN: &str = "provisioning-test-token";

/// How the fake provider answers the authorize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeBehavior {
    /// Redirect back with a code.
    Redirect,
    /// Answer 200 and never redirect.
    Stall,
    /// Redirect back with an `error` parameter.
    Deny,
    /// Redirect back with a state that was never issued.
    ForgeState,
}

#[derive(Debug, Clone)]
pub struct IdpOptions {
    pub authorize: AuthorizeBehavior,
    pub rotate_refresh_token: bool,
    pub code_challenge_methods: Vec<String>,
    /// Nonce placed in issued ID tokens instead of the requested one.
    pub nonce_override: Option<String>,
}

impl Default for IdpOptions {
    fn default() -> Self {
        Self {
            authorize: AuthorizeBehavior::Redirect,
            rotate_refresh_token: false,
            code_challenge_methods: vec!["S256".to_string()],
            nonce_override: None,
        }
    }
}

impl IdpOptions {
    pub fn with_authorize(mut self, behavior: AuthorizeBehavior) -> Self {
        self.authorize = behavior;
        self
    }

    pub fn with_rotating_refresh_token(mut self) -> Self {
        self.rotate_refresh_token = true;
        self
    }

    pub fn with_code_challenge_methods(mut self, methods: &[&str]) -> Self {
        self.code_challenge_methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_nonce_override(mut self, nonce: &str) -> Self {
        self.nonce_override = Some(nonce.to_string());
        self
    }
}

/// What the provider saw during a login.
#[derive(Debug, Default, Clone)]
pub struct IdpObservations {
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub code_verifier: Option<String>,
    pub authorize_requests: usize,
}

/// A `wiremock`-backed OIDC provider that redirects authorize requests
/// straight back to the caller, standing in for certificate authentication.
pub struct FakeIdp {
    pub server: MockServer,
    observed: Arc<Mutex<IdpObservations>>,
}

struct AuthorizeResponder {
    behavior: AuthorizeBehavior,
    observed: Arc<Mutex<IdpObservations>>,
}

impl Respond for AuthorizeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        {
            let mut observed = self.observed.lock().unwrap();
            observed.authorize_requests += 1;
            observed.nonce = params.get("nonce").cloned();
            observed.code_challenge = params.get("code_challenge").cloned();
            observed.code_challenge_method = params.get("code_challenge_method").cloned();
        }

        let (Some(redirect_uri), Some(state)) = (params.get("redirect_uri"), params.get("state"))
        else {
            return ResponseTemplate::new(400).set_body_string("missing redirect_uri or state");
        };

        let location = match self.behavior {
            AuthorizeBehavior::Stall => {
                return ResponseTemplate::new(200).set_body_string("<html>login</html>");
            }
            AuthorizeBehavior::Redirect => format!("{redirect_uri}?code={AUTH_CODE}&state={state}"),
            AuthorizeBehavior::Deny => format!(
                "{redirect_uri}?error=access_denied&error_description=certificate+rejected&state={state}"
            ),
            AuthorizeBehavior::ForgeState => {
                format!("{redirect_uri}?code={AUTH_CODE}&state=forged")
            }
        };
        ResponseTemplate::new(302).insert_header("Location", location.as_str())
    }
}

struct TokenResponder {
    issuer: String,
    options: IdpOptions,
    observed: Arc<Mutex<IdpObservations>>,
}

fn invalid_grant(description: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": "invalid_grant",
        "error_description": description,
    }))
}

impl TokenResponder {
    fn exchange_code(&self, form: &HashMap<String, String>) -> ResponseTemplate {
        if form.get("code").map(String::as_str) != Some(AUTH_CODE) {
            return invalid_grant("unknown authorization code");
        }

        let mut observed = self.observed.lock().unwrap();
        observed.code_verifier = form.get("code_verifier").cloned();
        if let Some(challenge) = &observed.code_challenge {
            let Some(verifier) = &observed.code_verifier else {
                return invalid_grant("code_verifier required");
            };
            let expected = PkceChallenge::from_verifier(verifier.clone(), PkceMethod::S256);
            let matches = match observed.code_challenge_method.as_deref() {
                Some("plain") => verifier == challenge,
                _ => &expected.challenge == challenge,
            };
            if !matches {
                return invalid_grant("code_verifier does not match challenge");
            }
        }

        let mut id_token = IdTokenFixture::fresh(&self.issuer);
        if let Some(nonce) = self.options.nonce_override.as_ref().or(observed.nonce.as_ref()) {
            id_token = id_token.with_nonce(nonce);
        }

        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": id_token.encode(),
            "refresh_token": VALID_REFRESH_TOKEN,
        }))
    }

    fn refresh(&self, form: &HashMap<String, String>) -> ResponseTemplate {
        if form.get("refresh_token").map(String::as_str) != Some(VALID_REFRESH_TOKEN) {
            return invalid_grant("refresh token expired");
        }

        let mut body = json!({
            "access_token": "access-2",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": IdTokenFixture::fresh(&self.issuer).encode(),
        });
        if self.options.rotate_refresh_token {
            body["refresh_token"] = json!(ROTATED_REFRESH_TOKEN);
        }
        ResponseTemplate::new(200).set_body_json(body)
    }
}

impl Respond for TokenResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let form: HashMap<String, String> = url::form_urlencoded::parse(&request.body)
            .into_owned()
            .collect();

        match form.get("grant_type").map(String::as_str) {
            Some("authorization_code") => self.exchange_code(&form),
            Some("refresh_token") => self.refresh(&form),
            _ => ResponseTemplate::new(400).set_body_json(json!({
                "error": "unsupported_grant_type",
            })),
        }
    }
}

impl FakeIdp {
    pub async fn start() -> Self {
        Self::start_with(IdpOptions::default()).await
    }

    pub async fn start_with(options: IdpOptions) -> Self {
        let server = MockServer::start().await;
        let issuer = server.uri();
        let observed = Arc::new(Mutex::new(IdpObservations::default()));

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/token"),
                "jwks_uri": format!("{issuer}/keys"),
                "response_types_supported": ["code"],
                "scopes_supported": ["openid", "email", "offline_access"],
                "code_challenge_methods_supported": options.code_challenge_methods,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/authorize"))
            .respond_with(AuthorizeResponder {
                behavior: options.authorize,
                observed: observed.clone(),
            })
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(TokenResponder {
                issuer: issuer.clone(),
                options,
                observed: observed.clone(),
            })
            .mount(&server)
            .await;

        Self { server, observed }
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Login settings pointing at this provider with an ephemeral listener.
    pub fn login_config(&self) -> LoginConfig {
        LoginConfig::new(self.issuer(), "rotor")
            .with_bind_addresses(vec!["127.0.0.1:0".to_string()])
            .with_redirect_hostname("127.0.0.1")
            .with_use_pkce(false)
            .with_login_timeout(Duration::from_secs(10))
    }

    pub async fn login(&self) -> Result<CertificateAuthLogin, LoginError> {
        self.login_with(self.login_config()).await
    }

    pub async fn login_with(&self, config: LoginConfig) -> Result<CertificateAuthLogin, LoginError> {
        CertificateAuthLogin::new(config, user_certificate()).await
    }

    pub fn observed(&self) -> IdpObservations {
        self.observed.lock().unwrap().clone()
    }
}

/// A `wiremock`-backed provisioning API.
pub struct ProvisioningMock {
    pub server: MockServer,
}

impl ProvisioningMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> ProvisioningConfig {
        ProvisioningConfig::new(self.server.uri(), PROVISIONING_TOKEN)
    }

    pub fn client(&self) -> ProvisioningClient {
        ProvisioningClient::new(&self.config()).expect("Failed to create provisioning client")
    }

    fn bindings_path(resource_id: &str) -> String {
        format!("/provisioning/v1/environments/{resource_id}/bindings")
    }

    fn authorized(verb: &str, resource_path: String) -> wiremock::MockBuilder {
        Mock::given(method(verb))
            .and(path(resource_path))
            .and(header("authorization", format!("Bearer {PROVISIONING_TOKEN}").as_str()))
    }

    pub async fn mock_list(&self, resource_id: &str, binding_ids: &[&str]) {
        Self::authorized("GET", Self::bindings_path(resource_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(binding_list_json(binding_ids)))
            .mount(&self.server)
            .await;
    }

    /// Expect a create with `ttl_seconds` and answer with the given binding.
    pub async fn mock_create(
        &self,
        resource_id: &str,
        ttl_seconds: i64,
        response: CreatedBinding<'_>,
    ) {
        let mut template = ResponseTemplate::new(201).set_body_json(created_binding_json(
            response.id,
            response.expires_at,
            response.kubeconfig,
        ));
        if let Some(location) = response.location {
            template = template.insert_header("Location", location);
        }

        Self::authorized("POST", Self::bindings_path(resource_id))
            .and(body_json(json!({
                "parameters": { "expiration_seconds": ttl_seconds }
            })))
            .respond_with(template)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_delete(&self, resource_id: &str, binding_id: &str, status: u16) {
        Self::authorized(
            "DELETE",
            format!("{}/{binding_id}", Self::bindings_path(resource_id)),
        )
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(&self.server)
        .await;
    }

    pub async fn mock_error(&self, verb: &str, resource_id: &str, status: u16, body: serde_json::Value) {
        Self::authorized(verb, Self::bindings_path(resource_id))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

/// Binding returned by [`ProvisioningMock::mock_create`].
pub struct CreatedBinding<'a> {
    pub id: &'a str,
    pub expires_at: DateTime<Utc>,
    pub kubeconfig: &'a str,
    pub location: Option<&'a str>,
}

/// Binding id in the shape the provisioning API uses.
pub fn new_binding_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
