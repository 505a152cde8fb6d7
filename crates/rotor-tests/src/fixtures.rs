//! Test fixtures for tokens, certificates and kubeconfigs.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rotor_auth::UserCertificate;
use serde_json::{Value, json};

/// HMAC key the fake identity provider signs tokens with.
pub const JWT_SECRET: &[u8] = b"rotor-test-signing-key";

pub const CERTIFICATE_PASSWORD: &str = "rotor-test";

const CLIENT_CERT_DER: &[u8] = include_bytes!("../fixtures/client.der");
const CLIENT_KEY_DER: &[u8] = include_bytes!("../fixtures/client.key.der");
const CA_CERT_DER: &[u8] = include_bytes!("../fixtures/ca.der");

/// Sign arbitrary claims as a compact JWT.
pub fn signed_jwt(claims: &Value) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(JWT_SECRET))
        .expect("Failed to sign JWT fixture")
}

/// Factory for ID tokens.
pub struct IdTokenFixture {
    claims: serde_json::Map<String, Value>,
}

impl IdTokenFixture {
    /// An ID token issued at `issued_at` that lives for `lifetime`.
    pub fn issued(issuer: &str, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let mut claims = serde_json::Map::new();
        claims.insert("iss".into(), json!(issuer));
        claims.insert("sub".into(), json!("rotor-client"));
        claims.insert("aud".into(), json!("rotor"));
        claims.insert("iat".into(), json!(issued_at.timestamp()));
        claims.insert("exp".into(), json!((issued_at + lifetime).timestamp()));
        Self { claims }
    }

    /// An hour-long token issued now.
    pub fn fresh(issuer: &str) -> Self {
        Self::issued(issuer, Utc::now(), Duration::hours(1))
    }

    pub fn with_nonce(mut self, nonce: &str) -> Self {
        self.claims.insert("nonce".into(), json!(nonce));
        self
    }

    pub fn without(mut self, claim: &str) -> Self {
        self.claims.remove(claim);
        self
    }

    pub fn encode(&self) -> String {
        signed_jwt(&Value::Object(self.claims.clone()))
    }
}

/// PKCS#12 bundle holding the test client certificate, its key and the CA.
pub fn pkcs12_fixture(password: &str) -> Vec<u8> {
    p12::PFX::new(
        CLIENT_CERT_DER,
        CLIENT_KEY_DER,
        Some(CA_CERT_DER),
        password,
        "rotor-client",
    )
    .expect("Failed to build PKCS#12 fixture")
    .to_der()
}

pub fn client_certificate_der() -> &'static [u8] {
    CLIENT_CERT_DER
}

pub fn ca_certificate_der() -> &'static [u8] {
    CA_CERT_DER
}

pub fn user_certificate() -> UserCertificate {
    UserCertificate::new(pkcs12_fixture(CERTIFICATE_PASSWORD), CERTIFICATE_PASSWORD)
}

/// Kubeconfig with one client-certificate user.
pub const KUBECONFIG_TEMPLATE: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: shoot
  cluster:
    certificate-authority-data: Y2EtZGF0YQ==
    server: https://api.shoot.example:443
contexts:
- name: shoot
  context:
    cluster: shoot
    user: oidc
current-context: shoot
users:
- name: oidc
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: kubectl
      args:
      - oidc-login
      - get-token
"#;

/// Provisioning API body for a created binding.
pub fn created_binding_json(id: &str, expires_at: DateTime<Utc>, kubeconfig: &str) -> Value {
    json!({
        "metadata": {
            "id": id,
            "expires_at": expires_at.to_rfc3339(),
        },
        "credentials": {
            "kubeconfig": kubeconfig,
        }
    })
}

/// Provisioning API body for a binding listing.
pub fn binding_list_json(ids: &[&str]) -> Value {
    json!({
        "bindings": ids.iter().map(|id| json!({ "bindingId": id })).collect::<Vec<_>>()
    })
}
