//! Certificate-authenticated OIDC authorization code login.
//!
//! A login runs two units of work under one cancellation token:
//!
//! * the *visitor* waits for the authorize URL and requests it with a client
//!   presenting the user certificate, so the provider authenticates the
//!   caller via mutual TLS and redirects straight back;
//! * the *receiver* runs the loopback redirect listener, publishes the
//!   authorize URL once it is listening, and exchanges the returned code for
//!   tokens.
//!
//! The first failure cancels the other side. Both are bounded by an absolute
//! deadline taken from [`LoginConfig::login_timeout`].

use crate::callback::{self, AuthorizationCallback};
use crate::certificate::{ClientIdentity, UserCertificate, parse_certificate};
use crate::config::LoginConfig;
use crate::error::LoginError;
use crate::jwt::JwtClaims;
use crate::oidc::{OidcDiscoveryDocument, read_token_response};
use crate::pkce::{PkceChallenge, PkceMethod, random_token};
use rotor_core::{SharedClock, TokenSet, system_clock};
use rotor_trace::{RotationAttributes, login_span};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};
use url::Url;

/// Per-attempt protocol parameters.
struct LoginAttempt {
    state: String,
    nonce: String,
    pkce: Option<PkceChallenge>,
    redirect_uri: String,
    deadline: Instant,
}

/// OIDC login that authenticates with a client certificate instead of a
/// browser session.
pub struct CertificateAuthLogin {
    config: LoginConfig,
    provider: OidcDiscoveryDocument,
    identity: ClientIdentity,
    http: reqwest::Client,
    mtls: reqwest::Client,
    clock: SharedClock,
}

impl CertificateAuthLogin {
    /// Parse the certificate and run provider discovery.
    pub async fn new(config: LoginConfig, certificate: UserCertificate) -> Result<Self, LoginError> {
        Self::with_clock(config, certificate, system_clock()).await
    }

    pub async fn with_clock(
        config: LoginConfig,
        certificate: UserCertificate,
        clock: SharedClock,
    ) -> Result<Self, LoginError> {
        config.validate()?;
        let identity = parse_certificate(&certificate.pkcs12, &certificate.password)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let mtls = reqwest::Client::builder()
            .identity(identity.to_reqwest_identity()?)
            .build()?;

        let provider = OidcDiscoveryDocument::discover(&http, &config.issuer_url).await?;
        debug!(
            issuer = %provider.issuer,
            authorization_endpoint = %provider.authorization_endpoint,
            "Discovered identity provider"
        );

        Ok(Self {
            config,
            provider,
            identity,
            http,
            mtls,
            clock,
        })
    }

    pub fn provider(&self) -> &OidcDiscoveryDocument {
        &self.provider
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    fn span_attributes(&self) -> RotationAttributes {
        RotationAttributes::new().identity_provider(&self.config.issuer_url, &self.config.client_id)
    }

    /// Run the authorization code flow and return the issued tokens.
    ///
    /// Every failure is wrapped in [`LoginError::Authentication`].
    pub async fn do_login(&self, cancel: &CancellationToken) -> Result<TokenSet, LoginError> {
        let span = login_span(&self.span_attributes(), "authorization_code");
        self.run_login(cancel)
            .instrument(span)
            .await
            .map_err(|e| match e {
                e @ LoginError::Authentication(_) => e,
                other => LoginError::authentication(other),
            })
    }

    async fn run_login(&self, cancel: &CancellationToken) -> Result<TokenSet, LoginError> {
        let listener = callback::bind(&self.config.bind_addresses)
            .await
            .map_err(LoginError::Listener)?;
        let port = listener.local_addr().map_err(LoginError::Listener)?.port();

        let deadline = Instant::now()
            .checked_add(self.config.login_timeout())
            .ok_or_else(|| LoginError::InvalidConfig("login timeout is out of range".into()))?;
        let method = PkceMethod::negotiate(
            &self.provider.code_challenge_methods_supported,
            self.config.use_pkce,
        );
        let attempt = LoginAttempt {
            state: random_token(),
            nonce: random_token(),
            pkce: method.map(PkceChallenge::generate),
            redirect_uri: format!("http://{}:{}/", self.config.redirect_hostname, port),
            deadline,
        };
        let authorize_url = self.authorize_url(&attempt)?;
        debug!(
            redirect_uri = %attempt.redirect_uri,
            pkce = method.map(|m| m.as_str()).unwrap_or("none"),
            "Starting authorization code flow"
        );

        let session = cancel.child_token();
        let (url_tx, url_rx) = oneshot::channel();

        let visitor = async {
            let result = visit_authorize(&self.mtls, url_rx, &session, attempt.deadline).await;
            if result.is_err() {
                session.cancel();
            }
            result
        };
        let receiver = async {
            let result = self
                .receive_tokens(listener, url_tx, authorize_url, &attempt, &session)
                .await;
            if result.is_err() {
                session.cancel();
            }
            result
        };

        let (visited, received) = tokio::join!(visitor, receiver);
        session.cancel();

        match (visited, received) {
            (Ok(()), Ok(tokens)) => {
                info!(issuer = %self.provider.issuer, "Certificate-based login succeeded");
                Ok(tokens)
            }
            (Err(visit_err), Err(receive_err)) => Err(first_cause(visit_err, receive_err)),
            (Err(e), Ok(_)) | (Ok(()), Err(e)) => Err(e),
        }
    }

    fn authorize_url(&self, attempt: &LoginAttempt) -> Result<Url, LoginError> {
        let mut url = Url::parse(&self.provider.authorization_endpoint).map_err(|e| {
            LoginError::Discovery(format!(
                "invalid authorization endpoint {}: {e}",
                self.provider.authorization_endpoint
            ))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &attempt.redirect_uri)
                .append_pair("scope", &self.config.scope_param())
                .append_pair("state", &attempt.state)
                .append_pair("nonce", &attempt.nonce);
            if let Some(pkce) = &attempt.pkce {
                query
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", pkce.method.as_str());
            }
        }
        Ok(url)
    }

    /// Receiver: serve the redirect listener and exchange the returned code.
    async fn receive_tokens(
        &self,
        listener: TcpListener,
        url_tx: oneshot::Sender<Url>,
        authorize_url: Url,
        attempt: &LoginAttempt,
        session: &CancellationToken,
    ) -> Result<TokenSet, LoginError> {
        let (callback_tx, mut callback_rx) = mpsc::channel(1);
        let stop = session.child_token();
        tokio::spawn(callback::serve(listener, callback_tx, stop.clone()));

        if url_tx.send(authorize_url).is_err() {
            debug!("Authorization URL receiver already gone");
        }

        let received = tokio::select! {
            biased;
            _ = session.cancelled() => Err(LoginError::Cancelled),
            _ = sleep_until(attempt.deadline) => {
                Err(LoginError::Timeout("waiting for the authorization callback"))
            }
            callback = callback_rx.recv() => callback.ok_or_else(|| {
                LoginError::Listener(std::io::Error::other("callback listener stopped"))
            }),
        };
        stop.cancel();

        let code = self.check_callback(received?, attempt)?;
        debug!("Received authorization code, exchanging for tokens");

        let tokens = tokio::select! {
            biased;
            _ = session.cancelled() => return Err(LoginError::Cancelled),
            _ = sleep_until(attempt.deadline) => {
                return Err(LoginError::Timeout("exchanging the authorization code"));
            }
            tokens = self.exchange_code(&code, attempt) => tokens?,
        };

        self.check_nonce(&tokens.id_token, &attempt.nonce)?;
        Ok(tokens)
    }

    fn check_callback(
        &self,
        callback: AuthorizationCallback,
        attempt: &LoginAttempt,
    ) -> Result<String, LoginError> {
        if let Some(error) = callback.error {
            let message = match callback.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(LoginError::IdentityProvider(message));
        }
        if callback.state.as_deref() != Some(attempt.state.as_str()) {
            return Err(LoginError::StateMismatch);
        }
        callback.code.ok_or_else(|| {
            LoginError::IdentityProvider("authorization callback carried no code".to_string())
        })
    }

    fn check_nonce(&self, id_token: &str, expected: &str) -> Result<(), LoginError> {
        let claims = JwtClaims::decode_unverified(id_token).map_err(|e| {
            LoginError::IdentityProvider(format!("issued ID token is not a JWT: {e}"))
        })?;
        match claims.nonce() {
            Some(nonce) if nonce != expected => Err(LoginError::NonceMismatch),
            _ => Ok(()),
        }
    }

    async fn exchange_code(&self, code: &str, attempt: &LoginAttempt) -> Result<TokenSet, LoginError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", attempt.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(pkce) = &attempt.pkce {
            form.push(("code_verifier", pkce.verifier.as_str()));
        }

        let response = self
            .http
            .post(&self.provider.token_endpoint)
            .form(&form)
            .send()
            .await?;
        let body = read_token_response(response).await?;

        let id_token = body.id_token.ok_or_else(|| {
            LoginError::IdentityProvider("token response did not include an id_token".to_string())
        })?;
        Ok(TokenSet::new(id_token, body.refresh_token.unwrap_or_default()))
    }

    /// Whether `id_token` fails temporal validation now.
    ///
    /// Undecodable tokens report `false`.
    pub fn is_expired(&self, id_token: &str) -> bool {
        match JwtClaims::decode_unverified(id_token) {
            Ok(claims) => !claims.is_temporally_valid(self.clock.now()),
            Err(e) => {
                debug!(error = %e, "Could not decode ID token for expiry check");
                false
            }
        }
    }

    /// Redeem `refresh_token` for a new token set.
    ///
    /// Provider errors are returned as-is. The previous refresh token is kept
    /// when the provider does not rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, LoginError> {
        let span = login_span(&self.span_attributes(), "refresh");
        self.redeem_refresh_token(refresh_token).instrument(span).await
    }

    async fn redeem_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, LoginError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        let response = self
            .http
            .post(&self.provider.token_endpoint)
            .form(&form)
            .send()
            .await?;
        let body = read_token_response(response).await?;

        let id_token = body.id_token.ok_or_else(|| {
            LoginError::IdentityProvider("refresh response did not include an id_token".to_string())
        })?;
        let rotated = body.refresh_token.filter(|t| !t.is_empty());
        if rotated.is_none() {
            debug!("Provider did not rotate the refresh token");
        }

        info!(issuer = %self.provider.issuer, "Refreshed OIDC tokens");
        Ok(TokenSet::new(
            id_token,
            rotated.unwrap_or_else(|| refresh_token.to_string()),
        ))
    }
}

/// Visitor: wait for the authorize URL, then request it over mTLS.
async fn visit_authorize(
    mtls: &reqwest::Client,
    url_rx: oneshot::Receiver<Url>,
    session: &CancellationToken,
    deadline: Instant,
) -> Result<(), LoginError> {
    let url = tokio::select! {
        biased;
        _ = session.cancelled() => return Err(LoginError::Cancelled),
        _ = sleep_until(deadline) => {
            return Err(LoginError::Timeout("waiting for the authorization URL"));
        }
        received = url_rx => match received {
            Ok(url) => url,
            Err(_) => {
                debug!("Authorization URL handoff closed without a value");
                return Ok(());
            }
        },
    };

    debug!("Requesting authorization endpoint with client certificate");
    let response = tokio::select! {
        biased;
        _ = session.cancelled() => return Err(LoginError::Cancelled),
        _ = sleep_until(deadline) => {
            return Err(LoginError::Timeout("requesting the authorization endpoint"));
        }
        response = mtls.get(url).send() => response?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LoginError::IdentityProvider(format!(
            "authorization request returned {status}: {body}"
        )));
    }
    Ok(())
}

/// Prefer the error that caused the teardown over the cancellation it induced.
fn first_cause(visit_err: LoginError, receive_err: LoginError) -> LoginError {
    match (&visit_err, &receive_err) {
        (LoginError::Cancelled, other) if !matches!(other, LoginError::Cancelled) => receive_err,
        _ => visit_err,
    }
}
