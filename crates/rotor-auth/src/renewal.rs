//! Token renewal decisions: judge first, refresh before re-login.

use crate::error::LoginError;
use crate::judge::{JudgeError, RotationJudge};
use crate::login::CertificateAuthLogin;
use async_trait::async_trait;
use rotor_core::{RotationStatus, SharedClock, TokenSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Operations a token renewal needs from a login implementation.
#[async_trait]
pub trait LoginPerformer: Send + Sync {
    /// Run a fresh interactive-free login.
    async fn do_login(&self, cancel: &CancellationToken) -> Result<TokenSet, LoginError>;

    /// Whether the ID token fails temporal validation; `false` if undecodable.
    fn is_expired(&self, id_token: &str) -> bool;

    /// Redeem a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, LoginError>;
}

#[async_trait]
impl LoginPerformer for CertificateAuthLogin {
    async fn do_login(&self, cancel: &CancellationToken) -> Result<TokenSet, LoginError> {
        CertificateAuthLogin::do_login(self, cancel).await
    }

    fn is_expired(&self, id_token: &str) -> bool {
        CertificateAuthLogin::is_expired(self, id_token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, LoginError> {
        CertificateAuthLogin::refresh(self, refresh_token).await
    }
}

/// Outcome of inspecting a held token set.
#[derive(Debug, Default)]
pub struct RenewalAssessment {
    pub needs_renewal: bool,
    /// Judge snapshot; empty when the token could not be judged.
    pub status: RotationStatus,
    /// Why the judge could not be used, if it could not.
    pub introspection_error: Option<JudgeError>,
}

/// Decide whether `tokens` must be renewed.
///
/// Uses the rotation window when the token carries `iat` and `exp`, and falls
/// back to a plain expiry check otherwise. A missing ID token always needs
/// renewal.
pub fn assess(
    performer: &dyn LoginPerformer,
    tokens: Option<&TokenSet>,
    clock: SharedClock,
) -> RenewalAssessment {
    let Some(tokens) = tokens.filter(|t| !t.id_token.is_empty()) else {
        return RenewalAssessment {
            needs_renewal: true,
            ..RenewalAssessment::default()
        };
    };

    let judged = RotationJudge::with_clock(&tokens.id_token, clock)
        .and_then(|judge| Ok((judge.estimate_rotation_duration()?, judge)));

    match judged {
        Ok((duration, judge)) => RenewalAssessment {
            needs_renewal: judge.is_in_renew_period(duration),
            status: judge.status(),
            introspection_error: None,
        },
        Err(e) => {
            debug!(error = %e, "Falling back to expiry check");
            RenewalAssessment {
                needs_renewal: performer.is_expired(&tokens.id_token),
                status: RotationStatus::default(),
                introspection_error: Some(e),
            }
        }
    }
}

/// Obtain a fresh token set, refreshing when possible and logging in again
/// when the refresh fails.
pub async fn renew(
    performer: &dyn LoginPerformer,
    tokens: Option<&TokenSet>,
    cancel: &CancellationToken,
) -> Result<TokenSet, LoginError> {
    if let Some(tokens) = tokens
        && !tokens.refresh_token.is_empty()
    {
        match performer.refresh(&tokens.refresh_token).await {
            Ok(refreshed) => return Ok(refreshed),
            Err(e) => warn!(error = %e, "Token refresh failed, performing a new login"),
        }
    }
    performer.do_login(cancel).await
}
