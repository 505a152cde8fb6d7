//! Rotation timing decisions for OIDC tokens.

use crate::jwt::{JwtClaims, JwtError};
use chrono::{DateTime, Duration, Utc};
use rotor_core::rotation::rotation_window;
use rotor_core::{RotationStatus, SharedClock, system_clock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Could not parse token: {0}")]
    Parse(#[from] JwtError),
    #[error("Token has no expiry claim")]
    ExpiryMissing,
    #[error("Token has no issued-at claim")]
    IssuedAtMissing,
    #[error("Token expires at {expires_at} which is not after its issue time {issued_at}")]
    TemporalInvariantViolation {
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

impl From<JudgeError> for rotor_core::Error {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::Parse(e) => rotor_core::Error::Parse(e.to_string()),
            JudgeError::ExpiryMissing => rotor_core::Error::MissingClaim("exp"),
            JudgeError::IssuedAtMissing => rotor_core::Error::MissingClaim("iat"),
            e @ JudgeError::TemporalInvariantViolation { .. } => {
                rotor_core::Error::TemporalInvariantViolation(e.to_string())
            }
        }
    }
}

/// Decides when a token has entered its renewal window.
pub struct RotationJudge {
    claims: JwtClaims,
    clock: SharedClock,
}

impl RotationJudge {
    /// Decode `raw_token` and judge it against the wall clock.
    pub fn new(raw_token: &str) -> Result<Self, JudgeError> {
        Self::with_clock(raw_token, system_clock())
    }

    pub fn with_clock(raw_token: &str, clock: SharedClock) -> Result<Self, JudgeError> {
        let claims = JwtClaims::decode_unverified(raw_token)?;
        Ok(Self { claims, clock })
    }

    pub fn claims(&self) -> &JwtClaims {
        &self.claims
    }

    /// Length of the renewal window: one third of the token lifetime.
    pub fn estimate_rotation_duration(&self) -> Result<Duration, JudgeError> {
        let expires_at = self
            .claims
            .numeric_date("exp")?
            .ok_or(JudgeError::ExpiryMissing)?;
        let issued_at = self
            .claims
            .numeric_date("iat")?
            .ok_or(JudgeError::IssuedAtMissing)?;

        let duration = rotation_window(issued_at, expires_at);
        if duration <= Duration::zero() {
            return Err(JudgeError::TemporalInvariantViolation {
                issued_at,
                expires_at,
            });
        }
        Ok(duration)
    }

    /// Whether the token should be renewed now.
    ///
    /// A token that already fails temporal validation always needs renewal.
    /// Without an expiry there is nothing to judge against. A window reaching
    /// past the earliest representable instant has already opened.
    pub fn is_in_renew_period(&self, duration: Duration) -> bool {
        let now = self.clock.now();
        if !self.claims.is_temporally_valid(now) {
            return true;
        }
        match self.claims.expires_at() {
            Some(expires_at) => match expires_at.checked_sub_signed(duration) {
                Some(renew_from) => now >= renew_from,
                None => true,
            },
            None => false,
        }
    }

    /// Whether the token fails temporal validation right now.
    pub fn is_expired(&self) -> bool {
        !self.claims.is_temporally_valid(self.clock.now())
    }

    pub fn status(&self) -> RotationStatus {
        RotationStatus::derive(
            self.claims.issuer().map(str::to_string),
            self.claims.issued_at(),
            self.claims.expires_at(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use pretty_assertions::assert_eq;
    use rotor_core::FixedClock;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn token(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap()
    }

    fn judge_at(claims: Value, now: i64) -> RotationJudge {
        RotationJudge::with_clock(&token(claims), Arc::new(FixedClock::at_timestamp(now))).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_parse_failure_is_fatal() {
        assert!(matches!(
            RotationJudge::new("definitely.not.jwt"),
            Err(JudgeError::Parse(_))
        ));
    }

    #[test]
    fn test_estimate_is_a_third_of_lifetime() {
        let judge = judge_at(json!({"iat": 1_000, "exp": 4_600}), 1_000);
        assert_eq!(judge.estimate_rotation_duration().unwrap(), Duration::seconds(1_200));
    }

    #[test]
    fn test_estimate_with_string_claims() {
        let judge = judge_at(json!({"iat": "0", "exp": "3600"}), 0);
        assert_eq!(judge.estimate_rotation_duration().unwrap(), Duration::seconds(1_200));
    }

    #[test]
    fn test_estimate_missing_claims() {
        let judge = judge_at(json!({"iat": 1_000}), 1_000);
        assert!(matches!(
            judge.estimate_rotation_duration(),
            Err(JudgeError::ExpiryMissing)
        ));

        let judge = judge_at(json!({"exp": 4_000}), 1_000);
        assert!(matches!(
            judge.estimate_rotation_duration(),
            Err(JudgeError::IssuedAtMissing)
        ));
    }

    #[test]
    fn test_estimate_rejects_non_positive_lifetime() {
        for (iat, exp) in [(5_000, 5_000), (5_000, 4_000)] {
            let judge = judge_at(json!({"iat": iat, "exp": exp}), 0);
            assert!(
                matches!(
                    judge.estimate_rotation_duration(),
                    Err(JudgeError::TemporalInvariantViolation { .. })
                ),
                "iat={iat} exp={exp}"
            );
        }
    }

    #[test]
    fn test_renew_period_boundaries() {
        let claims = json!({"iat": 0, "exp": 3_000});
        let duration = Duration::seconds(1_000);

        assert!(!judge_at(claims.clone(), 1_999).is_in_renew_period(duration));
        assert!(judge_at(claims.clone(), 2_000).is_in_renew_period(duration));
        assert!(judge_at(claims.clone(), 2_999).is_in_renew_period(duration));
        assert!(judge_at(claims, 3_000).is_in_renew_period(duration));
    }

    #[test]
    fn test_invalid_token_always_renews() {
        let zero = Duration::zero();
        // before nbf
        assert!(judge_at(json!({"nbf": 500, "exp": 3_000}), 100).is_in_renew_period(zero));
        // before iat
        assert!(judge_at(json!({"iat": 500, "exp": 3_000}), 100).is_in_renew_period(zero));
        // expired
        assert!(judge_at(json!({"exp": 3_000}), 5_000).is_in_renew_period(zero));
    }

    #[test]
    fn test_oversized_window_renews() {
        let judge = judge_at(json!({"iat": 1_700_000_000, "exp": 1_700_003_600}), 1_700_000_000);
        assert!(judge.is_in_renew_period(Duration::days(365 * 300_000)));
        assert!(!judge.is_in_renew_period(Duration::minutes(20)));
    }

    #[test]
    fn test_no_expiry_cannot_be_judged() {
        let judge = judge_at(json!({"iat": 0}), 1_000_000);
        assert!(!judge.is_in_renew_period(Duration::days(365)));
    }

    #[test]
    fn test_status_full() {
        let judge = judge_at(
            json!({"iss": "https://idp.example", "iat": 0, "exp": 3_600}),
            10,
        );

        assert_eq!(
            judge.status(),
            RotationStatus {
                issuer: Some("https://idp.example".to_string()),
                issued_at: Some(at(0)),
                expires_at: Some(at(3_600)),
                rotation_not_before: Some(at(2_400)),
                rotation_duration: Some(Duration::seconds(1_200)),
                ..RotationStatus::default()
            }
        );
    }

    #[test]
    fn test_status_partial() {
        let judge = judge_at(json!({"iat": 42}), 100);
        assert_eq!(
            judge.status(),
            RotationStatus {
                issued_at: Some(at(42)),
                ..RotationStatus::default()
            }
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let err: rotor_core::Error = JudgeError::ExpiryMissing.into();
        assert!(matches!(err, rotor_core::Error::MissingClaim("exp")));
    }
}
