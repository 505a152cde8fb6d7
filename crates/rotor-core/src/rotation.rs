//! Rotation status snapshots derived from token claims.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// How the renewal point of a credential is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    /// Renew once two thirds of the token lifetime have elapsed.
    #[default]
    Dynamic,
}

/// Point-in-time view of a token's lifetime and renewal window.
///
/// `rotation_duration` and `rotation_not_before` are only populated when both
/// `issued_at` and `expires_at` are known and the lifetime is positive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_not_before: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub rotation_duration: Option<Duration>,
    #[serde(default)]
    pub rotation_strategy: RotationStrategy,
}

impl RotationStatus {
    /// Build a status from whatever lifetime facts are available.
    pub fn derive(
        issuer: Option<String>,
        issued_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let issued_at = issued_at.map(truncate_to_seconds);
        let expires_at = expires_at.map(truncate_to_seconds);

        let mut status = Self {
            issuer,
            issued_at,
            expires_at,
            ..Self::default()
        };

        if let (Some(iat), Some(exp)) = (issued_at, expires_at) {
            let duration = rotation_window(iat, exp);
            if duration > Duration::zero() {
                status.rotation_duration = Some(duration);
                status.rotation_not_before = Some(exp - duration);
            }
        }

        status
    }
}

/// Length of the renewal window: the final third of the lifetime.
pub fn rotation_window(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Duration {
    (expires_at - issued_at) / 3
}

fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::seconds(1))
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_derive_full_status() {
        let status = RotationStatus::derive(
            Some("https://idp.example".into()),
            Some(at(1_000)),
            Some(at(4_000)),
        );

        assert_eq!(status.rotation_duration, Some(Duration::seconds(1_000)));
        assert_eq!(status.rotation_not_before, Some(at(3_000)));
        assert_eq!(status.rotation_strategy, RotationStrategy::Dynamic);
    }

    #[test]
    fn test_derive_issued_at_only() {
        let status = RotationStatus::derive(None, Some(at(1_000)), None);
        assert_eq!(
            status,
            RotationStatus {
                issued_at: Some(at(1_000)),
                ..RotationStatus::default()
            }
        );
    }

    #[test]
    fn test_derive_inverted_lifetime_has_no_window() {
        let status = RotationStatus::derive(None, Some(at(4_000)), Some(at(1_000)));
        assert!(status.rotation_duration.is_none());
        assert!(status.rotation_not_before.is_none());
        assert_eq!(status.expires_at, Some(at(1_000)));
    }

    #[test]
    fn test_timestamps_truncated() {
        let iat = DateTime::from_timestamp(1_000, 750_000_000).unwrap();
        let status = RotationStatus::derive(None, Some(iat), None);
        assert_eq!(status.issued_at, Some(at(1_000)));
    }

    #[test]
    fn test_serialized_shape() {
        let status = RotationStatus::derive(None, Some(at(0)), Some(at(3_600)));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["rotationDuration"], 1_200);
        assert_eq!(json["rotationStrategy"], "Dynamic");
        assert!(json.get("issuer").is_none());
    }
}
