//! Unverified JWT claim decoding.
//!
//! Tokens handled here were obtained over an authenticated channel; the
//! claims are read for scheduling decisions only and the signature is never
//! checked.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT decoding error: {0}")]
    Decoding(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid numeric date in claim {0}")]
    InvalidNumericDate(&'static str),
}

/// Why a token fails temporal validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TemporalError {
    #[error("Token is expired")]
    Expired,
    #[error("Token used before issued")]
    UsedBeforeIssued,
    #[error("Token is not valid yet")]
    NotValidYet,
    #[error("Invalid numeric date in claim {0}")]
    Malformed(&'static str),
}

/// Read-only view over the payload of a compact JWT.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtClaims {
    claims: Map<String, Value>,
}

impl JwtClaims {
    /// Decode the payload of `token` without verifying its signature.
    pub fn decode_unverified(token: &str) -> Result<Self, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(Self {
            claims: data.claims,
        })
    }

    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.string("iss")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.string("nonce")
    }

    /// Read a NumericDate claim given either as a JSON number or a numeric
    /// string. Fractional seconds are truncated.
    pub fn numeric_date(&self, name: &'static str) -> Result<Option<DateTime<Utc>>, JwtError> {
        let Some(value) = self.claims.get(name) else {
            return Ok(None);
        };

        let secs = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            _ => None,
        };

        secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(Some)
            .ok_or(JwtError::InvalidNumericDate(name))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.numeric_date("exp").ok().flatten()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.numeric_date("iat").ok().flatten()
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.numeric_date("nbf").ok().flatten()
    }

    /// Standard temporal checks: `now < exp`, `now >= iat`, `now >= nbf`.
    /// Absent claims pass; malformed ones fail.
    pub fn validate_temporal(&self, now: DateTime<Utc>) -> Result<(), TemporalError> {
        let date = |name: &'static str| {
            self.numeric_date(name)
                .map_err(|_| TemporalError::Malformed(name))
        };

        if let Some(exp) = date("exp")?
            && now >= exp
        {
            return Err(TemporalError::Expired);
        }
        if let Some(iat) = date("iat")?
            && now < iat
        {
            return Err(TemporalError::UsedBeforeIssued);
        }
        if let Some(nbf) = date("nbf")?
            && now < nbf
        {
            return Err(TemporalError::NotValidYet);
        }
        Ok(())
    }

    pub fn is_temporally_valid(&self, now: DateTime<Utc>) -> bool {
        self.validate_temporal(now).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn token(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"unrelated-secret"),
        )
        .unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_decode_ignores_signature() {
        let raw = token(json!({"iss": "https://idp.example", "exp": 2_000, "iat": 1_000}));
        let claims = JwtClaims::decode_unverified(&raw).unwrap();

        assert_eq!(claims.issuer(), Some("https://idp.example"));
        assert_eq!(claims.expires_at(), Some(at(2_000)));
        assert_eq!(claims.issued_at(), Some(at(1_000)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(JwtClaims::decode_unverified("not-a-jwt").is_err());
        assert!(JwtClaims::decode_unverified("a.b.c").is_err());
    }

    #[test]
    fn test_numeric_dates_from_strings_and_floats() {
        let claims = JwtClaims::from_map(
            json!({"exp": "1700000000", "iat": 1_600_000_000.9, "nbf": " 1650000000 "})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(claims.expires_at(), Some(at(1_700_000_000)));
        assert_eq!(claims.issued_at(), Some(at(1_600_000_000)));
        assert_eq!(claims.not_before(), Some(at(1_650_000_000)));
    }

    #[test]
    fn test_malformed_numeric_date() {
        let claims = JwtClaims::from_map(json!({"exp": "soon"}).as_object().cloned().unwrap());

        assert!(matches!(
            claims.numeric_date("exp"),
            Err(JwtError::InvalidNumericDate("exp"))
        ));
        assert_eq!(
            claims.validate_temporal(at(0)),
            Err(TemporalError::Malformed("exp"))
        );
    }

    #[test]
    fn test_temporal_boundaries() {
        let claims = JwtClaims::from_map(
            json!({"iat": 1_000, "nbf": 1_100, "exp": 2_000})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(claims.validate_temporal(at(999)), Err(TemporalError::UsedBeforeIssued));
        assert_eq!(claims.validate_temporal(at(1_050)), Err(TemporalError::NotValidYet));
        assert_eq!(claims.validate_temporal(at(1_100)), Ok(()));
        assert_eq!(claims.validate_temporal(at(1_999)), Ok(()));
        assert_eq!(claims.validate_temporal(at(2_000)), Err(TemporalError::Expired));
    }

    #[test]
    fn test_no_time_claims_is_valid() {
        let claims = JwtClaims::from_map(json!({"sub": "robot"}).as_object().cloned().unwrap());
        assert!(claims.is_temporally_valid(at(0)));
    }
}
