//! Externally issued credential bindings and their rotation policy.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One credential instance issued by the binding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Binding {
    /// A freshly issued, active binding.
    pub fn issued(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            is_active: true,
            created_at,
            expires_at,
        }
    }

    /// Hard TTL reached; inclusive at the boundary.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Soft rotation deadline reached; inclusive at the boundary.
    ///
    /// A deadline past the last representable instant is never due.
    pub fn is_rotation_due_at(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.created_at.checked_add_signed(interval) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// How often bindings are replaced and how long each one lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Age at which an active binding is superseded, in seconds.
    #[serde(with = "crate::duration", default = "default_rotation_interval")]
    pub rotation_interval: Duration,

    /// Lifetime requested for new bindings, in seconds.
    #[serde(with = "crate::duration", default = "default_time_to_live")]
    pub time_to_live: Duration,
}

fn default_rotation_interval() -> Duration {
    Duration::hours(1)
}

fn default_time_to_live() -> Duration {
    Duration::minutes(75)
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            rotation_interval: default_rotation_interval(),
            time_to_live: default_time_to_live(),
        }
    }
}

impl RotationPolicy {
    pub fn new(rotation_interval: Duration, time_to_live: Duration) -> Self {
        Self {
            rotation_interval,
            time_to_live,
        }
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    /// TTL to request from the binding service, rounded to whole seconds.
    pub fn ttl_seconds(&self) -> i64 {
        let millis = self.time_to_live.num_milliseconds();
        (millis as f64 / 1000.0).round() as i64
    }

    /// Reject policies that leave no handover window.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_interval <= Duration::zero() {
            return Err(Error::InvalidConfig(
                "rotation interval must be positive".to_string(),
            ));
        }
        if self.time_to_live <= Duration::zero() {
            return Err(Error::InvalidConfig(
                "time to live must be positive".to_string(),
            ));
        }
        if self.rotation_interval >= self.time_to_live {
            return Err(Error::InvalidConfig(format!(
                "rotation interval ({}s) must be shorter than time to live ({}s)",
                self.rotation_interval.num_seconds(),
                self.time_to_live.num_seconds()
            )));
        }
        Ok(())
    }

    /// Load a policy from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let policy: Self = serde_yaml::from_str(&contents)?;
        policy.validate()?;
        Ok(policy)
    }
}
