//! Which bindings stay active, and which are kept at all.

use chrono::{DateTime, Utc};
use rotor_core::{Binding, RotationPolicy};
use std::collections::HashSet;
use tracing::debug;

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// At least one binding is still active; no new one is needed.
    pub has_active: bool,
    /// Bindings that have not reached their TTL, active or not.
    pub retained: Vec<Binding>,
}

/// Tracks issued bindings against a [`RotationPolicy`].
///
/// Deactivation is one-way: a binding that passed its rotation deadline is
/// never reactivated, even if the policy changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct BindingRotationLedger {
    policy: RotationPolicy,
}

impl BindingRotationLedger {
    pub fn new(policy: RotationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn reconcile(
        &self,
        bindings: Vec<Binding>,
        authoritative_ids: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let mut known: Vec<Binding> = bindings
            .into_iter()
            .filter(|b| {
                let present = authoritative_ids.contains(&b.id);
                if !present {
                    debug!(binding_id = %b.id, "Binding no longer known to service");
                }
                present
            })
            .collect();

        let mut has_active = false;
        for binding in known.iter_mut().filter(|b| b.is_active) {
            if binding.is_expired_at(now) {
                debug!(binding_id = %binding.id, "Binding reached its TTL");
                binding.is_active = false;
            } else if binding.is_rotation_due_at(now, self.policy.rotation_interval) {
                debug!(binding_id = %binding.id, "Binding reached its rotation deadline");
                binding.is_active = false;
            } else {
                has_active = true;
            }
        }

        known.retain(|b| !b.is_expired_at(now));

        ReconcileOutcome {
            has_active,
            retained: known,
        }
    }

    /// Append a freshly issued binding and return it.
    pub fn record_issued(
        &self,
        retained: &mut Vec<Binding>,
        id: impl Into<String>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Binding {
        let binding = Binding::issued(id, now, expires_at);
        retained.push(binding.clone());
        binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn ids(bindings: &[&Binding]) -> HashSet<String> {
        bindings.iter().map(|b| b.id.clone()).collect()
    }

    fn ledger(interval_minutes: i64) -> BindingRotationLedger {
        BindingRotationLedger::new(
            RotationPolicy::default().with_rotation_interval(Duration::minutes(interval_minutes)),
        )
    }

    #[test]
    fn test_expired_binding_is_dropped() {
        let expired = Binding::issued(
            "expired",
            now() - Duration::hours(2),
            now() - Duration::seconds(1),
        );

        let outcome = ledger(60).reconcile(vec![expired.clone()], &ids(&[&expired]), now());

        assert!(!outcome.has_active);
        assert!(outcome.retained.is_empty());
    }

    #[test]
    fn test_rotated_binding_is_kept_inactive() {
        let rotated = Binding::issued(
            "rotated",
            now() - Duration::minutes(61),
            now() + Duration::minutes(60),
        );

        let outcome = ledger(60).reconcile(vec![rotated.clone()], &ids(&[&rotated]), now());

        assert!(!outcome.has_active);
        assert_eq!(
            outcome.retained,
            vec![Binding {
                is_active: false,
                ..rotated
            }]
        );
    }

    #[test]
    fn test_fresh_binding_stays_active() {
        let fresh = Binding::issued(
            "fresh",
            now() - Duration::minutes(5),
            now() + Duration::minutes(70),
        );

        let outcome = ledger(60).reconcile(vec![fresh.clone()], &ids(&[&fresh]), now());

        assert!(outcome.has_active);
        assert_eq!(outcome.retained, vec![fresh]);
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let kept = Binding::issued("kept", now(), now() + Duration::hours(1));
        let gone = Binding::issued("gone", now(), now() + Duration::hours(1));

        let outcome = ledger(60).reconcile(vec![kept.clone(), gone], &ids(&[&kept]), now());

        assert_eq!(outcome.retained, vec![kept]);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let at_ttl = Binding::issued("ttl", now() - Duration::minutes(10), now());
        let at_deadline = Binding::issued(
            "deadline",
            now() - Duration::minutes(60),
            now() + Duration::minutes(15),
        );

        let outcome = ledger(60).reconcile(
            vec![at_ttl.clone(), at_deadline.clone()],
            &ids(&[&at_ttl, &at_deadline]),
            now(),
        );

        assert!(!outcome.has_active);
        assert_eq!(outcome.retained.len(), 1);
        assert_eq!(outcome.retained[0].id, "deadline");
        assert!(!outcome.retained[0].is_active);
    }

    #[test]
    fn test_inactive_binding_never_reactivates() {
        let mut inactive = Binding::issued("old", now(), now() + Duration::hours(1));
        inactive.is_active = false;

        let outcome = ledger(600).reconcile(vec![inactive.clone()], &ids(&[&inactive]), now());

        assert!(!outcome.has_active);
        assert_eq!(outcome.retained, vec![inactive]);
    }

    #[test]
    fn test_out_of_range_interval_keeps_binding_active() {
        let policy: RotationPolicy = serde_yaml::from_str(
            "rotation_interval: 9000000000000\ntime_to_live: 9100000000000\n",
        )
        .unwrap();
        assert!(policy.validate().is_ok());
        let fresh = Binding::issued("fresh", now(), now() + Duration::minutes(75));

        let outcome =
            BindingRotationLedger::new(policy).reconcile(vec![fresh.clone()], &ids(&[&fresh]), now());

        assert!(outcome.has_active);
        assert_eq!(outcome.retained, vec![fresh]);
    }

    #[test]
    fn test_record_issued() {
        let ledger = ledger(60);
        let mut retained = Vec::new();
        let binding = ledger.record_issued(&mut retained, "new", now(), now() + Duration::minutes(75));

        assert!(binding.is_active);
        assert_eq!(binding.created_at, now());
        assert_eq!(retained, vec![binding]);
    }
}
