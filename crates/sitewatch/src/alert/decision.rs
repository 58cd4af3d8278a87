//! Per-URL alert state machine.
//!
//! A URL is either up or down; a URL with no stored state is in a third, unknown state.
//! Leaving the unknown state or flipping between up and down always alerts. Staying in
//! the same state alerts again only once the cooldown has elapsed since the last alert,
//! and only when reminders are enabled.

use chrono::{DateTime, Duration, Utc};

use crate::types::TargetState;

/// Default minimum spacing between two reminders for an unchanged URL
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

/// Why a notification is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// No state was recorded for the URL yet
    FirstObservation,
    /// The URL flipped between up and down
    Transition,
    /// The URL kept its state for longer than the cooldown
    Reminder,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::FirstObservation => write!(f, "first"),
            AlertKind::Transition => write!(f, "transition"),
            AlertKind::Reminder => write!(f, "reminder"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub cooldown: Duration,
    /// When false only first observations and transitions alert
    pub reminders: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self { cooldown: Duration::minutes(DEFAULT_COOLDOWN_MINUTES), reminders: true }
    }
}

impl AlertPolicy {
    pub fn new(cooldown: std::time::Duration, reminders: bool) -> Self {
        let cooldown = Duration::from_std(cooldown).unwrap_or(Duration::MAX);
        Self { cooldown, reminders }
    }
}

/// What to do with one observation, and the state to store afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send { kind: AlertKind, next: TargetState },
    Suppress { next: TargetState },
}

impl Decision {
    pub fn next_state(&self) -> TargetState {
        match self {
            Decision::Send { next, .. } | Decision::Suppress { next } => *next,
        }
    }

    pub fn should_send(&self) -> bool {
        matches!(self, Decision::Send { .. })
    }
}

/// Decide whether an observation of `is_up` at `now` warrants a notification.
pub fn decide(
    previous: Option<TargetState>,
    is_up: bool,
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> Decision {
    let alerted = TargetState { is_up, last_alert_at: now };

    let Some(previous) = previous else {
        return Decision::Send { kind: AlertKind::FirstObservation, next: alerted };
    };

    if previous.is_up != is_up {
        return Decision::Send { kind: AlertKind::Transition, next: alerted };
    }

    if policy.reminders && now - previous.last_alert_at > policy.cooldown {
        return Decision::Send { kind: AlertKind::Reminder, next: alerted };
    }

    Decision::Suppress { next: TargetState { is_up, last_alert_at: previous.last_alert_at } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn policy() -> AlertPolicy {
        AlertPolicy { cooldown: Duration::minutes(30), reminders: true }
    }

    #[test]
    fn test_first_observation_always_sends() {
        for is_up in [true, false] {
            let decision = decide(None, is_up, t0(), &policy());
            assert_eq!(
                decision,
                Decision::Send {
                    kind: AlertKind::FirstObservation,
                    next: TargetState { is_up, last_alert_at: t0() },
                }
            );
        }
    }

    #[test]
    fn test_unchanged_within_cooldown_is_suppressed() {
        let previous = TargetState { is_up: true, last_alert_at: t0() };
        let decision = decide(Some(previous), true, t0() + Duration::seconds(1), &policy());

        assert!(!decision.should_send());
        assert_eq!(decision.next_state(), previous);
    }

    #[test]
    fn test_transition_ignores_cooldown() {
        let previous = TargetState { is_up: true, last_alert_at: t0() };
        let now = t0() + Duration::seconds(2);
        let decision = decide(Some(previous), false, now, &policy());

        assert_eq!(
            decision,
            Decision::Send {
                kind: AlertKind::Transition,
                next: TargetState { is_up: false, last_alert_at: now },
            }
        );
    }

    #[test]
    fn test_reminder_after_cooldown() {
        let previous = TargetState { is_up: false, last_alert_at: t0() };
        let now = t0() + Duration::minutes(31);
        let decision = decide(Some(previous), false, now, &policy());

        assert_eq!(
            decision,
            Decision::Send {
                kind: AlertKind::Reminder,
                next: TargetState { is_up: false, last_alert_at: now },
            }
        );
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let previous = TargetState { is_up: false, last_alert_at: t0() };
        let decision = decide(Some(previous), false, t0() + Duration::minutes(30), &policy());
        assert!(!decision.should_send());
    }

    #[test]
    fn test_reminders_disabled() {
        let policy = AlertPolicy { reminders: false, ..policy() };
        let previous = TargetState { is_up: false, last_alert_at: t0() };

        let decision = decide(Some(previous), false, t0() + Duration::days(2), &policy);
        assert!(!decision.should_send());
        assert_eq!(decision.next_state(), previous);

        let decision = decide(Some(previous), true, t0() + Duration::seconds(5), &policy);
        assert!(decision.should_send());
    }

    #[test]
    fn test_policy_from_std_duration() {
        let policy = AlertPolicy::new(std::time::Duration::from_secs(90), false);
        assert_eq!(policy.cooldown, Duration::seconds(90));
        assert!(!policy.reminders);
    }
}
