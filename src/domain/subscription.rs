use chrono::{DateTime, Utc};
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 86_400;

/// Display state derived from the Paystack subscription replica on the
/// landlord row. Never persisted: the provider object is the source of
/// truth and this is re-derived on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionState {
    Active,
    NonRenewing,
    Attention,
    Cancelled,
    Completed,
    TrialActive { days_left: i64 },
    TrialExpired,
}

impl SubscriptionState {
    /// The gating contract: these states unlock the product, everything
    /// else lands on the paywall.
    pub fn grants_access(self) -> bool {
        matches!(
            self,
            Self::Active | Self::NonRenewing | Self::TrialActive { .. }
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::NonRenewing => "NON_RENEWING",
            Self::Attention => "ATTENTION",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::TrialActive { .. } => "TRIAL_ACTIVE",
            Self::TrialExpired => "TRIAL_EXPIRED",
        }
    }

    pub fn days_left_in_trial(self) -> Option<i64> {
        match self {
            Self::TrialActive { days_left } => Some(days_left),
            _ => None,
        }
    }
}

/// Derive the landlord-facing subscription state.
///
/// Without a provider subscription the trial window decides. With one, the
/// provider's status string decides, and `attention` outranks everything:
/// a payment problem must surface even when a next payment date is set.
/// Unrecognized statuses fail closed: blocking is recoverable, accidentally
/// granting access is not.
pub fn derive_subscription_state(
    subscription_code: Option<&str>,
    provider_status: Option<&str>,
    trial_ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubscriptionState {
    let code = subscription_code.map(str::trim).filter(|c| !c.is_empty());
    if code.is_none() {
        return match trial_ends_at {
            Some(expiry) if now < expiry => SubscriptionState::TrialActive {
                days_left: days_left_in_trial(expiry, now),
            },
            _ => SubscriptionState::TrialExpired,
        };
    }

    match provider_status.map(str::trim).unwrap_or_default() {
        "attention" => SubscriptionState::Attention,
        "active" => SubscriptionState::Active,
        "non-renewing" => SubscriptionState::NonRenewing,
        "cancelled" => SubscriptionState::Cancelled,
        "completed" => SubscriptionState::Completed,
        other => {
            tracing::warn!(
                status = other,
                "Unrecognized provider subscription status, treating as attention"
            );
            SubscriptionState::Attention
        }
    }
}

fn days_left_in_trial(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expiry - now).num_seconds().max(0);
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::{derive_subscription_state, SubscriptionState};
    use chrono::{DateTime, Duration, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-04T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn trial_boundary() {
        let reference = now();
        let state =
            derive_subscription_state(None, None, Some(reference + Duration::days(3)), reference);
        assert_eq!(state, SubscriptionState::TrialActive { days_left: 3 });

        let expiry = reference - Duration::seconds(1);
        let state = derive_subscription_state(None, None, Some(expiry), reference);
        assert_eq!(state, SubscriptionState::TrialExpired);
    }

    #[test]
    fn partial_trial_days_round_up() {
        let reference = now();
        let state = derive_subscription_state(
            None,
            None,
            Some(reference + Duration::hours(25)),
            reference,
        );
        assert_eq!(state, SubscriptionState::TrialActive { days_left: 2 });
    }

    #[test]
    fn missing_trial_window_is_expired() {
        let state = derive_subscription_state(None, None, None, now());
        assert_eq!(state, SubscriptionState::TrialExpired);
    }

    #[test]
    fn blank_subscription_code_counts_as_none() {
        let state = derive_subscription_state(Some("  "), Some("active"), None, now());
        assert_eq!(state, SubscriptionState::TrialExpired);
    }

    #[test]
    fn provider_statuses_map_directly() {
        for (raw, expected) in [
            ("active", SubscriptionState::Active),
            ("non-renewing", SubscriptionState::NonRenewing),
            ("cancelled", SubscriptionState::Cancelled),
            ("completed", SubscriptionState::Completed),
        ] {
            let state = derive_subscription_state(Some("SUB_x1"), Some(raw), None, now());
            assert_eq!(state, expected, "status {raw}");
        }
    }

    #[test]
    fn attention_outranks_everything_else() {
        // A next payment date and a live trial window do not matter once the
        // provider reports attention.
        let state = derive_subscription_state(
            Some("SUB_x1"),
            Some("attention"),
            Some(now() + Duration::days(10)),
            now(),
        );
        assert_eq!(state, SubscriptionState::Attention);
        assert!(!state.grants_access());
    }

    #[test]
    fn unknown_status_fails_closed() {
        let state = derive_subscription_state(Some("SUB_x1"), Some("paused"), None, now());
        assert!(!state.grants_access());

        let state = derive_subscription_state(Some("SUB_x1"), None, None, now());
        assert!(!state.grants_access());
    }

    #[test]
    fn gating_contract_is_exhaustive() {
        let states = [
            SubscriptionState::Active,
            SubscriptionState::NonRenewing,
            SubscriptionState::Attention,
            SubscriptionState::Cancelled,
            SubscriptionState::Completed,
            SubscriptionState::TrialActive { days_left: 5 },
            SubscriptionState::TrialExpired,
        ];
        for state in states {
            let expected = matches!(
                state,
                SubscriptionState::Active
                    | SubscriptionState::NonRenewing
                    | SubscriptionState::TrialActive { .. }
            );
            assert_eq!(state.grants_access(), expected, "state {}", state.as_str());
        }
    }
}
