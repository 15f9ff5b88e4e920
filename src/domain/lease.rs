use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Days before a fixed-term lease ends during which the dashboard flags it
/// for renewal attention.
pub const EXPIRY_WARNING_DAYS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "lease_type", rename_all = "snake_case")]
pub enum LeaseType {
    FixedTerm,
    Monthly,
}

impl LeaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FixedTerm => "fixed_term",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "lease_status", rename_all = "snake_case")]
pub enum LeaseStatus {
    Pending,
    Active,
    Expired,
    Terminated,
}

impl LeaseStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }
}

/// Effective lease status for a given day.
///
/// Termination is an explicit landlord action and is terminal: once stored,
/// it is never recomputed away. Everything else is derived from the lease's
/// temporal fields, so the stored status can only ever be a cache.
/// Monthly leases have no end-of-term and never expire by date.
pub fn resolve_lease_status(
    stored: LeaseStatus,
    lease_type: LeaseType,
    starts_on: NaiveDate,
    ends_on: Option<NaiveDate>,
    today: NaiveDate,
) -> LeaseStatus {
    if stored == LeaseStatus::Terminated {
        return LeaseStatus::Terminated;
    }
    if starts_on > today {
        return LeaseStatus::Pending;
    }
    if lease_type == LeaseType::FixedTerm {
        if let Some(ends) = ends_on {
            if ends < today {
                return LeaseStatus::Expired;
            }
        }
    }
    LeaseStatus::Active
}

pub fn days_until_end(ends_on: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    ends_on.map(|ends| (ends - today).num_days())
}

/// True when the lease ends within the warning window but has not ended yet.
pub fn is_expiring_soon(ends_on: Option<NaiveDate>, today: NaiveDate) -> bool {
    matches!(
        days_until_end(ends_on, today),
        Some(days) if days > 0 && days <= EXPIRY_WARNING_DAYS
    )
}

#[cfg(test)]
mod tests {
    use super::{
        is_expiring_soon, resolve_lease_status, LeaseStatus, LeaseType, EXPIRY_WARNING_DAYS,
    };
    use chrono::NaiveDate;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn resolution_is_deterministic() {
        let starts = date(2026, 1, 1);
        let ends = Some(date(2026, 12, 31));
        let today = date(2026, 6, 15);
        let first = resolve_lease_status(
            LeaseStatus::Pending,
            LeaseType::FixedTerm,
            starts,
            ends,
            today,
        );
        let second = resolve_lease_status(
            LeaseStatus::Pending,
            LeaseType::FixedTerm,
            starts,
            ends,
            today,
        );
        assert_eq!(first, second);
        assert_eq!(first, LeaseStatus::Active);
    }

    #[test]
    fn fixed_term_expires_strictly_after_end_date() {
        let starts = date(2026, 1, 1);
        let ends = date(2026, 6, 30);
        for (today, expected) in [
            (date(2026, 6, 29), LeaseStatus::Active),
            (date(2026, 6, 30), LeaseStatus::Active),
            (date(2026, 7, 1), LeaseStatus::Expired),
        ] {
            assert_eq!(
                resolve_lease_status(
                    LeaseStatus::Active,
                    LeaseType::FixedTerm,
                    starts,
                    Some(ends),
                    today,
                ),
                expected,
                "today = {today}"
            );
        }
    }

    #[test]
    fn monthly_leases_never_expire_by_date() {
        let starts = date(2020, 1, 1);
        let status = resolve_lease_status(
            LeaseStatus::Active,
            LeaseType::Monthly,
            starts,
            Some(date(2020, 12, 31)),
            date(2030, 1, 1),
        );
        assert_eq!(status, LeaseStatus::Active);
    }

    #[test]
    fn termination_is_terminal() {
        let status = resolve_lease_status(
            LeaseStatus::Terminated,
            LeaseType::Monthly,
            date(2026, 1, 1),
            None,
            date(2026, 2, 1),
        );
        assert_eq!(status, LeaseStatus::Terminated);
    }

    #[test]
    fn pending_before_start_date() {
        let status = resolve_lease_status(
            LeaseStatus::Pending,
            LeaseType::Monthly,
            date(2026, 9, 1),
            None,
            date(2026, 8, 4),
        );
        assert_eq!(status, LeaseStatus::Pending);
    }

    #[test]
    fn expiry_warning_window_bounds() {
        let today = date(2026, 8, 4);
        assert!(!is_expiring_soon(None, today));
        assert!(!is_expiring_soon(Some(today), today));
        assert!(is_expiring_soon(Some(date(2026, 8, 5)), today));
        assert!(is_expiring_soon(
            Some(today + chrono::Duration::days(EXPIRY_WARNING_DAYS)),
            today
        ));
        assert!(!is_expiring_soon(
            Some(today + chrono::Duration::days(EXPIRY_WARNING_DAYS + 1)),
            today
        ));
        assert!(!is_expiring_soon(Some(date(2026, 8, 1)), today));
    }
}
