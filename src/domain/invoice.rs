use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "invoice_category", rename_all = "snake_case")]
pub enum InvoiceCategory {
    Rent,
    Deposit,
    Maintenance,
    UtilityBill,
    Levy,
    RatesAndTaxes,
    ServiceCharge,
    WaterElectricity,
    Other,
}

impl InvoiceCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "rent" => Some(Self::Rent),
            "deposit" => Some(Self::Deposit),
            "maintenance" => Some(Self::Maintenance),
            "utility_bill" => Some(Self::UtilityBill),
            "levy" => Some(Self::Levy),
            "rates_and_taxes" => Some(Self::RatesAndTaxes),
            "service_charge" => Some(Self::ServiceCharge),
            "water_electricity" => Some(Self::WaterElectricity),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Effective invoice status for a given day.
///
/// A recorded payment is terminal; there is no reversal path. Until then the
/// status is purely a function of the due date and the clock.
pub fn resolve_invoice_status(
    due_date: NaiveDate,
    payment_recorded: bool,
    today: NaiveDate,
) -> InvoiceStatus {
    if payment_recorded {
        return InvoiceStatus::Paid;
    }
    if today > due_date {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

/// A calendar month a recurring rent invoice is generated for.
/// Stored and displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year = year.parse::<i32>().ok()?;
        let month = month.parse::<u32>().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Due date within this cycle: the lease's billing day, clamped into the
    /// month (a lease starting on the 31st falls due on Feb 28/29).
    pub fn due_date(self, billing_day: u32) -> NaiveDate {
        let last = last_day_of_month(self.year, self.month);
        let day = billing_day.clamp(1, last);
        NaiveDate::from_ymd_opt(self.year, self.month, day)
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid month"))
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|date| date.pred_opt())
        .map(|date| date.day())
        .unwrap_or(28)
}

/// Cycles the monthly generator still owes a lease: every month from the
/// later of (lease start, month after the last generated cycle) up to and
/// including the current cycle. Earlier gaps are intentionally not
/// backfilled once a later cycle exists.
pub fn plan_billing_periods(
    starts_on: NaiveDate,
    last_generated: Option<BillingPeriod>,
    today: NaiveDate,
) -> Vec<BillingPeriod> {
    if starts_on > today {
        return Vec::new();
    }
    let current = BillingPeriod::from_date(today);
    let mut cursor = match last_generated {
        Some(period) => period.next(),
        None => BillingPeriod::from_date(starts_on),
    };
    let mut periods = Vec::new();
    while cursor <= current {
        periods.push(cursor);
        cursor = cursor.next();
    }
    periods
}

#[cfg(test)]
mod tests {
    use super::{
        plan_billing_periods, resolve_invoice_status, BillingPeriod, InvoiceStatus,
    };
    use chrono::NaiveDate;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn period(year: i32, month: u32) -> BillingPeriod {
        BillingPeriod { year, month }
    }

    #[test]
    fn pending_until_due_then_overdue() {
        let due = date(2026, 8, 10);
        assert_eq!(
            resolve_invoice_status(due, false, date(2026, 8, 9)),
            InvoiceStatus::Pending
        );
        assert_eq!(
            resolve_invoice_status(due, false, due),
            InvoiceStatus::Pending
        );
        assert_eq!(
            resolve_invoice_status(due, false, date(2026, 8, 11)),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn payment_is_terminal_regardless_of_clock() {
        let due = date(2026, 8, 10);
        assert_eq!(
            resolve_invoice_status(due, true, date(2026, 1, 1)),
            InvoiceStatus::Paid
        );
        assert_eq!(
            resolve_invoice_status(due, true, date(2030, 1, 1)),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn period_display_and_parse_round_trip() {
        let parsed = BillingPeriod::parse("2026-08").expect("parses");
        assert_eq!(parsed, period(2026, 8));
        assert_eq!(parsed.to_string(), "2026-08");
        assert!(BillingPeriod::parse("2026-13").is_none());
        assert!(BillingPeriod::parse("garbage").is_none());
    }

    #[test]
    fn period_advances_across_year_boundary() {
        assert_eq!(period(2026, 12).next(), period(2027, 1));
        assert_eq!(period(2026, 8).next(), period(2026, 9));
    }

    #[test]
    fn due_date_clamps_to_month_length() {
        assert_eq!(period(2026, 2).due_date(31), date(2026, 2, 28));
        assert_eq!(period(2028, 2).due_date(31), date(2028, 2, 29));
        assert_eq!(period(2026, 8).due_date(15), date(2026, 8, 15));
        assert_eq!(period(2026, 4).due_date(0), date(2026, 4, 1));
    }

    #[test]
    fn plans_every_cycle_from_lease_start() {
        let periods = plan_billing_periods(date(2026, 5, 20), None, date(2026, 8, 4));
        assert_eq!(
            periods,
            vec![
                period(2026, 5),
                period(2026, 6),
                period(2026, 7),
                period(2026, 8)
            ]
        );
    }

    #[test]
    fn plans_only_cycles_after_the_last_generated_one() {
        let periods =
            plan_billing_periods(date(2026, 1, 1), Some(period(2026, 6)), date(2026, 8, 4));
        assert_eq!(periods, vec![period(2026, 7), period(2026, 8)]);
    }

    #[test]
    fn regeneration_for_a_covered_month_plans_nothing() {
        let periods =
            plan_billing_periods(date(2026, 1, 1), Some(period(2026, 8)), date(2026, 8, 4));
        assert!(periods.is_empty());
    }

    #[test]
    fn future_leases_plan_nothing() {
        let periods = plan_billing_periods(date(2026, 9, 1), None, date(2026, 8, 4));
        assert!(periods.is_empty());
    }
}
