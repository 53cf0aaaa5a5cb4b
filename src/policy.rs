// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Loan policy and fee arithmetic.
//!
//! All due-date and fee math flows through one [`LoanPolicy`] value chosen
//! at process start. Production charges by the day; the accelerated policy
//! compresses the same ratios to minutes so demos play out in real time.
//! Every component receives the policy at construction; nothing reads the
//! environment inside business logic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::{Duration, SystemTime};
use thiserror::Error;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

/// A late-reminder window larger than this many fee units almost certainly
/// means a day-scale threshold leaked into a minute-scale policy.
const MAX_LATE_WINDOW_UNITS: u64 = 1000;

/// Time-unit policy for loans, reminders, and late fees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanPolicy {
    /// Granularity of late-fee accrual (a day in production).
    pub unit: Duration,
    /// How long a loan runs before it is due.
    pub loan_period: Duration,
    /// Span before the due date during which a due reminder is eligible.
    pub reminder_window: Duration,
    /// Span after the due date after which a late reminder becomes eligible.
    pub late_reminder_window: Duration,
    /// Fee charged per started unit past the due date.
    pub late_fee_rate_per_unit: Decimal,
    /// Minimum gap between repeated late reminders for one reservation.
    pub reminder_cooldown: Duration,
    /// Cadence of the reconciliation sweep.
    pub sweep_interval: Duration,
}

/// Policy validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("fee unit must be non-zero")]
    ZeroUnit,

    #[error("loan period must be non-zero")]
    ZeroLoanPeriod,

    #[error("late fee rate must be positive")]
    NonPositiveRate,

    #[error("{0} is not a whole multiple of the fee unit")]
    MisalignedWindow(&'static str),

    /// A day-scale cutoff inside a minute-granularity policy would push
    /// the first late reminder out by thousands of fee units; such a
    /// policy is refused rather than run silently.
    #[error("late reminder window spans {0} fee units (limit {MAX_LATE_WINDOW_UNITS})")]
    OversizedLateWindow(u64),

    #[error("reminder window exceeds the loan period")]
    ReminderWindowTooLarge,
}

impl LoanPolicy {
    /// Day-granularity policy: 14-day loans, 0.20 per day late.
    pub fn production() -> Self {
        Self {
            unit: DAY,
            loan_period: 14 * DAY,
            reminder_window: 2 * DAY,
            late_reminder_window: 7 * DAY,
            late_fee_rate_per_unit: dec!(0.2),
            reminder_cooldown: DAY,
            sweep_interval: DAY,
        }
    }

    /// Minute-granularity policy for demos and fast development loops.
    ///
    /// Same ratios as production with the day replaced by the minute; the
    /// fee rate is 0.20 per day converted to a per-minute rate.
    pub fn accelerated() -> Self {
        Self {
            unit: MINUTE,
            loan_period: 2 * MINUTE,
            reminder_window: 2 * MINUTE,
            late_reminder_window: 7 * MINUTE,
            late_fee_rate_per_unit: dec!(0.2) / dec!(1440),
            reminder_cooldown: 2 * MINUTE,
            sweep_interval: MINUTE,
        }
    }

    /// Checks the policy for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] for zero units or periods, non-positive
    /// rates, windows that do not align with the fee unit, or a
    /// late-reminder window so large it must belong to a different unit.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.unit.is_zero() {
            return Err(PolicyError::ZeroUnit);
        }
        if self.loan_period.is_zero() {
            return Err(PolicyError::ZeroLoanPeriod);
        }
        if self.late_fee_rate_per_unit <= Decimal::ZERO {
            return Err(PolicyError::NonPositiveRate);
        }
        for (name, window) in [
            ("loan period", self.loan_period),
            ("reminder window", self.reminder_window),
            ("late reminder window", self.late_reminder_window),
            ("reminder cooldown", self.reminder_cooldown),
        ] {
            if !is_whole_multiple(window, self.unit) {
                return Err(PolicyError::MisalignedWindow(name));
            }
        }
        let late_units = self.late_reminder_window.as_secs() / self.unit.as_secs();
        if late_units > MAX_LATE_WINDOW_UNITS {
            return Err(PolicyError::OversizedLateWindow(late_units));
        }
        if self.reminder_window > self.loan_period {
            return Err(PolicyError::ReminderWindowTooLarge);
        }
        Ok(())
    }
}

fn is_whole_multiple(d: Duration, unit: Duration) -> bool {
    d.subsec_nanos() == 0 && d.as_secs() % unit.as_secs() == 0
}

/// Number of started fee units between the due date and `at`.
///
/// Zero when `at` is on or before the due date. Any fraction of a unit
/// counts as a whole unit (a book one second late is one unit late).
pub fn units_late(due_date: SystemTime, at: SystemTime, unit: Duration) -> u64 {
    let late = match at.duration_since(due_date) {
        Ok(elapsed) => elapsed,
        Err(_) => return 0,
    };
    if late.is_zero() {
        return 0;
    }
    let secs = late.as_secs() + u64::from(late.subsec_nanos() > 0);
    secs.div_ceil(unit.as_secs().max(1))
}

/// Late fee for a loan due at `due_date`, evaluated at `at`.
///
/// This is the single fee formula shared by the return path and the
/// reconciliation sweep: started units past due times the policy rate,
/// clamped to `cap` when one is given (the book's retail price).
pub fn late_fee(
    due_date: SystemTime,
    at: SystemTime,
    policy: &LoanPolicy,
    cap: Option<Decimal>,
) -> Decimal {
    let units = units_late(due_date, at, policy.unit);
    let fee = Decimal::from(units) * policy.late_fee_rate_per_unit;
    match cap {
        Some(cap) => fee.min(cap),
        None => fee,
    }
}

/// Whole days late, regardless of the policy unit.
///
/// Reporting always speaks in days even when fees accrue per minute.
pub fn days_late(due_date: SystemTime, at: SystemTime) -> u64 {
    units_late(due_date, at, DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn production_policy_is_valid() {
        LoanPolicy::production().validate().unwrap();
    }

    #[test]
    fn accelerated_policy_is_valid() {
        LoanPolicy::accelerated().validate().unwrap();
    }

    #[test]
    fn uncompressed_late_window_is_rejected() {
        // 7 days inside a minute-granularity policy.
        let policy = LoanPolicy {
            late_reminder_window: 7 * DAY,
            ..LoanPolicy::accelerated()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::OversizedLateWindow(7 * 24 * 60))
        );
    }

    #[test]
    fn misaligned_window_is_rejected() {
        let policy = LoanPolicy {
            reminder_window: Duration::from_secs(90),
            ..LoanPolicy::accelerated()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::MisalignedWindow("reminder window"))
        );
    }

    #[test]
    fn zero_rate_is_rejected() {
        let policy = LoanPolicy {
            late_fee_rate_per_unit: Decimal::ZERO,
            ..LoanPolicy::production()
        };
        assert_eq!(policy.validate(), Err(PolicyError::NonPositiveRate));
    }

    #[test]
    fn on_time_is_zero_units_late() {
        let due = at(1000);
        assert_eq!(units_late(due, at(1000), MINUTE), 0);
        assert_eq!(units_late(due, at(500), MINUTE), 0);
    }

    #[test]
    fn partial_unit_rounds_up() {
        let due = at(1000);
        assert_eq!(units_late(due, at(1001), MINUTE), 1);
        assert_eq!(units_late(due, at(1060), MINUTE), 1);
        assert_eq!(units_late(due, at(1061), MINUTE), 2);
    }

    #[test]
    fn five_days_late_costs_one_unit_of_currency() {
        let policy = LoanPolicy::production();
        let due = at(0);
        let returned = due + 5 * DAY;
        assert_eq!(late_fee(due, returned, &policy, None), dec!(1.0));
    }

    #[test]
    fn fee_is_capped_at_retail_price() {
        let policy = LoanPolicy::production();
        let due = at(0);
        let much_later = due + 400 * DAY; // uncapped fee would be 80.0
        assert_eq!(
            late_fee(due, much_later, &policy, Some(dec!(10.0))),
            dec!(10.0)
        );
    }

    #[test]
    fn fee_is_monotone_until_the_cap() {
        let policy = LoanPolicy::production();
        let due = at(0);
        let mut previous = Decimal::ZERO;
        for days in 1u32..100 {
            let fee = late_fee(due, due + days * DAY, &policy, Some(dec!(10.0)));
            assert!(fee >= previous);
            assert!(fee <= dec!(10.0));
            previous = fee;
        }
    }

    #[test]
    fn days_late_ignores_the_policy_unit() {
        let due = at(0);
        assert_eq!(days_late(due, due + 5 * DAY), 5);
        assert_eq!(days_late(due, due + Duration::from_secs(1)), 1);
        assert_eq!(days_late(due, due), 0);
    }
}
