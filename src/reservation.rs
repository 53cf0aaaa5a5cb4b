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

//! Reservation state machine.
//!
//! A [`Reservation`] is the authoritative record of one loan:
//!
//  Active (returned = false) ──return / forced purchase──► Returned (terminal)
//!
//! While active, the late fee accrues monotonically and is capped at the
//! retail price snapshotted when the loan was created. Once returned, the
//! fee is frozen at the value computed at return time. Records are never
//! deleted; the closed ones are the audit trail.

use crate::base::{BookId, ReservationId, UserId};
use crate::error::LendingError;
use crate::policy::{self, LoanPolicy};
use crate::user::RESERVATION_FEE;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct ReservationData {
    reserved_at: SystemTime,
    due_date: SystemTime,
    returned: bool,
    returned_at: Option<SystemTime>,
    fee: Decimal,
    late_fee: Decimal,
    reminder_sent: bool,
    late_reminder_sent: bool,
    last_reminder_sent_at: Option<SystemTime>,
    last_late_fee_update: Option<SystemTime>,
    /// Price of the book when the loan was created; the purchase-conversion
    /// cap stays fixed even if the catalogue price changes later.
    book_retail_price: Decimal,
}

impl ReservationData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.late_fee <= self.book_retail_price,
            "Invariant violated: late fee ({}) exceeds retail price snapshot ({})",
            self.late_fee,
            self.book_retail_price
        );
    }
}

/// A single loan linking one user to one book copy for a bounded period.
#[derive(Debug)]
pub struct Reservation {
    id: ReservationId,
    user_id: UserId,
    book_id: BookId,
    inner: Mutex<ReservationData>,
}

impl Reservation {
    /// Opens a loan due one loan period after `now`, with the reservation
    /// fee charged and a zero late fee.
    pub fn new(
        id: ReservationId,
        user_id: UserId,
        book_id: BookId,
        now: SystemTime,
        policy: &LoanPolicy,
        book_retail_price: Decimal,
    ) -> Self {
        Self {
            id,
            user_id,
            book_id,
            inner: Mutex::new(ReservationData {
                reserved_at: now,
                due_date: now + policy.loan_period,
                returned: false,
                returned_at: None,
                fee: RESERVATION_FEE,
                late_fee: Decimal::ZERO,
                reminder_sent: false,
                late_reminder_sent: false,
                last_reminder_sent_at: None,
                last_late_fee_update: None,
                book_retail_price,
            }),
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn reserved_at(&self) -> SystemTime {
        self.inner.lock().reserved_at
    }

    pub fn due_date(&self) -> SystemTime {
        self.inner.lock().due_date
    }

    pub fn is_returned(&self) -> bool {
        self.inner.lock().returned
    }

    pub fn returned_at(&self) -> Option<SystemTime> {
        self.inner.lock().returned_at
    }

    pub fn fee(&self) -> Decimal {
        self.inner.lock().fee
    }

    pub fn late_fee(&self) -> Decimal {
        self.inner.lock().late_fee
    }

    pub fn reminder_sent(&self) -> bool {
        self.inner.lock().reminder_sent
    }

    pub fn late_reminder_sent(&self) -> bool {
        self.inner.lock().late_reminder_sent
    }

    pub fn last_reminder_sent_at(&self) -> Option<SystemTime> {
        self.inner.lock().last_reminder_sent_at
    }

    pub fn last_late_fee_update(&self) -> Option<SystemTime> {
        self.inner.lock().last_late_fee_update
    }

    pub fn book_retail_price(&self) -> Decimal {
        self.inner.lock().book_retail_price
    }

    /// Late fee this loan would owe if settled at `at`.
    ///
    /// Zero on or before the due date; otherwise started units times the
    /// policy rate, capped at the retail price snapshot. Pure with respect
    /// to the stored fee; use [`update_late_fee`](Self::update_late_fee)
    /// to persist an accrual.
    pub fn late_fee_at(&self, at: SystemTime, policy: &LoanPolicy) -> Decimal {
        let data = self.inner.lock();
        policy::late_fee(data.due_date, at, policy, Some(data.book_retail_price))
    }

    /// True iff not returned and past due.
    pub fn is_late(&self, now: SystemTime) -> bool {
        let data = self.inner.lock();
        !data.returned && now > data.due_date
    }

    /// Whole days past due, regardless of the policy unit.
    ///
    /// Reporting granularity only; fee accrual uses the policy unit.
    pub fn days_late(&self, now: SystemTime) -> u64 {
        let data = self.inner.lock();
        if data.returned {
            return 0;
        }
        policy::days_late(data.due_date, now)
    }

    /// Whether a due reminder is owed: active, not yet reminded, and `now`
    /// inside `[due - reminder_window, due]`.
    pub fn should_send_reminder(&self, now: SystemTime, policy: &LoanPolicy) -> bool {
        let data = self.inner.lock();
        if data.returned || data.reminder_sent {
            return false;
        }
        now >= data.due_date - policy.reminder_window && now <= data.due_date
    }

    /// Whether a first late reminder is owed: active, not yet sent, and
    /// `now` at or past `due + late_reminder_window`.
    pub fn should_send_late_reminder(&self, now: SystemTime, policy: &LoanPolicy) -> bool {
        let data = self.inner.lock();
        if data.returned || data.late_reminder_sent {
            return false;
        }
        now >= data.due_date + policy.late_reminder_window
    }

    /// Whether the sweep may send a late reminder right now: the first
    /// once the late-reminder window has elapsed, repeats once the last
    /// one is older than the policy cooldown.
    pub fn late_reminder_due(&self, now: SystemTime, policy: &LoanPolicy) -> bool {
        let data = self.inner.lock();
        if data.returned {
            return false;
        }
        if !data.late_reminder_sent {
            return now >= data.due_date + policy.late_reminder_window;
        }
        match data.last_reminder_sent_at {
            Some(sent_at) => match now.duration_since(sent_at) {
                Ok(elapsed) => elapsed > policy.reminder_cooldown,
                Err(_) => false,
            },
            None => true,
        }
    }

    /// Recomputes the accrued late fee as of `now` and stores it.
    ///
    /// The stored fee never decreases and never exceeds the retail price
    /// snapshot. Returns the fee now on record. No-op on a returned
    /// reservation, whose fee is frozen.
    pub fn update_late_fee(&self, now: SystemTime, policy: &LoanPolicy) -> Decimal {
        let mut data = self.inner.lock();
        if data.returned {
            return data.late_fee;
        }
        let accrued = policy::late_fee(data.due_date, now, policy, Some(data.book_retail_price));
        data.late_fee = data.late_fee.max(accrued);
        data.last_late_fee_update = Some(now);
        data.assert_invariants();
        data.late_fee
    }

    /// True iff the accrued fee has reached the retail price snapshot, the
    /// point at which the loan converts to a forced purchase.
    pub fn late_fee_at_cap(&self) -> bool {
        let data = self.inner.lock();
        data.late_fee >= data.book_retail_price
    }

    /// Claims the close: flips `returned` so no other caller can close
    /// this loan, leaving the settlement fields for
    /// [`finalize_return`](Self::finalize_return). The check and the flip
    /// happen under one lock, so exactly one caller wins the claim.
    ///
    /// A claimed reservation reads as returned, which keeps it out of the
    /// sweep queries while the caller settles the wallet and shelf.
    ///
    /// # Errors
    ///
    /// [`LendingError::AlreadyReturned`] when the loan is already closed
    /// or claimed; the record is left untouched.
    pub fn claim_return(&self) -> Result<(), LendingError> {
        let mut data = self.inner.lock();
        if data.returned {
            return Err(LendingError::AlreadyReturned);
        }
        data.returned = true;
        Ok(())
    }

    /// Reverses a claim whose follow-up effects failed. The loan is
    /// active again and a later return can retry.
    pub fn release_return(&self) {
        let mut data = self.inner.lock();
        debug_assert!(
            data.returned && data.returned_at.is_none(),
            "release_return on a reservation that was never claimed"
        );
        data.returned = false;
    }

    /// Settles a claimed close. For a regular return the late fee is
    /// recomputed from `now` and frozen; for a forced purchase the
    /// accrued fee on record is preserved. Returns the frozen fee.
    pub fn finalize_return(
        &self,
        now: SystemTime,
        is_purchase: bool,
        policy: &LoanPolicy,
    ) -> Decimal {
        let mut data = self.inner.lock();
        debug_assert!(
            data.returned,
            "finalize_return on a reservation that was never claimed"
        );
        data.returned_at = Some(now);
        if !is_purchase {
            data.late_fee =
                policy::late_fee(data.due_date, now, policy, Some(data.book_retail_price));
        }
        data.assert_invariants();
        data.late_fee
    }

    /// Closes the loan in one step: claim plus settlement.
    ///
    /// # Errors
    ///
    /// [`LendingError::AlreadyReturned`] when the loan is already closed;
    /// the record is left untouched.
    pub fn mark_returned(
        &self,
        now: SystemTime,
        is_purchase: bool,
        policy: &LoanPolicy,
    ) -> Result<Decimal, LendingError> {
        self.claim_return()?;
        Ok(self.finalize_return(now, is_purchase, policy))
    }

    /// Records that the due reminder went out.
    pub fn mark_reminder_sent(&self, now: SystemTime) {
        let mut data = self.inner.lock();
        data.reminder_sent = true;
        data.last_reminder_sent_at = Some(now);
    }

    /// Records that a late reminder went out.
    pub fn mark_late_reminder_sent(&self, now: SystemTime) {
        let mut data = self.inner.lock();
        data.late_reminder_sent = true;
        data.last_reminder_sent_at = Some(now);
    }
}
