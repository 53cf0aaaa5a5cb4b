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

//! User wallet and loan ledger.
//!
//! A [`User`] holds a wallet balance and the ordered history of borrowed
//! books. Ledger entries are appended on loan and flagged returned on
//! return, never removed. Eligibility rules: enough balance for the
//! reservation fee, fewer than three active loans, and no second active
//! loan for the same title.

use crate::base::{BookId, UserId};
use crate::error::LendingError;
use crate::policy::{self, LoanPolicy};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::SystemTime;

/// Fixed fee charged once per reservation.
pub const RESERVATION_FEE: Decimal = dec!(3.0);

/// Maximum number of concurrently unreturned loans per user.
pub const MAX_ACTIVE_LOANS: usize = 3;

/// One row of a user's loan ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowedBook {
    pub book_id: BookId,
    pub borrowed_at: SystemTime,
    pub due_date: SystemTime,
    pub returned: bool,
    pub returned_at: Option<SystemTime>,
}

#[derive(Debug)]
struct UserData {
    name: String,
    email: String,
    wallet_balance: Decimal,
    borrowed_books: Vec<BorrowedBook>,
}

impl UserData {
    fn active_loan_count(&self) -> usize {
        self.borrowed_books.iter().filter(|b| !b.returned).count()
    }

    fn has_active_loan_for(&self, book_id: BookId) -> bool {
        self.borrowed_books
            .iter()
            .any(|b| !b.returned && b.book_id == book_id)
    }

    fn push_loan(&mut self, book_id: BookId, now: SystemTime, policy: &LoanPolicy) {
        self.borrowed_books.push(BorrowedBook {
            book_id,
            borrowed_at: now,
            due_date: now + policy.loan_period,
            returned: false,
            returned_at: None,
        });
    }
}

/// A library member.
#[derive(Debug)]
pub struct User {
    id: UserId,
    inner: Mutex<UserData>,
}

impl User {
    pub fn new(id: UserId, name: String, email: String, wallet_balance: Decimal) -> Self {
        Self {
            id,
            inner: Mutex::new(UserData {
                name,
                email,
                wallet_balance,
                borrowed_books: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    pub fn email(&self) -> String {
        self.inner.lock().email.clone()
    }

    pub fn wallet_balance(&self) -> Decimal {
        self.inner.lock().wallet_balance
    }

    /// Snapshot of the full loan ledger, oldest entry first.
    pub fn borrowed_books(&self) -> Vec<BorrowedBook> {
        self.inner.lock().borrowed_books.clone()
    }

    /// Number of unreturned ledger entries.
    pub fn active_loan_count(&self) -> usize {
        self.inner.lock().active_loan_count()
    }

    /// True iff the user currently holds an unreturned loan for this title.
    pub fn has_active_loan_for(&self, book_id: BookId) -> bool {
        self.inner.lock().has_active_loan_for(book_id)
    }

    /// Whether the user may take out a loan for this title.
    ///
    /// Three independently necessary conditions: balance covers the
    /// reservation fee, fewer than [`MAX_ACTIVE_LOANS`] active loans, and
    /// the title is not already actively borrowed. Failing any returns
    /// `false`; it is not an error, the caller decides how to surface it.
    pub fn can_borrow(&self, book_id: BookId) -> bool {
        let data = self.inner.lock();
        if data.wallet_balance < RESERVATION_FEE {
            return false;
        }
        if data.active_loan_count() >= MAX_ACTIVE_LOANS {
            return false;
        }
        if data.has_active_loan_for(book_id) {
            return false;
        }
        true
    }

    /// Charges the reservation fee and appends an active ledger entry.
    ///
    /// Does not re-check eligibility; the balance may go negative if the
    /// caller skipped [`can_borrow`](Self::can_borrow). The engine's
    /// create path uses the guarded [`deduct_from_wallet`] +
    /// [`record_loan`] steps instead so the deduction can be compensated.
    ///
    /// [`deduct_from_wallet`]: Self::deduct_from_wallet
    /// [`record_loan`]: Self::record_loan
    pub fn borrow_book(&self, book_id: BookId, now: SystemTime, policy: &LoanPolicy) {
        let mut data = self.inner.lock();
        data.wallet_balance -= RESERVATION_FEE;
        data.push_loan(book_id, now, policy);
    }

    /// Appends an active ledger entry without touching the wallet.
    pub fn record_loan(&self, book_id: BookId, now: SystemTime, policy: &LoanPolicy) {
        self.inner.lock().push_loan(book_id, now, policy);
    }

    /// Marks the first active ledger entry for `book_id` as returned.
    ///
    /// Returns the late fee owed for that entry, computed with the shared
    /// policy formula (uncapped; the reservation applies the retail-price
    /// cap).
    ///
    /// # Errors
    ///
    /// [`LendingError::NoActiveLoan`] when no unreturned entry references
    /// the title.
    pub fn return_book(
        &self,
        book_id: BookId,
        now: SystemTime,
        policy: &LoanPolicy,
    ) -> Result<Decimal, LendingError> {
        let mut data = self.inner.lock();
        let entry = data
            .borrowed_books
            .iter_mut()
            .find(|b| !b.returned && b.book_id == book_id)
            .ok_or(LendingError::NoActiveLoan)?;

        entry.returned = true;
        entry.returned_at = Some(now);
        Ok(policy::late_fee(entry.due_date, now, policy, None))
    }

    /// Removes funds, refusing to go below zero.
    ///
    /// # Errors
    ///
    /// [`LendingError::InsufficientBalance`] when the balance does not
    /// cover `amount`. The check and the decrement happen under one lock.
    pub fn deduct_from_wallet(&self, amount: Decimal) -> Result<(), LendingError> {
        let mut data = self.inner.lock();
        if data.wallet_balance < amount {
            return Err(LendingError::InsufficientBalance);
        }
        data.wallet_balance -= amount;
        Ok(())
    }

    /// Adds funds unconditionally.
    pub fn add_to_wallet(&self, amount: Decimal) {
        self.inner.lock().wallet_balance += amount;
    }

    /// Removes funds unconditionally; the balance may go negative.
    ///
    /// Settlement path for forced purchases, where the debt stands even
    /// when the wallet cannot cover it. Everything else goes through the
    /// guarded [`deduct_from_wallet`](Self::deduct_from_wallet).
    pub fn charge(&self, amount: Decimal) {
        self.inner.lock().wallet_balance -= amount;
    }
}
