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

//! Lending engine.
//!
//! The [`LendingEngine`] coordinates a loan across its three records: the
//! user's wallet and ledger, the book's copy counts, and the reservation
//! itself. Requests and the reconciliation sweep both drive the same
//! operations.
//!
//! # Invariants
//!
//! - The reservation fee is charged exactly once per loan.
//! - A reservation is closed at most once; the return path claims the
//!   terminal transition before any side effect runs, and releases the
//!   claim if a later step fails.
//! - No transaction spans the three records. Creation is a sequence of
//!   single-record atomic updates with explicit compensation: if a step
//!   fails after the wallet was debited, the debit is refunded and the
//!   copy restored before the error propagates.
//!
//! # Thread Safety
//!
//! Stores use [`DashMap`](dashmap::DashMap) and every record guards its
//! own state, so independent loans proceed in parallel while two
//! concurrent borrows of the last copy cannot both succeed.

use crate::base::{BookId, ReservationId, UserId};
use crate::book::{Book, BookDetails};
use crate::clock::Clock;
use crate::error::LendingError;
use crate::policy::LoanPolicy;
use crate::reservation::Reservation;
use crate::store::{BookStore, ReservationStore, UserStore};
use crate::user::{RESERVATION_FEE, User};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

/// Coordinates users, books, and reservations.
pub struct LendingEngine {
    books: BookStore,
    users: UserStore,
    reservations: ReservationStore,
    policy: LoanPolicy,
    clock: Arc<dyn Clock>,
}

impl LendingEngine {
    /// Creates an engine with empty stores.
    ///
    /// The policy and clock are fixed for the engine's lifetime; nothing
    /// downstream reads the environment or the ambient time.
    pub fn new(policy: LoanPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            books: BookStore::new(),
            users: UserStore::new(),
            reservations: ReservationStore::new(),
            policy,
            clock,
        }
    }

    pub fn books(&self) -> &BookStore {
        &self.books
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn reservations(&self) -> &ReservationStore {
        &self.reservations
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Registers a member with a starting balance.
    pub fn register_user(
        &self,
        name: &str,
        email: &str,
        wallet_balance: Decimal,
    ) -> Result<Arc<User>, LendingError> {
        let user = self
            .users
            .create(name.to_string(), email.to_string(), wallet_balance)?;
        info!(user = %user.id(), email, "user registered");
        Ok(user)
    }

    /// Adds a title to the catalogue.
    pub fn add_book(
        &self,
        details: BookDetails,
        total_copies: u32,
    ) -> Result<Arc<Book>, LendingError> {
        let book = self.books.create(details, total_copies)?;
        info!(book = %book.id(), isbn = %book.isbn(), "book catalogued");
        Ok(book)
    }

    /// Removes a title, refusing while any loan for it is still open.
    pub fn delete_book(&self, book_id: BookId) -> Result<(), LendingError> {
        if self.reservations.has_active_for_book(book_id) {
            return Err(LendingError::HasActiveLoans);
        }
        self.books.delete(book_id)
    }

    /// Credits a member's wallet. Returns the new balance.
    pub fn add_to_wallet(&self, user_id: UserId, amount: Decimal) -> Result<Decimal, LendingError> {
        let user = self.users.get(user_id).ok_or(LendingError::UserNotFound)?;
        user.add_to_wallet(amount);
        Ok(user.wallet_balance())
    }

    /// Debits a member's wallet. Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`LendingError::InsufficientBalance`] when the balance does not
    /// cover the amount.
    pub fn deduct_from_wallet(
        &self,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<Decimal, LendingError> {
        let user = self.users.get(user_id).ok_or(LendingError::UserNotFound)?;
        user.deduct_from_wallet(amount)?;
        Ok(user.wallet_balance())
    }

    /// Creates a loan: charges the reservation fee, takes a copy off the
    /// shelf, appends the ledger entry, and records the reservation with a
    /// snapshot of the retail price.
    ///
    /// # Errors
    ///
    /// - [`LendingError::UserNotFound`] / [`LendingError::BookNotFound`]
    /// - [`LendingError::Ineligible`] - borrowing rules violated
    /// - [`LendingError::NotAvailable`] - no copies left; also raised when
    ///   a concurrent borrow takes the last copy after the eligibility
    ///   check, in which case the fee debit is compensated
    /// - [`LendingError::InsufficientBalance`] - wallet raced below the fee
    pub fn create_reservation(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<Arc<Reservation>, LendingError> {
        let user = self.users.get(user_id).ok_or(LendingError::UserNotFound)?;
        let book = self.books.get(book_id).ok_or(LendingError::BookNotFound)?;

        if !user.can_borrow(book_id) {
            return Err(LendingError::Ineligible);
        }
        if !book.is_available() {
            return Err(LendingError::NotAvailable);
        }

        // Wallet first, then inventory. Each step is a single-record
        // atomic update; a failure after the debit refunds it.
        user.deduct_from_wallet(RESERVATION_FEE)?;

        if let Err(e) = book.borrow() {
            warn!(user = %user_id, book = %book_id, "borrow lost the last copy, refunding fee");
            user.add_to_wallet(RESERVATION_FEE);
            return Err(e);
        }

        let now = self.clock.now();
        user.record_loan(book_id, now, &self.policy);

        let reservation = self.reservations.create(|id| {
            Reservation::new(id, user_id, book_id, now, &self.policy, book.retail_price())
        });

        info!(
            reservation = %reservation.id(),
            user = %user_id,
            book = %book_id,
            fee = %RESERVATION_FEE,
            "reservation created"
        );
        Ok(reservation)
    }

    /// Closes a loan: puts the copy back, settles the late fee (unless the
    /// close is a forced purchase, which preserves the accrued fee), and
    /// marks the user's ledger entry returned.
    ///
    /// The terminal transition is claimed before any side effect runs, so
    /// of two concurrent returns exactly one performs the shelf and wallet
    /// updates; the other fails with [`LendingError::AlreadyReturned`] and
    /// touches nothing. A failure after the claim releases it.
    ///
    /// # Errors
    ///
    /// - [`LendingError::ReservationNotFound`]
    /// - [`LendingError::AlreadyReturned`] - the loser of a double return;
    ///   the failed call leaves all state unchanged
    /// - [`LendingError::BookNotFound`] / [`LendingError::OverReturn`]
    /// - [`LendingError::InsufficientBalance`] - late fee exceeds the
    ///   wallet; the shelf increment and the claim are compensated before
    ///   propagating
    pub fn return_reservation(
        &self,
        id: ReservationId,
        is_purchase: bool,
    ) -> Result<Arc<Reservation>, LendingError> {
        let reservation = self
            .reservations
            .get(id)
            .ok_or(LendingError::ReservationNotFound)?;
        reservation.claim_return()?;

        let Some(book) = self.books.get(reservation.book_id()) else {
            reservation.release_return();
            return Err(LendingError::BookNotFound);
        };
        if let Err(e) = book.return_copy() {
            reservation.release_return();
            return Err(e);
        }

        let now = self.clock.now();
        let user = self.users.get(reservation.user_id());

        if !is_purchase {
            let late_fee = reservation.late_fee_at(now, &self.policy);
            if late_fee > Decimal::ZERO {
                match &user {
                    Some(user) => {
                        if let Err(e) = user.deduct_from_wallet(late_fee) {
                            warn!(
                                reservation = %id,
                                user = %reservation.user_id(),
                                late_fee = %late_fee,
                                "late fee not covered, restoring shelf copy"
                            );
                            if book.borrow().is_err() {
                                warn!(
                                    reservation = %id,
                                    book = %reservation.book_id(),
                                    "restored copy taken by a concurrent borrow"
                                );
                            }
                            reservation.release_return();
                            return Err(e);
                        }
                    }
                    None => {
                        warn!(reservation = %id, "user missing at return, skipping late fee");
                    }
                }
            }
        }

        if let Some(user) = &user {
            if let Err(e) = user.return_book(reservation.book_id(), now, &self.policy) {
                // Ledger already consistent (e.g. force-closed twice in a
                // crash window); the reservation stays authoritative.
                warn!(reservation = %id, reason = %e, "ledger entry missing at return");
            }
        }

        let late_fee = reservation.finalize_return(now, is_purchase, &self.policy);
        info!(
            reservation = %id,
            user = %reservation.user_id(),
            book = %reservation.book_id(),
            late_fee = %late_fee,
            purchase = is_purchase,
            "reservation returned"
        );
        Ok(reservation)
    }
}
