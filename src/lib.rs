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

//! # Lending Library
//!
//! This library tracks book loans for a small lending library: loan
//! reservations with a fixed fee, due dates, late-fee accrual, and the
//! conversion of an unreturned book into a forced purchase once its late
//! fees reach the retail price.
//!
//! ## Core Components
//!
//! - [`LendingEngine`]: coordinates users, books, and reservations
//! - [`Reservation`]: the loan state machine (active until returned)
//! - [`Reconciler`]: periodic sweep sending reminders, accruing fees, and
//!   converting maxed-out loans into purchases
//! - [`LoanPolicy`]: injected time-unit policy (days in production,
//!   minutes in accelerated demo mode)
//!
//! ## Example
//!
//! ```
//! use lending_library_rs::{LendingEngine, LoanPolicy, SystemClock, BookDetails};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let engine = LendingEngine::new(LoanPolicy::production(), Arc::new(SystemClock));
//!
//! let user = engine.register_user("John Doe", "john.doe@example.com", dec!(50.0)).unwrap();
//! let book = engine.add_book(BookDetails {
//!     isbn: "9780441013593".into(),
//!     title: "Dune".into(),
//!     author: "Frank Herbert".into(),
//!     publication_year: 1965,
//!     publisher: "Chilton Books".into(),
//!     retail_price: dec!(9.99),
//! }, 4).unwrap();
//!
//! let reservation = engine.create_reservation(user.id(), book.id()).unwrap();
//! assert_eq!(user.wallet_balance(), dec!(47.0));
//!
//! engine.return_reservation(reservation.id(), false).unwrap();
//! assert_eq!(book.available_copies(), 4);
//! ```
//!
//! ## Thread Safety
//!
//! Stores are concurrent maps and every record guards its own state, so
//! independent loans proceed in parallel; copy counts and wallet balances
//! are only changed by check-and-update under the record's own lock.

pub mod base;
pub mod book;
pub mod clock;
pub mod engine;
pub mod error;
pub mod import;
pub mod notify;
pub mod policy;
pub mod reservation;
pub mod store;
pub mod sweep;
pub mod user;

pub use base::{BookId, ReservationId, UserId};
pub use book::{Book, BookDetails, DEFAULT_TOTAL_COPIES};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::LendingEngine;
pub use error::LendingError;
pub use import::import_books;
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use policy::{LoanPolicy, PolicyError};
pub use reservation::Reservation;
pub use store::{BookSearch, BookStore, ReservationStore, UserStore};
pub use sweep::{Reconciler, SweepReport};
pub use user::{BorrowedBook, MAX_ACTIVE_LOANS, RESERVATION_FEE, User};
