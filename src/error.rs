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

//! Error types for lending operations.

use thiserror::Error;

/// Lending operation errors.
///
/// Domain operations fail fast with one of these; callers at the boundary
/// decide how to surface them. Sweep-internal failures for a single
/// reservation are logged and skipped rather than propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    /// Referenced user does not exist
    #[error("user not found")]
    UserNotFound,

    /// Referenced book does not exist
    #[error("book not found")]
    BookNotFound,

    /// Referenced reservation does not exist
    #[error("reservation not found")]
    ReservationNotFound,

    /// No copies left on the shelf
    #[error("book is not available")]
    NotAvailable,

    /// Return would push available copies past the total
    #[error("cannot return more copies than total copies")]
    OverReturn,

    /// Reservation was already closed
    #[error("reservation already returned")]
    AlreadyReturned,

    /// User fails one of the borrowing rules (balance, loan count, duplicate)
    #[error("user cannot borrow this book")]
    Ineligible,

    /// Wallet balance is below the requested deduction
    #[error("insufficient wallet balance")]
    InsufficientBalance,

    /// User has no active loan for the given book
    #[error("no active loan for this book")]
    NoActiveLoan,

    /// Another user already registered this email address
    #[error("email address already registered")]
    DuplicateEmail,

    /// Another book already carries this ISBN
    #[error("ISBN already registered")]
    DuplicateIsbn,

    /// Book still has unreturned loans and cannot be removed
    #[error("book has active loans")]
    HasActiveLoans,

    /// Retail price must be positive
    #[error("invalid retail price (must be positive)")]
    InvalidPrice,
}
