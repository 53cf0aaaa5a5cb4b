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

//! Book inventory.
//!
//! A [`Book`] tracks the copy counts for one title. Borrowing and
//! returning are the only mutations, and each is a check-and-update under
//! the record's own lock, so two concurrent borrows of the last copy can
//! never both succeed.

use crate::base::BookId;
use crate::error::LendingError;
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// Default shelf size for imported titles.
pub const DEFAULT_TOTAL_COPIES: u32 = 4;

/// Descriptive fields for a title, as they arrive from import or admin
/// creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetails {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub publisher: String,
    pub retail_price: Decimal,
}

#[derive(Debug)]
struct BookData {
    details: BookDetails,
    total_copies: u32,
    available_copies: u32,
}

impl BookData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.available_copies <= self.total_copies,
            "Invariant violated: available copies ({}) exceed total copies ({})",
            self.available_copies,
            self.total_copies
        );
    }

    fn borrow(&mut self) -> Result<(), LendingError> {
        if self.available_copies == 0 {
            return Err(LendingError::NotAvailable);
        }
        self.available_copies -= 1;
        self.assert_invariants();
        Ok(())
    }

    fn return_copy(&mut self) -> Result<(), LendingError> {
        if self.available_copies >= self.total_copies {
            return Err(LendingError::OverReturn);
        }
        self.available_copies += 1;
        self.assert_invariants();
        Ok(())
    }
}

/// One title in the catalogue.
///
/// # Invariants
///
/// - `0 <= available_copies <= total_copies` after any sequence of
///   borrow/return calls.
/// - `borrow` on zero available copies fails with
///   [`LendingError::NotAvailable`].
/// - `return_copy` at full shelf fails with [`LendingError::OverReturn`].
#[derive(Debug)]
pub struct Book {
    id: BookId,
    inner: Mutex<BookData>,
}

impl Book {
    /// Creates a title with a full shelf of `total_copies`.
    pub fn new(id: BookId, details: BookDetails, total_copies: u32) -> Self {
        let total_copies = total_copies.max(1);
        Self {
            id,
            inner: Mutex::new(BookData {
                details,
                total_copies,
                available_copies: total_copies,
            }),
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn isbn(&self) -> String {
        self.inner.lock().details.isbn.clone()
    }

    pub fn title(&self) -> String {
        self.inner.lock().details.title.clone()
    }

    pub fn author(&self) -> String {
        self.inner.lock().details.author.clone()
    }

    pub fn publication_year(&self) -> i32 {
        self.inner.lock().details.publication_year
    }

    pub fn publisher(&self) -> String {
        self.inner.lock().details.publisher.clone()
    }

    pub fn retail_price(&self) -> Decimal {
        self.inner.lock().details.retail_price
    }

    pub fn total_copies(&self) -> u32 {
        self.inner.lock().total_copies
    }

    pub fn available_copies(&self) -> u32 {
        self.inner.lock().available_copies
    }

    /// True iff at least one copy is on the shelf.
    pub fn is_available(&self) -> bool {
        self.inner.lock().available_copies > 0
    }

    /// Takes one copy off the shelf.
    ///
    /// # Errors
    ///
    /// [`LendingError::NotAvailable`] when no copies are left. The check
    /// and the decrement happen under one lock.
    pub fn borrow(&self) -> Result<(), LendingError> {
        self.inner.lock().borrow()
    }

    /// Puts one copy back on the shelf.
    ///
    /// # Errors
    ///
    /// [`LendingError::OverReturn`] when the shelf is already full.
    pub fn return_copy(&self) -> Result<(), LendingError> {
        self.inner.lock().return_copy()
    }
}
