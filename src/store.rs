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

//! Record stores for books, users, and reservations.
//!
//! Persistence collaborators with a deliberately narrow contract: find,
//! create, delete, count, and the entity-specific queries the engine and
//! sweep need. Backed by [`DashMap`], with mutations applied field-by-field
//! under each record's own lock, which gives the partial-update,
//! last-write-wins semantics the core assumes.

use crate::base::{BookId, ReservationId, UserId};
use crate::book::{Book, BookDetails};
use crate::error::LendingError;
use crate::policy::LoanPolicy;
use crate::reservation::Reservation;
use crate::user::User;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

/// Catalogue search terms; all given fields must match.
#[derive(Debug, Clone, Default)]
pub struct BookSearch {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive substring of the author.
    pub author: Option<String>,
    pub publication_year: Option<i32>,
}

/// The book catalogue.
#[derive(Debug, Default)]
pub struct BookStore {
    books: DashMap<BookId, Arc<Book>>,
    next_id: AtomicU32,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a title to the catalogue.
    ///
    /// # Errors
    ///
    /// [`LendingError::InvalidPrice`] for a non-positive retail price,
    /// [`LendingError::DuplicateIsbn`] when the ISBN is already catalogued.
    pub fn create(
        &self,
        details: BookDetails,
        total_copies: u32,
    ) -> Result<Arc<Book>, LendingError> {
        if details.retail_price <= Decimal::ZERO {
            return Err(LendingError::InvalidPrice);
        }
        if self.find_by_isbn(&details.isbn).is_some() {
            return Err(LendingError::DuplicateIsbn);
        }
        let id = BookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let book = Arc::new(Book::new(id, details, total_copies));
        self.books.insert(id, Arc::clone(&book));
        Ok(book)
    }

    pub fn get(&self, id: BookId) -> Option<Arc<Book>> {
        self.books.get(&id).map(|b| Arc::clone(&b))
    }

    pub fn find_by_isbn(&self, isbn: &str) -> Option<Arc<Book>> {
        self.books
            .iter()
            .find(|entry| entry.value().isbn() == isbn)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All titles matching every given search term.
    pub fn search(&self, query: &BookSearch) -> Vec<Arc<Book>> {
        let title = query.title.as_deref().map(str::to_lowercase);
        let author = query.author.as_deref().map(str::to_lowercase);
        self.books
            .iter()
            .filter(|entry| {
                let book = entry.value();
                title
                    .as_deref()
                    .is_none_or(|t| book.title().to_lowercase().contains(t))
                    && author
                        .as_deref()
                        .is_none_or(|a| book.author().to_lowercase().contains(a))
                    && query
                        .publication_year
                        .is_none_or(|y| book.publication_year() == y)
            })
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Removes a title. The engine refuses this while loans are active.
    pub fn delete(&self, id: BookId) -> Result<(), LendingError> {
        self.books
            .remove(&id)
            .map(|_| ())
            .ok_or(LendingError::BookNotFound)
    }

    pub fn count(&self) -> usize {
        self.books.len()
    }
}

/// The member register.
#[derive(Debug, Default)]
pub struct UserStore {
    users: DashMap<UserId, Arc<User>>,
    next_id: AtomicU32,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a member.
    ///
    /// # Errors
    ///
    /// [`LendingError::DuplicateEmail`] when the address is taken.
    pub fn create(
        &self,
        name: String,
        email: String,
        wallet_balance: Decimal,
    ) -> Result<Arc<User>, LendingError> {
        if self.find_by_email(&email).is_some() {
            return Err(LendingError::DuplicateEmail);
        }
        let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let user = Arc::new(User::new(id, name, email, wallet_balance));
        self.users.insert(id, Arc::clone(&user));
        Ok(user)
    }

    pub fn get(&self, id: UserId) -> Option<Arc<User>> {
        self.users.get(&id).map(|u| Arc::clone(&u))
    }

    pub fn find_by_email(&self, email: &str) -> Option<Arc<User>> {
        self.users
            .iter()
            .find(|entry| entry.value().email() == email)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn delete(&self, id: UserId) -> Result<(), LendingError> {
        self.users
            .remove(&id)
            .map(|_| ())
            .ok_or(LendingError::UserNotFound)
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

/// The loan record archive. Reservations are created and mutated in place,
/// never removed.
#[derive(Debug, Default)]
pub struct ReservationStore {
    reservations: DashMap<ReservationId, Arc<Reservation>>,
    next_id: AtomicU32,
}

impl ReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id and stores a new reservation built by `make`.
    pub fn create(
        &self,
        make: impl FnOnce(ReservationId) -> Reservation,
    ) -> Arc<Reservation> {
        let id = ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let reservation = Arc::new(make(id));
        self.reservations.insert(id, Arc::clone(&reservation));
        reservation
    }

    pub fn get(&self, id: ReservationId) -> Option<Arc<Reservation>> {
        self.reservations.get(&id).map(|r| Arc::clone(&r))
    }

    pub fn find_by_user(&self, user_id: UserId) -> Vec<Arc<Reservation>> {
        self.filter(|r| r.user_id() == user_id)
    }

    pub fn find_by_book(&self, book_id: BookId) -> Vec<Arc<Reservation>> {
        self.filter(|r| r.book_id() == book_id)
    }

    /// True iff any active reservation references the title.
    pub fn has_active_for_book(&self, book_id: BookId) -> bool {
        self.reservations
            .iter()
            .any(|entry| entry.value().book_id() == book_id && !entry.value().is_returned())
    }

    /// Active reservations owed a due reminder: flag unset and the due
    /// date inside `[now, now + reminder_window]`, both ends inclusive. A
    /// loan due in exactly the window is included; one unit further out is
    /// not.
    pub fn find_pending_reminders(
        &self,
        now: SystemTime,
        policy: &LoanPolicy,
    ) -> Vec<Arc<Reservation>> {
        let horizon = now + policy.reminder_window;
        self.filter(|r| {
            !r.is_returned() && !r.reminder_sent() && r.due_date() >= now && r.due_date() <= horizon
        })
    }

    /// Active reservations strictly past due.
    ///
    /// Strict, so a loan due at this exact instant still belongs to the
    /// due-reminder pass and never to both passes in one sweep.
    pub fn find_pending_late_reminders(&self, now: SystemTime) -> Vec<Arc<Reservation>> {
        self.filter(|r| !r.is_returned() && r.due_date() < now)
    }

    pub fn count(&self) -> usize {
        self.reservations.len()
    }

    fn filter(&self, keep: impl Fn(&Reservation) -> bool) -> Vec<Arc<Reservation>> {
        self.reservations
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}
