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

//! Engine public API integration tests.
//!
//! Full loan lifecycles driven through [`LendingEngine`] with a manual
//! clock, so due dates and late fees are exercised deterministically.

use lending_library_rs::{
    BookDetails, BookSearch, Clock, LendingEngine, LendingError, LoanPolicy, ManualClock,
    RESERVATION_FEE,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn details(isbn: &str, title: &str, price: Decimal) -> BookDetails {
    BookDetails {
        isbn: isbn.to_string(),
        title: title.to_string(),
        author: "Frank Herbert".to_string(),
        publication_year: 1965,
        publisher: "Chilton Books".to_string(),
        retail_price: price,
    }
}

fn setup() -> (LendingEngine, ManualClock) {
    let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let engine = LendingEngine::new(LoanPolicy::production(), Arc::new(clock.clone()));
    (engine, clock)
}

#[test]
fn on_time_lifecycle_costs_only_the_reservation_fee() {
    let (engine, clock) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();

    let reservation = engine.create_reservation(user.id(), book.id()).unwrap();
    assert_eq!(user.wallet_balance(), dec!(50.0) - RESERVATION_FEE);
    assert_eq!(book.available_copies(), 3);
    assert_eq!(reservation.due_date(), clock.now() + engine.policy().loan_period);

    clock.advance(10 * DAY);
    engine.return_reservation(reservation.id(), false).unwrap();

    assert!(reservation.is_returned());
    assert_eq!(reservation.late_fee(), Decimal::ZERO);
    assert_eq!(user.wallet_balance(), dec!(47.0));
    assert_eq!(book.available_copies(), 4);
    assert_eq!(user.active_loan_count(), 0);
}

#[test]
fn late_lifecycle_settles_the_accrued_fee_on_return() {
    let (engine, clock) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();
    let reservation = engine.create_reservation(user.id(), book.id()).unwrap();

    // 14-day loan returned 5 days late: one whole fee unit at 0.2/day.
    clock.advance(engine.policy().loan_period + 5 * DAY);
    engine.return_reservation(reservation.id(), false).unwrap();

    assert_eq!(reservation.late_fee(), dec!(1.0));
    assert_eq!(user.wallet_balance(), dec!(46.0));
}

#[test]
fn fourth_concurrent_loan_is_refused() {
    let (engine, _) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let mut books = Vec::new();
    for i in 0..4 {
        books.push(
            engine
                .add_book(details(&format!("isbn-{i}"), "Dune", dec!(10.0)), 4)
                .unwrap(),
        );
    }

    for book in &books[..3] {
        engine.create_reservation(user.id(), book.id()).unwrap();
    }
    assert_eq!(
        engine.create_reservation(user.id(), books[3].id()).unwrap_err(),
        LendingError::Ineligible
    );

    // Returning one frees the slot.
    let open = engine.reservations().find_by_user(user.id());
    engine.return_reservation(open[0].id(), false).unwrap();
    engine.create_reservation(user.id(), books[3].id()).unwrap();
}

#[test]
fn same_title_cannot_be_borrowed_twice_at_once() {
    let (engine, _) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();

    let first = engine.create_reservation(user.id(), book.id()).unwrap();
    assert_eq!(
        engine.create_reservation(user.id(), book.id()).unwrap_err(),
        LendingError::Ineligible
    );

    engine.return_reservation(first.id(), false).unwrap();
    engine.create_reservation(user.id(), book.id()).unwrap();
}

#[test]
fn copies_are_shared_across_users() {
    let (engine, _) = setup();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 2).unwrap();
    let a = engine.register_user("A", "a@example.com", dec!(10.0)).unwrap();
    let b = engine.register_user("B", "b@example.com", dec!(10.0)).unwrap();
    let c = engine.register_user("C", "c@example.com", dec!(10.0)).unwrap();

    engine.create_reservation(a.id(), book.id()).unwrap();
    engine.create_reservation(b.id(), book.id()).unwrap();
    assert_eq!(
        engine.create_reservation(c.id(), book.id()).unwrap_err(),
        LendingError::NotAvailable
    );
    // The losing caller is not charged.
    assert_eq!(c.wallet_balance(), dec!(10.0));
}

#[test]
fn duplicate_registration_is_refused() {
    let (engine, _) = setup();
    engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    assert_eq!(
        engine
            .register_user("John II", "john.doe@example.com", dec!(1.0))
            .unwrap_err(),
        LendingError::DuplicateEmail
    );

    engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();
    assert_eq!(
        engine
            .add_book(details("111", "Dune Again", dec!(12.0)), 4)
            .unwrap_err(),
        LendingError::DuplicateIsbn
    );
}

#[test]
fn catalogue_search_through_the_engine_stores() {
    let (engine, _) = setup();
    engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();
    engine
        .add_book(details("222", "Dune Messiah", dec!(11.0)), 4)
        .unwrap();

    let hits = engine.books().search(&BookSearch {
        title: Some("dune".to_string()),
        ..Default::default()
    });
    assert_eq!(hits.len(), 2);

    let exact = engine.books().search(&BookSearch {
        title: Some("messiah".to_string()),
        author: Some("herbert".to_string()),
        ..Default::default()
    });
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].isbn(), "222");
}

#[test]
fn reservation_history_survives_the_return() {
    let (engine, clock) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();
    let reservation = engine.create_reservation(user.id(), book.id()).unwrap();

    clock.advance(DAY);
    engine.return_reservation(reservation.id(), false).unwrap();

    // Closed reservations remain queryable as the audit trail.
    assert_eq!(engine.reservations().count(), 1);
    let archived = engine.reservations().get(reservation.id()).unwrap();
    assert!(archived.is_returned());
    assert_eq!(archived.returned_at(), Some(clock.now()));
    assert_eq!(archived.fee(), RESERVATION_FEE);

    let ledger = user.borrowed_books();
    assert_eq!(ledger.len(), 1);
    assert!(ledger[0].returned);
}

#[test]
fn late_fee_never_exceeds_the_retail_price_snapshot() {
    let (engine, clock) = setup();
    let user = engine
        .register_user("John Doe", "john.doe@example.com", dec!(50.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();
    let reservation = engine.create_reservation(user.id(), book.id()).unwrap();

    // Years overdue: the settled fee is capped at the snapshot, even after
    // the catalogue price would have changed.
    clock.advance(engine.policy().loan_period + 1000 * DAY);
    engine.return_reservation(reservation.id(), false).unwrap();
    assert_eq!(reservation.late_fee(), dec!(10.0));
    assert_eq!(user.wallet_balance(), dec!(37.0)); // 50 - 3 - 10
}

#[test]
fn unknown_ids_surface_not_found_errors() {
    let (engine, _) = setup();
    assert_eq!(
        engine
            .return_reservation(lending_library_rs::ReservationId(5), false)
            .unwrap_err(),
        LendingError::ReservationNotFound
    );
    assert_eq!(
        engine.delete_book(lending_library_rs::BookId(5)).unwrap_err(),
        LendingError::BookNotFound
    );
}

#[test]
fn wallet_top_up_restores_eligibility() {
    let (engine, _) = setup();
    let user = engine
        .register_user("Bob Johnson", "bob.johnson@example.com", dec!(1.0))
        .unwrap();
    let book = engine.add_book(details("111", "Dune", dec!(10.0)), 4).unwrap();

    assert_eq!(
        engine.create_reservation(user.id(), book.id()).unwrap_err(),
        LendingError::Ineligible
    );
    engine.add_to_wallet(user.id(), dec!(5.0)).unwrap();
    engine.create_reservation(user.id(), book.id()).unwrap();
    assert_eq!(user.wallet_balance(), dec!(3.0));
}
