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

//! Property-based tests for the lending engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! valid loan operations and any point in time.

use lending_library_rs::policy::{late_fee, units_late};
use lending_library_rs::{
    Book, BookDetails, BookId, LendingEngine, LendingError, LoanPolicy, ManualClock,
    MAX_ACTIVE_LOANS, RESERVATION_FEE,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn due() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn details(isbn: &str, price: Decimal) -> BookDetails {
    BookDetails {
        isbn: isbn.to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        publication_year: 1965,
        publisher: "Chilton Books".to_string(),
        retail_price: price,
    }
}

/// Generate a positive retail price (0.01 to 100.00).
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

// =============================================================================
// Late Fee Formula Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// No fee accrues at or before the due date.
    #[test]
    fn no_fee_before_due(early_secs in 0u64..100_000_000) {
        let policy = LoanPolicy::production();
        let at = due() - Duration::from_secs(early_secs);
        prop_assert_eq!(late_fee(due(), at, &policy, None), Decimal::ZERO);
    }

    /// The fee is nondecreasing in time.
    #[test]
    fn fee_is_monotone(a_secs in 0u64..10_000_000, b_secs in 0u64..10_000_000) {
        let policy = LoanPolicy::production();
        let (earlier, later) = if a_secs <= b_secs {
            (a_secs, b_secs)
        } else {
            (b_secs, a_secs)
        };
        let fee_earlier = late_fee(due(), due() + Duration::from_secs(earlier), &policy, None);
        let fee_later = late_fee(due(), due() + Duration::from_secs(later), &policy, None);
        prop_assert!(fee_earlier <= fee_later);
    }

    /// The capped fee never exceeds the cap, however overdue.
    #[test]
    fn fee_respects_the_cap(late_secs in 0u64..1_000_000_000, cap in arb_price()) {
        let policy = LoanPolicy::production();
        let fee = late_fee(due(), due() + Duration::from_secs(late_secs), &policy, Some(cap));
        prop_assert!(fee >= Decimal::ZERO);
        prop_assert!(fee <= cap);
    }

    /// Any partial unit counts as a whole started unit.
    #[test]
    fn started_units_round_up(whole in 0u32..1000, partial_secs in 1u64..(24 * 60 * 60)) {
        let at = due() + DAY * whole + Duration::from_secs(partial_secs);
        prop_assert_eq!(units_late(due(), at, DAY), u64::from(whole) + 1);
    }

    /// Whole units are counted exactly.
    #[test]
    fn whole_units_count_exactly(whole in 1u32..1000) {
        prop_assert_eq!(units_late(due(), due() + DAY * whole, DAY), u64::from(whole));
    }
}

// =============================================================================
// Copy Count Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Borrow/return churn keeps the available count within [0, total].
    #[test]
    fn copies_stay_within_bounds(
        total in 1u32..10,
        ops in prop::collection::vec(any::<bool>(), 0..50),
    ) {
        let book = Book::new(BookId(1), details("111", dec!(10.0)), total);
        let mut out = 0u32;

        for borrow in ops {
            if borrow {
                match book.borrow() {
                    Ok(()) => out += 1,
                    Err(LendingError::NotAvailable) => prop_assert_eq!(out, total),
                    Err(e) => prop_assert!(false, "unexpected error: {e}"),
                }
            } else {
                match book.return_copy() {
                    Ok(()) => out -= 1,
                    Err(LendingError::OverReturn) => prop_assert_eq!(out, 0),
                    Err(e) => prop_assert!(false, "unexpected error: {e}"),
                }
            }
            prop_assert!(book.available_copies() <= total);
            prop_assert_eq!(book.available_copies(), total - out);
        }
    }
}

// =============================================================================
// Engine Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// However many loans are attempted, no user ever holds more than
    /// the active-loan limit, and every successful loan cost exactly
    /// one reservation fee.
    #[test]
    fn loan_limit_and_fee_accounting(
        attempts in prop::collection::vec((0usize..4, 0usize..8), 0..40),
    ) {
        let clock = ManualClock::new(due());
        let engine = LendingEngine::new(LoanPolicy::production(), Arc::new(clock));

        let users: Vec<_> = (0..4)
            .map(|i| {
                engine
                    .register_user(
                        &format!("User {i}"),
                        &format!("user{i}@example.com"),
                        dec!(100.0),
                    )
                    .unwrap()
            })
            .collect();
        let books: Vec<_> = (0..8)
            .map(|i| {
                engine
                    .add_book(details(&format!("isbn-{i}"), dec!(10.0)), 2)
                    .unwrap()
            })
            .collect();

        let mut successes = vec![0u32; users.len()];
        for (u, b) in attempts {
            match engine.create_reservation(users[u].id(), books[b].id()) {
                Ok(_) => successes[u] += 1,
                Err(LendingError::Ineligible) | Err(LendingError::NotAvailable) => {}
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }

        for (user, &wins) in users.iter().zip(&successes) {
            prop_assert!(user.active_loan_count() <= MAX_ACTIVE_LOANS);
            prop_assert_eq!(
                user.wallet_balance(),
                dec!(100.0) - RESERVATION_FEE * Decimal::from(wins)
            );
        }

        // Copies on loan match the active reservations per title.
        for book in &books {
            let active = engine
                .reservations()
                .find_by_book(book.id())
                .iter()
                .filter(|r| !r.is_returned())
                .count() as u32;
            prop_assert_eq!(book.available_copies(), book.total_copies() - active);
        }
    }

    /// Creating and then returning every loan on time restores all
    /// copies and costs each user exactly the fees for their loans.
    #[test]
    fn on_time_round_trips_conserve_everything(
        picks in prop::collection::vec((0usize..4, 0usize..8), 0..30),
    ) {
        let clock = ManualClock::new(due());
        let engine = LendingEngine::new(LoanPolicy::production(), Arc::new(clock));

        let users: Vec<_> = (0..4)
            .map(|i| {
                engine
                    .register_user(
                        &format!("User {i}"),
                        &format!("user{i}@example.com"),
                        dec!(100.0),
                    )
                    .unwrap()
            })
            .collect();
        let books: Vec<_> = (0..8)
            .map(|i| {
                engine
                    .add_book(details(&format!("isbn-{i}"), dec!(10.0)), 2)
                    .unwrap()
            })
            .collect();

        let mut fees_paid = vec![Decimal::ZERO; users.len()];
        let mut open = Vec::new();
        for (u, b) in picks {
            if let Ok(r) = engine.create_reservation(users[u].id(), books[b].id()) {
                fees_paid[u] += RESERVATION_FEE;
                open.push(r);
            }
        }
        for r in open {
            engine.return_reservation(r.id(), false).unwrap();
        }

        for (user, fees) in users.iter().zip(&fees_paid) {
            prop_assert_eq!(user.active_loan_count(), 0);
            prop_assert_eq!(user.wallet_balance(), dec!(100.0) - fees);
        }
        for book in &books {
            prop_assert_eq!(book.available_copies(), book.total_copies());
        }
    }
}
