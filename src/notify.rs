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

//! Notification contract.
//!
//! The core treats notification delivery as fire-and-forget: the sweep
//! logs a failure for the affected reservation and moves on, so one bad
//! send never blocks the rest of the batch. [`LogNotifier`] stands in for
//! a real mail provider and writes the message content as tracing events.

use crate::book::Book;
use crate::user::User;
use rust_decimal::Decimal;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound notifications for the loan lifecycle.
pub trait Notifier: Send + Sync {
    /// A loan approaches its due date.
    fn send_due_reminder(&self, user: &User, book: &Book, due_date: SystemTime)
    -> Result<(), NotifyError>;

    /// A loan is overdue and has accrued `late_fee` so far.
    fn send_late_reminder(
        &self,
        user: &User,
        book: &Book,
        due_date: SystemTime,
        late_fee: Decimal,
    ) -> Result<(), NotifyError>;

    /// Late fees reached the retail price; the loan converted to a sale.
    fn send_purchase_notification(
        &self,
        user: &User,
        book: &Book,
        price: Decimal,
    ) -> Result<(), NotifyError>;
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Notifier that logs instead of delivering.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_due_reminder(
        &self,
        user: &User,
        book: &Book,
        due_date: SystemTime,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            email = %user.email(),
            title = %book.title(),
            due_unix = unix_secs(due_date),
            "due date reminder: please return the book before it is due"
        );
        Ok(())
    }

    fn send_late_reminder(
        &self,
        user: &User,
        book: &Book,
        due_date: SystemTime,
        late_fee: Decimal,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            email = %user.email(),
            title = %book.title(),
            due_unix = unix_secs(due_date),
            late_fee = %late_fee,
            retail_price = %book.retail_price(),
            "late reminder: return the book to avoid additional fees; at the \
             retail price the book is purchased automatically"
        );
        Ok(())
    }

    fn send_purchase_notification(
        &self,
        user: &User,
        book: &Book,
        price: Decimal,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            email = %user.email(),
            title = %book.title(),
            price = %price,
            balance = %user.wallet_balance(),
            "late fees reached the retail price: the book is now purchased \
             and the amount was deducted from the wallet"
        );
        Ok(())
    }
}
