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

//! Reconciliation sweep.
//!
//! The [`Reconciler`] periodically scans open reservations and drives the
//! engine's own operations: due reminders, late-fee accrual, late
//! reminders, and the forced-purchase conversion once accrued fees reach
//! the book's retail price.
//!
//! A sweep makes two passes, the due pass always before the overdue pass.
//! The queries partition reservations (`due >= now` vs. `due < now`), so
//! no reservation is handled by both passes in one sweep. Per-reservation
//! failures - missing user or book, a notifier rejection - are logged and
//! skipped; the reservation's flags stay unset and it is reconsidered on
//! the next sweep.

use crate::engine::LendingEngine;
use crate::notify::Notifier;
use crate::reservation::Reservation;
use crossbeam::channel::tick;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What one sweep did; returned for observability and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub due_reminders_sent: usize,
    pub late_reminders_sent: usize,
    pub purchases: usize,
    pub skipped: usize,
}

/// Periodic reconciliation job over the reservation archive.
pub struct Reconciler {
    engine: Arc<LendingEngine>,
    notifier: Arc<dyn Notifier>,
    /// In-flight guard: a tick arriving while a sweep is running is
    /// skipped rather than queued, so sweeps never overlap.
    in_flight: AtomicBool,
}

impl Reconciler {
    pub fn new(engine: Arc<LendingEngine>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            notifier,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Starts the sweep loop on its own thread, ticking at the policy's
    /// sweep interval. The loop runs until process shutdown; there is no
    /// cancellation mechanism.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.engine.policy().sweep_interval;
        thread::spawn(move || {
            let ticker = tick(interval);
            info!(interval_secs = interval.as_secs(), "reconciler started");
            for _ in ticker.iter() {
                self.run_sweep();
            }
        })
    }

    /// Runs one sweep: the due-reminder pass, then the overdue pass.
    ///
    /// Returns `None` when another sweep is still in flight (the tick is
    /// skipped, not serialized).
    pub fn run_sweep(&self) -> Option<SweepReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!("previous sweep still running, skipping tick");
            return None;
        }

        let mut report = SweepReport::default();
        self.due_pass(&mut report);
        self.overdue_pass(&mut report);
        debug!(
            due = report.due_reminders_sent,
            late = report.late_reminders_sent,
            purchases = report.purchases,
            skipped = report.skipped,
            "sweep finished"
        );

        self.in_flight.store(false, Ordering::Release);
        Some(report)
    }

    /// Reminds users whose loans fall due within the reminder window.
    fn due_pass(&self, report: &mut SweepReport) {
        let now = self.engine.now();
        let policy = self.engine.policy();
        let pending = self
            .engine
            .reservations()
            .find_pending_reminders(now, policy);

        for reservation in pending {
            if !reservation.should_send_reminder(now, policy) {
                continue;
            }
            let Some(user) = self.engine.users().get(reservation.user_id()) else {
                self.skip(&reservation, "user missing", report);
                continue;
            };
            let Some(book) = self.engine.books().get(reservation.book_id()) else {
                self.skip(&reservation, "book missing", report);
                continue;
            };

            match self
                .notifier
                .send_due_reminder(&user, &book, reservation.due_date())
            {
                Ok(()) => {
                    reservation.mark_reminder_sent(now);
                    report.due_reminders_sent += 1;
                }
                Err(e) => {
                    // Flag stays unset; the next sweep retries this one.
                    warn!(reservation = %reservation.id(), reason = %e, "due reminder failed");
                    report.skipped += 1;
                }
            }
        }
    }

    /// Accrues late fees on overdue loans, converts maxed-out loans into
    /// purchases, and sends cooldown-gated late reminders.
    fn overdue_pass(&self, report: &mut SweepReport) {
        let now = self.engine.now();
        let policy = self.engine.policy();
        let overdue = self.engine.reservations().find_pending_late_reminders(now);

        for reservation in overdue {
            let Some(user) = self.engine.users().get(reservation.user_id()) else {
                self.skip(&reservation, "user missing", report);
                continue;
            };
            let Some(book) = self.engine.books().get(reservation.book_id()) else {
                self.skip(&reservation, "book missing", report);
                continue;
            };

            let late_fee = reservation.update_late_fee(now, policy);

            if reservation.late_fee_at_cap() {
                let price = reservation.book_retail_price();
                info!(
                    reservation = %reservation.id(),
                    user = %user.id(),
                    book = %book.id(),
                    price = %price,
                    "late fee reached retail price, converting loan to purchase"
                );
                if let Err(e) = self.engine.return_reservation(reservation.id(), true) {
                    warn!(reservation = %reservation.id(), reason = %e, "forced purchase failed");
                    report.skipped += 1;
                    continue;
                }
                if let Err(e) = user.deduct_from_wallet(price) {
                    // Balance may go negative for purchases: the book is
                    // gone either way, the debt stands.
                    debug!(reservation = %reservation.id(), reason = %e, "charging purchase as overdraft");
                    user.charge(price);
                }
                if let Err(e) = self.notifier.send_purchase_notification(&user, &book, price) {
                    warn!(reservation = %reservation.id(), reason = %e, "purchase notification failed");
                }
                report.purchases += 1;
                // No reminder logic for a converted loan.
                continue;
            }

            if reservation.late_reminder_due(now, policy) {
                match self
                    .notifier
                    .send_late_reminder(&user, &book, reservation.due_date(), late_fee)
                {
                    Ok(()) => {
                        reservation.mark_late_reminder_sent(now);
                        report.late_reminders_sent += 1;
                    }
                    Err(e) => {
                        warn!(reservation = %reservation.id(), reason = %e, "late reminder failed");
                        report.skipped += 1;
                    }
                }
            }
        }
    }

    fn skip(&self, reservation: &Reservation, reason: &str, report: &mut SweepReport) {
        warn!(reservation = %reservation.id(), reason, "skipping reservation this sweep");
        report.skipped += 1;
    }
}
