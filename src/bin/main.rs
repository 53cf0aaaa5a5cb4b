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

use clap::Parser;
use lending_library_rs::{
    LendingEngine, LoanPolicy, LogNotifier, Reconciler, SystemClock, import_books,
};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Lending Library - import a book catalogue and run the reconciliation loop
///
/// Loads books from a CSV catalogue, then sweeps open reservations on the
/// policy cadence: due reminders, late-fee accrual, and forced-purchase
/// conversion. Runs until interrupted.
#[derive(Parser, Debug)]
#[command(name = "lending-library-rs")]
#[command(about = "A lending library engine with a periodic reconciliation sweep", long_about = None)]
struct Args {
    /// Path to the CSV book catalogue
    ///
    /// Expected columns: id,title,author,publication_year,publisher,price
    #[arg(value_name = "FILE")]
    catalogue: PathBuf,

    /// Use minute-granularity time units instead of days, so loans fall
    /// due and accrue fees within minutes (for demos and development)
    #[arg(long)]
    accelerated: bool,

    /// Seed a demo user and borrow the first catalogued book, so the
    /// sweep has something to reconcile
    #[arg(long)]
    demo: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let policy = if args.accelerated {
        LoanPolicy::accelerated()
    } else {
        LoanPolicy::production()
    };
    if let Err(e) = policy.validate() {
        eprintln!("Invalid loan policy: {}", e);
        process::exit(1);
    }

    let file = match File::open(&args.catalogue) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.catalogue.display(), e);
            process::exit(1);
        }
    };

    let engine = Arc::new(LendingEngine::new(policy, Arc::new(SystemClock)));

    match import_books(&engine, BufReader::new(file)) {
        Ok(imported) => info!(imported, "catalogue loaded"),
        Err(e) => {
            eprintln!("Error importing catalogue: {}", e);
            process::exit(1);
        }
    }

    if args.demo {
        if let Err(e) = seed_demo(&engine) {
            eprintln!("Error seeding demo data: {}", e);
            process::exit(1);
        }
    }

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&engine),
        Arc::new(LogNotifier),
    ));
    let handle = reconciler.spawn();

    // The sweep loop never returns; the process runs until interrupted.
    if handle.join().is_err() {
        eprintln!("Reconciler thread panicked");
        process::exit(1);
    }
}

/// Registers sample members and opens one loan against the first title.
fn seed_demo(engine: &LendingEngine) -> Result<(), lending_library_rs::LendingError> {
    let john = engine.register_user("John Doe", "john.doe@example.com", dec!(50.0))?;
    engine.register_user("Jane Smith", "jane.smith@example.com", dec!(30.0))?;
    engine.register_user("Bob Johnson", "bob.johnson@example.com", dec!(20.0))?;

    let first = engine
        .books()
        .search(&Default::default())
        .into_iter()
        .next()
        .ok_or(lending_library_rs::LendingError::BookNotFound)?;

    let reservation = engine.create_reservation(john.id(), first.id())?;
    info!(
        reservation = %reservation.id(),
        title = %first.title(),
        "demo loan created"
    );
    Ok(())
}
