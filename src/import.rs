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

//! Bulk book import from CSV.
//!
//! Reads a tabular catalogue (`id,title,author,publication_year,publisher,
//! price`; the `id` column becomes the ISBN) and creates one book per row
//! with the default shelf size. Malformed rows and per-row create failures
//! are logged and skipped; the import never aborts on a bad row.

use crate::book::{BookDetails, DEFAULT_TOTAL_COPIES};
use crate::engine::LendingEngine;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use tracing::{info, warn};

/// Raw CSV record matching the catalogue export format.
#[derive(Debug, Deserialize)]
struct BookRecord {
    /// Source catalogue id, carried over as the ISBN.
    id: String,
    title: String,
    author: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    publication_year: Option<i32>,
    #[serde(default)]
    publisher: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    price: Option<Decimal>,
}

impl BookRecord {
    /// Returns `None` when a required field failed to parse.
    fn into_details(self) -> Option<BookDetails> {
        Some(BookDetails {
            isbn: self.id,
            title: self.title,
            author: self.author,
            publication_year: self.publication_year?,
            publisher: self.publisher,
            retail_price: self.price?,
        })
    }
}

/// Imports books from a CSV reader into the catalogue.
///
/// Returns the number of rows imported. Streaming: arbitrarily large
/// files are handled without buffering the whole catalogue.
///
/// # Errors
///
/// Returns a [`csv::Error`] only when the reader itself fails or the CSV
/// structure is unreadable; individual bad rows are skipped.
pub fn import_books<R: Read>(engine: &LendingEngine, reader: R) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut imported = 0usize;
    for result in rdr.deserialize::<BookRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(reason = %e, "skipping malformed catalogue row");
                continue;
            }
        };

        let Some(details) = record.into_details() else {
            warn!("skipping catalogue row with unparsable year or price");
            continue;
        };

        let isbn = details.isbn.clone();
        match engine.add_book(details, DEFAULT_TOTAL_COPIES) {
            Ok(_) => imported += 1,
            Err(e) => {
                warn!(isbn = %isbn, reason = %e, "skipping catalogue row");
            }
        }
    }

    info!(imported, "catalogue import finished");
    Ok(imported)
}
