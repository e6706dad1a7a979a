// Bookshelf
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Catalog Service: the business logic of the server.

use crate::db::BookStore;
use crate::model::Isbn;
use bookshelf_core::db::DbError;
use bookshelf_core::driver::DriverError;
use std::sync::Arc;

mod book;
mod books;
#[cfg(test)]
pub(crate) mod testutils;

/// Business logic.
///
/// Every public operation issues at most one call to the store, so these operations consume the
/// driver to make it clear that a request maps to exactly one of them.  Clone the driver to issue
/// more calls.
#[derive(Clone)]
pub struct Driver {
    /// The store that the driver uses for persistence.
    store: Arc<dyn BookStore>,
}

impl Driver {
    /// Creates a new driver backed by the given injected `store`.
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }
}

/// Converts a store error `e` raised while operating on the book identified by `isbn` into a
/// driver error that names the book.
fn book_error(isbn: &Isbn, e: DbError) -> DriverError {
    match e {
        DbError::AlreadyExists => {
            DriverError::AlreadyExists(format!("A book with ISBN '{}' already exists", isbn.as_str()))
        }
        DbError::NotFound => {
            DriverError::NotFound(format!("No book with ISBN '{}'", isbn.as_str()))
        }
        e => e.into(),
    }
}
