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

//! Book Store: persistent collection of books keyed by ISBN.
//!
//! Every operation in here maps to a single SQL statement so that the database, and nothing
//! else, serializes concurrent access to the same ISBN.  Uniqueness is enforced by a unique index
//! on the `isbn` column and updates and deletes match on that same column, which makes a late
//! update of a deleted book report `NotFound`.

use crate::model::{Book, BookPatch, Isbn, NewBook};
use bookshelf_core::db::DbResult;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(any(feature = "sqlite", test))]
pub mod sqlite;

/// Operations offered by a book store.
///
/// Listings return books by creation time, with ties kept in insertion order.
#[async_trait::async_trait]
pub trait BookStore: Send + Sync {
    /// Persists `book`, stamping its creation time.  Fails with `AlreadyExists` if another book
    /// with the same ISBN is already stored.
    async fn insert(&self, book: NewBook) -> DbResult<Book>;

    /// Gets the book identified by `isbn`.
    async fn find_by_isbn(&self, isbn: &Isbn) -> DbResult<Book>;

    /// Gets all stored books.
    async fn list_all(&self) -> DbResult<Vec<Book>>;

    /// Applies `patch` to the book identified by `isbn` and returns the book after the update.
    async fn update_by_isbn(&self, isbn: &Isbn, patch: &BookPatch) -> DbResult<Book>;

    /// Deletes the book identified by `isbn`.
    async fn delete_by_isbn(&self, isbn: &Isbn) -> DbResult<()>;

    /// Releases the connections held by the store.  Any further operation reports `Unavailable`.
    async fn close(&self);
}
