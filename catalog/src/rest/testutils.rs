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

//! Test utilities for the REST API.

use crate::db::sqlite::{testutils, SqliteBookStore};
use crate::db::BookStore;
use crate::driver::Driver;
use crate::model::*;
use crate::rest::app;
use axum::Router;
use bookshelf_core::clocks::testutils::SettableClock;
use bookshelf_core::db::DbError;
use std::sync::Arc;

/// State of a running test.
pub(crate) struct TestContext {
    /// The store backing the app, for out-of-band inspection of the data.
    store: Arc<SqliteBookStore>,

    /// The clock that stamps new books.
    clock: Arc<SettableClock>,

    /// The app under test.
    app: Router,
}

impl TestContext {
    pub(crate) async fn setup() -> Self {
        let (store, clock) = testutils::setup().await;
        let store = Arc::new(store);
        let app = app(Driver::new(store.clone()));
        Self { store, clock, app }
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Creates a book identified by `isbn` with fixed contents directly in the store.
    pub(crate) async fn insert_book(&self, isbn: &str) -> Book {
        let book = NewBook::new(
            Title::from("The Left Hand of Darkness"),
            Author::from("Ursula K. Le Guin"),
            Isbn::new(isbn).unwrap(),
        )
        .with_published_year(1969);
        self.store.insert(book).await.unwrap()
    }

    /// Gets the book identified by `isbn` from the store, if it exists.
    pub(crate) async fn get_book(&self, isbn: &str) -> Option<Book> {
        match self.store.find_by_isbn(&Isbn::new(isbn).unwrap()).await {
            Ok(book) => Some(book),
            Err(DbError::NotFound) => None,
            Err(e) => panic!("{:?}", e),
        }
    }

    /// Gets all books from the store.
    pub(crate) async fn list_books(&self) -> Vec<Book> {
        self.store.list_all().await.unwrap()
    }

    /// Deletes the book identified by `isbn` directly from the store.
    pub(crate) async fn delete_book(&self, isbn: &str) {
        self.store.delete_by_isbn(&Isbn::new(isbn).unwrap()).await.unwrap()
    }

    /// Shuts down the store so that further requests fail.
    pub(crate) async fn close_store(&self) {
        self.store.close().await
    }
}
