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

//! Operations on the whole collection of books.

use crate::driver::{book_error, Driver};
use crate::model::{Book, NewBook};
use bookshelf_core::driver::DriverResult;
use log::info;

impl Driver {
    /// Adds `book` to the catalog and returns it as persisted.
    pub(crate) async fn create_book(self, book: NewBook) -> DriverResult<Book> {
        let isbn = book.isbn().clone();
        let book = self.store.insert(book).await.map_err(|e| book_error(&isbn, e))?;
        info!("Created book {}", isbn.as_str());
        Ok(book)
    }

    /// Gets all books in the catalog in insertion order.
    pub(crate) async fn list_books(self) -> DriverResult<Vec<Book>> {
        let books = self.store.list_all().await?;
        Ok(books)
    }
}
