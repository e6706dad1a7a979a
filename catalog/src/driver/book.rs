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

//! Operations on one book.

use crate::driver::{book_error, Driver};
use crate::model::{Book, BookPatch, Isbn};
use bookshelf_core::driver::DriverResult;
use log::info;

impl Driver {
    /// Deletes the book identified by `isbn`.
    pub(crate) async fn delete_book(self, isbn: &Isbn) -> DriverResult<()> {
        self.store.delete_by_isbn(isbn).await.map_err(|e| book_error(isbn, e))?;
        info!("Deleted book {}", isbn.as_str());
        Ok(())
    }

    /// Gets the book identified by `isbn`.
    pub(crate) async fn get_book(self, isbn: &Isbn) -> DriverResult<Book> {
        let book = self.store.find_by_isbn(isbn).await.map_err(|e| book_error(isbn, e))?;
        Ok(book)
    }

    /// Merges `patch` into the book identified by `isbn` and returns the result.
    pub(crate) async fn update_book(self, isbn: &Isbn, patch: BookPatch) -> DriverResult<Book> {
        patch.validate(isbn)?;
        let book =
            self.store.update_by_isbn(isbn, &patch).await.map_err(|e| book_error(isbn, e))?;
        info!("Updated book {}", isbn.as_str());
        Ok(book)
    }
}
