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

//! Implementation of the Book Store using SQLite.

use crate::db::BookStore;
use crate::model::{Author, Book, BookPatch, Isbn, NewBook, Title};
use bookshelf_core::clocks::Clock;
use bookshelf_core::db::sqlite::{
    build_timestamp, map_sqlx_error, run_schema, unpack_timestamp, SqliteDb,
};
use bookshelf_core::db::{DbError, DbResult};
use futures::TryStreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// Schema to use to initialize the database.
const SCHEMA: &str = include_str!("sqlite.sql");

/// Columns that make up a `Book`, in the order expected by `TryFrom<SqliteRow>`.
const BOOK_COLUMNS: &str =
    "title, author, isbn, published_year, available, created_at_secs, created_at_nsecs";

impl TryFrom<SqliteRow> for Book {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let title: String = row.try_get("title").map_err(map_sqlx_error)?;
        let author: String = row.try_get("author").map_err(map_sqlx_error)?;
        let isbn: String = row.try_get("isbn").map_err(map_sqlx_error)?;
        let published_year: Option<i32> = row.try_get("published_year").map_err(map_sqlx_error)?;
        let available: bool = row.try_get("available").map_err(map_sqlx_error)?;
        let created_at_secs: i64 = row.try_get("created_at_secs").map_err(map_sqlx_error)?;
        let created_at_nsecs: i64 = row.try_get("created_at_nsecs").map_err(map_sqlx_error)?;

        Ok(Book::new(
            Title::new(title)?,
            Author::new(author)?,
            Isbn::new(isbn)?,
            published_year,
            available,
            build_timestamp(created_at_secs, created_at_nsecs)?,
        ))
    }
}

/// A book store backed by an SQLite database.
pub struct SqliteBookStore {
    /// Connection to the database.
    db: SqliteDb,

    /// Clock used to stamp the creation time of new books.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SqliteBookStore {
    /// Opens the database at `conn_str` and initializes its schema if necessary.
    pub async fn connect(conn_str: &str, clock: Arc<dyn Clock + Send + Sync>) -> DbResult<Self> {
        let db = SqliteDb::connect(conn_str).await?;
        if let Err(e) = run_schema(&db, SCHEMA).await {
            db.close().await;
            return Err(e);
        }
        Ok(Self { db, clock })
    }
}

#[async_trait::async_trait]
impl BookStore for SqliteBookStore {
    async fn insert(&self, book: NewBook) -> DbResult<Book> {
        let book = book.into_book(self.clock.now_utc());
        let (created_at_secs, created_at_nsecs) = unpack_timestamp(*book.created_at())?;

        let query_str = "
            INSERT INTO books
                (title, author, isbn, published_year, available,
                created_at_secs, created_at_nsecs)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        ";
        let done = sqlx::query(query_str)
            .bind(book.title().as_str())
            .bind(book.author().as_str())
            .bind(book.isbn().as_str())
            .bind(*book.published_year())
            .bind(*book.available())
            .bind(created_at_secs)
            .bind(created_at_nsecs)
            .execute(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        if done.rows_affected() != 1 {
            return Err(DbError::BackendError("Insertion affected more than one row".to_owned()));
        }
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &Isbn) -> DbResult<Book> {
        let query_str = format!("SELECT {} FROM books WHERE isbn = ?", BOOK_COLUMNS);
        let row = sqlx::query(&query_str)
            .bind(isbn.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        Book::try_from(row)
    }

    async fn list_all(&self) -> DbResult<Vec<Book>> {
        let query_str = format!(
            "SELECT {} FROM books ORDER BY created_at_secs, created_at_nsecs, id",
            BOOK_COLUMNS
        );
        let mut rows = sqlx::query(&query_str).fetch(self.db.pool());

        let mut books = vec![];
        while let Some(row) = rows.try_next().await.map_err(map_sqlx_error)? {
            books.push(Book::try_from(row)?);
        }
        Ok(books)
    }

    async fn update_by_isbn(&self, isbn: &Isbn, patch: &BookPatch) -> DbResult<Book> {
        let query_str = format!(
            "
            UPDATE books SET
                title = COALESCE(?, title),
                author = COALESCE(?, author),
                published_year = CASE WHEN ? THEN ? ELSE published_year END,
                available = COALESCE(?, available)
            WHERE isbn = ?
            RETURNING {}
        ",
            BOOK_COLUMNS
        );
        let maybe_row = sqlx::query(&query_str)
            .bind(patch.title().map(Title::as_str))
            .bind(patch.author().map(Author::as_str))
            .bind(patch.published_year().is_some())
            .bind(patch.published_year().flatten())
            .bind(patch.available())
            .bind(isbn.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        match maybe_row {
            None => Err(DbError::NotFound),
            Some(row) => Book::try_from(row),
        }
    }

    async fn delete_by_isbn(&self, isbn: &Isbn) -> DbResult<()> {
        let query_str = "DELETE FROM books WHERE isbn = ?";
        let done = sqlx::query(query_str)
            .bind(isbn.as_str())
            .execute(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        match done.rows_affected() {
            0 => Err(DbError::NotFound),
            1 => Ok(()),
            _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
        }
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
