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

//! Implementation of the Book Store using PostgreSQL.

use crate::db::BookStore;
use crate::model::{Author, Book, BookPatch, Isbn, NewBook, Title};
use bookshelf_core::clocks::Clock;
use bookshelf_core::db::postgres::{map_sqlx_error, run_schema, PostgresDb, PostgresOptions};
use bookshelf_core::db::{DbError, DbResult};
use futures::TryStreamExt;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;
use time::OffsetDateTime;

/// Schema to use to initialize the database.
const SCHEMA: &str = include_str!("postgres.sql");

/// Columns that make up a `Book`, in the order expected by `TryFrom<PgRow>`.
const BOOK_COLUMNS: &str = "title, author, isbn, published_year, available, created_at";

impl TryFrom<PgRow> for Book {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let title: String = row.try_get("title").map_err(map_sqlx_error)?;
        let author: String = row.try_get("author").map_err(map_sqlx_error)?;
        let isbn: String = row.try_get("isbn").map_err(map_sqlx_error)?;
        let published_year: Option<i32> = row.try_get("published_year").map_err(map_sqlx_error)?;
        let available: bool = row.try_get("available").map_err(map_sqlx_error)?;
        let created_at: OffsetDateTime = row.try_get("created_at").map_err(map_sqlx_error)?;

        Ok(Book::new(
            Title::new(title)?,
            Author::new(author)?,
            Isbn::new(isbn)?,
            published_year,
            available,
            created_at,
        ))
    }
}

/// A book store backed by a PostgreSQL server.
pub struct PostgresBookStore {
    /// Connection pool to the server.
    db: PostgresDb,

    /// Clock used to stamp the creation time of new books.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl PostgresBookStore {
    /// Sets up a connection pool to the server described by `opts` and initializes the schema if
    /// necessary.
    pub async fn connect(
        opts: PostgresOptions,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> DbResult<Self> {
        Self::attach(PostgresDb::connect(opts)?, clock).await
    }

    /// Wraps an existing connection pool `db`, initializing the schema if necessary.
    async fn attach(db: PostgresDb, clock: Arc<dyn Clock + Send + Sync>) -> DbResult<Self> {
        if let Err(e) = run_schema(&db, SCHEMA).await {
            db.close().await;
            return Err(e);
        }
        Ok(Self { db, clock })
    }
}

#[async_trait::async_trait]
impl BookStore for PostgresBookStore {
    async fn insert(&self, book: NewBook) -> DbResult<Book> {
        let book = book.into_book(self.clock.now_utc());

        let query_str = "
            INSERT INTO books (title, author, isbn, published_year, available, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let done = sqlx::query(query_str)
            .bind(book.title().as_str())
            .bind(book.author().as_str())
            .bind(book.isbn().as_str())
            .bind(*book.published_year())
            .bind(*book.available())
            .bind(*book.created_at())
            .execute(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        if done.rows_affected() != 1 {
            return Err(DbError::BackendError("Insertion affected more than one row".to_owned()));
        }
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &Isbn) -> DbResult<Book> {
        let query_str = format!("SELECT {} FROM books WHERE isbn = $1", BOOK_COLUMNS);
        let row = sqlx::query(&query_str)
            .bind(isbn.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(map_sqlx_error)?;
        Book::try_from(row)
    }

    async fn list_all(&self) -> DbResult<Vec<Book>> {
        let query_str = format!("SELECT {} FROM books ORDER BY created_at, id", BOOK_COLUMNS);
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
                title = COALESCE($1, title),
                author = COALESCE($2, author),
                published_year = CASE WHEN $3 THEN $4 ELSE published_year END,
                available = COALESCE($5, available)
            WHERE isbn = $6
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
        let query_str = "DELETE FROM books WHERE isbn = $1";
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::generate_db_tests;
    use bookshelf_core::clocks::testutils::SettableClock;
    use time::macros::datetime;

    /// Connects to the test server and prepares a book store with a private schema.
    async fn setup() -> (PostgresBookStore, Arc<SettableClock>) {
        let clock = Arc::new(SettableClock::new(datetime!(2023-12-01 05:50:20 UTC)));
        let db = bookshelf_core::db::postgres::testutils::setup().await;
        let store = PostgresBookStore::attach(db, clock.clone()).await.unwrap();
        (store, clock)
    }

    generate_db_tests!(
        setup().await,
        #[ignore = "Requires environment configuration and is expensive"]
    );
}
