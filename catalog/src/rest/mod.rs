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

//! Entry point to the REST server.

use crate::driver::Driver;
use axum::Router;
use bookshelf_core::rest::{fallback, method_not_allowed};

mod book_delete;
mod book_get;
mod book_put;
mod books_get;
mod books_post;
#[cfg(test)]
mod testutils;

/// Creates the router for the application.
pub(crate) fn app(driver: Driver) -> Router {
    use axum::routing::get;
    Router::new()
        .route(
            "/api/books/:isbn",
            get(book_get::handler)
                .put(book_put::handler)
                .delete(book_delete::handler)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/books",
            get(books_get::handler).post(books_post::handler).fallback(method_not_allowed),
        )
        .fallback(fallback)
        .with_state(driver)
}

#[cfg(test)]
mod tests {
    use super::testutils::*;
    use crate::model::Book;
    use axum::http;
    use bookshelf_core::rest::testutils::*;
    use bookshelf_core::rest::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_route() {
        let context = TestContext::setup().await;

        for uri in ["/", "/api", "/api/v1/books", "/api/books/isbn-1/extra"] {
            OneShotBuilder::new(context.app(), (http::Method::GET, uri))
                .send_empty()
                .await
                .expect_status(http::StatusCode::NOT_FOUND)
                .expect_error(ErrorKind::NotFound, "No such API")
                .await;
        }
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let context = TestContext::setup().await;

        for (method, uri) in [
            (http::Method::DELETE, "/api/books"),
            (http::Method::PUT, "/api/books"),
            (http::Method::POST, "/api/books/isbn-1"),
            (http::Method::PATCH, "/api/books/isbn-1"),
        ] {
            OneShotBuilder::new(context.app(), (method, uri))
                .send_empty()
                .await
                .expect_status(http::StatusCode::METHOD_NOT_ALLOWED)
                .expect_error(ErrorKind::Validation, "Method not allowed")
                .await;
        }
    }

    #[tokio::test]
    async fn test_dune_lifecycle() {
        let context = TestContext::setup().await;
        let item = (http::Method::GET, "/api/books/978-0441013593");

        let created = OneShotBuilder::new(context.app(), (http::Method::POST, "/api/books"))
            .send_json(json!({
                "title": "Dune",
                "author": "Herbert",
                "isbn": "978-0441013593",
                "publishedYear": 1965,
            }))
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_data::<Book>()
            .await;
        assert!(*created.available());

        let fetched = OneShotBuilder::new(context.app(), item.clone())
            .send_empty()
            .await
            .expect_data::<Book>()
            .await;
        assert_eq!(created, fetched);

        let updated =
            OneShotBuilder::new(context.app(), (http::Method::PUT, "/api/books/978-0441013593"))
                .send_json(json!({"available": false}))
                .await
                .expect_data::<Book>()
                .await;
        assert!(!*updated.available());
        assert_eq!(created.title(), updated.title());
        assert_eq!(created.author(), updated.author());
        assert_eq!(created.published_year(), updated.published_year());
        assert_eq!(created.created_at(), updated.created_at());

        OneShotBuilder::new(context.app(), (http::Method::DELETE, "/api/books/978-0441013593"))
            .send_empty()
            .await
            .expect_message("Book deleted")
            .await;

        OneShotBuilder::new(context.app(), item)
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error(ErrorKind::NotFound, "978-0441013593")
            .await;
    }
}
