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

//! Catalog service for physical book records.
//!
//! Books are identified by their ISBN and carry an availability flag that models their loan
//! state.  The service offers operations to create, list, look up, update, and delete books over
//! a REST API.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use crate::db::BookStore;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use bookshelf_core::clocks::SystemClock;
#[cfg(feature = "postgres")]
use bookshelf_core::db::postgres::PostgresOptions;
use bookshelf_core::db::DbResult;
use bookshelf_core::env::{get_optional_var, get_required_var};
use log::{info, warn};
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod db;
pub mod driver;
use driver::Driver;
pub mod model;
mod rest;

/// Port to listen on when none is configured.
const DEFAULT_PORT: u16 = 3000;

/// Location of the books.
#[derive(Debug)]
pub enum StoreConfig {
    /// A PostgreSQL server.
    #[cfg(feature = "postgres")]
    Postgres(PostgresOptions),

    /// An SQLite database given by its connection string.
    #[cfg(any(feature = "sqlite", test))]
    Sqlite(String),
}

/// Configuration of the server.
#[derive(Debug)]
pub struct Config {
    /// Address to listen on.
    pub bind_addr: SocketAddr,

    /// Location of the books.
    pub store: StoreConfig,

    /// Origins allowed to issue cross-origin requests.  Empty disables CORS.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Creates a new set of options from environment variables whose names start with `prefix`.
    ///
    /// PostgreSQL connection details are read from the `PGSQL_PROD` variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let port = get_optional_var::<u16>(prefix, "PORT")?.unwrap_or(DEFAULT_PORT);
        let bind_all = get_optional_var::<bool>(prefix, "BIND_ALL")?.unwrap_or(false);
        let bind_addr = if bind_all {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
        } else {
            SocketAddr::from((Ipv4Addr::LOCALHOST, port))
        };

        let backend = get_optional_var::<String>(prefix, "DB")?;
        let store = match backend.as_deref().unwrap_or("postgres") {
            #[cfg(feature = "postgres")]
            "postgres" => StoreConfig::Postgres(PostgresOptions::from_env("PGSQL_PROD")?),

            #[cfg(any(feature = "sqlite", test))]
            "sqlite" => StoreConfig::Sqlite(get_required_var::<String>(prefix, "SQLITE_URL")?),

            other => {
                return Err(format!("Unsupported database type '{}' in {}_DB", other, prefix));
            }
        };

        let allowed_origins = get_optional_var::<String>(prefix, "ALLOWED_ORIGINS")?
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        Ok(Self { bind_addr, store, allowed_origins })
    }
}

/// Builds the layer that answers cross-origin requests from `origins`.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, String> {
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        let value = HeaderValue::from_str(origin)
            .map_err(|e| format!("Invalid allowed origin '{}': {}", origin, e))?;
        values.push(value);
    }

    Ok(CorsLayer::new()
        .allow_origin(values)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Creates the router for the application, wrapped in CORS handling if `allowed_origins` is not
/// empty.
fn build_app(driver: Driver, allowed_origins: &[String]) -> Result<Router, String> {
    let app = rest::app(driver);
    if allowed_origins.is_empty() {
        Ok(app)
    } else {
        Ok(app.layer(cors_layer(allowed_origins)?))
    }
}

/// Opens the store described by `config`.
async fn open_store(config: StoreConfig) -> DbResult<Arc<dyn BookStore>> {
    let clock = Arc::new(SystemClock::default());
    let store: Arc<dyn BookStore> = match config {
        #[cfg(feature = "postgres")]
        StoreConfig::Postgres(opts) => {
            Arc::new(db::postgres::PostgresBookStore::connect(opts, clock).await?)
        }

        #[cfg(any(feature = "sqlite", test))]
        StoreConfig::Sqlite(conn_str) => {
            Arc::new(db::sqlite::SqliteBookStore::connect(&conn_str, clock).await?)
        }
    };
    Ok(store)
}

/// Waits until the process is asked to terminate.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for termination signals: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Instantiates all resources to serve the application as described by `config`.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    let store = open_store(config.store).await?;

    let result = async {
        let app = build_app(Driver::new(store.clone()), &config.allowed_origins)?;
        let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
        info!("Listening on {}", config.bind_addr);
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        Ok::<(), Box<dyn Error>>(())
    }
    .await;

    store.close().await;
    result
}
