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

//! Test utilities for the business layer.

use crate::db::sqlite::{testutils, SqliteBookStore};
use crate::driver::Driver;
use bookshelf_core::clocks::testutils::SettableClock;
use std::sync::Arc;

/// State of a running test.
pub(crate) struct TestContext {
    /// The store backing the driver, for out-of-band inspection of the data.
    store: Arc<SqliteBookStore>,

    /// The clock that stamps new books.
    clock: Arc<SettableClock>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Initializes a driver backed by an in-memory store.
    pub(crate) async fn setup() -> Self {
        let (store, clock) = testutils::setup().await;
        let store = Arc::new(store);
        let driver = Driver::new(store.clone());
        Self { store, clock, driver }
    }

    /// Returns the store backing the driver.
    pub(crate) fn store(&self) -> &SqliteBookStore {
        &self.store
    }

    /// Returns the clock that stamps new books.
    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Returns a copy of the driver, ready to run one operation.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }
}
