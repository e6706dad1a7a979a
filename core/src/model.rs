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

//! Generic types shared by the data models of all services.

/// Model errors.  These are raised when a value fails validation at construction time.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;

/// Validates that `s` contains at least one non-whitespace character and no NUL characters.
///
/// The contents are returned untouched: callers that need byte-exact storage (such as natural
/// keys) rely on this function not trimming or normalizing anything.
pub fn require_text<S: Into<String>>(field: &str, s: S) -> ModelResult<String> {
    let s = s.into();
    if s.trim().is_empty() {
        return Err(ModelError(format!("{} cannot be empty", field)));
    }
    if s.contains('\0') {
        return Err(ModelError(format!("{} cannot contain NUL characters", field)));
    }
    Ok(s)
}
