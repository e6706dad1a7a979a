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

//! High-level data types.

use bookshelf_core::model::{require_text, ModelError, ModelResult};
use derive_getters::Getters;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Generates a newtype over a string that must contain at least one non-whitespace character.
///
/// The contents are kept byte-for-byte as given: no trimming and no case folding.
macro_rules! required_text [
    ( $(#[$meta:meta])* $name:ident, $field:literal ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new value from an untrusted string `s`, making sure it is valid.
            pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
                require_text($field, s).map(Self)
            }

            /// Returns a string view of the value.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        #[cfg(test)]
        impl From<&'static str> for $name {
            /// Creates a new value from a hardcoded string, which must be valid.
            fn from(s: &'static str) -> Self {
                Self::new(s).expect("Hardcoded values must be valid")
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                /// A deserialization visitor for the enclosing type.
                struct TextVisitor;

                impl Visitor<'_> for TextVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        formatter.write_str("a string")
                    }

                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        $name::new(v).map_err(|e| E::custom(e.to_string()))
                    }

                    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        $name::new(v).map_err(|e| E::custom(e.to_string()))
                    }
                }

                deserializer.deserialize_string(TextVisitor)
            }
        }
    }
];

required_text!(
    /// The natural key of a book.  Compared byte-exactly.
    Isbn,
    "ISBN"
);

required_text!(
    /// The title of a book.
    Title,
    "Title"
);

required_text!(
    /// The author of a book.
    Author,
    "Author"
);

/// Deserializes a field that is present in the input, even if its value is `null`.
///
/// Combined with `#[serde(default)]`, this lets an `Option<T>` field distinguish between a key
/// that was omitted (`None`) and a key that was given (`Some`), which partial updates need.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Returns the loan state of books created without an explicit value.
fn default_available() -> bool {
    true
}

/// A book record as held by the store.
#[derive(Clone, Debug, Getters, PartialEq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// The book's title.
    title: Title,

    /// The book's author.
    author: Author,

    /// The book's unique identifier.
    isbn: Isbn,

    /// The year in which the book was published, if known.
    published_year: Option<i32>,

    /// Whether the book is on the shelf or out on loan.
    available: bool,

    /// When the record was created.  Set once by the store.
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl Book {
    /// Reassembles a book from its stored parts.
    pub(crate) fn new(
        title: Title,
        author: Author,
        isbn: Isbn,
        published_year: Option<i32>,
        available: bool,
        created_at: OffsetDateTime,
    ) -> Self {
        Self { title, author, isbn, published_year, available, created_at }
    }
}

/// A request to create a new book.
///
/// Unknown fields are rejected, which includes `createdAt` because only the store assigns it.
#[derive(Debug, Deserialize, Getters)]
#[cfg_attr(test, derive(Clone, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewBook {
    /// The book's title.
    title: Title,

    /// The book's author.
    author: Author,

    /// The book's unique identifier.
    isbn: Isbn,

    /// The year in which the book was published, if known.
    #[serde(default)]
    published_year: Option<i32>,

    /// Initial loan state.
    #[serde(default = "default_available")]
    available: bool,
}

impl NewBook {
    /// Creates a new available book with no publication year.
    pub fn new(title: Title, author: Author, isbn: Isbn) -> Self {
        Self { title, author, isbn, published_year: None, available: default_available() }
    }

    /// Sets the publication year.
    pub fn with_published_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    /// Sets the initial loan state.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Turns this request into a full record stamped with `created_at`.
    pub(crate) fn into_book(self, created_at: OffsetDateTime) -> Book {
        Book::new(
            self.title,
            self.author,
            self.isbn,
            self.published_year,
            self.available,
            created_at,
        )
    }
}

/// A partial update to an existing book.  Fields that are `None` are left untouched.
///
/// `isbn` and `createdAt` are accepted by the parser only so that `validate` can reject attempts
/// to modify them with a meaningful message.
#[derive(Debug, Default, Deserialize)]
#[cfg_attr(test, derive(Clone, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BookPatch {
    /// New title.
    #[serde(default, deserialize_with = "deserialize_present")]
    title: Option<Title>,

    /// New author.
    #[serde(default, deserialize_with = "deserialize_present")]
    author: Option<Author>,

    /// New publication year, where `Some(None)` clears it.
    #[serde(default, deserialize_with = "deserialize_present")]
    published_year: Option<Option<i32>>,

    /// New loan state.
    #[serde(default, deserialize_with = "deserialize_present")]
    available: Option<bool>,

    /// Identity of the record, which can only be restated.
    #[serde(default, deserialize_with = "deserialize_present")]
    isbn: Option<Isbn>,

    /// Creation time of the record, which can never be given.
    #[serde(default, deserialize_with = "deserialize_present")]
    created_at: Option<serde_json::Value>,
}

impl BookPatch {
    /// Sets the new title.
    pub fn with_title(mut self, title: Title) -> Self {
        self.title = Some(title);
        self
    }

    /// Sets the new author.
    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    /// Sets the new publication year, or clears it with `None`.
    pub fn with_published_year(mut self, year: Option<i32>) -> Self {
        self.published_year = Some(year);
        self
    }

    /// Sets the new loan state.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = Some(available);
        self
    }

    /// Restates the identity of the record being updated.
    #[cfg(test)]
    pub(crate) fn with_isbn(mut self, isbn: Isbn) -> Self {
        self.isbn = Some(isbn);
        self
    }

    /// Ensures that applying this patch to the record identified by `isbn` does not touch any of
    /// the fields that are immutable after creation.
    pub fn validate(&self, isbn: &Isbn) -> ModelResult<()> {
        if let Some(new_isbn) = &self.isbn {
            if new_isbn != isbn {
                return Err(ModelError(format!(
                    "ISBN cannot be changed from '{}' to '{}'",
                    isbn.as_str(),
                    new_isbn.as_str()
                )));
            }
        }
        if self.created_at.is_some() {
            return Err(ModelError("createdAt cannot be changed".to_owned()));
        }
        Ok(())
    }

    /// Returns the new title, if any.
    pub fn title(&self) -> Option<&Title> {
        self.title.as_ref()
    }

    /// Returns the new author, if any.
    pub fn author(&self) -> Option<&Author> {
        self.author.as_ref()
    }

    /// Returns the new publication year, if any, where `Some(None)` clears it.
    pub fn published_year(&self) -> Option<Option<i32>> {
        self.published_year
    }

    /// Returns the new loan state, if any.
    pub fn available(&self) -> Option<bool> {
        self.available
    }

    /// Applies this patch to `book` in memory.
    #[cfg(test)]
    pub(crate) fn apply(&self, book: Book) -> Book {
        Book {
            title: self.title.clone().unwrap_or(book.title),
            author: self.author.clone().unwrap_or(book.author),
            published_year: self.published_year.unwrap_or(book.published_year),
            available: self.available.unwrap_or(book.available),
            ..book
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{assert_de_tokens_error, assert_tokens, Token};
    use time::macros::datetime;

    #[test]
    fn test_required_text_ok() {
        assert_eq!("978-0441013593", Isbn::new("978-0441013593").unwrap().as_str());
        assert_eq!(" Dune ", Title::new(" Dune ").unwrap().as_str());
        assert_eq!("Herbert", Author::new("Herbert").unwrap().as_str());
    }

    #[test]
    fn test_required_text_error() {
        assert_eq!(ModelError("ISBN cannot be empty".to_owned()), Isbn::new("").unwrap_err());
        assert_eq!(ModelError("Title cannot be empty".to_owned()), Title::new("  ").unwrap_err());
        assert_eq!(ModelError("Author cannot be empty".to_owned()), Author::new("\t").unwrap_err());
        assert_eq!(
            ModelError("Title cannot contain NUL characters".to_owned()),
            Title::new("a\0b").unwrap_err()
        );
    }

    #[test]
    fn test_isbn_is_byte_exact() {
        assert_ne!(Isbn::from("978-0441013593"), Isbn::from("9780441013593"));
        assert_ne!(Isbn::from("isbn-x"), Isbn::from("ISBN-X"));
    }

    #[test]
    fn test_isbn_ser_de_ok() {
        assert_tokens(&Isbn::from("978-0441013593"), &[Token::Str("978-0441013593")]);
    }

    #[test]
    fn test_title_de_error() {
        assert_de_tokens_error::<Title>(&[Token::Str("")], "Title cannot be empty");
    }

    #[test]
    fn test_book_serialization() {
        let book = Book::new(
            Title::from("Dune"),
            Author::from("Herbert"),
            Isbn::from("978-0441013593"),
            Some(1965),
            true,
            datetime!(2023-12-01 10:15:00.5 UTC),
        );
        assert_eq!(
            serde_json::json!({
                "title": "Dune",
                "author": "Herbert",
                "isbn": "978-0441013593",
                "publishedYear": 1965,
                "available": true,
                "createdAt": "2023-12-01T10:15:00.5Z",
            }),
            serde_json::to_value(&book).unwrap()
        );
    }

    #[test]
    fn test_new_book_defaults() {
        let book: NewBook = serde_json::from_value(serde_json::json!({
            "title": "Dune",
            "author": "Herbert",
            "isbn": "978-0441013593",
        }))
        .unwrap();
        assert_eq!(
            NewBook::new(Title::from("Dune"), Author::from("Herbert"), Isbn::from("978-0441013593")),
            book
        );
        assert!(*book.available());
        assert_eq!(&None, book.published_year());
    }

    #[test]
    fn test_new_book_all_fields() {
        let book: NewBook = serde_json::from_value(serde_json::json!({
            "title": "Dune",
            "author": "Herbert",
            "isbn": "978-0441013593",
            "publishedYear": 1965,
            "available": false,
        }))
        .unwrap();
        assert_eq!(
            NewBook::new(Title::from("Dune"), Author::from("Herbert"), Isbn::from("978-0441013593"))
                .with_published_year(1965)
                .with_available(false),
            book
        );
    }

    #[test]
    fn test_new_book_errors() {
        for (json, exp_error) in [
            (serde_json::json!({"author": "a", "isbn": "i"}), "missing field `title`"),
            (serde_json::json!({"title": "t", "isbn": "i"}), "missing field `author`"),
            (serde_json::json!({"title": "t", "author": "a"}), "missing field `isbn`"),
            (serde_json::json!({"title": "", "author": "a", "isbn": "i"}), "Title cannot be empty"),
            (serde_json::json!({"title": "t", "author": "a", "isbn": " "}), "ISBN cannot be empty"),
            (
                serde_json::json!({"title": "t", "author": "a", "isbn": "i", "publishedYear": "x"}),
                "invalid type",
            ),
            (
                serde_json::json!({"title": "t", "author": "a", "isbn": "i", "createdAt": "now"}),
                "unknown field `createdAt`",
            ),
            (
                serde_json::json!({"title": "t", "author": "a", "isbn": "i", "pages": 3}),
                "unknown field `pages`",
            ),
        ] {
            let err = serde_json::from_value::<NewBook>(json).unwrap_err().to_string();
            assert!(err.contains(exp_error), "Error '{}' does not contain '{}'", err, exp_error);
        }
    }

    #[test]
    fn test_new_book_into_book() {
        let created_at = datetime!(2023-12-01 10:15:00 UTC);
        let book = NewBook::new(Title::from("t"), Author::from("a"), Isbn::from("i"))
            .with_published_year(2000)
            .into_book(created_at);
        assert_eq!(
            Book::new(
                Title::from("t"),
                Author::from("a"),
                Isbn::from("i"),
                Some(2000),
                true,
                created_at
            ),
            book
        );
    }

    #[test]
    fn test_book_patch_absent_vs_null() {
        let patch: BookPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(BookPatch::default(), patch);

        let patch: BookPatch =
            serde_json::from_value(serde_json::json!({"publishedYear": null})).unwrap();
        assert_eq!(Some(None), patch.published_year());

        let patch: BookPatch =
            serde_json::from_value(serde_json::json!({"publishedYear": 1999, "available": false}))
                .unwrap();
        assert_eq!(Some(Some(1999)), patch.published_year());
        assert_eq!(Some(false), patch.available());
        assert_eq!(None, patch.title());
    }

    #[test]
    fn test_book_patch_errors() {
        for (json, exp_error) in [
            (serde_json::json!({"title": null}), "invalid type: null"),
            (serde_json::json!({"author": ""}), "Author cannot be empty"),
            (serde_json::json!({"available": null}), "invalid type: null"),
            (serde_json::json!({"available": "yes"}), "invalid type"),
            (serde_json::json!({"shelf": 3}), "unknown field `shelf`"),
        ] {
            let err = serde_json::from_value::<BookPatch>(json).unwrap_err().to_string();
            assert!(err.contains(exp_error), "Error '{}' does not contain '{}'", err, exp_error);
        }
    }

    #[test]
    fn test_book_patch_validate_identity() {
        let isbn = Isbn::from("978-0441013593");

        BookPatch::default().validate(&isbn).unwrap();
        BookPatch::default().with_isbn(isbn.clone()).validate(&isbn).unwrap();

        assert_eq!(
            ModelError("ISBN cannot be changed from '978-0441013593' to 'other'".to_owned()),
            BookPatch::default().with_isbn(Isbn::from("other")).validate(&isbn).unwrap_err()
        );

        for json in [
            serde_json::json!({"createdAt": "2023-12-01T10:15:00Z"}),
            serde_json::json!({"createdAt": null}),
        ] {
            let patch: BookPatch = serde_json::from_value(json).unwrap();
            assert_eq!(
                ModelError("createdAt cannot be changed".to_owned()),
                patch.validate(&isbn).unwrap_err()
            );
        }
    }

    #[test]
    fn test_book_patch_apply() {
        let book = Book::new(
            Title::from("t"),
            Author::from("a"),
            Isbn::from("i"),
            Some(2000),
            true,
            datetime!(2023-12-01 10:15:00 UTC),
        );

        assert_eq!(book, BookPatch::default().apply(book.clone()));

        let patched =
            BookPatch::default().with_available(false).with_published_year(None).apply(book.clone());
        assert_eq!(
            Book::new(
                Title::from("t"),
                Author::from("a"),
                Isbn::from("i"),
                None,
                false,
                datetime!(2023-12-01 10:15:00 UTC),
            ),
            patched
        );
    }
}
