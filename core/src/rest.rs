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

//! Generic code for REST handlers.
//!
//! All services should implement an `app` function in this module that returns the `Router` for the
//! application.
//!
//! Every API should be put in its own `.rs` file, using a name like `<entity>_<method>.rs`.  This
//! may seem overkill, but putting every API in its own file makes it easy to ensure all the
//! integration tests for the given API truly belong to that API.
//!
//! More specifically, the `tests` module within an API should define a `route` method that
//! returns the HTTP method and the API path under test.  All integration tests within the module
//! then rely on `route` to obtain this information, ensuring that they all test the desired API.
//!
//! Every response, successful or not, is wrapped in an `Envelope`.  Handlers return
//! `Envelope::data` or `Envelope::message` on success and a `RestError` on failure, and the
//! extractors in this module make sure that request rejections also take the envelope shape.

use crate::driver::DriverError;
use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::Json;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Machine-readable classification of a failed request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was malformed or carried invalid values.
    Validation,

    /// The request tried to create an entity whose key is already taken.
    DuplicateKey,

    /// The entity targeted by the request does not exist.
    NotFound,

    /// The backing store could not be reached.
    StoreUnavailable,

    /// Something unexpected happened while processing the request.
    Internal,
}

/// The single response shape used by all APIs.
///
/// Successful responses set `success` and carry either `data` or a `message`.  Failed responses
/// clear `success` and carry both `error` and `message`.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub success: bool,

    /// The payload of a successful operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// The classification of a failed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,

    /// Human-readable details about the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Wraps the payload of a successful operation.
    pub fn data(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: None }
    }
}

impl Envelope<()> {
    /// Reports the success of an operation that has no payload.
    pub fn message<M: Into<String>>(message: M) -> Self {
        Self { success: true, data: None, error: None, message: Some(message.into()) }
    }

    /// Reports the failure of an operation.
    pub fn error<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        Self { success: false, data: None, error: Some(kind), message: Some(message.into()) }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

/// Frontend errors.  These are the errors that are visible to the user on failed requests.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RestError {
    /// Indicates that a request to create an entity failed because its key is taken.
    #[error("{0}")]
    AlreadyExists(String),

    /// Catch-all error type for all unexpected errors.
    #[error("{0}")]
    InternalError(String),

    /// Indicates an error in the contents of the request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Indicates that the path exists but does not accept the request's method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Indicates that a requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Indicates that a request that should have empty content did not.
    #[error("Content should be empty")]
    PayloadNotEmpty,

    /// Indicates that the backing store cannot be reached.
    #[error("{0}")]
    Unavailable(String),
}

impl RestError {
    /// Returns the HTTP status code and the envelope classification of this error.
    fn classify(&self) -> (http::StatusCode, ErrorKind) {
        match self {
            RestError::AlreadyExists(_) => (http::StatusCode::CONFLICT, ErrorKind::DuplicateKey),
            RestError::InternalError(_) => {
                (http::StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal)
            }
            RestError::InvalidRequest(_) => (http::StatusCode::BAD_REQUEST, ErrorKind::Validation),
            RestError::MethodNotAllowed => {
                (http::StatusCode::METHOD_NOT_ALLOWED, ErrorKind::Validation)
            }
            RestError::NotFound(_) => (http::StatusCode::NOT_FOUND, ErrorKind::NotFound),
            RestError::PayloadNotEmpty => {
                (http::StatusCode::PAYLOAD_TOO_LARGE, ErrorKind::Validation)
            }
            RestError::Unavailable(_) => {
                (http::StatusCode::SERVICE_UNAVAILABLE, ErrorKind::StoreUnavailable)
            }
        }
    }
}

impl From<DriverError> for RestError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::AlreadyExists(_) => RestError::AlreadyExists(e.to_string()),
            DriverError::BackendError(_) => RestError::InternalError(e.to_string()),
            DriverError::InvalidInput(_) => RestError::InvalidRequest(e.to_string()),
            DriverError::NotFound(_) => RestError::NotFound(e.to_string()),
            DriverError::Unavailable(_) => RestError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind) = self.classify();
        if matches!(kind, ErrorKind::Internal | ErrorKind::StoreUnavailable) {
            warn!("Request failed with status {}: {}", status, self);
        }

        (status, Envelope::error(kind, self.to_string())).into_response()
    }
}

/// Result type for this module.
pub type RestResult<T> = Result<T, RestError>;

/// Handler for requests that do not match any route.
pub async fn fallback() -> RestError {
    RestError::NotFound("No such API".to_owned())
}

/// Handler for requests whose path matches a route that lacks a handler for their method.
pub async fn method_not_allowed() -> RestError {
    RestError::MethodNotAllowed
}

/// A request body extractor that forbids any content.
///
/// Any API that doesn't expect a body should use this to ensure we don't get garbage data that we
/// don't care about.  This future-proofs the service.
pub struct EmptyBody {}

#[async_trait]
impl<S> FromRequest<S> for EmptyBody
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.into_body().is_end_stream() {
            Ok(EmptyBody {})
        } else {
            Err(RestError::PayloadNotEmpty)
        }
    }
}

/// A request body extractor that parses JSON into `T`.
///
/// This behaves like `axum::Json` except that all rejections (wrong content type, syntax errors,
/// and values that `T` refuses to deserialize) are reported as `RestError::InvalidRequest` so
/// that they reach the client inside the response envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(RestError::InvalidRequest(rejection.body_text())),
        }
    }
}

/// A path parameter extractor that parses the captured segments into `T`.
///
/// This behaves like `axum::extract::Path` except that rejections are reported as
/// `RestError::InvalidRequest` so that they reach the client inside the response envelope.
pub struct PathParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => Err(RestError::InvalidRequest(rejection.body_text())),
        }
    }
}

/// Common test code for the REST server.
#[cfg(feature = "testutils")]
pub mod testutils {
    use super::*;
    use axum::http::{self, HeaderName, HeaderValue};
    use axum::Router;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use tower::util::ServiceExt;

    /// Maximum body size for testing purposes.
    const MAX_BODY_SIZE: usize = 64 * 1024;

    /// Builder for a single request to the API server.
    #[must_use]
    pub struct OneShotBuilder {
        /// The router for the app being tested.
        app: Router,

        /// Builder for the request that will be sent to the app.
        builder: axum::http::request::Builder,
    }

    impl OneShotBuilder {
        /// Creates a new request against a given `method`/`uri` pair served by an `app` router.
        pub fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
            let builder = http::Request::builder().method(method).uri(uri.as_ref());
            Self { app, builder }
        }

        /// Sets the header `name` to `value` in the outgoing request.
        pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
        where
            HeaderName: TryFrom<K>,
            <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
            HeaderValue: TryFrom<V>,
            <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
        {
            self.builder = self.builder.header(name, value);
            self
        }

        /// Finishes building the request and sends it with an empty payload.
        pub async fn send_empty(self) -> ResponseChecker {
            let request = self.builder.body(axum::body::Body::empty()).unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a text payload.
        pub async fn send_text<T: Into<String>>(self, text: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref())
                .body(axum::body::Body::from(text.into()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a JSON payload.
        pub async fn send_json<T: Serialize>(self, request: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(axum::body::Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }
    }

    /// Type alias for the complex type returned by the `oneshot` function.
    type HttpResponse = hyper::Response<axum::body::Body>;

    /// Validator for the outcome of a request sent by a `OneShotBuilder`.
    #[must_use]
    pub struct ResponseChecker {
        /// Actual response that we received from the app.
        response: HttpResponse,

        /// Expected HTTP status code in the response above.
        exp_status: http::StatusCode,
    }

    impl From<HttpResponse> for ResponseChecker {
        fn from(response: HttpResponse) -> Self {
            Self { response, exp_status: http::StatusCode::OK }
        }
    }

    impl ResponseChecker {
        /// Sets the expected exit HTTP status to `status`.
        pub fn expect_status(mut self, status: http::StatusCode) -> Self {
            self.exp_status = status;
            self
        }

        /// Returns the HTTP status of the response without validating it.
        pub fn status(&self) -> http::StatusCode {
            self.response.status()
        }

        /// Performs common validation operations on the response.
        pub fn verify(&self) {
            assert_eq!(self.exp_status, self.response.status());
        }

        /// Reads the body of the response and parses it as an envelope carrying a `T`.
        async fn take_envelope<T: DeserializeOwned>(self) -> Envelope<T> {
            self.verify();

            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            match serde_json::from_slice::<Envelope<T>>(&body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    let body = String::from_utf8(body.to_vec()).unwrap();
                    panic!("Invalid envelope due to {}; content was {}", e, body);
                }
            }
        }

        /// Finishes checking the response and expects it to be a successful envelope carrying a
        /// valid JSON object of type `T`.
        pub async fn expect_data<T: DeserializeOwned>(self) -> T {
            let envelope = self.take_envelope::<T>().await;
            assert!(envelope.success, "Envelope does not report success");
            assert_eq!(None, envelope.error);
            envelope.data.expect("Envelope has no data")
        }

        /// Finishes checking the response and expects it to be a successful envelope without
        /// data and with a message that matches `exp_re`.
        pub async fn expect_message(self, exp_re: &str) {
            let envelope = self.take_envelope::<serde_json::Value>().await;
            assert!(envelope.success, "Envelope does not report success");
            assert_eq!(None, envelope.data);
            let message = envelope.message.expect("Envelope has no message");
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(re.is_match(&message), "Message '{}' does not match re '{}'", message, exp_re);
        }

        /// Finishes checking the response and expects it to be a failed envelope of the given
        /// `kind` whose message matches `exp_re`.
        pub async fn expect_error(self, kind: ErrorKind, exp_re: &str) {
            let envelope = self.take_envelope::<serde_json::Value>().await;
            assert!(!envelope.success, "Envelope reports success");
            assert_eq!(None, envelope.data);
            assert_eq!(Some(kind), envelope.error);
            let message = envelope.message.expect("Envelope has no message");
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(re.is_match(&message), "Message '{}' does not match re '{}'", message, exp_re);
        }

        /// Finishes checking the response and returns the response itself for out of band
        /// validation of properties not supported by the `ResponseChecker`.
        pub async fn take_response(self) -> HttpResponse {
            self.verify();

            self.response
        }
    }

    /// Generates a test to verify that an API that expects JSON fails when it gets something else.
    #[macro_export]
    macro_rules! test_payload_must_be_json {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_json() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_error($crate::rest::ErrorKind::Validation, "Content-Type")
                    .await;

                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .with_header(axum::http::header::CONTENT_TYPE, "application/json")
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_error($crate::rest::ErrorKind::Validation, "expected ident")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_json;

    /// Generates a test to verify that an API that does not expect a payload fails as necessary.
    #[macro_export]
    macro_rules! test_payload_must_be_empty {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_empty() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .send_text("should not be here")
                    .await
                    .expect_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                    .expect_error($crate::rest::ErrorKind::Validation, "should be empty")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_empty;
}
