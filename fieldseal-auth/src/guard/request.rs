//! Request, context and outcome types for the guard.

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};

use super::error::Rejection;

/// An inbound request as seen by the guard: metadata plus the fully
/// buffered body.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Request path, optionally including the context prefix and a query.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Buffered body. Cloning is cheap, so it can be both inspected and
    /// replayed downstream.
    pub body: Bytes,
}

impl InboundRequest {
    /// Create a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set `Content-Type: application/json` and the body.
    #[must_use]
    pub fn with_json(self, body: impl Into<Bytes>) -> Self {
        self.with_header(CONTENT_TYPE.as_str(), "application/json")
            .with_body(body)
    }

    /// Whether the method creates or updates state (POST, PUT, PATCH).
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }

    /// Whether the declared content type is JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }
}

/// Per-request marker carried down the dispatch chain.
///
/// The guard returns a processed context with every outcome; invoking it
/// again with that context forwards without re-verifying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardContext {
    processed: bool,
}

impl GuardContext {
    /// Context for a request the guard has not seen.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Whether the guard already ran for this request.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// The context after the guard has run.
    #[must_use]
    pub fn mark_processed(self) -> Self {
        Self { processed: true }
    }
}

/// What the dispatch layer should do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Forward the request with its original body.
    PassThrough,
    /// Forward the request with this decrypted body instead.
    Decrypted(Bytes),
    /// Do not forward; answer with this rejection.
    Rejected(Rejection),
}

impl GuardOutcome {
    /// Whether the request must not reach downstream handlers.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The body to forward, given the original one, or `None` on rejection.
    #[must_use]
    pub fn forward_body(&self, original: &Bytes) -> Option<Bytes> {
        match self {
            Self::PassThrough => Some(original.clone()),
            Self::Decrypted(body) => Some(body.clone()),
            Self::Rejected(_) => None,
        }
    }
}

/// Outcome of one guard invocation together with the updated context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guarded {
    /// What to do with the request.
    pub outcome: GuardOutcome,
    /// Context to pass along with the request from here on.
    pub context: GuardContext,
}
