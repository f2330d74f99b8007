//! Request-scoped correlation identifiers.
//!
//! Every inbound request gets exactly one correlation id at the edge: either
//! the value the caller already sent in the `bank-correlation-id` header, or
//! a freshly generated UUID. The id is carried by value through every call
//! boundary for the lifetime of the request and echoed on the final response;
//! there is no ambient/thread-local context.
use http::{HeaderMap, HeaderValue};
use uuid::Uuid;

/// Transport header used to propagate the correlation id across services.
pub const CORRELATION_HEADER: &str = "bank-correlation-id";

/// Immutable trace identifier for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    id: String,
}

impl CorrelationContext {
    /// Generate a fresh random identifier. Called at most once per request.
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the id from inbound headers, if the caller supplied one.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(CORRELATION_HEADER)?.to_str().ok()?;
        if value.is_empty() {
            return None;
        }
        Some(Self {
            id: value.to_string(),
        })
    }

    /// Extract-or-generate at the edge. Returns the context and whether a new
    /// id had to be minted.
    pub fn extract_or_generate(headers: &HeaderMap) -> (Self, bool) {
        match Self::from_headers(headers) {
            Some(ctx) => {
                tracing::debug!(correlation_id = %ctx.id, "correlation id found on inbound request");
                (ctx, false)
            }
            None => {
                let ctx = Self::generate();
                tracing::debug!(correlation_id = %ctx.id, "correlation id generated at the edge");
                (ctx, true)
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Header value for outbound propagation and the response echo.
    pub fn header_value(&self) -> HeaderValue {
        // Inbound values pass through to_str() so this only fails for a
        // value we generated ourselves, which is always a plain UUID.
        HeaderValue::from_str(&self.id).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl From<&str> for CorrelationContext {
    fn from(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}
