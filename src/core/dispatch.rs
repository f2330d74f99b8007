//! Typed RPC-style clients for the peer banking services.
//!
//! The dispatcher resolves a logical service name, POSTs the lookup key as
//! JSON, and decodes an ordered record list from the reply. Every call
//! carries the correlation id as a transport header. There is no retry here;
//! retry and degradation policy belong to the circuit breaker above. Any
//! transport failure, timeout, non-success status, or decode failure maps to
//! [`DispatchError::Unavailable`] and never yields a partially decoded
//! result.
use std::{sync::Arc, time::Duration};

use axum::body::Body as AxumBody;
use http_body_util::BodyExt;
use hyper::{Request, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::timeout;
use tracing::Instrument;

use crate::{
    core::{
        correlation::{CORRELATION_HEADER, CorrelationContext},
        model::{Card, Customer, Loan},
    },
    ports::{http_client::HttpClient, service_registry::ServiceRegistry},
};

/// Logical name of the loans peer in the service registry.
pub const LOANS_SERVICE: &str = "LOANS";
/// Logical name of the cards peer in the service registry.
pub const CARDS_SERVICE: &str = "CARDS";

#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// The peer could not be reached, timed out, answered non-success, or
    /// returned an undecodable body. Unresolved service names land here too.
    #[error("downstream service unavailable: {0}")]
    Unavailable(String),
}

/// Client for the fan-out calls issued by the aggregation handler.
pub struct Dispatcher {
    client: Arc<dyn HttpClient>,
    registry: Arc<dyn ServiceRegistry>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        registry: Arc<dyn ServiceRegistry>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            call_timeout,
        }
    }

    pub async fn fetch_loans(
        &self,
        ctx: &CorrelationContext,
        customer: &Customer,
    ) -> Result<Vec<Loan>, DispatchError> {
        self.post_list(LOANS_SERVICE, "/myLoans", ctx, customer)
            .await
    }

    pub async fn fetch_cards(
        &self,
        ctx: &CorrelationContext,
        customer: &Customer,
    ) -> Result<Vec<Card>, DispatchError> {
        self.post_list(CARDS_SERVICE, "/myCards", ctx, customer)
            .await
    }

    async fn post_list<T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        ctx: &CorrelationContext,
        customer: &Customer,
    ) -> Result<Vec<T>, DispatchError> {
        let span = crate::tracing_setup::create_downstream_span(service, ctx.id());
        self.post_list_inner(service, path, ctx, customer)
            .instrument(span)
            .await
    }

    async fn post_list_inner<T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        ctx: &CorrelationContext,
        customer: &Customer,
    ) -> Result<Vec<T>, DispatchError> {
        let base = self
            .registry
            .resolve(service)
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        let url = format!("{base}{path}");
        tracing::debug!(url = %url, "calling peer service");

        let body = serde_json::to_vec(customer)
            .map_err(|e| DispatchError::Unavailable(format!("request encoding failed: {e}")))?;
        let req = Request::builder()
            .method("POST")
            .uri(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(CORRELATION_HEADER, ctx.header_value())
            .body(AxumBody::from(body))
            .map_err(|e| DispatchError::Unavailable(format!("request build failed: {e}")))?;

        let response = match timeout(self.call_timeout, self.client.send_request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(service = %service, error = %e, "downstream call failed");
                return Err(DispatchError::Unavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "downstream call timed out"
                );
                return Err(DispatchError::Unavailable(format!(
                    "call to {service} timed out"
                )));
            }
        };

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());
        if !status.is_success() {
            tracing::warn!(service = %service, status = %status, "downstream returned non-success");
            return Err(DispatchError::Unavailable(format!(
                "{service} answered {status}"
            )));
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| DispatchError::Unavailable(format!("reading {service} body failed: {e}")))?
            .to_bytes();
        serde_json::from_slice(&bytes)
            .map_err(|e| DispatchError::Unavailable(format!("decoding {service} reply failed: {e}")))
    }
}
