use std::{sync::Arc, time::Instant};

use axum::body::Body as AxumBody;
use eyre::{Result, WrapErr};
use http_body_util::BodyExt;
use hyper::{Method, Request, Response, StatusCode, header, header::HeaderValue};
use tokio::time::timeout;
use tracing::Instrument;

use crate::{
    core::{
        CustomerAggregator, GatewayService,
        correlation::{CORRELATION_HEADER, CorrelationContext},
        model::Customer,
    },
    ports::{http_client::HttpClient, service_registry::ServiceRegistry},
    tracing_setup,
};

/// Elapsed handling time, stamped on every response on the way out.
pub const RESPONSE_TIME_HEADER: &str = "X-Response-Time";

/// Fixed reply of the rate-limited greeting endpoint.
pub const GREETING: &str = "Hello from the bank!";
/// Fixed degraded reply when admission is denied.
pub const GREETING_FALLBACK: &str = "The tellers are busy, please try again in a moment.";
/// Limiter bucket guarding the greeting endpoint.
pub const SAY_HELLO_BUCKET: &str = "sayHello";

/// Edge HTTP handler: correlation lifecycle, local endpoints, and the
/// routed proxy path.
pub struct GatewayHandler {
    gateway: Arc<GatewayService>,
    http_client: Arc<dyn HttpClient>,
    registry: Arc<dyn ServiceRegistry>,
    aggregator: Arc<CustomerAggregator>,
}

impl GatewayHandler {
    pub fn new(
        gateway: Arc<GatewayService>,
        http_client: Arc<dyn HttpClient>,
        registry: Arc<dyn ServiceRegistry>,
        aggregator: Arc<CustomerAggregator>,
    ) -> Self {
        Self {
            gateway,
            http_client,
            registry,
            aggregator,
        }
    }

    /// Main entry point for every inbound request. The correlation id is
    /// resolved first and stamped on whatever response leaves, including
    /// errors and 404s.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>> {
        let started = Instant::now();
        let (ctx, _) = CorrelationContext::extract_or_generate(req.headers());

        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = tracing_setup::create_request_span(method.as_str(), &path, ctx.id());
        let result = async {
            match (&method, path.as_str()) {
                (&Method::POST, "/myCustomerDetails") => {
                    self.handle_customer_details(req, &ctx).await
                }
                (&Method::GET, "/sayHello") => self.handle_say_hello(),
                _ => self.handle_proxy(req, &ctx).await,
            }
        }
        .instrument(span.clone())
        .await;

        let mut response = result?;
        span.record("http.status_code", response.status().as_u16());

        let headers = response.headers_mut();
        headers.insert(CORRELATION_HEADER, ctx.header_value());
        let elapsed = format!("{}ms", started.elapsed().as_millis());
        headers.insert(
            RESPONSE_TIME_HEADER,
            HeaderValue::from_str(&elapsed).unwrap_or_else(|_| HeaderValue::from_static("0ms")),
        );

        Ok(response)
    }

    /// Aggregation endpoint: local lookup plus the loans/cards fan-out,
    /// always through the circuit breaker.
    async fn handle_customer_details(
        &self,
        req: Request<AxumBody>,
        ctx: &CorrelationContext,
    ) -> Result<Response<AxumBody>> {
        let bytes = req
            .into_body()
            .collect()
            .await
            .wrap_err("Failed to read request body")?
            .to_bytes();

        let customer: Customer = match serde_json::from_slice(&bytes) {
            Ok(customer) => customer,
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &serde_json::json!({ "error": format!("invalid request body: {e}") }),
                );
            }
        };

        match self.aggregator.customer_details(ctx, customer).await {
            Ok(details) => json_response(StatusCode::OK, &serde_json::to_value(&details)?),
            Err(e) => {
                // Only a failure of the degraded path itself lands here; the
                // breaker already absorbed the primary-path failure.
                tracing::error!(
                    correlation_id = %ctx.id(),
                    error = %e,
                    "customer details fallback path failed"
                );
                json_response(
                    StatusCode::BAD_GATEWAY,
                    &serde_json::json!({ "error": "customer details unavailable" }),
                )
            }
        }
    }

    /// Rate-limited greeting. Denial is a designed degraded reply, not an
    /// error: the limiter only answers yes/no and we pick the response.
    fn handle_say_hello(&self) -> Result<Response<AxumBody>> {
        if self.gateway.admit(SAY_HELLO_BUCKET) {
            text_response(StatusCode::OK, GREETING)
        } else {
            tracing::debug!(bucket = SAY_HELLO_BUCKET, "admission denied, serving fallback reply");
            text_response(StatusCode::OK, GREETING_FALLBACK)
        }
    }

    /// Routed proxy path: rewrite, resolve, forward with the correlation
    /// header attached.
    async fn handle_proxy(
        &self,
        mut req: Request<AxumBody>,
        ctx: &CorrelationContext,
    ) -> Result<Response<AxumBody>> {
        let path = req.uri().path().to_string();

        let (service, rewritten_path) = match self.gateway.resolve_route(&path) {
            Some(m) => (m.service.to_string(), m.rewritten_path),
            None => {
                tracing::debug!(path = %path, "no matching route");
                return text_response(StatusCode::NOT_FOUND, "No route for path");
            }
        };

        let base = match self.registry.resolve(&service) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "service resolution failed");
                return text_response(StatusCode::BAD_GATEWAY, "Upstream service unavailable");
            }
        };

        let query = req
            .uri()
            .query()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        let upstream = format!("{base}{rewritten_path}{query}");
        *req.uri_mut() = upstream
            .parse()
            .wrap_err("Failed to parse upstream URI")?;
        req.headers_mut()
            .insert(CORRELATION_HEADER, ctx.header_value());

        tracing::debug!(service = %service, upstream = %upstream, "forwarding request");

        // Bounded like the dispatcher's fan-out calls: a hung peer must not
        // pin the inbound request open.
        match timeout(self.gateway.client_timeout(), self.http_client.send_request(req)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                tracing::error!(service = %service, error = %e, "upstream request failed");
                text_response(StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    timeout_ms = self.gateway.client_timeout().as_millis() as u64,
                    "upstream request timed out"
                );
                text_response(StatusCode::BAD_GATEWAY, "Upstream request timed out")
            }
        }
    }
}

impl Clone for GatewayHandler {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            http_client: self.http_client.clone(),
            registry: self.registry.clone(),
            aggregator: self.aggregator.clone(),
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Result<Response<AxumBody>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(AxumBody::from(body))
        .wrap_err("Failed to build text response")
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Result<Response<AxumBody>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(AxumBody::from(value.to_string()))
        .wrap_err("Failed to build JSON response")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        adapters::{account_store::InMemoryAccountStore, service_registry::StaticServiceRegistry},
        config::models::{GatewayConfig, RateLimitConfig, ServiceConfig},
        core::Dispatcher,
        ports::http_client::{HttpClientError, HttpClientResult},
    };

    struct RefusingClient;

    #[async_trait]
    impl HttpClient for RefusingClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Err(HttpClientError::ConnectionError("refused".to_string()))
        }
    }

    fn handler_with_config(config: GatewayConfig) -> GatewayHandler {
        handler_with(config, Arc::new(RefusingClient))
    }

    fn handler_with(config: GatewayConfig, client: Arc<dyn HttpClient>) -> GatewayHandler {
        let registry: Arc<dyn ServiceRegistry> =
            Arc::new(StaticServiceRegistry::new(&config.services));
        let gateway = Arc::new(GatewayService::new(Arc::new(config)).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(
            client.clone(),
            registry.clone(),
            gateway.client_timeout(),
        ));
        let store = Arc::new(InMemoryAccountStore::new(vec![]));
        let aggregator = Arc::new(CustomerAggregator::new(
            store,
            dispatcher,
            gateway.breakers(),
        ));
        GatewayHandler::new(gateway, client, registry, aggregator)
    }

    fn get(path: &str) -> Request<AxumBody> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(AxumBody::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn say_hello_switches_to_fallback_when_denied() {
        let mut config = GatewayConfig::default();
        config.rate_limits = HashMap::from([(
            SAY_HELLO_BUCKET.to_string(),
            RateLimitConfig {
                requests: 1,
                period: "60s".to_string(),
            },
        )]);
        let handler = handler_with_config(config);

        let first = handler.handle_request(get("/sayHello")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let body = first.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, GREETING.as_bytes());

        let second = handler.handle_request(get("/sayHello")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let body = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, GREETING_FALLBACK.as_bytes());
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found_with_correlation() {
        let handler = handler_with_config(GatewayConfig::default());
        let response = handler
            .handle_request(get("/bank/unknown/x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(CORRELATION_HEADER));
        assert!(response.headers().contains_key(RESPONSE_TIME_HEADER));
    }

    struct HangingClient;

    #[async_trait]
    impl HttpClient for HangingClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Err(HttpClientError::ConnectionError("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn hung_upstream_times_out_as_bad_gateway() {
        let mut config = GatewayConfig::default();
        config.routes = GatewayConfig::bank_routes();
        config.services = HashMap::from([(
            "ACCOUNTS".to_string(),
            ServiceConfig {
                base_url: "http://accounts:8080".to_string(),
            },
        )]);
        config.client.timeout = "50ms".to_string();
        let handler = handler_with(config, Arc::new(HangingClient));

        let response = handler
            .handle_request(get("/bank/accounts/myAccount"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().contains_key(CORRELATION_HEADER));
    }

    #[tokio::test]
    async fn malformed_aggregation_body_is_bad_request() {
        let handler = handler_with_config(GatewayConfig::default());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/myCustomerDetails")
            .body(AxumBody::from("{not json"))
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
