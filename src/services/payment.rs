//! Payment processor client.
//!
//! 1.  **CircuitBreaker** guards every outbound call. After `failure_threshold`
//!     consecutive failures it opens and rejects calls outright until
//!     `timeout` has passed, then lets calls through again half-open. A
//!     processor rejection (4xx) is not counted as a failure.
//! 2.  **StripeClient** creates payment intents over the processor's REST API.
//!     Card collection and capture happen client-side with the returned
//!     `client_secret`; this service never sees card data.

use async_trait::async_trait;
use failsafe::backoff::{self, Constant};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, Instrument, StateMachine};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

/// Logs breaker transitions.
#[derive(Debug, Clone, Copy)]
pub struct TracingInstrument {
    failure_threshold: u32,
}

impl Instrument for TracingInstrument {
    fn on_call_rejected(&self) {
        warn!("Circuit breaker is OPEN - blocking payment processor request");
    }

    fn on_open(&self) {
        error!(
            "Circuit breaker OPENED - {} consecutive failures reached threshold",
            self.failure_threshold
        );
    }

    fn on_half_open(&self) {
        info!("Circuit breaker transitioning to HalfOpen state");
    }

    fn on_closed(&self) {
        info!("Circuit breaker recovered - transitioning to Closed state");
    }
}

pub struct CircuitBreaker {
    machine: StateMachine<ConsecutiveFailures<Constant>, TracingInstrument>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        let failure_threshold = failure_threshold.max(1);
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff::constant(timeout));
        Self {
            machine: Config::new()
                .failure_policy(policy)
                .instrument(TracingInstrument { failure_threshold })
                .build(),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.timeout_seconds))
    }

    pub fn is_call_permitted(&self) -> bool {
        self.machine.is_call_permitted()
    }

    /// Runs `call` through the breaker. An open circuit yields `CircuitOpen`
    /// without polling `call`.
    pub async fn call<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match failsafe::futures::CircuitBreaker::call_with(&self.machine, is_outage, call).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(GatewayError::CircuitOpen),
        }
    }
}

// the processor is healthy when it answers 4xx, it just said no
fn is_outage(e: &GatewayError) -> bool {
    !matches!(e, GatewayError::Rejected(_))
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment processor temporarily unavailable")]
    CircuitOpen,

    #[error("payment processor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment processor rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(&self, amount_in_cents: i64) -> Result<PaymentIntent, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

pub struct StripeClient {
    secret_key: String,
    base_url: String,
    currency: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
}

impl StripeClient {
    pub fn new(config: &PaymentConfig, circuit_breaker: CircuitBreaker) -> Result<Self, GatewayError> {
        Ok(Self {
            secret_key: config.secret_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            circuit_breaker,
        })
    }

    async fn send_intent(&self, amount_in_cents: i64) -> Result<PaymentIntent, GatewayError> {
        let amount = amount_in_cents.to_string();
        let response = self
            .http_client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", self.currency.as_str()),
                ("payment_method_types[]", "card"),
            ])
            .send()
            .await?;

        if response.status().is_client_error() {
            // 4xx is the processor refusing our input, not an outage
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "request rejected".to_string());
            return Err(GatewayError::Rejected(message));
        }

        let intent = response.error_for_status()?.json::<IntentResponse>().await?;
        Ok(PaymentIntent { id: intent.id, client_secret: intent.client_secret })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(&self, amount_in_cents: i64) -> Result<PaymentIntent, GatewayError> {
        info!("Creating payment intent: amount={}, currency={}", amount_in_cents, self.currency);
        let result = self.circuit_breaker.call(self.send_intent(amount_in_cents)).await;
        if let Err(e @ GatewayError::Transport(_)) = &result {
            error!("Payment processor request failed: {:?}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str, threshold: u32) -> StripeClient {
        let config = PaymentConfig {
            secret_key: "sk_test_123".into(),
            api_url: base_url.into(),
            currency: "usd".into(),
        };
        StripeClient::new(&config, CircuitBreaker::new(threshold, Duration::from_secs(60))).unwrap()
    }

    async fn outage(breaker: &CircuitBreaker) {
        let result = breaker.call(async { Err::<(), _>(GatewayError::CircuitOpen) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_recovers_after_timeout() {
        let breaker = CircuitBreaker::new(2, Duration::from_millis(20));
        outage(&breaker).await;
        assert!(breaker.is_call_permitted());
        outage(&breaker).await;
        assert!(!breaker.is_call_permitted());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(breaker.is_call_permitted());
        assert_eq!(breaker.call(async { Ok::<_, GatewayError>(7) }).await.unwrap(), 7);
        assert!(breaker.is_call_permitted());
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_polling_the_call() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(3600));
        outage(&breaker).await;

        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = breaker
            .call(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, GatewayError>(())
            })
            .await;
        assert!(matches!(result, Err(GatewayError::CircuitOpen)));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_after_timeout_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        outage(&breaker).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(breaker.is_call_permitted());
        outage(&breaker).await;
        assert!(!breaker.is_call_permitted());
    }

    #[tokio::test]
    async fn rejections_are_not_outages() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(3600));
        let result = breaker
            .call(async { Err::<(), _>(GatewayError::Rejected("card declined".into())) })
            .await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
        assert!(breaker.is_call_permitted());
    }

    #[tokio::test]
    async fn creates_intent_with_form_body_and_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("amount=2500"))
            .and(body_string_contains("currency=usd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_1",
                "client_secret": "pi_1_secret_abc",
                "amount": 2500
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = client(&server.uri(), 3).create_payment_intent(2500).await.unwrap();
        assert_eq!(intent.client_secret, "pi_1_secret_abc");
        assert_eq!(intent.id, "pi_1");
    }

    #[tokio::test]
    async fn processor_rejection_does_not_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Amount must be at least $0.50 usd" }
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri(), 1);
        let err = client.create_payment_intent(1).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(ref m) if m.contains("at least")));
        assert!(client.circuit_breaker.is_call_permitted());
    }

    #[tokio::test]
    async fn outages_open_the_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 2);
        assert!(matches!(client.create_payment_intent(100).await, Err(GatewayError::Transport(_))));
        assert!(matches!(client.create_payment_intent(100).await, Err(GatewayError::Transport(_))));
        assert!(matches!(client.create_payment_intent(100).await, Err(GatewayError::CircuitOpen)));
    }
}
