#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use fake::{faker::internet::en::SafeEmail, Fake};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use court_booking::{
    app,
    models::{court::NewCourt, user::NewUser, Role, Slot},
    services::{
        identity::{Identity, IdentityVerifier, VerifyError},
        payment::{GatewayError, PaymentIntent, PaymentProcessor},
    },
    store::{MemoryStore, Store},
    AppState,
};
use uuid::Uuid;

/// Accepts tokens of the form `token:<email>`.
pub struct StaticVerifier;

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        token
            .strip_prefix("token:")
            .map(|email| Identity {
                uid: format!("uid-{}", email),
                email: email.to_string(),
                expires_at: chrono::Utc::now().timestamp() + 3600,
            })
            .ok_or(VerifyError::UnknownKey)
    }
}

pub struct FakeProcessor;

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(&self, amount_in_cents: i64) -> Result<PaymentIntent, GatewayError> {
        Ok(PaymentIntent {
            id: format!("pi_{}", amount_in_cents),
            client_secret: format!("pi_{}_secret", amount_in_cents),
        })
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), Arc::new(StaticVerifier), Arc::new(FakeProcessor));
        Self { store, router: app(Arc::new(state)) }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        email: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, email, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn send(&self, method: Method, uri: &str, email: Option<&str>, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = email {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer token:{}", email));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn seed_user(&self, role: Role) -> String {
        let fake: String = SafeEmail().fake();
        // keep it safe to drop into a query string unescaped
        let local: String = fake
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_'))
            .collect();
        let email = format!("{}{}", &Uuid::new_v4().simple().to_string()[..6], local);
        self.store
            .insert_user(NewUser { email: email.clone(), role, ..Default::default() })
            .await
            .unwrap();
        email
    }

    pub async fn seed_court(&self, name: &str, slots: &[(&str, &str, bool)]) -> Uuid {
        self.store
            .insert_court(NewCourt {
                name: name.into(),
                sport_type: "tennis".into(),
                slots: slots
                    .iter()
                    .map(|(start, end, available)| Slot {
                        start_time: start.to_string(),
                        end_time: end.to_string(),
                        available: *available,
                    })
                    .collect(),
                ..Default::default()
            })
            .await
            .unwrap()
            .inserted_id
    }
}
