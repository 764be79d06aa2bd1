//! HTTP surface.
//!
//! Handlers are thin: extract the caller and the body, call into [`crate::core`], emit the
//! returned events through the [`Notifier`], and shape the JSON response.

pub mod auth;
pub mod bookings;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod rate_limit;
pub mod tracking;
pub mod wallet;

use crate::{
    config::AppConfig,
    core::notification::{DeliveryMode, Notifier},
    errors::Error,
};
use auth::JwtKeys;
use axum::{
    Router,
    extract::FromRequest,
    middleware,
    routing::{get, patch, post},
};
use rate_limit::RateLimiter;
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub notifier: Notifier,
    pub keys: JwtKeys,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &AppConfig, mode: DeliveryMode) -> Self {
        Self {
            notifier: Notifier::new(db.clone(), mode),
            keys: JwtKeys::new(&config.auth),
            rate_limiter: RateLimiter::in_memory(&config.rate_limit),
            db,
        }
    }
}

/// JSON body extractor whose rejections use the service's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

async fn health_check() -> &'static str {
    "OK"
}

pub fn create_router(state: AppState) -> Router {
    let limiter_state = state.clone();
    let limited = move || middleware::from_fn_with_state(limiter_state.clone(), rate_limit::rate_limit);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/orders",
            post(orders::place_order).layer(limited()).get(orders::list_orders),
        )
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/payment/confirm", post(orders::confirm_payment))
        .route("/orders/{id}/services", post(bookings::link_to_order))
        .route("/track", get(tracking::track))
        .route(
            "/bookings/mechanic",
            post(bookings::create_mechanic).layer(limited()),
        )
        .route(
            "/bookings/logistics",
            post(bookings::create_logistics).layer(limited()),
        )
        .route("/bookings/{kind}/{id}", get(bookings::get_booking))
        .route("/bookings/{kind}/{id}/status", patch(bookings::update_status))
        .route("/products", post(products::create))
        .route("/products/{id}", get(products::get).patch(products::update))
        .route("/suppliers/{id}/products", get(products::list_for_supplier))
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}", axum::routing::delete(notifications::delete))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/wallet", get(wallet::summary))
        .route("/wallet/withdrawals", post(wallet::withdraw))
        .route("/profiles/{role}", post(profiles::create))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Router harness for handler tests.

    use super::*;
    use crate::{core::access::Principal, entities::Role, errors::Result};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
    }

    impl TestApp {
        pub fn new(db: DatabaseConnection) -> Self {
            let state = AppState::new(db, &AppConfig::default(), DeliveryMode::Inline);
            Self {
                router: create_router(state.clone()),
                state,
            }
        }

        pub fn token(&self, principal: &Principal) -> Result<String> {
            self.state.keys.issue_token(&principal.id, principal.role)
        }

        pub fn admin_token(&self) -> Result<String> {
            self.state.keys.issue_token("admin", Role::Admin)
        }

        /// Sends a request and returns the status with the parsed JSON body (`Null` if empty).
        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::test_support::TestApp;
    use crate::test_utils::setup_test_db;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new(setup_test_db().await.unwrap());
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = TestApp::new(setup_test_db().await.unwrap());
        let (status, body) = app.send(Method::GET, "/orders", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = app.send(Method::GET, "/orders", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
