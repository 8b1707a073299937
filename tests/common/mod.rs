#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use payment_bridge::{build_router, config::AppConfig, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const PLATFORM_TOKEN: &str = "shpat_test";
pub const API_VERSION: &str = "2024-07";

/// Application wired against mock gateway and platform servers.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockServer,
    pub platform: MockServer,
}

impl TestApp {
    /// Application with platform relay enabled.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Application without platform credentials: nothing is relayed.
    pub async fn without_platform() -> Self {
        Self::build(false).await
    }

    async fn build(with_platform: bool) -> Self {
        let gateway = MockServer::start().await;
        let platform = MockServer::start().await;

        let mut cfg = AppConfig::new(SERVER_KEY);
        cfg.environment = "test".to_string();
        cfg.cors_allow_any_origin = true;
        cfg.gateway_base_url = gateway.uri();
        cfg.storefront_url = Some("https://store.example.com".to_string());
        cfg.http_timeout_secs = 5;
        if with_platform {
            cfg.platform_url = Some(platform.uri());
            cfg.platform_token = Some(PLATFORM_TOKEN.to_string());
        }

        let state = AppState::from_config(cfg).expect("failed to build app state");
        let router = build_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            gateway,
            platform,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Posts a body verbatim, for payloads that are not valid JSON.
    pub async fn post_raw(&self, uri: &str, body: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub fn order_path(order_id: &str) -> String {
        format!("/admin/api/{}/orders/{}.json", API_VERSION, order_id)
    }

    /// Gateway accepts any transaction and answers with a token derived from `token`.
    pub async fn mount_gateway_success(&self, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(snap_created(token))
            .expect(expected_calls)
            .mount(&self.gateway)
            .await;
    }

    /// Platform accepts every order update.
    pub async fn mount_platform_updates(&self) {
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": {} })))
            .mount(&self.platform)
            .await;
    }

    /// Fails the test on drop if the platform receives any order update.
    pub async fn forbid_platform_updates(&self) {
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&self.platform)
            .await;
    }
}

pub fn redirect_url_for(token: &str) -> String {
    format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{}", token)
}

pub fn snap_created(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "token": token,
        "redirect_url": redirect_url_for(token),
    }))
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}
