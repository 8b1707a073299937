//! Payment bridge
//!
//! Turns commerce-platform orders and storefront carts into hosted-payment
//! transactions and relays gateway payment notifications back to the platform.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod models;
pub mod services;
pub mod tracing;

use axum::Router;
use http::{header, HeaderValue, Method};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};

use crate::cache::PaymentLinkCache;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::{
    CommercePlatform, GatewayBridge, OrderNormalizer, PaymentGateway, ShopifyClient,
    ShopifyConfig, SnapGateway, SnapGatewayConfig,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub bridge: Arc<GatewayBridge>,
    pub normalizer: Arc<OrderNormalizer>,
}

impl AppState {
    /// Wires the Snap gateway, the optional Shopify client and the payment-link
    /// cache from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, ServiceError> {
        let gateway = SnapGateway::new(SnapGatewayConfig {
            base_url: config.gateway_base_url.clone(),
            server_key: config.gateway_server_key.clone(),
            finish_url: config
                .storefront_base_url()
                .map(|base| format!("{}/checkout/thank_you", base)),
            timeout: config.http_timeout(),
        })
        .map_err(|e| ServiceError::InternalError(format!("failed to build gateway client: {}", e)))?;

        let platform: Option<Arc<dyn CommercePlatform>> = match (
            config.platform_base_url(),
            config.platform_token.clone(),
        ) {
            (Some(base_url), Some(access_token)) if config.platform_enabled() => {
                let client = ShopifyClient::new(ShopifyConfig {
                    base_url,
                    access_token,
                    api_version: config.platform_api_version.clone(),
                    timeout: config.http_timeout(),
                })
                .map_err(|e| {
                    ServiceError::InternalError(format!("failed to build platform client: {}", e))
                })?;
                ::tracing::info!("Platform relay enabled");
                Some(Arc::new(client) as Arc<dyn CommercePlatform>)
            }
            _ => {
                ::tracing::info!("Platform relay not configured; status updates will only be logged");
                None
            }
        };

        Ok(Self::with_collaborators(config, Arc::new(gateway), platform))
    }

    /// Builds state around caller-supplied gateway and platform implementations.
    pub fn with_collaborators(
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        platform: Option<Arc<dyn CommercePlatform>>,
    ) -> Self {
        let cache = PaymentLinkCache::new(
            config.redirect_cache_capacity,
            config.redirect_cache_ttl(),
        );
        let normalizer = OrderNormalizer::new(config.storefront_base_url());

        Self {
            bridge: Arc::new(GatewayBridge::new(gateway, platform, cache)),
            normalizer: Arc::new(normalizer),
            config,
        }
    }
}

/// CORS from configuration: an explicit allow-list, otherwise permissive when
/// the environment allows it. Configuration validation rejects the remaining
/// case; a config that skipped validation gets a layer that admits no origin.
pub fn build_cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(AllowHeaders::list([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
            ]))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

/// Full application router with request ids, HTTP tracing and CORS.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    handlers::routes()
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn allowed_origin(cfg: AppConfig, origin: &str) -> Option<String> {
        use axum::body::Body;
        use http::Request;
        use tower::ServiceExt;

        let cors = build_cors_layer(&cfg);
        let state = AppState::from_config(cfg).unwrap();
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = build_router(state, cors).oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_follows_configuration() {
        let mut cfg = AppConfig::new("key");
        assert_eq!(
            allowed_origin(cfg.clone(), "https://anywhere.example.com").await,
            Some("*".to_string())
        );

        cfg.environment = "production".into();
        assert_eq!(
            allowed_origin(cfg.clone(), "https://anywhere.example.com").await,
            None
        );

        cfg.cors_allowed_origins = Some("https://shop.example.com, ".into());
        assert_eq!(
            allowed_origin(cfg.clone(), "https://shop.example.com").await,
            Some("https://shop.example.com".to_string())
        );
        assert_eq!(
            allowed_origin(cfg, "https://anywhere.example.com").await,
            None
        );
    }

    #[test]
    fn platform_client_is_only_built_with_credentials() {
        let mut cfg = AppConfig::new("key");
        let state = AppState::from_config(cfg.clone()).unwrap();
        assert!(state.bridge.platform().is_none());

        cfg.platform_url = Some("my-store.myshopify.com".into());
        cfg.platform_token = Some("shpat_123".into());
        let state = AppState::from_config(cfg).unwrap();
        assert!(state.bridge.platform().is_some());
    }
}
