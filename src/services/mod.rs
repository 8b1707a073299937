pub mod bridge;
pub mod gateway;
pub mod normalizer;
pub mod pipeline;
pub mod platform;

pub use bridge::GatewayBridge;
pub use gateway::{PaymentGateway, SnapGateway, SnapGatewayConfig};
pub use normalizer::OrderNormalizer;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use platform::{CommercePlatform, OrderUpdate, ShopifyClient, ShopifyConfig};
