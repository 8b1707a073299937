use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref TRANSACTIONS_CREATED: IntCounter = register_int_counter!(
        "gateway_transactions_created_total",
        "Total number of gateway transactions created"
    ).unwrap();

    pub static ref TRANSACTIONS_REPLAYED: IntCounter = register_int_counter!(
        "gateway_transactions_replayed_total",
        "Total number of create requests answered from the payment-link cache"
    ).unwrap();

    pub static ref GATEWAY_ERRORS: IntCounter = register_int_counter!(
        "gateway_errors_total",
        "Total number of failed gateway calls"
    ).unwrap();

    pub static ref NOTIFICATIONS_RECEIVED: IntCounter = register_int_counter!(
        "gateway_notifications_received_total",
        "Total number of gateway notifications received"
    ).unwrap();

    pub static ref RELAYS_SENT: IntCounter = register_int_counter!(
        "platform_relays_sent_total",
        "Total number of successful platform order updates"
    ).unwrap();

    pub static ref RELAYS_FAILED: IntCounter = register_int_counter!(
        "platform_relays_failed_total",
        "Total number of failed platform order updates"
    ).unwrap();

    pub static ref CACHE_EVICTIONS: IntCounter = register_int_counter!(
        "payment_link_cache_evictions_total",
        "Total number of payment-link cache entries evicted for capacity"
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
