use crate::errors::ServiceError;
use crate::models::order::line_items_total;
use crate::models::{CanonicalOrder, Customer, LineItem, OrderSource, PlatformOrderId};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_FIRST_NAME: &str = "Guest";
pub const DEFAULT_EMAIL: &str = "unknown@example.com";
pub const DEFAULT_ITEM_NAME: &str = "Product";
pub const DEFAULT_CATEGORY: &str = "General";
/// Gateway limit on item names.
pub const MAX_ITEM_NAME_CHARS: usize = 50;

const TOTAL_FIELDS: [&str; 4] = ["total_price", "current_total_price", "total", "amount"];

/// Maps heterogeneous inbound order and cart payloads to a [`CanonicalOrder`].
///
/// Optional data never blocks the payment flow: missing customer fields and
/// item attributes fall back to fixed defaults. Only an unresolvable amount is
/// an error.
#[derive(Debug, Clone, Default)]
pub struct OrderNormalizer {
    storefront_url: Option<String>,
}

impl OrderNormalizer {
    pub fn new(storefront_url: Option<String>) -> Self {
        Self {
            storefront_url: storefront_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn normalize(
        &self,
        payload: &Value,
        source: OrderSource,
    ) -> Result<CanonicalOrder, ServiceError> {
        let object = payload.as_object().ok_or_else(|| {
            ServiceError::ValidationError("order payload must be a JSON object".to_string())
        })?;

        let id = resolve_order_id(object, source);

        let items_key = match source {
            OrderSource::PlatformOrder => "line_items",
            OrderSource::Cart => "items",
        };
        let raw_items = object
            .get(items_key)
            .or_else(|| object.get(alternate_items_key(items_key)))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut priced_items = 0usize;
        let line_items: Vec<LineItem> = raw_items
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| raw.as_object().map(|item| (index, item)))
            .map(|(index, item)| {
                let (line_item, priced) = self.line_item(index, item);
                if priced {
                    priced_items += 1;
                }
                line_item
            })
            .collect();

        let explicit_total = TOTAL_FIELDS
            .iter()
            .find_map(|field| object.get(*field).and_then(parse_minor_units));

        let gross_amount = if priced_items > 0 {
            let sum = line_items_total(&line_items).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "order {} amount is too large to process",
                    id
                ))
            })?;
            if let Some(total) = explicit_total {
                if total != sum {
                    warn!(
                        order_id = %id,
                        explicit_total = total,
                        line_item_total = sum,
                        "Order total disagrees with line items; using line item sum"
                    );
                }
            }
            sum
        } else {
            explicit_total.ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "cannot determine amount for order {}: no total and no priced line items",
                    id
                ))
            })?
        };

        if gross_amount <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "order {} has non-positive amount {}",
                id, gross_amount
            )));
        }

        // Items that carry no price only make sense when the total came from them
        let line_items = if priced_items > 0 { line_items } else { Vec::new() };

        let customer = resolve_customer(object);

        debug!(
            order_id = %id,
            gross_amount,
            items = line_items.len(),
            "Normalized order"
        );

        Ok(CanonicalOrder {
            id,
            gross_amount,
            customer,
            line_items,
            source,
        })
    }

    fn line_item(&self, index: usize, item: &Map<String, Value>) -> (LineItem, bool) {
        let unit_price = item.get("price").and_then(parse_minor_units);
        let quantity = item
            .get("quantity")
            .and_then(parse_quantity)
            .unwrap_or(1);

        let name: String = first_string(item, &["title", "name"])
            .unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string())
            .chars()
            .take(MAX_ITEM_NAME_CHARS)
            .collect();

        let id = first_string(item, &["id", "variant_id", "sku"])
            .unwrap_or_else(|| (index + 1).to_string());

        let url = first_string(item, &["url"]).or_else(|| {
            let base = self.storefront_url.as_ref()?;
            let handle = first_string(item, &["handle"]).unwrap_or_default();
            Some(format!("{}/products/{}", base, handle))
        });

        let line_item = LineItem {
            id,
            name,
            unit_price: unit_price.unwrap_or(0),
            quantity,
            category: first_string(item, &["category", "product_type"])
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            url,
        };
        (line_item, unit_price.is_some())
    }
}

fn alternate_items_key(key: &str) -> &'static str {
    if key == "items" {
        "line_items"
    } else {
        "items"
    }
}

fn resolve_order_id(object: &Map<String, Value>, source: OrderSource) -> String {
    let now = Utc::now().timestamp_millis();
    match source {
        OrderSource::Cart => format!("CART-{}", now),
        OrderSource::PlatformOrder => {
            let from_gid = object
                .get("admin_graphql_api_id")
                .and_then(Value::as_str)
                .and_then(PlatformOrderId::parse);
            if let Some(id) = from_gid {
                return id.to_string();
            }
            match object.get("id").and_then(value_to_string) {
                Some(raw) => PlatformOrderId::parse(&raw)
                    .map(|id| id.to_string())
                    .unwrap_or(raw),
                None => format!("ORD-{}", now),
            }
        }
    }
}

fn resolve_customer(object: &Map<String, Value>) -> Customer {
    let customer = object.get("customer").and_then(Value::as_object);
    let billing = object.get("billing_address").and_then(Value::as_object);

    let nested = |map: Option<&Map<String, Value>>, key: &str| {
        map.and_then(|m| first_string(m, &[key]))
    };

    let first_name = nested(customer, "first_name")
        .or_else(|| nested(billing, "first_name"))
        .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string());

    let email = nested(customer, "email")
        .or_else(|| first_string(object, &["email", "contact_email"]))
        .unwrap_or_else(|| DEFAULT_EMAIL.to_string());

    let phone = nested(customer, "phone")
        .or_else(|| first_string(object, &["phone"]))
        .or_else(|| nested(billing, "phone"))
        .unwrap_or_default();

    Customer {
        first_name,
        email,
        phone,
    }
}

/// First non-blank string (or number rendered as string) among `keys`.
fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(value_to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Parses a price or total and rounds it half away from zero to whole units.
pub fn parse_minor_units(value: &Value) -> Option<i64> {
    parse_decimal(value)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn parse_quantity(value: &Value) -> Option<u32> {
    let quantity = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(quantity).ok().filter(|q| *q >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn normalizer() -> OrderNormalizer {
        OrderNormalizer::new(Some("https://store.example.com/".to_string()))
    }

    #[test]
    fn total_only_order_uses_rounded_total_and_defaults() {
        let payload = json!({ "id": "1001", "total_price": "150000", "customer": {} });
        let order = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();

        assert_eq!(order.id, "1001");
        assert_eq!(order.gross_amount, 150_000);
        assert_eq!(order.customer.first_name, DEFAULT_FIRST_NAME);
        assert_eq!(order.customer.email, DEFAULT_EMAIL);
        assert_eq!(order.customer.phone, "");
        assert!(order.line_items.is_empty());
    }

    #[test]
    fn line_items_drive_the_amount() {
        let payload = json!({
            "id": 1002,
            "total_price": "999999",
            "line_items": [
                { "id": 11, "title": "Batik shirt", "price": "75000.40", "quantity": 2 },
                { "id": 12, "title": "Tote bag", "price": 20000.5, "quantity": 1 }
            ]
        });
        let order = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();

        assert_eq!(order.line_items[0].unit_price, 75_000);
        assert_eq!(order.line_items[1].unit_price, 20_001);
        assert_eq!(order.gross_amount, 170_001);
        assert_eq!(order.line_items_total(), Some(order.gross_amount));
    }

    #[test]
    fn global_id_is_reduced_to_numeric_id() {
        let payload = json!({
            "id": 5551234,
            "admin_graphql_api_id": "gid://shopify/Order/5551234",
            "total_price": "10.00"
        });
        let order = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();
        assert_eq!(order.id, "5551234");
        assert_eq!(order.platform_id().unwrap().as_str(), "5551234");
    }

    #[test]
    fn cart_orders_get_generated_ids() {
        let payload = json!({
            "items": [{ "title": "Mug", "price": "45000", "quantity": 1, "handle": "mug" }],
            "customer": { "first_name": "Sari", "email": "sari@example.com" }
        });
        let order = normalizer().normalize(&payload, OrderSource::Cart).unwrap();

        assert!(order.id.starts_with("CART-"));
        assert!(order.platform_id().is_none());
        assert_eq!(order.customer.first_name, "Sari");
        assert_eq!(
            order.line_items[0].url.as_deref(),
            Some("https://store.example.com/products/mug")
        );
        assert_eq!(order.line_items[0].id, "1");
    }

    #[test]
    fn item_defaults_apply() {
        let long_title = "x".repeat(80);
        let payload = json!({
            "id": "1003",
            "line_items": [{ "title": long_title, "price": "1000", "quantity": 0 }]
        });
        let order = OrderNormalizer::default()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();

        let item = &order.line_items[0];
        assert_eq!(item.name.chars().count(), MAX_ITEM_NAME_CHARS);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.category, DEFAULT_CATEGORY);
        assert!(item.url.is_none());
    }

    #[test]
    fn unpriced_items_fall_back_to_total() {
        let payload = json!({
            "id": "1004",
            "total_price": 25000,
            "line_items": [{ "title": "Gift card" }]
        });
        let order = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();
        assert_eq!(order.gross_amount, 25_000);
        assert!(order.line_items.is_empty());
    }

    #[test]
    fn missing_amount_is_a_validation_error() {
        let payload = json!({ "id": "1005", "line_items": [{ "title": "Mystery" }] });
        let err = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn oversized_line_items_are_a_validation_error() {
        let payload = json!({
            "id": "1",
            "line_items": [{ "price": "5000000000000000000", "quantity": 2 }]
        });
        assert_matches!(
            normalizer().normalize(&payload, OrderSource::PlatformOrder),
            Err(ServiceError::ValidationError(message)) if message.contains("too large")
        );

        let payload = json!({
            "id": "2",
            "line_items": [
                { "price": "5000000000000000000", "quantity": 1 },
                { "price": "5000000000000000000", "quantity": 1 }
            ]
        });
        assert_matches!(
            normalizer().normalize(&payload, OrderSource::PlatformOrder),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn non_numeric_total_is_a_validation_error() {
        let payload = json!({ "id": "1006", "total_price": "free" });
        assert_matches!(
            normalizer().normalize(&payload, OrderSource::PlatformOrder),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert_matches!(
            normalizer().normalize(&json!([1, 2, 3]), OrderSource::Cart),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn customer_fields_fall_back_to_order_level_data() {
        let payload = json!({
            "id": "1007",
            "total_price": "5000",
            "email": "buyer@example.com",
            "billing_address": { "first_name": "Budi", "phone": "+628123" }
        });
        let order = normalizer()
            .normalize(&payload, OrderSource::PlatformOrder)
            .unwrap();
        assert_eq!(order.customer.first_name, "Budi");
        assert_eq!(order.customer.email, "buyer@example.com");
        assert_eq!(order.customer.phone, "+628123");
    }

    #[test]
    fn decimals_parse_from_strings_numbers_and_exponents() {
        assert_eq!(parse_decimal(&json!(" 150000.50 ")), Some(dec!(150000.50)));
        assert_eq!(parse_decimal(&json!(75000)), Some(dec!(75000)));
        assert_eq!(parse_decimal(&json!("1.5e3")), Some(dec!(1500)));
        assert_eq!(parse_decimal(&json!(true)), None);
    }

    #[test]
    fn parse_minor_units_rounds_half_away_from_zero() {
        assert_eq!(parse_minor_units(&json!("10.5")), Some(11));
        assert_eq!(parse_minor_units(&json!("10.49")), Some(10));
        assert_eq!(parse_minor_units(&json!(99.5)), Some(100));
        assert_eq!(parse_minor_units(&json!("abc")), None);
        assert_eq!(parse_minor_units(&json!(null)), None);
    }
}
