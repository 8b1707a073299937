use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the platform's GraphQL global id for orders.
const ORDER_GID_PREFIX: &str = "gid://shopify/Order/";

/// Which inbound shape an order was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    /// Order-created webhook from the commerce platform
    PlatformOrder,
    /// Cart posted directly by the storefront
    Cart,
}

/// Canonical platform order id: the bare numeric id.
///
/// Accepts `1001` or `gid://shopify/Order/1001` on input and always renders
/// as `1001`, which is the form the platform's REST endpoints expect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformOrderId(String);

impl PlatformOrderId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix(ORDER_GID_PREFIX).unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(digits.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    /// Unit price in minor currency units
    pub unit_price: i64,
    pub quantity: u32,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl LineItem {
    /// `None` when the subtotal does not fit in an `i64`.
    pub fn subtotal(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// Normalized purchase used to drive a gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    pub id: String,
    /// Amount in minor currency units
    pub gross_amount: i64,
    pub customer: Customer,
    pub line_items: Vec<LineItem>,
    pub source: OrderSource,
}

impl CanonicalOrder {
    /// The platform id of this order, if it came from (or maps to) a platform order.
    pub fn platform_id(&self) -> Option<PlatformOrderId> {
        PlatformOrderId::parse(&self.id)
    }

    pub fn line_items_total(&self) -> Option<i64> {
        line_items_total(&self.line_items)
    }
}

/// Checked sum of line item subtotals.
pub fn line_items_total(items: &[LineItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.subtotal()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_id_accepts_numeric_and_global_ids() {
        let plain = PlatformOrderId::parse("1001").unwrap();
        let global = PlatformOrderId::parse("gid://shopify/Order/1001").unwrap();
        assert_eq!(plain, global);
        assert_eq!(global.to_string(), "1001");
    }

    #[test]
    fn platform_id_rejects_other_shapes() {
        assert!(PlatformOrderId::parse("CART-1700000000000").is_none());
        assert!(PlatformOrderId::parse("gid://shopify/Customer/1001").is_none());
        assert!(PlatformOrderId::parse("").is_none());
        assert!(PlatformOrderId::parse("gid://shopify/Order/").is_none());
    }

    #[test]
    fn line_item_subtotal_multiplies_quantity() {
        let item = LineItem {
            id: "1".into(),
            name: "Batik shirt".into(),
            unit_price: 75_000,
            quantity: 3,
            category: "General".into(),
            url: None,
        };
        assert_eq!(item.subtotal(), Some(225_000));
    }

    #[test]
    fn oversized_amounts_do_not_overflow() {
        let item = LineItem {
            id: "1".into(),
            name: "Gold bar".into(),
            unit_price: 5_000_000_000_000_000_000,
            quantity: 2,
            category: "General".into(),
            url: None,
        };
        assert_eq!(item.subtotal(), None);

        let half = LineItem {
            unit_price: i64::MAX / 2 + 1,
            quantity: 1,
            ..item
        };
        assert_eq!(half.subtotal(), Some(i64::MAX / 2 + 1));
        assert_eq!(line_items_total(&[half.clone(), half]), None);
    }
}
