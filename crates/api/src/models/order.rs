//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use pasal_core::{
    Money, OrderId, OrderItemId, OrderStatus, PaymentProvider, PaymentStatus, ProductId, UserId,
};

use super::Address;

/// Shipping destination, copied onto the order at checkout so later address
/// edits don't rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "Nepal".to_string()
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns a client-facing message naming the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                return Err(format!("shipping address {field} is required"));
            }
        }
        Ok(())
    }
}

impl From<Address> for ShippingAddress {
    fn from(address: Address) -> Self {
        Self {
            full_name: address.full_name,
            phone: address.phone,
            line1: address.line1,
            line2: address.line2,
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            country: address.country,
        }
    }
}

/// An order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_provider: PaymentProvider,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub total_amount: Money,
    pub shipping_address: Json<ShippingAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the shopper may still pay for this order online.
    #[must_use]
    pub fn awaiting_payment(&self) -> bool {
        self.payment_status != PaymentStatus::Paid && self.status == OrderStatus::Pending
    }
}

/// One purchased product with the price paid.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A product and quantity requested at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_address_defaults() {
        let address: ShippingAddress = serde_json::from_str(
            r#"{"full_name":"Sita Sharma","phone":"9800000000","line1":"Thamel","city":"Kathmandu"}"#,
        )
        .unwrap();
        assert_eq!(address.country, "Nepal");
        assert!(address.line2.is_none());
        assert!(address.validate().is_ok());
    }

    #[test]
    fn test_shipping_address_requires_city() {
        let address: ShippingAddress = serde_json::from_str(
            r#"{"full_name":"Sita Sharma","phone":"9800000000","line1":"Thamel","city":" "}"#,
        )
        .unwrap();
        assert_eq!(
            address.validate().unwrap_err(),
            "shipping address city is required"
        );
    }
}
