//! Shopping cart types.

use serde::Serialize;

use pasal_core::{CartItemId, Money, ProductId};

/// One cart row with a snapshot of the product it refers to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub stock: i32,
    pub quantity: i32,
}

impl CartLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * u32::try_from(self.quantity).unwrap_or(0)
    }
}

/// The current user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Money,
}

impl From<Vec<CartLine>> for Cart {
    fn from(items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = items.iter().map(CartLine::line_total).sum();
        Self {
            items,
            item_count,
            subtotal,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i32, price: i64, quantity: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::new(Decimal::new(price, 2)).unwrap(),
            image_url: None,
            stock: 10,
            quantity,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from(vec![line(1, 1250, 2), line(2, 399, 3)]);
        assert_eq!(cart.item_count, 5);
        assert_eq!(cart.subtotal.to_string(), "36.97");
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from(Vec::new());
        assert_eq!(cart.item_count, 0);
        assert!(cart.subtotal.is_zero());
    }
}
