//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velour_core::{OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};

/// A placed order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Backend row ID.
    pub id: OrderId,
    /// Owning shopper.
    pub user_id: UserId,
    /// Current progression of the order.
    pub status: OrderStatus,
    /// Grand total charged, including shipping and discounts.
    pub total_amount: Price,
    /// Shipping address as the single line the backend stores.
    pub shipping_address: Option<String>,
    /// Carrier tracking number, set once the order ships.
    pub tracking_number: Option<String>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order last changed.
    pub updated_at: DateTime<Utc>,
    /// Line items, frozen from the cart at checkout.
    pub items: Vec<OrderItem>,
}

/// One line of a placed order.
///
/// Name, image, and unit price are snapshots from the cart line that
/// produced this row, so order history stays stable when the catalog
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Backend row ID.
    pub id: OrderItemId,
    /// Catalog product the line referred to.
    pub product_id: ProductId,
    /// Product name at checkout.
    pub product_name: String,
    /// Product image at checkout, if any.
    pub image_url: Option<String>,
    /// Units purchased.
    pub quantity: i64,
    /// Unit price at checkout.
    pub unit_price: Price,
    /// Selected size.
    pub size: Option<String>,
    /// Selected color.
    pub color: Option<String>,
}

/// Shipping address collected at checkout.
///
/// The backend stores a single text column, so the structured form is
/// rendered with [`ShippingAddress::to_single_line`] before insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingAddress {
    /// Name of the person receiving the order.
    pub recipient: String,
    /// Contact phone number.
    pub phone: String,
    /// Street address.
    pub line1: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
}

impl ShippingAddress {
    /// Whether every field has been filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !(self.recipient.trim().is_empty()
            || self.phone.trim().is_empty()
            || self.line1.trim().is_empty()
            || self.city.trim().is_empty()
            || self.postal_code.trim().is_empty())
    }

    /// Render the address as the single line stored on the order row.
    #[must_use]
    pub fn to_single_line(&self) -> String {
        format!(
            "{recipient}, {phone}, {line1}, {city} {postal_code}",
            recipient = self.recipient.trim(),
            phone = self.phone.trim(),
            line1 = self.line1.trim(),
            city = self.city.trim(),
            postal_code = self.postal_code.trim(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Lin Mei".to_string(),
            phone: "13800000000".to_string(),
            line1: "88 Nanjing Rd".to_string(),
            city: "Shanghai".to_string(),
            postal_code: "200001".to_string(),
        }
    }

    #[test]
    fn test_complete_address() {
        assert!(address().is_complete());
    }

    #[test]
    fn test_blank_field_is_incomplete() {
        let mut addr = address();
        addr.city = "   ".to_string();
        assert!(!addr.is_complete());
    }

    #[test]
    fn test_single_line_rendering() {
        assert_eq!(
            address().to_single_line(),
            "Lin Mei, 13800000000, 88 Nanjing Rd, Shanghai 200001"
        );
    }
}
