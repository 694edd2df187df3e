//! Cart line item types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use velour_core::{CartLineId, Price, ProductId};

/// A single line in the shopper's cart.
///
/// The line ID is minted locally when the item is added; it is never shared
/// with the backend until an order is placed. The price is a snapshot taken
/// at add time and is not reconciled against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Locally generated line ID.
    pub id: CartLineId,
    /// Catalog product this line refers to.
    pub product_id: ProductId,
    /// Product name at add time.
    pub name: String,
    /// Unit price at add time.
    pub unit_price: Price,
    /// Product image at add time, if any.
    pub image_url: Option<String>,
    /// Units of this line. At least 1 while the line exists.
    pub quantity: i64,
    /// Selected size, if the product has sizes.
    pub size: Option<String>,
    /// Selected color, if the product has colors.
    pub color: Option<String>,
    /// When the line was added.
    pub created_at: DateTime<Utc>,
    /// When the line was last changed.
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Price of the whole line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.line_total(self.quantity)
    }
}

/// Parameters for adding a line to the cart.
///
/// Quantity is taken as given; callers send at least 1. The update path is
/// the one that clamps.
#[derive(Debug, Clone)]
pub struct NewCartLine {
    /// Catalog product to add.
    pub product_id: ProductId,
    /// Product name snapshot.
    pub name: String,
    /// Unit price snapshot.
    pub unit_price: Price,
    /// Product image snapshot.
    pub image_url: Option<String>,
    /// Units to add.
    pub quantity: i64,
    /// Selected size.
    pub size: Option<String>,
    /// Selected color.
    pub color: Option<String>,
}
