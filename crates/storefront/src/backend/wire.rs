//! Row and payload types exchanged with the backend's REST interface.
//!
//! These mirror the backend tables byte-for-byte; `From` conversions turn
//! them into the domain models the rest of the crate works with. Numeric
//! columns arrive as JSON numbers, hence the float codec on money fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use velour_core::{
    CurrencyCode, CustomerRole, Email, OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId,
};

use crate::models::{CurrentUser, Order, OrderItem};

// =============================================================================
// Users table
// =============================================================================

/// A row of the users table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub role: CustomerRole,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for CurrentUser {
    fn from(row: UserRecord) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            avatar_url: row.avatar_url,
            is_verified: row.is_verified,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// Insert payload for the users table.
///
/// The row ID is the auth identity ID, assigned by the identity provider at
/// sign-up rather than by the table.
#[derive(Debug, Clone, Serialize)]
pub struct NewUserRecord {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub is_verified: bool,
    pub role: CustomerRole,
}

/// Partial update for a user row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

// =============================================================================
// Orders tables
// =============================================================================

/// A row of the orders table, with its items nested by the select.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "order_items", default)]
    pub items: Vec<OrderItemRecord>,
}

impl From<OrderRecord> for Order {
    fn from(row: OrderRecord) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            total_amount: Price::cny(row.total_amount),
            shipping_address: row.shipping_address,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
            items: row.items.into_iter().map(OrderItem::from).collect(),
        }
    }
}

/// A row of the `order_items` table.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl From<OrderItemRecord> for OrderItem {
    fn from(row: OrderItemRecord) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            image_url: row.image_url,
            quantity: row.quantity,
            unit_price: Price::new(row.unit_price, CurrencyCode::CNY),
            size: row.size,
            color: row.color,
        }
    }
}

/// Insert payload for the orders table.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderRecord {
    pub user_id: UserId,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
}

/// Insert payload for the `order_items` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItemRecord {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
}
