//! Shopper identity types.
//!
//! These types represent validated domain objects separate from the wire
//! row types the backend gateway deserializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velour_core::{CustomerRole, Email, UserId};

/// The authenticated shopper held by the session store.
///
/// `None` in the store means "not signed in"; there is no separate
/// authenticated flag to drift out of sync with it. Serializable because
/// the snapshot is persisted locally between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's backend row ID (same as the auth identity ID).
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name shown in the account area.
    pub name: String,
    /// Public URL of the uploaded avatar, if any.
    pub avatar_url: Option<String>,
    /// Whether the email has been verified.
    pub is_verified: bool,
    /// Customer tier.
    pub role: CustomerRole,
    /// When the account row was created.
    pub created_at: DateTime<Utc>,
}
