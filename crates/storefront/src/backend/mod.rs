//! Gateway to the hosted backend-as-a-service.
//!
//! The backend provides authentication, row-level table access, and object
//! storage. Everything the storefront needs from it goes through the
//! [`ShopBackend`] trait so stores and services can be exercised against an
//! in-process fake, with [`client::BackendClient`] as the HTTP
//! implementation used in production.

pub mod client;
pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use velour_core::{Email, OrderId, OrderStatus, UserId};

pub use client::BackendClient;
pub use wire::{
    NewOrderItemRecord, NewOrderRecord, NewUserRecord, OrderItemRecord, OrderRecord, UserRecord,
    UserUpdate,
};

/// Seconds before nominal expiry at which a session counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An operation that needs a signed-in session was called without one.
    #[error("No active session")]
    NotSignedIn,

    /// A write that should have returned the affected row returned nothing.
    #[error("No matching row")]
    MissingRow,
}

/// An authenticated session issued by the backend's identity provider.
///
/// Carries the tokens for user-scoped calls plus the identity needed to
/// fetch the full user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Auth identity the session belongs to. Doubles as the user-row key.
    pub user_id: UserId,
    /// Email the session was issued for.
    pub email: Email,
    /// Bearer token for user-scoped requests.
    pub access_token: String,
    /// Token for obtaining a replacement session when this one expires.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// When the tokens were issued, by this process's clock.
    pub obtained_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the access token has expired (with a safety margin).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let expires_at =
            self.obtained_at + chrono::Duration::seconds(self.expires_in - EXPIRY_MARGIN_SECS);
        Utc::now() >= expires_at
    }
}

/// Auth-state transition pushed by the backend.
///
/// Delivered at most once per transition; listeners must stay idempotent
/// under redundant delivery of the state they already reflect.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A session was established (sign-in or sign-up).
    SignedIn {
        /// The session that was established.
        session: AuthSession,
    },
    /// The session ended.
    SignedOut,
}

/// The fixed interface the storefront uses to reach the backend.
///
/// One implementation talks HTTP ([`BackendClient`]); tests substitute an
/// in-process fake. The auth-event channel outlives individual calls, so
/// receivers obtained from [`ShopBackend::auth_events`] keep delivering for
/// the life of the backend handle.
#[async_trait]
pub trait ShopBackend: Send + Sync {
    /// Sign in with email and password.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError>;

    /// Create an account with email and password.
    async fn sign_up(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError>;

    /// End the current session. No-op when not signed in.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// The currently active session, if any, refreshed when stale.
    async fn active_session(&self) -> Result<Option<AuthSession>, BackendError>;

    /// Fetch a user row by ID. `Ok(None)` when no row exists.
    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>, BackendError>;

    /// Insert a user row (registration).
    async fn insert_user(&self, user: &NewUserRecord) -> Result<UserRecord, BackendError>;

    /// Update fields on a user row, returning the updated row.
    async fn update_user(&self, id: UserId, update: &UserUpdate)
    -> Result<UserRecord, BackendError>;

    /// All orders belonging to a user, newest first, items nested.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderRecord>, BackendError>;

    /// Insert an order row, returning it with backend-assigned fields.
    async fn insert_order(&self, order: &NewOrderRecord) -> Result<OrderRecord, BackendError>;

    /// Insert the line items of a just-placed order.
    async fn insert_order_items(&self, items: &[NewOrderItemRecord]) -> Result<(), BackendError>;

    /// Set the status of an order, scoped to its owner.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<(), BackendError>;

    /// Upload an avatar image and return its public URL.
    async fn upload_avatar(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;

    /// Subscribe to auth-state transitions.
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}
