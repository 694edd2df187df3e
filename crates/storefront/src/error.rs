//! Unified error handling.
//!
//! Provides a unified `Error` type aggregating every layer's errors, plus
//! the `user_message` mapping that keeps backend internals out of shopper
//! notifications.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::services::auth::AuthFlowError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::profile::ProfileError;

/// Application-level error type for the storefront core.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading or validation failed.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A backend gateway call failed outside any service flow.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Login or registration failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthFlowError),

    /// Quoting or placing an order failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Loading or cancelling orders failed.
    #[error("Order error: {0}")]
    Orders(#[from] OrderError),

    /// Profile read or update failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl Error {
    /// Notification text safe to show the shopper.
    ///
    /// Service errors already carry their own mapping; config and raw
    /// backend errors collapse into a generic line so no URL, status code,
    /// or response body ever reaches the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) | Self::Backend(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
            Self::Auth(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Orders(err) => err.user_message(),
            Self::Profile(err) => err.user_message(),
        }
    }
}

/// Result type alias for `Error`.
pub type Result<T> = std::result::Result<T, Error>;
