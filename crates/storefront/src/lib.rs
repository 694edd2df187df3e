//! Velour storefront core library.
//!
//! The client side of the shop as a library: observable session and cart
//! stores, the HTTP gateway to the hosted backend, and the page-level
//! flows (auth, checkout, orders, profile) built over them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{AuthEvent, AuthSession, BackendClient, BackendError, ShopBackend};
pub use config::{BackendConfig, ConfigError};
pub use error::{Error, Result};
pub use state::StorefrontApp;
pub use store::{CartState, CartStore, SessionState, SessionStore, StateFile};
