//! Page-level flows over the stores and the backend gateway.
//!
//! # Services
//!
//! - `auth` - Login and registration
//! - `checkout` - Totals, promo codes, order submission
//! - `orders` - Order history and cancellation
//! - `profile` - Profile reads, name changes, avatar upload

pub mod auth;
pub mod checkout;
pub mod orders;
pub mod profile;

pub use auth::{AuthFlowError, AuthService, MIN_PASSWORD_LENGTH};
pub use checkout::{CheckoutError, CheckoutQuote, CheckoutRequest, CheckoutService, PromoCode};
pub use orders::{OrderError, OrderService};
pub use profile::{ProfileError, ProfileService};
