//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod user;

pub use cart::{CartLine, NewCartLine};
pub use order::{Order, OrderItem, ShippingAddress};
pub use user::CurrentUser;
