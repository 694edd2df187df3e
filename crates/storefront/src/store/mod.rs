//! Observable state containers and their local persistence.

pub mod cart;
pub mod session;
pub mod state_file;

pub use cart::{CartState, CartStore};
pub use session::{SessionState, SessionStore};
pub use state_file::{SESSION_STATE_KEY, StateFile};
