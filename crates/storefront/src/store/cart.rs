//! Observable cart state.
//!
//! Purely in-memory: lines live for the process lifetime and never touch the
//! backend. Prices on a line are the add-time snapshot and are not
//! reconciled against the live catalog.

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;

use velour_core::CartLineId;

use crate::models::{CartLine, NewCartLine};

/// Published cart state.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    pub items: Vec<CartLine>,
    pub is_loading: bool,
}

/// Container for the shopper's cart.
///
/// State is published through a `watch` channel; [`CartStore::subscribe`]
/// hands out receivers that observe every update. No operation here can
/// fail; input validation belongs to the flows that call in.
#[derive(Debug)]
pub struct CartStore {
    state: watch::Sender<CartState>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self { state }
    }

    /// Observe cart updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Current state, cloned out of the channel.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Append a new line and return its generated id.
    ///
    /// No de-duplication: adding the same product, size, and color twice
    /// yields two independent lines.
    pub fn add_item(&self, new: NewCartLine) -> CartLineId {
        let now = Utc::now();
        let id = CartLineId::generate();
        let line = CartLine {
            id,
            product_id: new.product_id,
            name: new.name,
            unit_price: new.unit_price,
            image_url: new.image_url,
            quantity: new.quantity,
            size: new.size,
            color: new.color,
            created_at: now,
            updated_at: now,
        };
        self.state.send_modify(|state| state.items.push(line));
        id
    }

    /// Remove the line with the given id. Unknown ids are a no-op, though an
    /// update still fires.
    pub fn remove_item(&self, id: &CartLineId) {
        self.state
            .send_modify(|state| state.items.retain(|line| line.id != *id));
    }

    /// Set a line's quantity, clamped to at least 1. Unknown ids are a
    /// no-op. Dropping a line goes through [`CartStore::remove_item`], never
    /// through a zero quantity.
    pub fn update_quantity(&self, id: &CartLineId, quantity: i64) {
        self.state.send_modify(|state| {
            if let Some(line) = state.items.iter_mut().find(|line| line.id == *id) {
                line.quantity = quantity.max(1);
                line.updated_at = Utc::now();
            }
        });
    }

    /// Drop every line.
    pub fn clear(&self) {
        self.state.send_modify(|state| state.items.clear());
    }

    /// Replace the whole line collection.
    pub fn set_items(&self, items: Vec<CartLine>) {
        self.state.send_modify(|state| state.items = items);
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.state.send_modify(|state| state.is_loading = is_loading);
    }

    /// Current lines, cloned.
    #[must_use]
    pub fn items(&self) -> Vec<CartLine> {
        self.state.borrow().items.clone()
    }

    /// Sum of `unit_price × quantity` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.state
            .borrow()
            .items
            .iter()
            .map(CartLine::line_total)
            .sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.state
            .borrow()
            .items
            .iter()
            .map(|line| line.quantity)
            .sum()
    }
}
