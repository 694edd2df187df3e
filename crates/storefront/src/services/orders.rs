//! Order history and cancellation.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use velour_core::{OrderId, OrderStatus, UserId};

use crate::backend::{BackendError, ShopBackend};
use crate::models::Order;

/// Errors from the order history flows.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Could not load orders")]
    History(#[source] BackendError),
    #[error("Could not cancel order")]
    Cancel(#[source] BackendError),
}

impl OrderError {
    /// Notification text for the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::History(_) => "Could not load your orders. Please try again.".to_string(),
            Self::Cancel(_) => "Could not cancel the order. Please try again.".to_string(),
        }
    }
}

/// Read and cancel a shopper's orders.
pub struct OrderService {
    backend: Arc<dyn ShopBackend>,
}

impl OrderService {
    #[must_use]
    pub fn new(backend: Arc<dyn ShopBackend>) -> Self {
        Self { backend }
    }

    /// The shopper's orders, newest first, items attached.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::History`] when the backend call fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn history(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        let rows = self
            .backend
            .list_orders(user_id)
            .await
            .map_err(OrderError::History)?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Mark an order cancelled. Scoped by order and owner, so one shopper
    /// cannot touch another's rows; whether the order is still cancellable
    /// is for the caller to gate on [`OrderStatus::is_cancellable`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cancel`] when the backend call fails.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn cancel(&self, order_id: OrderId, user_id: UserId) -> Result<(), OrderError> {
        self.backend
            .update_order_status(order_id, user_id, OrderStatus::Cancelled)
            .await
            .map_err(OrderError::Cancel)
    }
}
