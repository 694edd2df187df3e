//! Checkout totals and order submission.

use std::sync::Arc;

use rust_decimal::{Decimal, dec};
use thiserror::Error;
use tracing::instrument;

use velour_core::OrderStatus;

use crate::backend::wire::{NewOrderItemRecord, NewOrderRecord};
use crate::backend::{BackendError, ShopBackend};
use crate::models::{CartLine, Order, ShippingAddress};
use crate::store::{CartStore, SessionStore};

/// Subtotal at or above which shipping is free, in CNY.
const FREE_SHIPPING_THRESHOLD: Decimal = dec!(299);

/// Flat shipping fee below the threshold, in CNY.
const FLAT_SHIPPING_FEE: Decimal = dec!(15);

/// A recognized promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoCode {
    /// `NEW10`: 10% off the subtotal.
    TenPercent,
    /// `SAVE20`: a flat 20 off.
    FlatTwenty,
}

impl PromoCode {
    /// Match a raw code, ignoring surrounding whitespace. Codes are
    /// case-sensitive.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "NEW10" => Some(Self::TenPercent),
            "SAVE20" => Some(Self::FlatTwenty),
            _ => None,
        }
    }

    fn discount(self, subtotal: Decimal) -> Decimal {
        match self {
            Self::TenPercent => (subtotal * dec!(0.10)).round_dp(2),
            Self::FlatTwenty => dec!(20),
        }
    }
}

/// Price breakdown for a checkout selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Everything the shopper confirmed on the checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// The selected cart lines going into the order.
    pub lines: Vec<CartLine>,
    pub address: ShippingAddress,
    pub promo: Option<PromoCode>,
    pub terms_accepted: bool,
}

/// Errors from quoting and placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("No items selected")]
    EmptySelection,
    #[error("Shipping address is incomplete")]
    IncompleteAddress,
    #[error("Terms must be accepted")]
    TermsNotAccepted,
    #[error("Unknown promo code")]
    InvalidPromoCode,
    #[error("Order submission failed")]
    SubmissionFailed(#[source] BackendError),
}

impl CheckoutError {
    /// Notification text for the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => "Sign in to place your order.".to_string(),
            Self::EmptySelection => "Select at least one item.".to_string(),
            Self::IncompleteAddress => "Fill in the whole shipping address.".to_string(),
            Self::TermsNotAccepted => "Accept the terms to continue.".to_string(),
            Self::InvalidPromoCode => "That promo code is not valid.".to_string(),
            Self::SubmissionFailed(_) => "Order submission failed. Please try again.".to_string(),
        }
    }
}

/// Turns a cart selection into an order on the backend.
pub struct CheckoutService {
    backend: Arc<dyn ShopBackend>,
    session: Arc<SessionStore>,
    cart: Arc<CartStore>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ShopBackend>,
        session: Arc<SessionStore>,
        cart: Arc<CartStore>,
    ) -> Self {
        Self {
            backend,
            session,
            cart,
        }
    }

    /// Resolve a promo code the shopper typed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidPromoCode`] for anything but the
    /// recognized codes.
    pub fn apply_promo(code: &str) -> Result<PromoCode, CheckoutError> {
        PromoCode::parse(code).ok_or(CheckoutError::InvalidPromoCode)
    }

    /// Price a selection: subtotal, promo discount, shipping, total.
    ///
    /// Shipping is free from a subtotal of 299 CNY; below that a flat 15
    /// applies. The total never goes below zero, whatever the discount.
    #[must_use]
    pub fn quote(lines: &[CartLine], promo: Option<PromoCode>) -> CheckoutQuote {
        let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();
        let discount = promo.map_or(Decimal::ZERO, |code| code.discount(subtotal));
        let shipping = shipping_fee(subtotal);
        let total = (subtotal - discount + shipping).max(Decimal::ZERO);
        CheckoutQuote {
            subtotal,
            discount,
            shipping,
            total,
        }
    }

    /// Submit the order: one orders row plus one row per selected line,
    /// with name, image, and unit price denormalized from the cart
    /// snapshot. Clears the cart on success.
    ///
    /// The returned order carries no item rows; the history fetch is what
    /// attaches them.
    ///
    /// # Errors
    ///
    /// Validation errors come first (signed-in user, non-empty selection,
    /// complete address, accepted terms); backend failures come back as
    /// [`CheckoutError::SubmissionFailed`].
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn place_order(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        let Some(user) = self.session.current_user() else {
            return Err(CheckoutError::NotSignedIn);
        };
        if request.lines.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }
        if !request.address.is_complete() {
            return Err(CheckoutError::IncompleteAddress);
        }
        if !request.terms_accepted {
            return Err(CheckoutError::TermsNotAccepted);
        }

        let quote = Self::quote(&request.lines, request.promo);
        let order = self
            .backend
            .insert_order(&NewOrderRecord {
                user_id: user.id,
                status: OrderStatus::Pending,
                total_amount: quote.total,
                shipping_address: Some(request.address.to_single_line()),
            })
            .await
            .map_err(CheckoutError::SubmissionFailed)?;

        let items: Vec<NewOrderItemRecord> = request
            .lines
            .iter()
            .map(|line| NewOrderItemRecord {
                order_id: order.id,
                product_id: line.product_id,
                product_name: line.name.clone(),
                image_url: line.image_url.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price.amount,
                size: line.size.clone(),
                color: line.color.clone(),
            })
            .collect();
        self.backend
            .insert_order_items(&items)
            .await
            .map_err(CheckoutError::SubmissionFailed)?;

        self.cart.clear();
        Ok(order.into())
    }
}

fn shipping_fee(subtotal: Decimal) -> Decimal {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    }
}
