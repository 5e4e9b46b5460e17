use commerce_common::MoneyConversionError;
use thiserror::Error;

use crate::{
    db_types::{CartLine, NewOrder, OrderRequestError, OrderStatusType, PaymentStatusType, Product},
    traits::{
        data_objects::{shortfall_summary, CancelledOrder, FullOrder, OrderChanged, StockShortfall},
        OrderManagement,
        OrderQueryError,
    },
};

/// This trait defines the highest level of behaviour for storage backends supporting the order
/// engine.
///
/// This behaviour includes:
/// * Resolving cart lines against the product catalog
/// * Committing a checkout: stock reservation plus order persistence as one atomic unit
/// * Applying order and payment lifecycle transitions
/// * Reversing a reservation when an order is cancelled or purged
#[allow(async_fn_in_trait)]
pub trait CheckoutDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Resolve every requested cart line against the catalog. Read-only; no stock is touched.
    ///
    /// Products are returned in request-line order. A missing product id fails the whole batch
    /// with [`CheckoutError::ProductNotFound`]. Lines whose requested quantity exceeds the
    /// available stock are gathered across the whole batch and reported together as
    /// [`CheckoutError::InsufficientStock`], so the caller sees the complete picture.
    async fn resolve_for_order(&self, lines: &[CartLine]) -> Result<Vec<Product>, CheckoutError>;

    /// Persist the assembled order as a single atomic unit.
    ///
    /// Within one transaction: every line's stock is reserved with a conditional decrement, the
    /// order header and its items are inserted, and the unit commits. If any line loses a race
    /// with a concurrent checkout, the whole unit rolls back and every shortfall is reported;
    /// no order row and no stock decrement survive a failure, so the caller may safely retry.
    async fn commit_order(&self, order: NewOrder) -> Result<FullOrder, CheckoutError>;

    /// Apply a fulfilment status transition.
    ///
    /// The transition is validated against the order's *current* status inside the same
    /// transaction that applies it, so a stale read can never produce an invalid transition.
    /// Stock is not touched; cancellation (which reverses the reservation) goes through
    /// [`Self::cancel_order`] instead.
    async fn update_order_status(&self, order_id: i64, new_status: OrderStatusType) -> Result<OrderChanged, CheckoutError>;

    /// Apply a payment status transition, optionally recording the gateway's payment reference.
    ///
    /// Same atomicity contract as [`Self::update_order_status`]. This is the landing point for
    /// external payment-gateway callbacks.
    async fn update_payment_status(
        &self,
        order_id: i64,
        new_status: PaymentStatusType,
        payment_reference: Option<String>,
    ) -> Result<OrderChanged, CheckoutError>;

    /// Cancel the order and, if the order still holds its stock reservation, return every line's
    /// quantity to the catalog. One atomic unit.
    async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError>;

    /// Admin purge: delete the order and its items, reversing the stock reservation if it is
    /// still held. One atomic unit. Returns the removed records.
    async fn delete_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), CheckoutError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Invalid order request: {0}")]
    ValidationError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("One or more lines exceed available stock. {}", shortfall_summary(.0))]
    InsufficientStock(Vec<StockShortfall>),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Order status cannot change from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Payment status cannot change from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatusType, to: PaymentStatusType },
    #[error("'{0}' is not a recognised status value")]
    UnknownStatus(String),
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("Amount cannot be represented: {0}")]
    AmountOutOfRange(String),
    #[error("{0}")]
    QueryError(#[from] OrderQueryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}

impl From<OrderRequestError> for CheckoutError {
    fn from(e: OrderRequestError) -> Self {
        CheckoutError::ValidationError(e.to_string())
    }
}

impl From<MoneyConversionError> for CheckoutError {
    fn from(e: MoneyConversionError) -> Self {
        CheckoutError::AmountOutOfRange(e.to_string())
    }
}
