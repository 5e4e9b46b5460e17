use thiserror::Error;

use crate::{
    db_types::{Order, OrderItem},
    order_objects::OrderQueryFilter,
    traits::FullOrder,
};

/// Read-side queries over orders and their lines. Backends expose these to the admin and
/// customer-facing views; nothing here mutates state.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderQueryError>;

    /// The order together with its line items, or None if the order does not exist.
    async fn fetch_full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderQueryError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderQueryError>;

    /// All orders placed by the given customer, oldest first.
    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError>;

    /// Fetches orders according to the criteria in the filter, ordered by `created_at` ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderQueryError {
    fn from(e: sqlx::Error) -> Self {
        OrderQueryError::DatabaseError(e.to_string())
    }
}
