//! `SqliteDatabase` is a concrete storage backend for the order engine.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module.
//!
//! The checkout transaction issues the conditional stock decrement as its first write, so
//! concurrent checkouts serialize on the database write lock rather than deadlocking on a
//! read-to-write upgrade. The pool's busy timeout bounds how long a checkout waits for that
//! lock; hitting the timeout surfaces as a database error with the transaction rolled back.
use std::fmt::Debug;

use commerce_common::Money;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, products};
use crate::{
    db_types::{CartLine, NewOrder, NewProduct, Order, OrderItem, OrderStatusType, PaymentStatusType, Product},
    order_objects::OrderQueryFilter,
    traits::{
        CancelledOrder,
        CatalogError,
        CatalogManagement,
        CheckoutDatabase,
        CheckoutError,
        FullOrder,
        OrderChanged,
        OrderManagement,
        OrderQueryError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database given by the `SOE_DATABASE_URL` environment variable, or the
    /// compiled default.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl CheckoutDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn resolve_for_order(&self, lines: &[CartLine]) -> Result<Vec<Product>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        products::resolve_for_order(lines, &mut conn).await
    }

    async fn commit_order(&self, order: NewOrder) -> Result<FullOrder, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        // the reservation comes first so the transaction is a writer from its first statement
        products::reserve_stock(&order.lines, &mut tx).await?;
        let full = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{} has been saved in the DB with {} lines; stock reserved",
            full.order.id,
            full.items.len()
        );
        Ok(full)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<OrderChanged, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(CheckoutError::OrderNotFound(order_id))?;
        if order.status == new_status {
            return Err(CheckoutError::OrderModificationNoOp);
        }
        if !order.status.can_transition_to(new_status) {
            return Err(CheckoutError::InvalidStatusTransition { from: order.status, to: new_status });
        }
        let updated = orders::update_order_status(order_id, order.status, new_status, &mut tx)
            .await?
            .ok_or_else(|| CheckoutError::DatabaseError(format!("Order {order_id} changed mid-transaction")))?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} status is now {}", updated.status);
        Ok(OrderChanged::new(order, updated))
    }

    async fn update_payment_status(
        &self,
        order_id: i64,
        new_status: PaymentStatusType,
        payment_reference: Option<String>,
    ) -> Result<OrderChanged, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(CheckoutError::OrderNotFound(order_id))?;
        if order.payment_status == new_status {
            return Err(CheckoutError::OrderModificationNoOp);
        }
        if !order.payment_status.can_transition_to(new_status) {
            return Err(CheckoutError::InvalidPaymentTransition { from: order.payment_status, to: new_status });
        }
        let updated =
            orders::update_payment_status(order_id, order.payment_status, new_status, payment_reference, &mut tx)
                .await?
                .ok_or_else(|| CheckoutError::DatabaseError(format!("Order {order_id} changed mid-transaction")))?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} payment status is now {}", updated.payment_status);
        Ok(OrderChanged::new(order, updated))
    }

    async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(CheckoutError::OrderNotFound(order_id))?;
        if !order.status.can_transition_to(OrderStatusType::Cancelled) {
            return Err(CheckoutError::InvalidStatusTransition { from: order.status, to: OrderStatusType::Cancelled });
        }
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        let restocked = order.status.holds_stock_reservation();
        if restocked {
            products::restock(&items, &mut tx).await?;
        }
        let updated = orders::update_order_status(order_id, order.status, OrderStatusType::Cancelled, &mut tx)
            .await?
            .ok_or_else(|| CheckoutError::DatabaseError(format!("Order {order_id} changed mid-transaction")))?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} cancelled. Restocked: {restocked}");
        Ok(CancelledOrder { old_status: order.status, order: updated, items, restocked })
    }

    async fn delete_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(CheckoutError::OrderNotFound(order_id))?;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        let restocked = order.status.holds_stock_reservation();
        if restocked {
            products::restock(&items, &mut tx).await?;
        }
        orders::delete_order(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} and {} lines deleted. Restocked: {restocked}", items.len());
        Ok(CancelledOrder { old_status: order.status, order, items, restocked })
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_full_order(&self, order_id: i64) -> Result<Option<FullOrder>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        match order {
            Some(order) => {
                let items = orders::fetch_order_items(order.id, &mut conn).await?;
                Ok(Some(FullOrder::new(order, items)))
            },
            None => Ok(None),
        }
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderQueryError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn set_unit_price(&self, product_id: i64, unit_price: Money) -> Result<Product, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        products::set_unit_price(product_id, unit_price, &mut conn).await
    }

    async fn set_stock_level(&self, product_id: i64, stock_quantity: i64) -> Result<Product, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        products::set_stock_level(product_id, stock_quantity, &mut conn).await
    }
}
