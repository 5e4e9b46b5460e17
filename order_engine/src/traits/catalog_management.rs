use commerce_common::Money;
use thiserror::Error;

use crate::db_types::{NewProduct, Product};

/// The product-maintenance surface used by the catalog owner (and by tests).
///
/// Checkout stock reservations do NOT go through this trait; the conditional decrement inside
/// [`crate::traits::CheckoutDatabase::commit_order`] is the only checkout-time stock writer.
/// `set_stock_level` exists for catalog management (goods received, stocktake corrections) and
/// overwrites the level outright.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogError>;

    /// Reprice a product. Existing order lines keep the price they were purchased at.
    async fn set_unit_price(&self, product_id: i64, unit_price: Money) -> Result<Product, CatalogError>;

    async fn set_stock_level(&self, product_id: i64, stock_quantity: i64) -> Result<Product, CatalogError>;
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Stock level {0} is invalid; levels cannot be negative")]
    InvalidStockLevel(i64),
    #[error("Price {0} is invalid; prices cannot be negative")]
    InvalidPrice(Money),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}
