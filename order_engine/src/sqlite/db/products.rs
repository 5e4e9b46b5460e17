use commerce_common::Money;
use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartLine, NewProduct, OrderItem, PricedLine, Product},
    traits::{CatalogError, CheckoutError, StockShortfall},
};

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, CatalogError> {
    if product.unit_price.is_negative() {
        return Err(CatalogError::InvalidPrice(product.unit_price));
    }
    if product.stock_quantity < 0 {
        return Err(CatalogError::InvalidStockLevel(product.stock_quantity));
    }
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (name, unit_price, stock_quantity)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.unit_price.value())
    .bind(product.stock_quantity)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Product [{}] inserted with id {}", product.name, product.id);
    Ok(product)
}

pub async fn set_unit_price(
    product_id: i64,
    unit_price: Money,
    conn: &mut SqliteConnection,
) -> Result<Product, CatalogError> {
    if unit_price.is_negative() {
        return Err(CatalogError::InvalidPrice(unit_price));
    }
    let result: Option<Product> = sqlx::query_as(
        "UPDATE products SET unit_price = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(unit_price.value())
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(CatalogError::ProductNotFound(product_id))
}

pub async fn set_stock_level(
    product_id: i64,
    stock_quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, CatalogError> {
    if stock_quantity < 0 {
        return Err(CatalogError::InvalidStockLevel(stock_quantity));
    }
    let result: Option<Product> = sqlx::query_as(
        "UPDATE products SET stock_quantity = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(stock_quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(CatalogError::ProductNotFound(product_id))
}

/// Resolve each requested line against the catalog, read-only.
///
/// Returns the product rows in request-line order. The first missing product aborts the batch;
/// short stock is gathered across the whole batch so the caller can report every offending line
/// at once.
pub async fn resolve_for_order(
    lines: &[CartLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<Product>, CheckoutError> {
    let mut resolved = Vec::with_capacity(lines.len());
    let mut shortfalls = Vec::new();
    for line in lines {
        let product =
            fetch_product(line.product_id, &mut *conn).await?.ok_or(CheckoutError::ProductNotFound(line.product_id))?;
        if product.stock_quantity < line.quantity {
            shortfalls.push(StockShortfall {
                product_id: product.id,
                product_name: product.name.clone(),
                requested: line.quantity,
                available: product.stock_quantity,
            });
        }
        resolved.push(product);
    }
    if !shortfalls.is_empty() {
        debug!("📝️ Cart resolution found {} short lines", shortfalls.len());
        return Err(CheckoutError::InsufficientStock(shortfalls));
    }
    Ok(resolved)
}

/// Reserve stock for every line with a conditional decrement.
///
/// `UPDATE .. SET stock_quantity = stock_quantity - n WHERE id = ? AND stock_quantity >= n`
/// either applies the decrement or affects zero rows; there is no separate read, so two
/// checkouts racing for the same units serialize on the row and the loser sees zero rows
/// affected. Losing lines are re-read and gathered into a complete shortfall report.
///
/// Must be called inside the checkout transaction: on a shortfall the caller rolls the
/// transaction back, which is what discards the decrements already applied to earlier lines.
pub async fn reserve_stock(lines: &[PricedLine], conn: &mut SqliteConnection) -> Result<(), CheckoutError> {
    let mut shortfalls = Vec::new();
    for line in lines {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
             AND stock_quantity >= $1",
        )
        .bind(line.quantity)
        .bind(line.product_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            let available =
                fetch_product(line.product_id, &mut *conn).await?.map(|p| p.stock_quantity).unwrap_or_default();
            shortfalls.push(StockShortfall {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                requested: line.quantity,
                available,
            });
        }
    }
    if !shortfalls.is_empty() {
        debug!("📝️ Stock reservation failed for {} lines", shortfalls.len());
        return Err(CheckoutError::InsufficientStock(shortfalls));
    }
    Ok(())
}

/// Return previously reserved stock to the catalog (cancellation and purge paths).
///
/// Products are weak references from order lines; a product that has since been removed from
/// the catalog is logged and skipped rather than failing the reversal.
pub async fn restock(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), CheckoutError> {
    for item in items {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(item.quantity)
        .bind(item.product_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            warn!("📝️ Product {} no longer exists; {} units not returned to stock", item.product_id, item.quantity);
        }
    }
    Ok(())
}
