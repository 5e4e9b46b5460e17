use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderStatusType, PaymentStatusType},
    order_objects::OrderQueryFilter,
    traits::{CheckoutError, FullOrder},
};

/// Inserts the order header and its line items using the given connection. This is not atomic on
/// its own; the caller embeds it in the checkout transaction together with the stock reservation
/// and passes `&mut tx` as the connection argument.
///
/// New orders always start as `Pending`/`Pending`.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<FullOrder, CheckoutError> {
    let header: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                customer_id,
                shipping_address,
                billing_address,
                sub_total,
                tax_amount,
                shipping_cost,
                total_amount,
                status,
                payment_method,
                payment_status,
                payment_reference,
                notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.customer_id)
    .bind(order.shipping_address)
    .bind(order.billing_address)
    .bind(order.sub_total.value())
    .bind(order.tax_amount.value())
    .bind(order.shipping_cost.value())
    .bind(order.total_amount.value())
    .bind(OrderStatusType::Pending.to_string())
    .bind(order.payment_method.to_string())
    .bind(PaymentStatusType::Pending.to_string())
    .bind(order.payment_reference)
    .bind(order.notes)
    .fetch_one(&mut *conn)
    .await?;
    let mut items = Vec::with_capacity(order.lines.len());
    for line in order.lines {
        let item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *;
            "#,
        )
        .bind(header.id)
        .bind(line.product_id)
        .bind(line.product_name)
        .bind(line.quantity)
        .bind(line.unit_price.value())
        .bind(line.line_total.value())
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    debug!("📝️ Order inserted with id {} and {} lines", header.id, items.len());
    Ok(FullOrder::new(header, items))
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at ASC")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.iter().flatten().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if query.payment_status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.payment_status.iter().flatten().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("payment_status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Applies a status change guarded by the expected current value. Returns None when the guard
/// misses, i.e. the row's status is no longer `expected`.
pub(crate) async fn update_order_status(
    order_id: i64,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, CheckoutError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(new_status.to_string())
    .bind(order_id)
    .bind(expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// As [`update_order_status`], for the payment status. A supplied payment reference replaces the
/// stored one; None leaves it untouched.
pub(crate) async fn update_payment_status(
    order_id: i64,
    expected: PaymentStatusType,
    new_status: PaymentStatusType,
    payment_reference: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, CheckoutError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = $1, payment_reference = COALESCE($2, payment_reference), updated_at = \
         CURRENT_TIMESTAMP WHERE id = $3 AND payment_status = $4 RETURNING *",
    )
    .bind(new_status.to_string())
    .bind(payment_reference)
    .bind(order_id)
    .bind(expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Removes the order header and its items. The items are deleted explicitly rather than relying
/// on the cascade, so the count can be reported.
pub(crate) async fn delete_order(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, CheckoutError> {
    let items = sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(&mut *conn).await?;
    trace!("📝️ Deleted order {order_id} and {} items", items.rows_affected());
    Ok(items.rows_affected())
}
