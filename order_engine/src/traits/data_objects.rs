use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusType};

//--------------------------------------     FullOrder      ----------------------------------------------------------
/// An order header together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl FullOrder {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

//--------------------------------------    OrderChanged    ----------------------------------------------------------
/// The before and after images of an order mutation. Event subscribers (the external audit
/// logger in particular) receive both values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChanged {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderChanged {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

//--------------------------------------   CancelledOrder   ----------------------------------------------------------
/// The result of cancelling or purging an order: the final records, the status the order held
/// beforehand, and whether the stock reservation was reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledOrder {
    pub old_status: OrderStatusType,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub restocked: bool,
}

//--------------------------------------   StockShortfall   ----------------------------------------------------------
/// Requested-versus-available detail for one order line that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: i64,
    pub product_name: String,
    pub requested: i64,
    pub available: i64,
}

impl Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Product {} (#{}): requested {}, only {} in stock",
            self.product_name, self.product_id, self.requested, self.available
        )
    }
}

pub(crate) fn shortfall_summary(shortfalls: &[StockShortfall]) -> String {
    shortfalls.iter().map(ToString::to_string).collect::<Vec<String>>().join("; ")
}
