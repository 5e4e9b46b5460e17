use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderStatusType, PaymentStatusType},
    traits::{CancelledOrder, FullOrder},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: FullOrder,
}

impl OrderCreatedEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

/// Emitted whenever a fulfilment status transition is applied. Carries both the previous and the
/// new value for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType, new_status: OrderStatusType) -> Self {
        Self { order, old_status, new_status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusChangedEvent {
    pub order: Order,
    pub old_status: PaymentStatusType,
    pub new_status: PaymentStatusType,
}

impl PaymentStatusChangedEvent {
    pub fn new(order: Order, old_status: PaymentStatusType, new_status: PaymentStatusType) -> Self {
        Self { order, old_status, new_status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub cancelled: CancelledOrder,
}

impl OrderCancelledEvent {
    pub fn new(cancelled: CancelledOrder) -> Self {
        Self { cancelled }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentStatusChanged(PaymentStatusChangedEvent),
    OrderCancelled(OrderCancelledEvent),
}
