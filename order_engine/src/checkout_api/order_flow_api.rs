use std::{fmt::Debug, str::FromStr};

use log::*;

use crate::{
    db_types::{NewOrder, NewOrderRequest, OrderStatusType, PaymentStatusType, PricedLine},
    events::{EventProducers, OrderCancelledEvent, OrderCreatedEvent, OrderStatusChangedEvent, PaymentStatusChangedEvent},
    pricing::{price_lines, PricingConfig},
    traits::{CancelledOrder, CheckoutDatabase, CheckoutError, FullOrder, OrderChanged},
};

/// `CheckoutApi` is the primary API for placing orders and driving the post-creation order
/// lifecycle. It is the only caller of the stock-mutating backend operations; everything else in
/// the system reads.
pub struct CheckoutApi<B> {
    db: B,
    pricing: PricingConfig,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, pricing: PricingConfig, producers: EventProducers) -> Self {
        Self { db, pricing, producers }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }
}

impl<B> CheckoutApi<B>
where B: CheckoutDatabase
{
    /// Place a new order.
    ///
    /// The sequence is: validate the request, resolve every cart line against the catalog,
    /// price the lines, assemble the aggregate, then hand it to the backend which reserves
    /// stock and persists the order as one atomic unit. A failure anywhere before the final
    /// step touches no persistent state; a failure inside it rolls back completely. Either
    /// way, retrying the whole call is safe.
    ///
    /// Note that "safe to retry" refers to stock and order state. The engine does not
    /// deduplicate identical submissions; a double-click that produces two calls will produce
    /// two orders. Exactly-once submission belongs to the request layer (e.g. an idempotency
    /// key there).
    pub async fn place_order(&self, request: NewOrderRequest) -> Result<FullOrder, CheckoutError> {
        request.validate()?;
        let products = self.db.resolve_for_order(&request.lines).await?;
        let lines: Vec<PricedLine> = request
            .lines
            .iter()
            .zip(products.iter())
            .map(|(line, product)| PricedLine::new(product, line.quantity))
            .collect();
        let pricing = price_lines(&lines, &self.pricing)?;
        let order = NewOrder::assemble(request, lines, pricing);
        let full = self.db.commit_order(order).await?;
        debug!(
            "🛒️ Order #{} placed: {} across {} lines, {} total",
            full.order.id,
            full.order.sub_total,
            full.items.len(),
            full.order.total_amount
        );
        self.call_order_created_hook(&full).await;
        Ok(full)
    }

    /// Changes the fulfilment status of an order.
    ///
    /// The transition is validated against the order's current status atomically with the
    /// update. Moving to `Cancelled` is routed through [`Self::cancel_order`] so that the
    /// stock reservation is reversed on the same code path every time.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<OrderChanged, CheckoutError> {
        if new_status == OrderStatusType::Cancelled {
            let cancelled = self.cancel_order(order_id).await?;
            let mut old_order = cancelled.order.clone();
            old_order.status = cancelled.old_status;
            return Ok(OrderChanged::new(old_order, cancelled.order));
        }
        let changed = self.db.update_order_status(order_id, new_status).await?;
        info!(
            "🛒️ Order #{order_id} status changed from {} to {}",
            changed.old_order.status, changed.new_order.status
        );
        self.call_status_changed_hook(&changed).await;
        Ok(changed)
    }

    /// As [`Self::update_order_status`], but takes the raw status value received from an
    /// external caller. Values outside the enumerated status set are rejected without touching
    /// the order.
    pub async fn update_order_status_str(&self, order_id: i64, new_status: &str) -> Result<OrderChanged, CheckoutError> {
        let status = OrderStatusType::from_str(new_status)
            .map_err(|_| CheckoutError::UnknownStatus(new_status.to_string()))?;
        self.update_order_status(order_id, status).await
    }

    /// Changes the payment status of an order, optionally recording the gateway reference.
    /// This is the entry point that a payment-gateway callback is mapped into.
    pub async fn update_payment_status(
        &self,
        order_id: i64,
        new_status: PaymentStatusType,
        payment_reference: Option<String>,
    ) -> Result<OrderChanged, CheckoutError> {
        let changed = self.db.update_payment_status(order_id, new_status, payment_reference).await?;
        info!(
            "🛒️ Order #{order_id} payment status changed from {} to {}",
            changed.old_order.payment_status, changed.new_order.payment_status
        );
        self.call_payment_changed_hook(&changed).await;
        Ok(changed)
    }

    /// As [`Self::update_payment_status`], but takes the raw status value received from an
    /// external caller.
    pub async fn update_payment_status_str(
        &self,
        order_id: i64,
        new_status: &str,
        payment_reference: Option<String>,
    ) -> Result<OrderChanged, CheckoutError> {
        let status = PaymentStatusType::from_str(new_status)
            .map_err(|_| CheckoutError::UnknownStatus(new_status.to_string()))?;
        self.update_payment_status(order_id, status, payment_reference).await
    }

    /// Cancel an order. If the order still holds its stock reservation, every line's quantity
    /// is returned to the catalog in the same transaction that records the cancellation.
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError> {
        let cancelled = self.db.cancel_order(order_id).await?;
        if cancelled.restocked {
            info!("🛒️ Order #{order_id} cancelled; {} lines restocked", cancelled.items.len());
        } else {
            info!("🛒️ Order #{order_id} cancelled from {}; stock was no longer reserved", cancelled.old_status);
        }
        self.call_order_cancelled_hook(&cancelled).await;
        Ok(cancelled)
    }

    /// Admin purge of an order: the order and its lines are deleted and the stock reservation
    /// reversed if still held. The removed records are returned for the audit trail.
    pub async fn delete_order(&self, order_id: i64) -> Result<CancelledOrder, CheckoutError> {
        let removed = self.db.delete_order(order_id).await?;
        info!("🛒️ Order #{order_id} deleted; {} lines", removed.items.len());
        Ok(removed)
    }

    async fn call_order_created_hook(&self, full: &FullOrder) {
        for emitter in &self.producers.order_created_producer {
            trace!("🛒️ Notifying order created hook subscribers");
            emitter.publish_event(OrderCreatedEvent::new(full.clone())).await;
        }
    }

    async fn call_status_changed_hook(&self, changed: &OrderChanged) {
        for emitter in &self.producers.order_status_changed_producer {
            trace!("🛒️ Notifying status change hook subscribers");
            emitter
                .publish_event(OrderStatusChangedEvent::new(
                    changed.new_order.clone(),
                    changed.old_order.status,
                    changed.new_order.status,
                ))
                .await;
        }
    }

    async fn call_payment_changed_hook(&self, changed: &OrderChanged) {
        for emitter in &self.producers.payment_status_changed_producer {
            trace!("🛒️ Notifying payment status hook subscribers");
            emitter
                .publish_event(PaymentStatusChangedEvent::new(
                    changed.new_order.clone(),
                    changed.old_order.payment_status,
                    changed.new_order.payment_status,
                ))
                .await;
        }
    }

    async fn call_order_cancelled_hook(&self, cancelled: &CancelledOrder) {
        for emitter in &self.producers.order_cancelled_producer {
            trace!("🛒️ Notifying order cancelled hook subscribers");
            emitter.publish_event(OrderCancelledEvent::new(cancelled.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
