use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use commerce_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::pricing::PricingBreakdown;

//--------------------------------------      Product       ----------------------------------------------------------
/// A catalog product as the order engine sees it.
///
/// Product rows are owned by catalog management. The engine reads them when resolving a cart and
/// is the only writer of checkout stock decrements.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub unit_price: Money,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     NewProduct     ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub unit_price: Money,
    pub stock_quantity: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, unit_price: Money, stock_quantity: i64) -> Self {
        Self { name: name.into(), unit_price, stock_quantity }
    }
}

//--------------------------------------   OrderStatusType  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed and stock reserved, but fulfilment has not started.
    Pending,
    /// The order is being picked and packed.
    Processing,
    /// The order has left the warehouse.
    Shipped,
    /// The order has been delivered. Terminal.
    Delivered,
    /// The order was cancelled by the customer or an admin. Terminal.
    Cancelled,
    /// The customer returned the order. Terminal.
    Returned,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled | OrderStatusType::Returned)
    }

    /// A terminal status admits no further transitions. A non-terminal status may move to any
    /// other status; same-status updates are rejected as no-ops at the API layer.
    pub fn can_transition_to(&self, new_status: OrderStatusType) -> bool {
        !self.is_terminal() && *self != new_status
    }

    /// Whether stock reserved at checkout is still held back for this order. Once the goods have
    /// shipped, or the reservation has been reversed, restocking would double-count.
    pub fn holds_stock_reservation(&self) -> bool {
        matches!(self, OrderStatusType::Pending | OrderStatusType::Processing)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Returned => write!(f, "Returned"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "Returned" => Ok(Self::Returned),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//-------------------------------------- PaymentStatusType ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatusType {
    /// No payment outcome has been reported yet.
    Pending,
    /// Payment has been received in full.
    Paid,
    /// The payment attempt failed. A retry is permitted.
    Failed,
    /// A received payment was refunded. Terminal.
    Refunded,
}

impl PaymentStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatusType::Refunded)
    }

    pub fn can_transition_to(&self, new_status: PaymentStatusType) -> bool {
        use PaymentStatusType::*;
        matches!((self, new_status), (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Failed, Pending) | (Paid, Refunded))
    }
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatusType::Pending => write!(f, "Pending"),
            PaymentStatusType::Paid => write!(f, "Paid"),
            PaymentStatusType::Failed => write!(f, "Failed"),
            PaymentStatusType::Refunded => write!(f, "Refunded"),
        }
    }
}

impl From<String> for PaymentStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatusType::Pending
        })
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentMethod    ----------------------------------------------------------
/// The closed set of accepted payment methods. Anything else in a checkout request is a
/// validation failure before any resource is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::BankTransfer => write!(f, "BankTransfer"),
            PaymentMethod::CashOnDelivery => write!(f, "CashOnDelivery"),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment method: {value}. But this conversion cannot fail. Defaulting to Card");
            PaymentMethod::Card
        })
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" => Ok(Self::Card),
            "BankTransfer" => Ok(Self::BankTransfer),
            "CashOnDelivery" => Ok(Self::CashOnDelivery),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------       Order        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// None for guest checkouts.
    pub customer_id: Option<i64>,
    pub shipping_address: String,
    pub billing_address: String,
    pub sub_total: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatusType,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn totals_are_consistent(&self) -> bool {
        self.total_amount == self.sub_total + self.tax_amount + self.shipping_cost
    }
}

//--------------------------------------     OrderItem      ----------------------------------------------------------
/// One line of a persisted order. `product_name` and `unit_price` are snapshots taken at
/// purchase time; later catalog changes never touch them. Rows are immutable after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    /// Weak reference; the product may later change or disappear from the catalog.
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      CartLine      ----------------------------------------------------------
/// One requested line of an incoming checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

//--------------------------------------  NewOrderRequest   ----------------------------------------------------------
/// A checkout request with every field named explicitly. The checkout API calls
/// [`NewOrderRequest::validate`] before any catalog or storage access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    /// The customer placing the order, or None for a guest checkout.
    pub customer_id: Option<i64>,
    pub shipping_address: String,
    pub billing_address: String,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

impl NewOrderRequest {
    pub fn new<S1, S2>(shipping_address: S1, billing_address: S2, lines: Vec<CartLine>, payment_method: PaymentMethod) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            customer_id: None,
            shipping_address: shipping_address.into(),
            billing_address: billing_address.into(),
            lines,
            payment_method,
            payment_reference: None,
            notes: None,
        }
    }

    pub fn for_customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_payment_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the request for structural problems that can be rejected without touching the
    /// catalog or storage.
    pub fn validate(&self) -> Result<(), OrderRequestError> {
        if self.lines.is_empty() {
            return Err(OrderRequestError::EmptyOrder);
        }
        for line in &self.lines {
            if line.quantity < 1 {
                return Err(OrderRequestError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for line in &self.lines {
            if !seen.insert(line.product_id) {
                return Err(OrderRequestError::DuplicateLine(line.product_id));
            }
        }
        if self.shipping_address.trim().is_empty() {
            return Err(OrderRequestError::MissingShippingAddress);
        }
        if self.billing_address.trim().is_empty() {
            return Err(OrderRequestError::MissingBillingAddress);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRequestError {
    #[error("An order must contain at least one line")]
    EmptyOrder,
    #[error("Product {product_id} has an invalid quantity ({quantity}); quantities must be 1 or more")]
    InvalidQuantity { product_id: i64, quantity: i64 },
    #[error("Product {0} appears more than once in the order")]
    DuplicateLine(i64),
    #[error("A shipping address is required")]
    MissingShippingAddress,
    #[error("A billing address is required")]
    MissingBillingAddress,
}

//--------------------------------------     PricedLine     ----------------------------------------------------------
/// A cart line after catalog resolution: the requested quantity plus the name and price
/// snapshot it will be persisted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

impl PricedLine {
    /// Snapshot the product's current name and price against the requested quantity. Line totals
    /// are exact in cents, so no rounding can occur here.
    pub fn new(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.unit_price,
            line_total: product.unit_price * quantity,
        }
    }
}

//--------------------------------------      NewOrder      ----------------------------------------------------------
/// The fully assembled order aggregate, ready for persistence. Building one performs no I/O;
/// the storage backend persists it as a single atomic unit.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<i64>,
    pub shipping_address: String,
    pub billing_address: String,
    pub sub_total: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<PricedLine>,
}

impl NewOrder {
    /// Combine the validated request, the resolved line snapshots and the pricing breakdown into
    /// the aggregate. New orders always start as `Pending`/`Pending`; the initial statuses are
    /// applied at insert time.
    pub fn assemble(request: NewOrderRequest, lines: Vec<PricedLine>, pricing: PricingBreakdown) -> Self {
        Self {
            customer_id: request.customer_id,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            sub_total: pricing.sub_total,
            tax_amount: pricing.tax_amount,
            shipping_cost: pricing.shipping_cost,
            total_amount: pricing.total_amount,
            payment_method: request.payment_method,
            payment_reference: request.payment_reference,
            notes: request.notes,
            lines,
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use commerce_common::Money;

    use super::*;

    #[test]
    fn terminal_order_statuses_admit_nothing() {
        use OrderStatusType::*;
        for terminal in [Delivered, Cancelled, Returned] {
            for target in [Pending, Processing, Shipped, Delivered, Cancelled, Returned] {
                assert!(!terminal.can_transition_to(target), "{terminal} -> {target} must be rejected");
            }
        }
    }

    #[test]
    fn non_terminal_order_statuses_may_move_anywhere_else() {
        use OrderStatusType::*;
        for from in [Pending, Processing, Shipped] {
            for target in [Pending, Processing, Shipped, Delivered, Cancelled, Returned] {
                assert_eq!(from.can_transition_to(target), from != target);
            }
        }
    }

    #[test]
    fn payment_status_transition_table() {
        use PaymentStatusType::*;
        let allowed = [(Pending, Paid), (Pending, Failed), (Failed, Paid), (Failed, Pending), (Paid, Refunded)];
        for from in [Pending, Paid, Failed, Refunded] {
            for to in [Pending, Paid, Failed, Refunded] {
                assert_eq!(from.can_transition_to(to), allowed.contains(&(from, to)), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn unknown_status_values_are_rejected() {
        assert!(OrderStatusType::from_str("bogus").is_err());
        assert!(PaymentStatusType::from_str("Settled").is_err());
        assert!(PaymentMethod::from_str("iou").is_err());
    }

    #[test]
    fn stock_reservation_is_held_until_shipment_or_reversal() {
        use OrderStatusType::*;
        assert!(Pending.holds_stock_reservation());
        assert!(Processing.holds_stock_reservation());
        for status in [Shipped, Delivered, Cancelled, Returned] {
            assert!(!status.holds_stock_reservation());
        }
    }

    #[test]
    fn request_validation_catches_structural_problems() {
        let lines = vec![CartLine::new(1, 2)];
        let ok = NewOrderRequest::new("12 Main Rd", "12 Main Rd", lines.clone(), PaymentMethod::Card);
        assert!(ok.validate().is_ok());

        let empty = NewOrderRequest::new("12 Main Rd", "12 Main Rd", vec![], PaymentMethod::Card);
        assert_eq!(empty.validate(), Err(OrderRequestError::EmptyOrder));

        let zero_qty = NewOrderRequest::new("12 Main Rd", "12 Main Rd", vec![CartLine::new(5, 0)], PaymentMethod::Card);
        assert_eq!(zero_qty.validate(), Err(OrderRequestError::InvalidQuantity { product_id: 5, quantity: 0 }));

        let negative_qty = NewOrderRequest::new("12 Main Rd", "12 Main Rd", vec![CartLine::new(5, -3)], PaymentMethod::Card);
        assert!(negative_qty.validate().is_err());

        let dup = NewOrderRequest::new("12 Main Rd", "12 Main Rd", vec![CartLine::new(1, 1), CartLine::new(1, 2)], PaymentMethod::Card);
        assert_eq!(dup.validate(), Err(OrderRequestError::DuplicateLine(1)));

        let no_ship = NewOrderRequest::new("  ", "12 Main Rd", lines.clone(), PaymentMethod::Card);
        assert_eq!(no_ship.validate(), Err(OrderRequestError::MissingShippingAddress));

        let no_bill = NewOrderRequest::new("12 Main Rd", "", lines, PaymentMethod::Card);
        assert_eq!(no_bill.validate(), Err(OrderRequestError::MissingBillingAddress));
    }

    #[test]
    fn checkout_requests_deserialize_from_json() {
        let json = r#"{
            "customer_id": 17,
            "shipping_address": "14 Foundry Rd",
            "billing_address": "14 Foundry Rd",
            "lines": [{"product_id": 3, "quantity": 2}],
            "payment_method": "Card",
            "payment_reference": null,
            "notes": "call ahead"
        }"#;
        let request: NewOrderRequest = serde_json::from_str(json).expect("Invalid JSON");
        assert_eq!(request.customer_id, Some(17));
        assert_eq!(request.lines, vec![CartLine::new(3, 2)]);
        assert_eq!(request.payment_method, PaymentMethod::Card);
        assert!(request.validate().is_ok());

        // payment methods outside the enumerated set never make it into a request value
        let bartered = json.replace("Card", "Barter");
        assert!(serde_json::from_str::<NewOrderRequest>(&bartered).is_err());
    }

    #[test]
    fn priced_line_snapshots_the_product() {
        let product = Product {
            id: 7,
            name: "M8 hex bolt (100 pack)".to_string(),
            unit_price: Money::from_cents(1250),
            stock_quantity: 40,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let line = PricedLine::new(&product, 3);
        assert_eq!(line.product_name, product.name);
        assert_eq!(line.unit_price, product.unit_price);
        assert_eq!(line.line_total, Money::from_cents(3750));
    }
}
