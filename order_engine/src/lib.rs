//! Storefront Order Engine
//!
//! The order engine owns the one genuinely delicate piece of the storefront: placing an order.
//! A checkout must validate a multi-line cart, reserve stock for every line, price the result
//! and persist the order as a single atomic unit, staying correct when two customers race for
//! the last units of the same product. The engine also governs the order's post-creation
//! lifecycle (fulfilment and payment status transitions).
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly; use the public API instead. The
//!    exception is the data types, which are defined in the `db_types` module and are public.
//! 2. The backend contracts ([`mod@traits`]). Storage backends implement these traits in order
//!    to serve the checkout API. The key guarantee lives here: stock reservation and order
//!    persistence happen inside one atomic unit, or not at all.
//! 3. The public API ([`mod@checkout_api`]). [`CheckoutApi`] places orders and drives status
//!    transitions, and is the only code path that mutates stock.
//!
//! The engine also provides a set of events that can be subscribed to. These are emitted when an
//! order is created, cancelled, or changes status, and carry the before and after values so that
//! an external activity logger can record them.
mod checkout_api;

pub mod db_types;
pub mod events;
pub mod pricing;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use checkout_api::{order_flow_api::CheckoutApi, order_objects};
pub use pricing::{price_lines, PricingBreakdown, PricingConfig};
pub use traits::{
    CancelledOrder,
    CatalogManagement,
    CheckoutDatabase,
    CheckoutError,
    FullOrder,
    OrderChanged,
    OrderManagement,
    StockShortfall,
};
