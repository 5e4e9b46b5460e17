//! # Order engine public API
//!
//! The `checkout_api` module exposes the programmatic API for the order engine.
//!
//! * [`order_flow_api`] is the primary API for placing orders (inventory reservation, pricing
//!   and atomic persistence) and for driving the post-creation order lifecycle.
//! * [`order_objects`] holds the supporting query and result objects.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits
//! the API requires, plus the pricing configuration.
//!
//! ```rust,ignore
//! use order_engine::{CheckoutApi, PricingConfig, SqliteDatabase};
//! use order_engine::events::EventProducers;
//! let db = SqliteDatabase::new(10).await?;
//! let api = CheckoutApi::new(db, PricingConfig::from_env(), EventProducers::default());
//! let order = api.place_order(request).await?;
//! ```

pub mod order_flow_api;
pub mod order_objects;
