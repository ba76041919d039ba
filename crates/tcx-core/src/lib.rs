//! tcx-core
//!
//! Shared data model, broker adapter contract, price representation, and
//! order-sequencing bookkeeping used by every other `tcx-*` crate. This
//! crate has no broker implementation and no network I/O — it is the
//! dependency-free core that `tcx-broker-paper`, `tcx-broker-alpaca`,
//! `tcx-position`, `tcx-sequencer`, `tcx-fill`, `tcx-protection` and
//! `tcx-strategy` all build on top of.

pub mod broker;
pub mod id_map;
pub mod idempotency;
pub mod market;
pub mod oms;
pub mod prices;
pub mod types;

pub use broker::{Account, Bar, BrokerAdapter, BrokerError, BrokerPosition};
pub use id_map::BrokerOrderMap;
pub use idempotency::client_order_id;
pub use market::{FeatureSource, Features, MarketRegime, SentimentSnapshot, SentimentSource};
pub use oms::{OmsEvent, OmsOrder, OrderState, TransitionError};
pub use prices::{micros_to_price, price_to_micros, PricingError, MICROS_PER_UNIT};
pub use types::{
    BracketLeg, DetectionMethod, FillResult, FillStatus, Order, OrderConflict, OrderStatus,
    OrderType, PartialExit, Position, ProtectionState, SequenceResult, Side, ShareAllocation,
    ShareAvailability, SubmitOrderRequest, TimeInForce,
};
