pub mod dispatch;
pub mod order;
pub mod strategy;
pub mod venue;

pub use dispatch::TradingEngine;
pub use order::{ExecutionReport, Order, OrderSide, OrderStatus, OrderType};
pub use strategy::{EngineHandle, RegisteredStrategy, StrategyCallbacks};
pub use venue::{FixedVenue, VenueSelector};
