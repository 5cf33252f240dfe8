pub mod portfolio;
pub mod tracker;

pub use portfolio::{aggregate, apply_stress, PortfolioAggregates, StressScenario};
pub use tracker::{Fill, Position, PositionKey, PositionTracker};
