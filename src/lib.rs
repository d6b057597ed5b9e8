// src/lib.rs
// Main library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod engine;
pub mod risk;
pub mod strategy;

pub use config::Config;
pub use engine::coordinator::DecisionCoordinator;
pub use engine::management::TradeManager;
