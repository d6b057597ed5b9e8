// src/domain/repository/mod.rs
// Interfaces for the external collaborators the decision core consumes

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::errors::ProviderResult;
use crate::domain::models::{
    AccountState, Candlestick, Position, StrategyProfile, Timeframe,
};

/// Latest top-of-book quote
#[derive(Debug, Clone)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Market data provider. The core tolerates empty and short candle series.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn latest_quote(&self, symbol: &str) -> ProviderResult<Quote>;

    async fn historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> ProviderResult<Vec<Candlestick>>;
}

/// Account data provider
#[async_trait]
pub trait AccountDataProvider: Send + Sync {
    async fn account_state(&self) -> ProviderResult<AccountState>;

    async fn open_positions(&self, user_id: &str) -> ProviderResult<Vec<Position>>;
}

/// Strategy/bot configuration store supplying the declarative records the
/// validator and coordinator consume
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn strategy(&self, name: &str) -> ProviderResult<StrategyProfile>;
}

/// Optional prose generator used only to enrich reasoning strings. Its
/// output is display-only: no decision-bearing field is ever derived from
/// it, and any failure falls back to the rule-based reasoning.
#[async_trait]
pub trait RationaleGenerator: Send + Sync {
    async fn narrate(&self, summary: &str) -> ProviderResult<String>;
}
