// src/analysis/timing.rs
// Order timing analyzer: microstructure + strategy preference -> order kind

use async_trait::async_trait;
use rust_decimal::prelude::*;

use crate::domain::errors::AnalysisResult;
use crate::domain::models::{
    OrderKind, StrategyCategory, TimingAnalysis, TradingContext, Urgency,
};
use crate::risk::toolkit::{self, VolatilityClass};

/// Spread above this percent of price is considered wide
pub const WIDE_SPREAD_PERCENT: f64 = 0.1;

/// Largest limit offset toward a better fill, percent of price
pub const MAX_LIMIT_OFFSET_PERCENT: f64 = 0.2;

/// Picks the order kind and urgency for a candidate entry
#[async_trait]
pub trait OrderTimingAnalyzer: Send + Sync {
    /// Degrades to a MARKET/medium-urgency preference rather than failing.
    async fn assess(&self, context: &TradingContext) -> AnalysisResult<TimingAnalysis>;
}

/// Default analyzer: category preference adjusted for volatility, spread
/// and sub-5-minute timeframes
pub struct MicrostructureAnalyzer;

impl MicrostructureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn category_default(category: StrategyCategory) -> OrderKind {
        match category {
            StrategyCategory::Breakout | StrategyCategory::Momentum => OrderKind::Stop,
            StrategyCategory::MeanReversion | StrategyCategory::SupportResistance => {
                OrderKind::Limit
            }
            StrategyCategory::Scalping | StrategyCategory::News => OrderKind::Market,
            _ => OrderKind::Market,
        }
    }
}

impl Default for MicrostructureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderTimingAnalyzer for MicrostructureAnalyzer {
    async fn assess(&self, context: &TradingContext) -> AnalysisResult<TimingAnalysis> {
        let price = context.snapshot.price.to_f64().unwrap_or_default();
        let category = context.strategy.category;
        let preferred = Self::category_default(category);

        let mut kind = preferred;
        let mut urgency = Urgency::Medium;
        let mut reasoning = vec![format!(
            "{} strategy prefers {:?} entries",
            category, preferred
        )];

        let atr = context
            .snapshot
            .atr
            .unwrap_or_else(|| toolkit::estimate_atr(&context.history, price));
        let volatility = toolkit::volatility_class(atr, price);
        let spread_percent = context.snapshot.spread_percent();

        match volatility {
            VolatilityClass::High => {
                if kind != OrderKind::Market {
                    reasoning.push("High volatility, switching to market entry".to_string());
                }
                kind = OrderKind::Market;
                urgency = Urgency::High;
            }
            VolatilityClass::Low => {
                if urgency < Urgency::High {
                    if kind != OrderKind::Limit {
                        reasoning.push("Low volatility, limit entry preferred".to_string());
                    }
                    kind = OrderKind::Limit;
                }
            }
            VolatilityClass::Normal => {}
        }

        if spread_percent > WIDE_SPREAD_PERCENT && kind != OrderKind::Limit {
            kind = OrderKind::Limit;
            reasoning.push(format!(
                "Spread {:.3}% of price is wide, working a limit",
                spread_percent
            ));
        }

        // Sub-5-minute charts cannot wait for passive fills
        if context.timeframe.minutes() < 5 {
            kind = OrderKind::Market;
            urgency = Urgency::High;
            reasoning.push("Sub-5-minute timeframe, immediate market entry".to_string());
        }

        // Coherence: start at the 0.7 base, nudge for agreement with the
        // category preference and for forced overrides
        let mut confidence: f64 = 0.7;
        if kind == preferred {
            confidence += 0.1;
        } else {
            confidence -= 0.1;
        }
        if kind == OrderKind::Market && urgency == Urgency::High {
            confidence += 0.05;
        }
        if spread_percent > WIDE_SPREAD_PERCENT && kind == OrderKind::Market {
            // Paying a wide spread at market is the least coherent choice
            confidence -= 0.15;
        }
        confidence = confidence.clamp(0.3, 0.95);

        let entry_offset_percent = match kind {
            OrderKind::Limit => {
                let offset: f64 = match urgency {
                    Urgency::High => 0.05,
                    _ => 0.1,
                };
                offset.min(MAX_LIMIT_OFFSET_PERCENT)
            }
            // Stop entries sit beyond the trigger level by at least one
            // spread width
            OrderKind::Stop => spread_percent.max(0.05),
            OrderKind::Market => 0.0,
        };

        Ok(TimingAnalysis {
            kind,
            urgency,
            confidence,
            entry_offset_percent,
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::*;
    use rust_decimal_macros::dec;

    fn context(category: StrategyCategory, timeframe: Timeframe) -> TradingContext {
        TradingContext {
            symbol: "EURUSD".to_string(),
            timeframe,
            strategy: StrategyProfile {
                name: "s".to_string(),
                category,
                allowed_timeframes: None,
                entry_conditions: Vec::new(),
                exit_conditions: Vec::new(),
                required_indicators: Vec::new(),
                risk_rules: RiskRules::default(),
                confidence_threshold: 50.0,
                preferred_condition: None,
            },
            snapshot: MarketSnapshot {
                symbol: "EURUSD".to_string(),
                price: dec!(100),
                bid: Some(dec!(99.995)),
                ask: Some(dec!(100.005)),
                volume: dec!(5000),
                atr: Some(0.5),
                condition: None,
                timestamp: 0,
            },
            history: PriceHistory::new("EURUSD", timeframe),
            account: AccountState {
                balance: dec!(10000),
                margin_level: Some(500.0),
                unrealized_pnl: Decimal::ZERO,
            },
            open_positions: Vec::new(),
            risk_tolerance: RiskTolerance::Moderate,
            max_quantity: None,
        }
    }

    #[tokio::test]
    async fn breakout_prefers_stop_entry() {
        let ctx = context(StrategyCategory::Breakout, Timeframe::H1);
        let timing = MicrostructureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(timing.kind, OrderKind::Stop);
        assert!(timing.entry_offset_percent > 0.0);
    }

    #[tokio::test]
    async fn mean_reversion_prefers_limit_entry() {
        let ctx = context(StrategyCategory::MeanReversion, Timeframe::H1);
        let timing = MicrostructureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(timing.kind, OrderKind::Limit);
        assert!(timing.entry_offset_percent <= MAX_LIMIT_OFFSET_PERCENT);
    }

    #[tokio::test]
    async fn sub_five_minute_forces_market_high_urgency() {
        let ctx = context(StrategyCategory::MeanReversion, Timeframe::M1);
        let timing = MicrostructureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(timing.kind, OrderKind::Market);
        assert_eq!(timing.urgency, Urgency::High);
    }

    #[tokio::test]
    async fn high_volatility_switches_to_market() {
        let mut ctx = context(StrategyCategory::SupportResistance, Timeframe::H1);
        ctx.snapshot.atr = Some(2.5);
        let timing = MicrostructureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(timing.kind, OrderKind::Market);
        assert_eq!(timing.urgency, Urgency::High);
    }

    #[tokio::test]
    async fn wide_spread_switches_to_limit() {
        let mut ctx = context(StrategyCategory::Momentum, Timeframe::H1);
        ctx.snapshot.bid = Some(dec!(99.8));
        ctx.snapshot.ask = Some(dec!(100.2));
        let timing = MicrostructureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(timing.kind, OrderKind::Limit);
    }

    #[tokio::test]
    async fn coherent_choice_scores_higher_than_override() {
        let coherent = MicrostructureAnalyzer::new()
            .assess(&context(StrategyCategory::Scalping, Timeframe::M15))
            .await
            .unwrap();
        let mut overridden_ctx = context(StrategyCategory::Breakout, Timeframe::H1);
        overridden_ctx.snapshot.bid = Some(dec!(99.8));
        overridden_ctx.snapshot.ask = Some(dec!(100.2));
        let overridden = MicrostructureAnalyzer::new()
            .assess(&overridden_ctx)
            .await
            .unwrap();
        assert!(coherent.confidence > overridden.confidence);
    }
}
