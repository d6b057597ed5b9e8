// src/analysis/technical.rs
// Technical signal analyzer: candle series -> direction, strength, confidence

use async_trait::async_trait;

use crate::analysis::indicators;
use crate::domain::errors::AnalysisResult;
use crate::domain::models::{TechnicalAnalysis, TradeDirection, TradingContext};

/// Minimum candle count for a full indicator read; shorter series degrade
/// to a neutral result instead of erroring
pub const MIN_CANDLES: usize = 10;

const FAST_SMA: usize = 10;
const SLOW_SMA: usize = 20;
const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Produces the directional read consumed by decision synthesis
#[async_trait]
pub trait TechnicalAnalyzer: Send + Sync {
    /// Must not fail on missing or short history; the conservative default
    /// is a neutral low-confidence result.
    async fn analyze(&self, context: &TradingContext) -> AnalysisResult<TechnicalAnalysis>;
}

/// Default analyzer built on the indicator kernels: moving-average slope,
/// RSI zone, MACD crossover state and the recent high/low run. Confidence
/// rises with the number of corroborating signals; conflicting signals
/// resolve to neutral.
pub struct IndicatorAnalyzer;

impl IndicatorAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn vote(signals: &mut Vec<String>, bullish: &mut u32, bearish: &mut u32, tag: &str, up: bool) {
        signals.push(tag.to_string());
        if up {
            *bullish += 1;
        } else {
            *bearish += 1;
        }
    }
}

impl Default for IndicatorAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TechnicalAnalyzer for IndicatorAnalyzer {
    async fn analyze(&self, context: &TradingContext) -> AnalysisResult<TechnicalAnalysis> {
        let history = &context.history;
        if history.candles.len() < MIN_CANDLES {
            log::debug!(
                "{}: only {} candles, returning neutral analysis",
                context.symbol,
                history.candles.len()
            );
            return Ok(TechnicalAnalysis::neutral("insufficient candle history"));
        }

        let closes = history.close_prices();
        let highs = history.high_prices();
        let lows = history.low_prices();

        let mut signals = Vec::new();
        let mut bullish = 0u32;
        let mut bearish = 0u32;

        // Moving-average slope: fast SMA relative to slow SMA
        if let (Ok(fast), Ok(slow)) = (
            indicators::calculate_sma(&closes, FAST_SMA),
            indicators::calculate_sma(&closes, SLOW_SMA),
        ) {
            if let (Some(f), Some(s)) = (fast.last(), slow.last()) {
                if f > s {
                    Self::vote(&mut signals, &mut bullish, &mut bearish, "ma_fast_above_slow", true);
                } else if f < s {
                    Self::vote(&mut signals, &mut bullish, &mut bearish, "ma_fast_below_slow", false);
                }
            }
        }

        // Momentum via RSI zone
        if let Ok(rsi) = indicators::calculate_rsi(&closes, RSI_PERIOD) {
            if rsi > 55.0 {
                Self::vote(&mut signals, &mut bullish, &mut bearish, "rsi_bullish", true);
            } else if rsi < 45.0 {
                Self::vote(&mut signals, &mut bullish, &mut bearish, "rsi_bearish", false);
            }
        }

        // MACD histogram sign
        if let Ok((_, _, histogram)) =
            indicators::calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
        {
            if let Some(h) = histogram.last() {
                if *h > 0.0 {
                    Self::vote(&mut signals, &mut bullish, &mut bearish, "macd_positive", true);
                } else if *h < 0.0 {
                    Self::vote(&mut signals, &mut bullish, &mut bearish, "macd_negative", false);
                }
            }
        }

        // Structure: higher highs and higher lows over the last three candles
        let n = highs.len();
        if n >= 3 {
            let higher = highs[n - 1] > highs[n - 2]
                && highs[n - 2] > highs[n - 3]
                && lows[n - 1] > lows[n - 2];
            let lower = lows[n - 1] < lows[n - 2]
                && lows[n - 2] < lows[n - 3]
                && highs[n - 1] < highs[n - 2];
            if higher {
                Self::vote(&mut signals, &mut bullish, &mut bearish, "higher_highs", true);
            } else if lower {
                Self::vote(&mut signals, &mut bullish, &mut bearish, "lower_lows", false);
            }
        }

        let (direction, agree) = if bullish > bearish {
            (TradeDirection::Bullish, bullish)
        } else if bearish > bullish {
            (TradeDirection::Bearish, bearish)
        } else {
            (TradeDirection::Neutral, 0)
        };

        // Corroboration drives confidence: each agreeing signal adds a step
        let confidence = if direction == TradeDirection::Neutral {
            0.2
        } else {
            (0.2 + 0.17 * agree as f64).min(0.9)
        };
        let strength = if direction == TradeDirection::Neutral {
            1
        } else {
            ((agree * 2 + 2).min(10)) as u8
        };

        Ok(TechnicalAnalysis {
            direction,
            strength,
            confidence,
            signals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::*;
    use rust_decimal::prelude::*;
    use rust_decimal::Decimal;

    fn context_with_closes(closes: &[f64]) -> TradingContext {
        let mut history = PriceHistory::new("EURUSD", Timeframe::H1);
        for (i, &c) in closes.iter().enumerate() {
            let d = Decimal::from_f64(c).unwrap_or_default();
            history.add_candle(Candlestick {
                open_time: i as i64 * 3_600_000,
                close_time: (i + 1) as i64 * 3_600_000,
                open: d,
                high: d * Decimal::from_f64(1.002).unwrap(),
                low: d * Decimal::from_f64(0.998).unwrap(),
                close: d,
                volume: Decimal::from(1000),
            });
        }
        let price = history
            .last_candle()
            .map(|c| c.close)
            .unwrap_or(Decimal::from(100));
        TradingContext {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            strategy: StrategyProfile {
                name: "trend".to_string(),
                category: StrategyCategory::Trend,
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
                price,
                bid: None,
                ask: None,
                volume: Decimal::from(1000),
                atr: None,
                condition: None,
                timestamp: 0,
            },
            history,
            account: AccountState {
                balance: Decimal::from(10_000),
                margin_level: Some(500.0),
                unrealized_pnl: Decimal::ZERO,
            },
            open_positions: Vec::new(),
            risk_tolerance: RiskTolerance::Moderate,
            max_quantity: None,
        }
    }

    #[tokio::test]
    async fn short_history_is_neutral_not_error() {
        let ctx = context_with_closes(&[100.0, 101.0, 102.0]);
        let analysis = IndicatorAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(analysis.direction, TradeDirection::Neutral);
        assert!(analysis.confidence <= 0.2);
    }

    #[tokio::test]
    async fn empty_history_is_neutral() {
        let ctx = context_with_closes(&[]);
        let analysis = IndicatorAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(analysis.direction, TradeDirection::Neutral);
    }

    #[tokio::test]
    async fn sustained_uptrend_reads_bullish() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let ctx = context_with_closes(&closes);
        let analysis = IndicatorAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(analysis.direction, TradeDirection::Bullish);
        assert!(analysis.confidence > 0.5);
        assert!(analysis.strength >= 5);
    }

    #[tokio::test]
    async fn sustained_downtrend_reads_bearish() {
        let closes: Vec<f64> = (0..60).map(|i| 130.0 - i as f64 * 0.5).collect();
        let ctx = context_with_closes(&closes);
        let analysis = IndicatorAnalyzer::new().analyze(&ctx).await.unwrap();
        assert_eq!(analysis.direction, TradeDirection::Bearish);
        assert!(analysis.confidence > 0.5);
    }

    #[tokio::test]
    async fn confidence_rises_with_corroboration() {
        // Mild trend: fewer agreeing signals than the strong trend
        let mild: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.05) + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let strong: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();

        let weak = IndicatorAnalyzer::new()
            .analyze(&context_with_closes(&mild))
            .await
            .unwrap();
        let confident = IndicatorAnalyzer::new()
            .analyze(&context_with_closes(&strong))
            .await
            .unwrap();
        assert!(confident.confidence >= weak.confidence);
    }
}
