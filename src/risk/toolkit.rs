// src/risk/toolkit.rs
// Pure numeric risk functions: no I/O, no state

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::analysis::indicators;
use crate::analysis::levels::SwingLevels;
use crate::domain::models::{OrderSide, PriceHistory, Timeframe};

/// Risk percent applied when a timeframe has no table entry
pub const DEFAULT_TIMEFRAME_RISK_PERCENT: f64 = 0.5;

/// Ceiling on position notional as a fraction of the account balance
pub const MAX_NOTIONAL_FRACTION: f64 = 0.05;

/// Hard per-asset unit cap
pub const MAX_UNITS_PER_ASSET: f64 = 10_000.0;

/// Minimum viable notional in account currency; smaller trades are dropped
pub const MIN_NOTIONAL: f64 = 10.0;

/// ATR lookback used when the snapshot carries no precomputed value
pub const ATR_PERIOD: usize = 14;

/// Coarse volatility classification from the ATR/price ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityClass {
    Low,
    Normal,
    High,
}

/// Risk percent per timeframe. Timeframes outside the table take the
/// documented 0.5% default.
pub fn timeframe_risk_percent(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::M1 => 0.15,
        Timeframe::M5 => 0.25,
        Timeframe::M15 => 0.4,
        Timeframe::H1 => 0.8,
        Timeframe::H4 => 1.2,
        Timeframe::D1 => 2.0,
        _ => DEFAULT_TIMEFRAME_RISK_PERCENT,
    }
}

/// Classify volatility from ATR relative to price
pub fn volatility_class(atr: f64, price: f64) -> VolatilityClass {
    if price <= 0.0 {
        return VolatilityClass::Normal;
    }
    let atr_percent = atr / price * 100.0;
    if atr_percent > 1.5 {
        VolatilityClass::High
    } else if atr_percent < 0.3 {
        VolatilityClass::Low
    } else {
        VolatilityClass::Normal
    }
}

/// Volatility-adjusted sizing dampener
pub fn atr_position_multiplier(atr: f64, price: f64) -> f64 {
    if price <= 0.0 {
        return 1.0;
    }
    let atr_percent = atr / price * 100.0;
    if atr_percent > 2.0 {
        0.7
    } else if atr_percent > 1.0 {
        0.85
    } else if atr_percent < 0.3 {
        1.1
    } else {
        1.0
    }
}

/// ATR for the series, falling back to 1% of price when the candle history
/// is too short to compute one
pub fn estimate_atr(history: &PriceHistory, price: f64) -> f64 {
    indicators::latest_atr(
        &history.high_prices(),
        &history.low_prices(),
        &history.close_prices(),
        ATR_PERIOD,
    )
    .unwrap_or(price * 0.01)
}

/// Risk-based position size.
///
/// size = balance * risk_percent / 100 / |entry - stop|, with a fallback of
/// balance * 0.001 / entry when the stop is missing or at zero distance.
/// Clamped to the notional ceiling and the per-asset unit cap; trades below
/// the minimum viable notional collapse to zero rather than being inflated
/// past their risk budget.
pub fn position_size(
    balance: Decimal,
    risk_percent: f64,
    entry_price: Decimal,
    stop_loss: Option<Decimal>,
) -> Decimal {
    let balance_f = balance.to_f64().unwrap_or_default();
    let entry_f = entry_price.to_f64().unwrap_or_default();
    if balance_f <= 0.0 || entry_f <= 0.0 || risk_percent <= 0.0 {
        return Decimal::ZERO;
    }

    let risk_amount = balance_f * risk_percent / 100.0;
    let stop_distance = stop_loss
        .map(|s| (entry_price - s).abs().to_f64().unwrap_or_default())
        .unwrap_or(0.0);

    let mut size = if stop_distance > 0.0 {
        risk_amount / stop_distance
    } else {
        // No usable stop: token exposure of 0.1% of balance
        balance_f * 0.001 / entry_f
    };

    size = size.min(MAX_UNITS_PER_ASSET);
    size = size.min(balance_f * MAX_NOTIONAL_FRACTION / entry_f);

    if size * entry_f < MIN_NOTIONAL {
        return Decimal::ZERO;
    }

    Decimal::from_f64(size).unwrap_or_default()
}

/// Stop/target pair produced by the geometry below
#[derive(Debug, Clone, Copy)]
pub struct StopTarget {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Stop and take-profit from swing structure, ATR and the timeframe risk
/// budget. Per side, the most conservative candidate of each family wins:
/// for a BUY the stop is the highest of the stop candidates and the target
/// the lowest of the target candidates; a SELL is the mirror.
pub fn smart_stop_take_profit(
    side: OrderSide,
    price: f64,
    swing: &SwingLevels,
    atr: f64,
    risk_multiplier: f64,
    timeframe: Timeframe,
) -> StopTarget {
    let tf_risk = timeframe_risk_percent(timeframe) / 100.0;

    match side {
        OrderSide::Buy => {
            let mut stop_candidates = vec![price - risk_multiplier * atr, price * (1.0 - tf_risk)];
            if let Some(low) = swing.entry_candle_low {
                stop_candidates.push(low - 0.5 * atr);
            }
            if let Some(support) = swing.nearest_support {
                stop_candidates.push(support - 0.3 * atr);
            }
            let stop = stop_candidates
                .into_iter()
                .filter(|s| *s < price)
                .fold(f64::MIN, f64::max);

            let risk_distance = price - stop;
            let mut target_candidates = vec![price + 1.5 * risk_distance];
            if let Some(resistance) = swing.nearest_resistance {
                let shaved = resistance - 0.2 * atr;
                if shaved > price {
                    target_candidates.push(shaved);
                }
            }
            let take_profit = target_candidates.into_iter().fold(f64::MAX, f64::min);

            StopTarget {
                stop_loss: stop,
                take_profit,
            }
        }
        OrderSide::Sell => {
            let mut stop_candidates = vec![price + risk_multiplier * atr, price * (1.0 + tf_risk)];
            if let Some(high) = swing.entry_candle_high {
                stop_candidates.push(high + 0.5 * atr);
            }
            if let Some(resistance) = swing.nearest_resistance {
                stop_candidates.push(resistance + 0.3 * atr);
            }
            let stop = stop_candidates
                .into_iter()
                .filter(|s| *s > price)
                .fold(f64::MAX, f64::min);

            let risk_distance = stop - price;
            let mut target_candidates = vec![price - 1.5 * risk_distance];
            if let Some(support) = swing.nearest_support {
                let shaved = support + 0.2 * atr;
                if shaved < price {
                    target_candidates.push(shaved);
                }
            }
            let take_profit = target_candidates.into_iter().fold(f64::MIN, f64::max);

            StopTarget {
                stop_loss: stop,
                take_profit,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn timeframe_table_and_default() {
        assert!((timeframe_risk_percent(Timeframe::M1) - 0.15).abs() < 1e-9);
        assert!((timeframe_risk_percent(Timeframe::D1) - 2.0).abs() < 1e-9);
        // M30 has no table entry
        assert!((timeframe_risk_percent(Timeframe::M30) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn atr_multiplier_bands() {
        assert!((atr_position_multiplier(2.5, 100.0) - 0.7).abs() < 1e-9);
        assert!((atr_position_multiplier(1.5, 100.0) - 0.85).abs() < 1e-9);
        assert!((atr_position_multiplier(0.2, 100.0) - 1.1).abs() < 1e-9);
        assert!((atr_position_multiplier(0.5, 100.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn position_size_risk_formula() {
        // Scenario: entry 100, stop 98, balance 10_000, 1% risk
        // risk amount = 100, stop distance = 2, raw size = 50 units,
        // then the 5% notional ceiling (500 / 100 = 5 units) applies
        let size = position_size(dec!(10000), 1.0, dec!(100), Some(dec!(98)));
        assert_eq!(size, dec!(5));
    }

    #[test]
    fn position_size_uncapped_when_within_ceiling() {
        // Wide stop keeps the raw size under every cap: 100 / 50 = 2 units
        let size = position_size(dec!(10000), 1.0, dec!(100), Some(dec!(50)));
        assert_eq!(size, dec!(2));
    }

    #[test]
    fn position_size_missing_stop_falls_back() {
        let size = position_size(dec!(10000), 1.0, dec!(100), None);
        // balance * 0.001 / entry = 0.1 units, notional $10 = minimum viable
        let f = size.to_f64().unwrap();
        assert!((f - 0.1).abs() < 1e-9);
    }

    #[test]
    fn position_size_below_min_notional_is_zero() {
        let size = position_size(dec!(100), 0.1, dec!(100), Some(dec!(99)));
        assert_eq!(size, Decimal::ZERO);
    }

    #[test]
    fn risk_bound_holds_after_clamping() {
        // P4: quantity * |entry - stop| never exceeds balance * risk% / 100
        for risk in [0.25, 0.5, 1.0, 1.5, 2.0] {
            let size = position_size(dec!(25000), risk, dec!(120), Some(dec!(114)));
            let risked = size.to_f64().unwrap() * 6.0;
            assert!(risked <= 25000.0 * risk / 100.0 * 1.0001);
        }
    }

    #[test]
    fn buy_stop_below_price_target_above() {
        let swing = SwingLevels {
            nearest_support: Some(97.0),
            nearest_resistance: Some(106.0),
            entry_candle_low: Some(99.0),
            entry_candle_high: Some(101.0),
        };
        let st = smart_stop_take_profit(OrderSide::Buy, 100.0, &swing, 1.0, 1.0, Timeframe::H1);
        assert!(st.stop_loss < 100.0);
        assert!(st.take_profit > 100.0);
        // Most conservative stop candidate: max(98.5, 96.7, 99.0, 99.2) = 99.2
        assert!((st.stop_loss - 99.2).abs() < 1e-9);
        // Target: min(resistance - 0.2*atr = 105.8, 100 + 1.5*0.8 = 101.2)
        assert!((st.take_profit - 101.2).abs() < 1e-9);
    }

    #[test]
    fn sell_is_mirror_of_buy() {
        let swing = SwingLevels {
            nearest_support: Some(94.0),
            nearest_resistance: Some(103.0),
            entry_candle_low: Some(99.0),
            entry_candle_high: Some(101.0),
        };
        let st = smart_stop_take_profit(OrderSide::Sell, 100.0, &swing, 1.0, 1.0, Timeframe::H1);
        assert!(st.stop_loss > 100.0);
        assert!(st.take_profit < 100.0);
    }

    #[test]
    fn stop_sides_hold_without_swing_levels() {
        let swing = SwingLevels::default();
        for tf in [Timeframe::M1, Timeframe::H1, Timeframe::D1] {
            let buy = smart_stop_take_profit(OrderSide::Buy, 50.0, &swing, 0.4, 1.25, tf);
            assert!(buy.stop_loss < 50.0 && buy.take_profit > 50.0);
            let sell = smart_stop_take_profit(OrderSide::Sell, 50.0, &swing, 0.4, 1.25, tf);
            assert!(sell.stop_loss > 50.0 && sell.take_profit < 50.0);
        }
    }
}
