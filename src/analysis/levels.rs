// src/analysis/levels.rs
// Swing high/low detection feeding the stop/target geometry

use crate::domain::models::PriceHistory;
use rust_decimal::prelude::*;

/// Swing levels around the current price
#[derive(Debug, Clone, Default)]
pub struct SwingLevels {
    /// Nearest swing low below the current price
    pub nearest_support: Option<f64>,
    /// Nearest swing high above the current price
    pub nearest_resistance: Option<f64>,
    /// Low of the most recent candle
    pub entry_candle_low: Option<f64>,
    /// High of the most recent candle
    pub entry_candle_high: Option<f64>,
}

/// Detects swing highs and lows in a candle series
pub struct LevelDetector {
    /// A bar must exceed this many neighbors on each side to count as a swing
    lookaround: usize,
}

impl LevelDetector {
    pub fn new() -> Self {
        Self { lookaround: 2 }
    }

    pub fn with_lookaround(lookaround: usize) -> Self {
        Self {
            lookaround: lookaround.max(1),
        }
    }

    /// Extract the swing levels nearest to `price`. Short series yield a
    /// result with whatever levels could be found, never an error.
    pub fn detect(&self, history: &PriceHistory, price: f64) -> SwingLevels {
        let highs = history.high_prices();
        let lows = history.low_prices();

        let mut levels = SwingLevels::default();
        if let Some(last) = history.last_candle() {
            levels.entry_candle_low = last.low.to_f64();
            levels.entry_candle_high = last.high.to_f64();
        }

        levels.nearest_resistance = self
            .swing_points(&highs, true)
            .into_iter()
            .map(|i| highs[i])
            .filter(|&h| h > price)
            .fold(None, |acc: Option<f64>, h| match acc {
                Some(best) if best <= h => Some(best),
                _ => Some(h),
            });

        levels.nearest_support = self
            .swing_points(&lows, false)
            .into_iter()
            .map(|i| lows[i])
            .filter(|&l| l < price)
            .fold(None, |acc: Option<f64>, l| match acc {
                Some(best) if best >= l => Some(best),
                _ => Some(l),
            });

        levels
    }

    /// Indices of local extrema. `maxima` selects swing highs, otherwise
    /// swing lows.
    fn swing_points(&self, prices: &[f64], maxima: bool) -> Vec<usize> {
        let n = self.lookaround;
        let mut points = Vec::new();
        if prices.len() < 2 * n + 1 {
            return points;
        }

        for i in n..prices.len() - n {
            let candidate = prices[i];
            let is_extreme = (1..=n).all(|d| {
                if maxima {
                    candidate >= prices[i - d] && candidate >= prices[i + d]
                } else {
                    candidate <= prices[i - d] && candidate <= prices[i + d]
                }
            });
            if is_extreme {
                points.push(i);
            }
        }

        points
    }
}

impl Default for LevelDetector {
    fn default() -> Self {
        Self::new()
    }
}
