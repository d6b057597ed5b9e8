// src/risk/ladder.rs
// Builds the five risk-tiered candidate outcomes for a draft decision

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::analysis::levels::LevelDetector;
use crate::domain::models::{
    LadderRung, OrderSide, PositionSizeLadder, RiskLevels, RiskTier, TradingContext,
};
use crate::risk::toolkit;

/// Stop-geometry risk multiplier per tier, Conservative through Aggressive
fn tier_multiplier(tier: RiskTier) -> f64 {
    match tier {
        RiskTier::Conservative => 0.5,
        RiskTier::Low => 0.75,
        RiskTier::Medium => 1.0,
        RiskTier::High => 1.25,
        RiskTier::Aggressive => 1.5,
    }
}

/// Computes one ladder of five `RiskLevels` tiers, risk percent linearly
/// interpolated between the strategy's declared min and max risk per trade
pub struct LadderBuilder {
    detector: LevelDetector,
}

impl LadderBuilder {
    pub fn new() -> Self {
        Self {
            detector: LevelDetector::new(),
        }
    }

    pub fn build(&self, context: &TradingContext, side: OrderSide) -> PositionSizeLadder {
        let price = context.snapshot.price.to_f64().unwrap_or_default();
        let atr = context
            .snapshot
            .atr
            .unwrap_or_else(|| toolkit::estimate_atr(&context.history, price));
        let swing = self.detector.detect(&context.history, price);

        let rules = &context.strategy.risk_rules;
        let min_risk = rules.min_risk_percent.max(0.0);
        let max_risk = rules.max_risk_percent.max(min_risk);
        let dampener = toolkit::atr_position_multiplier(atr, price);

        let rungs = RiskTier::ALL
            .iter()
            .enumerate()
            .map(|(i, &tier)| {
                // The dampener can scale a quiet-market rung up, but never
                // past the strategy's declared ceiling
                let risk_percent = ((min_risk + (max_risk - min_risk) * i as f64 / 4.0)
                    * dampener)
                    .min(max_risk);
                let geometry = toolkit::smart_stop_take_profit(
                    side,
                    price,
                    &swing,
                    atr,
                    tier_multiplier(tier),
                    context.timeframe,
                );

                let stop = Decimal::from_f64(geometry.stop_loss).unwrap_or_default();
                let target = Decimal::from_f64(geometry.take_profit).unwrap_or_default();
                let size = toolkit::position_size(
                    context.account.balance,
                    risk_percent,
                    context.snapshot.price,
                    Some(stop),
                );

                let risk_distance = (price - geometry.stop_loss).abs();
                let reward_distance = (geometry.take_profit - price).abs();
                let size_f = size.to_f64().unwrap_or_default();
                let risk_reward_ratio = if risk_distance > 0.0 {
                    reward_distance / risk_distance
                } else {
                    0.0
                };

                let reasoning = vec![
                    format!(
                        "{} tier risks {:.2}% of balance at {:.2}x ATR stop distance",
                        tier,
                        risk_percent,
                        tier_multiplier(tier)
                    ),
                    format!(
                        "Stop {:.5}, target {:.5}, R:R {:.2}",
                        geometry.stop_loss, geometry.take_profit, risk_reward_ratio
                    ),
                ];

                LadderRung {
                    tier,
                    levels: RiskLevels {
                        stop_loss: stop,
                        take_profit: target,
                        position_size: size,
                        risk_amount: Decimal::from_f64(size_f * risk_distance)
                            .unwrap_or_default(),
                        reward_amount: Decimal::from_f64(size_f * reward_distance)
                            .unwrap_or_default(),
                        risk_reward_ratio,
                        risk_percent,
                        reasoning,
                    },
                }
            })
            .collect();

        PositionSizeLadder { rungs }
    }
}

impl Default for LadderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
