// src/engine/management.rs
// Continuous trade management: one action per monitoring cycle per position

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::domain::models::{
    ActionPriority, ManagementAction, MarketSnapshot, OrderSide, Position, StrategyCategory,
    Timeframe, TradeManagementAction,
};

/// Loss percent beyond which a position is closed unconditionally
pub const MAX_LOSS_PERCENT: f64 = 5.0;

/// Minutes after which a scalping position is stale
pub const SCALP_MAX_MINUTES: i64 = 15;

/// Minutes in trade before a marginally profitable position moves to breakeven
fn breakeven_minutes(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::M1 => 15,
        Timeframe::M5 => 45,
        Timeframe::M15 => 90,
        Timeframe::M30 => 150,
        Timeframe::H1 => 240,
        Timeframe::H4 => 720,
        Timeframe::D1 => 2880,
    }
}

/// Hard ceiling on time in position
fn max_minutes(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::M1 => 60,
        Timeframe::M5 => 240,
        Timeframe::M15 => 720,
        Timeframe::M30 => 1440,
        Timeframe::H1 => 2880,
        Timeframe::H4 => 10_080,
        Timeframe::D1 => 20_160,
    }
}

fn timeframe_trail_multiplier(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::M1 => 0.5,
        Timeframe::M5 => 0.6,
        Timeframe::M15 => 0.8,
        Timeframe::M30 => 0.9,
        Timeframe::H1 => 1.0,
        Timeframe::H4 => 1.5,
        Timeframe::D1 => 2.0,
    }
}

fn category_trail_multiplier(category: StrategyCategory) -> f64 {
    match category {
        StrategyCategory::Scalping => 0.5,
        StrategyCategory::Momentum | StrategyCategory::Breakout => 0.8,
        StrategyCategory::Trend => 1.2,
        StrategyCategory::Swing => 1.5,
        _ => 1.0,
    }
}

/// Stateless per call: a pure function of position and market snapshot.
/// Five independent rule checks run every cycle; the highest-priority
/// non-HOLD candidate wins, ties breaking on confidence.
pub struct TradeManager;

impl TradeManager {
    pub fn new() -> Self {
        Self
    }

    pub fn manage(&self, position: &Position, snapshot: &MarketSnapshot) -> TradeManagementAction {
        // Work off the live price; the stored current_price may be stale
        let mut live = position.clone();
        live.current_price = snapshot.price;

        let mut candidates = Vec::new();
        if let Some(action) = self.check_full_close(&live, snapshot) {
            candidates.push(action);
        }
        if let Some(action) = self.check_breakeven(&live, snapshot) {
            candidates.push(action);
        }
        if let Some(action) = self.check_trailing_stop(&live) {
            candidates.push(action);
        }
        if let Some(action) = self.check_partial_close(&live, snapshot) {
            candidates.push(action);
        }
        if let Some(action) = self.check_extend_target(&live) {
            candidates.push(action);
        }

        resolve(candidates)
    }

    fn check_breakeven(
        &self,
        position: &Position,
        snapshot: &MarketSnapshot,
    ) -> Option<TradeManagementAction> {
        let pnl = position.pnl_percent();
        let rr = position.rr_multiple().unwrap_or(0.0);
        let minutes = position.minutes_open(snapshot.timestamp);

        let rr_trigger = rr >= 1.0;
        let time_trigger =
            minutes > breakeven_minutes(position.timeframe) && pnl > 0.0 && pnl <= 1.0;
        if !rr_trigger && !time_trigger {
            return None;
        }

        // Already at or beyond breakeven: nothing to move
        if let Some(stop) = position.stop_loss {
            let protected = match position.side {
                OrderSide::Buy => stop >= position.entry_price,
                OrderSide::Sell => stop <= position.entry_price,
            };
            if protected {
                return None;
            }
        }

        let reason = if rr_trigger {
            format!("Trade at {:.2}R, protecting entry", rr)
        } else {
            format!("{} minutes in trade with marginal profit, protecting entry", minutes)
        };
        Some(TradeManagementAction {
            action: ManagementAction::MoveToBreakeven,
            new_stop_loss: Some(position.entry_price),
            new_take_profit: None,
            close_quantity: None,
            priority: ActionPriority::Medium,
            confidence: 0.75,
            reasoning: vec![reason],
        })
    }

    fn check_trailing_stop(&self, position: &Position) -> Option<TradeManagementAction> {
        if position.pnl_percent() <= 0.0 {
            return None;
        }

        let entry = position.entry_price.to_f64().unwrap_or_default();
        let trail_distance = entry
            * 0.01
            * timeframe_trail_multiplier(position.timeframe)
            * category_trail_multiplier(position.strategy_category);
        let price = position.current_price.to_f64().unwrap_or_default();

        let candidate = match position.side {
            OrderSide::Buy => price - trail_distance,
            OrderSide::Sell => price + trail_distance,
        };
        let candidate = Decimal::from_f64(candidate)?;

        // Tightens only, never loosens
        if let Some(stop) = position.stop_loss {
            let tighter = match position.side {
                OrderSide::Buy => candidate > stop,
                OrderSide::Sell => candidate < stop,
            };
            if !tighter {
                return None;
            }
        }

        Some(TradeManagementAction {
            action: ManagementAction::TrailStop,
            new_stop_loss: Some(candidate),
            new_take_profit: None,
            close_quantity: None,
            priority: ActionPriority::Medium,
            confidence: 0.7,
            reasoning: vec![format!(
                "Trailing stop to {} at {:.2} distance",
                candidate, trail_distance
            )],
        })
    }

    fn check_partial_close(
        &self,
        position: &Position,
        snapshot: &MarketSnapshot,
    ) -> Option<TradeManagementAction> {
        let rr = position.rr_multiple().unwrap_or(0.0);
        if (1.5..2.5).contains(&rr) {
            return Some(TradeManagementAction {
                action: ManagementAction::PartialClose,
                new_stop_loss: None,
                new_take_profit: None,
                close_quantity: Some(position.quantity * Decimal::new(5, 1)),
                priority: ActionPriority::Medium,
                confidence: 0.8,
                reasoning: vec![format!("Banking half at {:.2}R", rr)],
            });
        }

        // Time-based scale-out for the categories that decay fastest
        let time_scaled = matches!(
            position.strategy_category,
            StrategyCategory::Scalping | StrategyCategory::Swing
        );
        let minutes = position.minutes_open(snapshot.timestamp);
        if time_scaled && position.pnl_percent() > 0.0 && minutes > max_minutes(position.timeframe) / 2
        {
            return Some(TradeManagementAction {
                action: ManagementAction::PartialClose,
                new_stop_loss: None,
                new_take_profit: None,
                close_quantity: Some(position.quantity * Decimal::new(3, 1)),
                priority: ActionPriority::Medium,
                confidence: 0.65,
                reasoning: vec![format!(
                    "{} minutes in a {} trade, scaling out 30%",
                    minutes, position.strategy_category
                )],
            });
        }

        None
    }

    fn check_full_close(
        &self,
        position: &Position,
        snapshot: &MarketSnapshot,
    ) -> Option<TradeManagementAction> {
        let pnl = position.pnl_percent();
        let minutes = position.minutes_open(snapshot.timestamp);

        if pnl < -MAX_LOSS_PERCENT {
            return Some(self.full_close(
                position,
                ActionPriority::Urgent,
                0.95,
                format!("Loss at {:.1}%, cutting the position", pnl),
            ));
        }

        if position.strategy_category == StrategyCategory::Scalping && minutes > SCALP_MAX_MINUTES {
            return Some(self.full_close(
                position,
                ActionPriority::High,
                0.7,
                format!("Scalp held {} minutes, closing", minutes),
            ));
        }

        // Profitable but the remaining runway no longer pays for the risk
        if pnl > 0.0 {
            if let (Some(target), Some(stop)) = (position.take_profit, position.stop_loss) {
                let risk = (position.entry_price - stop).abs().to_f64().unwrap_or_default();
                let remaining = match position.side {
                    OrderSide::Buy => target - position.current_price,
                    OrderSide::Sell => position.current_price - target,
                };
                let remaining = remaining.to_f64().unwrap_or_default();
                if risk > 0.0 && remaining / risk < 0.5 {
                    return Some(self.full_close(
                        position,
                        ActionPriority::Medium,
                        0.65,
                        format!("Remaining R:R {:.2} below 0.5, taking profit", remaining / risk),
                    ));
                }
            }
        }

        if minutes > max_minutes(position.timeframe) {
            return Some(self.full_close(
                position,
                ActionPriority::High,
                0.75,
                format!("Max time in position exceeded ({} minutes)", minutes),
            ));
        }

        None
    }

    fn check_extend_target(&self, position: &Position) -> Option<TradeManagementAction> {
        let trending = matches!(
            position.strategy_category,
            StrategyCategory::Trend | StrategyCategory::Momentum
        );
        if !trending || position.pnl_percent() <= 3.0 {
            return None;
        }

        let target = position.take_profit?;
        let total = match position.side {
            OrderSide::Buy => target - position.entry_price,
            OrderSide::Sell => position.entry_price - target,
        };
        let travelled = match position.side {
            OrderSide::Buy => position.current_price - position.entry_price,
            OrderSide::Sell => position.entry_price - position.current_price,
        };
        let total_f = total.to_f64().unwrap_or_default();
        let travelled_f = travelled.to_f64().unwrap_or_default();
        if total_f <= 0.0 || travelled_f / total_f < 0.8 {
            return None;
        }

        let extension = total * Decimal::new(5, 1);
        let new_target = match position.side {
            OrderSide::Buy => target + extension,
            OrderSide::Sell => target - extension,
        };
        Some(TradeManagementAction {
            action: ManagementAction::ExtendTarget,
            new_stop_loss: None,
            new_take_profit: Some(new_target),
            close_quantity: None,
            priority: ActionPriority::Medium,
            confidence: 0.72,
            reasoning: vec![format!(
                "Trend still running at 80% of target, extending to {}",
                new_target
            )],
        })
    }

    fn full_close(
        &self,
        position: &Position,
        priority: ActionPriority,
        confidence: f64,
        reason: String,
    ) -> TradeManagementAction {
        TradeManagementAction {
            action: ManagementAction::FullClose,
            new_stop_loss: None,
            new_take_profit: None,
            close_quantity: Some(position.quantity),
            priority,
            confidence,
            reasoning: vec![reason],
        }
    }
}

impl Default for TradeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest priority wins; ties break on higher confidence
fn resolve(candidates: Vec<TradeManagementAction>) -> TradeManagementAction {
    candidates
        .into_iter()
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
        })
        .unwrap_or_else(|| TradeManagementAction::hold("No management rule triggered"))
}
