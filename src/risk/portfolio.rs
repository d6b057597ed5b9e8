// src/risk/portfolio.rs
// Portfolio/risk analyzer: account + open positions -> exposure assessment

use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::domain::errors::AnalysisResult;
use crate::domain::models::{PortfolioAssessment, RiskLevel, TradingContext};
use crate::risk::toolkit;

/// Margin level below which trading is suspended outright
pub const MARGIN_SUSPEND_LEVEL: f64 = 150.0;

/// Portfolio heat scale: the score at which heat saturates at 100
const HEAT_SATURATION_POINTS: f64 = 16.0;

/// Assesses account exposure for one proposed trade
#[async_trait]
pub trait PortfolioAnalyzer: Send + Sync {
    /// Must not fail on missing or invalid account data; the conservative
    /// default is the fixed HIGH-risk assessment from `fallback_assessment`.
    async fn assess(&self, context: &TradingContext) -> AnalysisResult<PortfolioAssessment>;
}

/// Default analyzer scoring position count, exposure, concentration, margin
/// level, drawdown and correlated positions into a single risk level
pub struct ExposureAnalyzer;

impl ExposureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Fixed conservative assessment for missing or invalid account data:
    /// HIGH risk, 30%/20% of the requested size as max/recommended.
    pub fn fallback_assessment(requested: Decimal) -> PortfolioAssessment {
        PortfolioAssessment {
            risk_level: RiskLevel::High,
            max_position_size: requested * Decimal::new(3, 1),
            recommended_position_size: requested * Decimal::new(2, 1),
            portfolio_heat: 75.0,
            warnings: vec!["Account data unavailable, conservative sizing applied".to_string()],
            recommendations: vec!["Verify account data feed before increasing size".to_string()],
            can_trade: true,
        }
    }
}

impl Default for ExposureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioAnalyzer for ExposureAnalyzer {
    async fn assess(&self, context: &TradingContext) -> AnalysisResult<PortfolioAssessment> {
        let balance = context.account.balance.to_f64().unwrap_or_default();
        if balance <= 0.0 {
            log::warn!(
                "{}: account balance missing or non-positive, using fallback assessment",
                context.symbol
            );
            let requested = context.max_quantity.unwrap_or(Decimal::ONE);
            return Ok(Self::fallback_assessment(requested));
        }

        let positions = &context.open_positions;
        let mut exposure_by_symbol: HashMap<&str, f64> = HashMap::new();
        for p in positions {
            *exposure_by_symbol.entry(p.symbol.as_str()).or_default() +=
                p.exposure().to_f64().unwrap_or_default();
        }
        let total_exposure: f64 = exposure_by_symbol.values().sum();
        let exposure_percent = total_exposure / balance * 100.0;
        let max_single_percent = exposure_by_symbol
            .values()
            .fold(0.0f64, |a, &b| a.max(b))
            / balance
            * 100.0;

        // Position sharing the proposed symbol's base-currency prefix count
        // as correlated
        let prefix: String = context.symbol.chars().take(3).collect();
        let correlated = positions
            .iter()
            .filter(|p| p.symbol.starts_with(&prefix))
            .count();
        let same_symbol_exposure = exposure_by_symbol
            .get(context.symbol.as_str())
            .copied()
            .unwrap_or(0.0);

        let margin_level = context.account.margin_level;
        let drawdown_percent =
            context.account.unrealized_pnl.to_f64().unwrap_or_default() / balance * 100.0;

        let mut points = 0u32;
        match positions.len() {
            n if n > 8 => points += 3,
            n if n > 5 => points += 2,
            n if n > 3 => points += 1,
            _ => {}
        }
        match exposure_percent {
            e if e > 50.0 => points += 4,
            e if e > 30.0 => points += 3,
            e if e > 20.0 => points += 2,
            e if e > 10.0 => points += 1,
            _ => {}
        }
        match max_single_percent {
            c if c > 25.0 => points += 3,
            c if c > 15.0 => points += 2,
            c if c > 10.0 => points += 1,
            _ => {}
        }
        if let Some(m) = margin_level {
            if m < 150.0 {
                points += 4;
            } else if m < 200.0 {
                points += 3;
            } else if m < 300.0 {
                points += 2;
            }
        }
        match drawdown_percent {
            d if d < -15.0 => points += 4,
            d if d < -10.0 => points += 3,
            d if d < -5.0 => points += 2,
            _ => {}
        }
        match correlated {
            c if c > 3 => points += 2,
            c if c > 1 => points += 1,
            _ => {}
        }

        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();
        if let Some(m) = margin_level {
            if m < MARGIN_SUSPEND_LEVEL {
                warnings.push(format!(
                    "CRITICAL: margin level {:.0} below {}, trading suspended",
                    m, MARGIN_SUSPEND_LEVEL
                ));
            } else if m < 300.0 {
                warnings.push(format!("Margin level {:.0} is getting thin", m));
                recommendations.push("Reduce leverage before adding positions".to_string());
            }
        }
        if drawdown_percent < -15.0 {
            warnings.push(format!(
                "CRITICAL: unrealized drawdown {:.1}% of balance",
                drawdown_percent
            ));
        } else if drawdown_percent < -5.0 {
            warnings.push(format!(
                "Unrealized drawdown at {:.1}% of balance",
                drawdown_percent
            ));
        }
        if exposure_percent > 50.0 {
            warnings.push(format!("Total exposure {:.1}% of balance", exposure_percent));
            recommendations.push("Close or trim positions to bring exposure down".to_string());
        }
        if max_single_percent > 25.0 {
            warnings.push(format!(
                "Single-symbol concentration {:.1}% of balance",
                max_single_percent
            ));
        }
        if positions.len() > 8 {
            recommendations.push(format!("{} open positions, consider consolidating", positions.len()));
        }

        let can_trade = !warnings.iter().any(|w| w.contains("CRITICAL"));

        let mut risk_level = match points {
            p if p >= 12 => RiskLevel::Critical,
            p if p >= 8 => RiskLevel::High,
            p if p >= 4 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        };
        // A suspended account is critical regardless of the point total
        if !can_trade {
            risk_level = RiskLevel::Critical;
        }

        let portfolio_heat = (points as f64 / HEAT_SATURATION_POINTS * 100.0).min(100.0);

        // Base risk per trade for the level, then multiplicative shrink for
        // stacked exposure
        let mut risk_percent: f64 = match risk_level {
            RiskLevel::Critical => 0.5,
            RiskLevel::High => 1.0,
            RiskLevel::Medium => 1.5,
            RiskLevel::Low => 2.0,
        };
        if exposure_percent > 30.0 {
            risk_percent *= 0.7;
        }
        if positions.len() > 5 {
            risk_percent *= 0.8;
        }
        if same_symbol_exposure > 0.0 {
            risk_percent *= 0.6;
        }

        let price = context.snapshot.price.to_f64().unwrap_or_default();
        let (max_size, recommended) = if price > 0.0 {
            let max_units = balance * toolkit::MAX_NOTIONAL_FRACTION / price;
            // Recommendation scales the ceiling by the remaining risk budget
            // relative to the 2% low-risk base
            let budget_ratio = (risk_percent / 2.0).min(1.0);
            (max_units, max_units * budget_ratio)
        } else {
            (0.0, 0.0)
        };

        log::debug!(
            "{}: portfolio points={} level={} heat={:.0} risk%={:.2}",
            context.symbol,
            points,
            risk_level,
            portfolio_heat,
            risk_percent
        );

        Ok(PortfolioAssessment {
            risk_level,
            max_position_size: Decimal::from_f64(max_size).unwrap_or_default(),
            recommended_position_size: Decimal::from_f64(recommended).unwrap_or_default(),
            portfolio_heat,
            warnings,
            recommendations,
            can_trade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::*;
    use rust_decimal_macros::dec;

    fn base_context() -> TradingContext {
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
                price: dec!(100),
                bid: Some(dec!(99.99)),
                ask: Some(dec!(100.01)),
                volume: dec!(5000),
                atr: Some(0.8),
                condition: None,
                timestamp: 0,
            },
            history: PriceHistory::new("EURUSD", Timeframe::H1),
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

    fn position(symbol: &str, qty: Decimal, price: Decimal) -> Position {
        Position {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity: qty,
            entry_price: price,
            current_price: price,
            stop_loss: None,
            take_profit: None,
            open_time: 0,
            strategy_category: StrategyCategory::Trend,
            timeframe: Timeframe::H1,
        }
    }

    #[tokio::test]
    async fn clean_account_is_low_risk() {
        let ctx = base_context();
        let assessment = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.can_trade);
        assert!(assessment.recommended_position_size > Decimal::ZERO);
    }

    #[tokio::test]
    async fn low_margin_suspends_trading() {
        // Scenario: margin level 120 -> CRITICAL, can_trade = false
        let mut ctx = base_context();
        ctx.account.margin_level = Some(120.0);
        let assessment = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
        assert!(!assessment.can_trade);
        assert!(assessment.warnings.iter().any(|w| w.contains("CRITICAL")));
    }

    #[tokio::test]
    async fn missing_balance_uses_fallback() {
        let mut ctx = base_context();
        ctx.account.balance = Decimal::ZERO;
        ctx.max_quantity = Some(dec!(10));
        let assessment = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.max_position_size, dec!(3.0));
        assert_eq!(assessment.recommended_position_size, dec!(2.0));
    }

    #[tokio::test]
    async fn stacked_exposure_raises_level_and_heat() {
        let mut ctx = base_context();
        // Nine positions, heavy concentration in one symbol, deep drawdown
        for i in 0..9 {
            ctx.open_positions
                .push(position(&format!("SYM{}USD", i), dec!(6), dec!(100)));
        }
        ctx.open_positions.push(position("EURUSD", dec!(30), dec!(100)));
        ctx.account.unrealized_pnl = dec!(-1200);
        let assessment = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert!(assessment.risk_level >= RiskLevel::High);
        assert!(assessment.portfolio_heat > 50.0);
        assert!(!assessment.warnings.is_empty());
    }

    #[tokio::test]
    async fn same_symbol_concentration_shrinks_recommendation() {
        let clean = ExposureAnalyzer::new()
            .assess(&base_context())
            .await
            .unwrap();

        let mut ctx = base_context();
        ctx.open_positions.push(position("EURUSD", dec!(2), dec!(100)));
        let loaded = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert!(loaded.recommended_position_size < clean.recommended_position_size);
    }

    #[tokio::test]
    async fn verdict_tracks_risk_level() {
        let clean = ExposureAnalyzer::new()
            .assess(&base_context())
            .await
            .unwrap();
        assert_eq!(clean.verdict(), RiskVerdict::Approve);

        let mut ctx = base_context();
        ctx.account.margin_level = Some(120.0);
        let critical = ExposureAnalyzer::new().assess(&ctx).await.unwrap();
        assert_eq!(critical.verdict(), RiskVerdict::Reject);
    }
}
