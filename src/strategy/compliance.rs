// src/strategy/compliance.rs
// Scores a candidate decision against the strategy's declared rules

use crate::domain::models::{
    StopMethod, StrategyCategory, StrategyCompliance, TradeAction, TradingContext,
};

/// Score at or above which a violation-free decision is compliant
pub const COMPLIANCE_PASS_SCORE: f64 = 70.0;

/// Total deduction cap for missing-indicator recommendations
const INDICATOR_DEDUCTION_CAP: f64 = 15.0;

/// Candidate decision fields the validator scores. Built by the coordinator
/// from the draft before gating.
#[derive(Debug, Clone)]
pub struct DraftDecision {
    pub action: TradeAction,
    pub risk_reward_ratio: f64,
    /// Synthesized confidence, 0-1
    pub confidence: f64,
    pub has_stop: bool,
    /// How the draft's stop was derived, if it carries one
    pub stop_method: Option<StopMethod>,
    /// Technical signal tags serving as entry-condition evidence
    pub evidence: Vec<String>,
}

/// Deduction-based validator. Advisory-but-blocking: the coordinator
/// downgrades a non-compliant BUY/SELL to HOLD.
pub struct ComplianceValidator;

impl ComplianceValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, context: &TradingContext, draft: &DraftDecision) -> StrategyCompliance {
        let strategy = &context.strategy;
        let mut score: f64 = 100.0;
        let mut violations = Vec::new();
        let mut recommendations = Vec::new();

        // Timeframe check applies only when the strategy declares an
        // explicit allow-list
        if let Some(allowed) = &strategy.allowed_timeframes {
            if !allowed.contains(&context.timeframe) {
                score -= 30.0;
                violations.push(format!(
                    "Timeframe {} not in strategy allow-list",
                    context.timeframe
                ));
            }
        }

        if let (Some(preferred), Some(current)) =
            (strategy.preferred_condition, context.snapshot.condition)
        {
            if preferred != current {
                score -= 25.0;
                violations.push(format!(
                    "Market condition {} does not match preferred {}",
                    current, preferred
                ));
            }
        }

        if !strategy.entry_conditions.is_empty() && draft.evidence.is_empty() {
            score -= 20.0;
            violations.push("No entry-condition evidence in the signal set".to_string());
        }

        if draft.action == TradeAction::Buy || draft.action == TradeAction::Sell {
            if let Some(required_rr) = strategy.risk_rules.required_risk_reward {
                if draft.risk_reward_ratio < required_rr {
                    score -= 15.0;
                    violations.push(format!(
                        "Risk-reward {:.2} below required {:.2}",
                        draft.risk_reward_ratio, required_rr
                    ));
                }
            }
            if !draft.has_stop {
                score -= 15.0;
                violations.push("No protective stop on a directional entry".to_string());
            }
            if let Some(required) = strategy.risk_rules.stop_method {
                if draft.has_stop && draft.stop_method != Some(required) {
                    score -= 15.0;
                    violations.push(format!("Stop not derived by required {} method", required));
                }
            }
        }

        if draft.confidence * 100.0 < strategy.confidence_threshold {
            score -= 10.0;
            violations.push(format!(
                "Confidence {:.0}% below strategy threshold {:.0}%",
                draft.confidence * 100.0,
                strategy.confidence_threshold
            ));
        }

        // Category-specific rules
        if strategy.category == StrategyCategory::Scalping {
            let wide_spread = context.snapshot.spread_percent() > 0.1;
            let low_liquidity = context.snapshot.volume.is_zero();
            if wide_spread || low_liquidity {
                score -= 10.0;
                violations.push("Scalping in a wide-spread or illiquid market".to_string());
            }
        }

        // Missing indicators are recommendations, never violations
        let mut indicator_deduction: f64 = 0.0;
        for indicator in &strategy.required_indicators {
            let needle = indicator.to_lowercase();
            let present = draft
                .evidence
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle));
            if !present {
                indicator_deduction += 5.0;
                recommendations.push(format!("Required indicator {} not evidenced", indicator));
            }
        }
        score -= indicator_deduction.min(INDICATOR_DEDUCTION_CAP);

        let score = score.max(0.0);
        let is_compliant = violations.is_empty() && score >= COMPLIANCE_PASS_SCORE;

        log::debug!(
            "{}: compliance score {:.0}, {} violations",
            strategy.name,
            score,
            violations.len()
        );

        StrategyCompliance {
            is_compliant,
            violations,
            recommendations,
            score,
        }
    }
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn context() -> TradingContext {
        TradingContext {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            strategy: StrategyProfile {
                name: "trend".to_string(),
                category: StrategyCategory::Trend,
                allowed_timeframes: Some(vec![Timeframe::H1, Timeframe::H4]),
                entry_conditions: vec!["price above moving average".to_string()],
                exit_conditions: Vec::new(),
                required_indicators: vec!["RSI".to_string()],
                risk_rules: RiskRules {
                    min_risk_percent: 0.5,
                    max_risk_percent: 2.0,
                    required_risk_reward: Some(1.5),
                    stop_method: None,
                },
                confidence_threshold: 50.0,
                preferred_condition: Some(MarketCondition::Trending),
            },
            snapshot: MarketSnapshot {
                symbol: "EURUSD".to_string(),
                price: dec!(100),
                bid: Some(dec!(99.995)),
                ask: Some(dec!(100.005)),
                volume: dec!(5000),
                atr: Some(0.5),
                condition: Some(MarketCondition::Trending),
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

    fn good_draft() -> DraftDecision {
        DraftDecision {
            action: TradeAction::Buy,
            risk_reward_ratio: 2.0,
            confidence: 0.75,
            has_stop: true,
            stop_method: Some(StopMethod::SwingBased),
            evidence: vec!["rsi_bullish".to_string(), "ma_fast_above_slow".to_string()],
        }
    }

    #[test]
    fn clean_draft_is_compliant() {
        let compliance = ComplianceValidator::new().validate(&context(), &good_draft());
        assert!(compliance.is_compliant);
        assert!(compliance.violations.is_empty());
        assert!((compliance.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn compliance_invariant_holds() {
        // is_compliant <=> violations empty AND score >= 70
        let validator = ComplianceValidator::new();
        let mut ctx = context();
        ctx.timeframe = Timeframe::M5;
        let compliance = validator.validate(&ctx, &good_draft());
        assert_eq!(
            compliance.is_compliant,
            compliance.violations.is_empty() && compliance.score >= 70.0
        );
        assert!(!compliance.is_compliant);
    }

    #[test]
    fn timeframe_outside_allow_list_deducts_30() {
        let mut ctx = context();
        ctx.timeframe = Timeframe::M5;
        let compliance = ComplianceValidator::new().validate(&ctx, &good_draft());
        assert!((compliance.score - 70.0).abs() < 1e-9);
        assert_eq!(compliance.violations.len(), 1);
        assert!(!compliance.is_compliant);
    }

    #[test]
    fn no_allow_list_means_no_timeframe_violation() {
        let mut ctx = context();
        ctx.strategy.allowed_timeframes = None;
        ctx.timeframe = Timeframe::M5;
        let compliance = ComplianceValidator::new().validate(&ctx, &good_draft());
        assert!(compliance.is_compliant);
    }

    #[test]
    fn poor_risk_reward_is_a_violation() {
        let mut draft = good_draft();
        draft.risk_reward_ratio = 1.0;
        let compliance = ComplianceValidator::new().validate(&context(), &draft);
        assert!(!compliance.is_compliant);
        assert!((compliance.score - 85.0).abs() < 1e-9);
    }

    #[test]
    fn missing_indicator_is_recommendation_only() {
        let mut draft = good_draft();
        draft.evidence = vec!["ma_fast_above_slow".to_string()];
        // Entry evidence still present, RSI indicator missing
        let compliance = ComplianceValidator::new().validate(&context(), &draft);
        assert!(compliance.violations.is_empty());
        assert_eq!(compliance.recommendations.len(), 1);
        assert!((compliance.score - 95.0).abs() < 1e-9);
        assert!(compliance.is_compliant);
    }

    #[test]
    fn stop_method_mismatch_is_a_violation() {
        let mut ctx = context();
        ctx.strategy.risk_rules.stop_method = Some(StopMethod::FixedPercent);
        let compliance = ComplianceValidator::new().validate(&ctx, &good_draft());
        assert!((compliance.score - 85.0).abs() < 1e-9);
        assert!(compliance
            .violations
            .iter()
            .any(|v| v.contains("FIXED_PERCENT")));
        assert!(!compliance.is_compliant);

        // Matching method keeps the draft clean
        ctx.strategy.risk_rules.stop_method = Some(StopMethod::SwingBased);
        let compliance = ComplianceValidator::new().validate(&ctx, &good_draft());
        assert!(compliance.is_compliant);
        assert!((compliance.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn scalping_with_wide_spread_violates() {
        let mut ctx = context();
        ctx.strategy.category = StrategyCategory::Scalping;
        ctx.snapshot.bid = Some(dec!(99.8));
        ctx.snapshot.ask = Some(dec!(100.2));
        let compliance = ComplianceValidator::new().validate(&ctx, &good_draft());
        assert!(compliance
            .violations
            .iter()
            .any(|v| v.contains("Scalping")));
    }

    #[test]
    fn stacked_violations_floor_at_zero() {
        let mut ctx = context();
        ctx.timeframe = Timeframe::M1;
        ctx.snapshot.condition = Some(MarketCondition::Ranging);
        let draft = DraftDecision {
            action: TradeAction::Buy,
            risk_reward_ratio: 0.5,
            confidence: 0.2,
            has_stop: false,
            stop_method: None,
            evidence: Vec::new(),
        };
        let compliance = ComplianceValidator::new().validate(&ctx, &draft);
        assert!(compliance.score >= 0.0);
        assert!(!compliance.is_compliant);
        assert!(compliance.violations.len() >= 5);
    }
}
