// src/engine/coordinator.rs
// Fans the three analyzers out concurrently and synthesizes one decision

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tokio::time::timeout;

use crate::analysis::levels::{LevelDetector, SwingLevels};
use crate::analysis::technical::TechnicalAnalyzer;
use crate::analysis::timing::OrderTimingAnalyzer;
use crate::config::Config;
use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{
    Decision, MarketSnapshot, OrderKind, OrderSide, OrderType, PortfolioAssessment, RiskTier,
    RiskVerdict, StopMethod, TechnicalAnalysis, TimingAnalysis, TradeAction, TradeDirection,
    TradingContext, Urgency,
};
use crate::domain::repository::RationaleGenerator;
use crate::risk::ladder::LadderBuilder;
use crate::risk::portfolio::{ExposureAnalyzer, PortfolioAnalyzer};
use crate::strategy::compliance::{ComplianceValidator, DraftDecision};

/// Per-analyzer wall-clock budget
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(5);

/// Synthesized confidence is clamped to this band before gating
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

/// Orchestrates one evaluation: concurrent analysis, confidence synthesis,
/// ladder sizing, compliance gating. Stateless between calls; every
/// evaluation reads only its own `TradingContext`.
pub struct DecisionCoordinator {
    technical: Arc<dyn TechnicalAnalyzer>,
    portfolio: Arc<dyn PortfolioAnalyzer>,
    timing: Arc<dyn OrderTimingAnalyzer>,
    validator: ComplianceValidator,
    ladder: LadderBuilder,
    detector: LevelDetector,
    rationale: Option<Arc<dyn RationaleGenerator>>,
    analyzer_timeout: Duration,
}

impl DecisionCoordinator {
    pub fn new(
        technical: Arc<dyn TechnicalAnalyzer>,
        portfolio: Arc<dyn PortfolioAnalyzer>,
        timing: Arc<dyn OrderTimingAnalyzer>,
    ) -> Self {
        Self {
            technical,
            portfolio,
            timing,
            validator: ComplianceValidator::new(),
            ladder: LadderBuilder::new(),
            detector: LevelDetector::new(),
            rationale: None,
            analyzer_timeout: DEFAULT_ANALYZER_TIMEOUT,
        }
    }

    /// Builds a coordinator from the loaded configuration: analyzer timeout
    /// from `engine.analyzer_timeout_secs`, rationale attached only when
    /// `engine.narrate_decisions` is set.
    pub fn from_config(
        config: &Config,
        technical: Arc<dyn TechnicalAnalyzer>,
        portfolio: Arc<dyn PortfolioAnalyzer>,
        timing: Arc<dyn OrderTimingAnalyzer>,
        rationale: Option<Arc<dyn RationaleGenerator>>,
    ) -> Self {
        let mut coordinator = Self::new(technical, portfolio, timing)
            .with_analyzer_timeout(Duration::from_secs(config.engine.analyzer_timeout_secs));
        if config.engine.narrate_decisions {
            if let Some(generator) = rationale {
                coordinator = coordinator.with_rationale(generator);
            }
        }
        coordinator
    }

    pub fn with_rationale(mut self, rationale: Arc<dyn RationaleGenerator>) -> Self {
        self.rationale = Some(rationale);
        self
    }

    pub fn with_analyzer_timeout(mut self, analyzer_timeout: Duration) -> Self {
        self.analyzer_timeout = analyzer_timeout;
        self
    }

    /// Runs one full evaluation. Never fails outward: any error inside the
    /// pipeline degrades to a zero-quantity HOLD.
    pub async fn evaluate(&self, context: &TradingContext) -> Decision {
        match self.evaluate_inner(context).await {
            Ok(decision) => decision,
            Err(e) => {
                log::error!("evaluation failed for {}: {}", context.symbol, e);
                Decision::hold(&format!("Evaluation failed: {}", e))
            }
        }
    }

    async fn evaluate_inner(&self, context: &TradingContext) -> EvaluationResult<Decision> {
        if context.snapshot.price <= Decimal::ZERO {
            return Err(EvaluationError::InvalidContext(format!(
                "non-positive price for {}",
                context.symbol
            )));
        }

        let (technical, assessment, timing) = self.run_analyzers(context).await;

        let direction = technical.direction;
        let action = match direction {
            TradeDirection::Bullish => TradeAction::Buy,
            TradeDirection::Bearish => TradeAction::Sell,
            TradeDirection::Neutral => TradeAction::Hold,
        };

        let confidence = synthesize_confidence(&technical, &assessment, &timing);

        let mut reasoning = Vec::new();
        reasoning.push(format!(
            "Technical: {} strength {}/10 confidence {:.2}",
            technical.direction, technical.strength, technical.confidence
        ));
        reasoning.extend(technical.signals.iter().cloned());
        reasoning.push(format!(
            "Portfolio: {} risk, heat {:.0}/100",
            assessment.risk_level, assessment.portfolio_heat
        ));
        reasoning.extend(assessment.recommendations.iter().cloned());
        reasoning.extend(timing.reasoning.iter().cloned());

        let mut warnings = assessment.warnings.clone();

        // Portfolio gate comes before any sizing work
        if !assessment.can_trade || assessment.verdict() == RiskVerdict::Reject {
            warnings.push("Portfolio risk gate rejected new exposure".to_string());
            return Ok(self
                .finish(
                    Decision {
                        action: TradeAction::Hold,
                        order_type: OrderType::Market,
                        quantity: Decimal::ZERO,
                        stop_loss: None,
                        take_profit: None,
                        risk_reward_ratio: 0.0,
                        confidence,
                        validated: false,
                        warnings,
                        reasoning,
                    },
                    context,
                )
                .await);
        }

        if action == TradeAction::Hold {
            reasoning.push("No directional edge, standing aside".to_string());
            return Ok(self
                .finish(
                    Decision {
                        action,
                        order_type: OrderType::Market,
                        quantity: Decimal::ZERO,
                        stop_loss: None,
                        take_profit: None,
                        risk_reward_ratio: 0.0,
                        confidence,
                        validated: true,
                        warnings,
                        reasoning,
                    },
                    context,
                )
                .await);
        }

        let side = match action {
            TradeAction::Sell => OrderSide::Sell,
            _ => OrderSide::Buy,
        };

        let ladder = self.ladder.build(context, side);
        let tier = tier_for_confidence(confidence, context);
        let rung = ladder
            .select(tier)
            .ok_or_else(|| EvaluationError::InvalidContext("empty size ladder".to_string()))?;
        reasoning.push(format!(
            "Sizing tier {} at {:.2}% risk",
            rung.tier, rung.levels.risk_percent
        ));
        reasoning.extend(rung.levels.reasoning.iter().cloned());

        let mut quantity = rung
            .levels
            .position_size
            .min(assessment.recommended_position_size);
        if let Some(cap) = context.max_quantity {
            quantity = quantity.min(cap);
        }

        let swing = self.detector.detect(
            &context.history,
            context.snapshot.price.to_f64().unwrap_or_default(),
        );
        let order_type = materialize_order(&timing, side, &context.snapshot, &swing);
        let stop_loss = Some(rung.levels.stop_loss);
        let take_profit = Some(rung.levels.take_profit);
        let risk_reward_ratio = rung.levels.risk_reward_ratio;

        let draft = DraftDecision {
            action,
            risk_reward_ratio,
            confidence,
            has_stop: stop_loss.is_some(),
            // The ladder geometry anchors its stops on swing structure
            stop_method: Some(StopMethod::SwingBased),
            evidence: technical.signals.clone(),
        };
        let compliance = self.validator.validate(context, &draft);
        reasoning.push(format!(
            "Compliance score {:.0}/100{}",
            compliance.score,
            if compliance.is_compliant { "" } else { ", non-compliant" }
        ));
        reasoning.extend(compliance.recommendations.iter().cloned());

        let mut decision = Decision {
            action,
            order_type,
            quantity,
            stop_loss,
            take_profit,
            risk_reward_ratio,
            confidence,
            validated: compliance.is_compliant,
            warnings,
            reasoning,
        };

        // Compliance gate: keep the geometry visible, drop the entry
        if !compliance.is_compliant {
            decision.action = TradeAction::Hold;
            decision.quantity = Decimal::ZERO;
            decision.warnings.extend(compliance.violations);
        }

        // Confidence gate against the strategy threshold (0-100 scale)
        if decision.action != TradeAction::Hold
            && confidence * 100.0 < context.strategy.confidence_threshold
        {
            decision
                .reasoning
                .push(format!(
                    "Confidence {:.0} below strategy threshold {:.0}",
                    confidence * 100.0,
                    context.strategy.confidence_threshold
                ));
            decision.action = TradeAction::Hold;
            decision.quantity = Decimal::ZERO;
        }

        if decision.quantity <= Decimal::ZERO && decision.action != TradeAction::Hold {
            decision
                .warnings
                .push("Sized below minimum viable quantity".to_string());
            decision.action = TradeAction::Hold;
        }

        Ok(self.finish(decision, context).await)
    }

    async fn run_analyzers(
        &self,
        context: &TradingContext,
    ) -> (TechnicalAnalysis, PortfolioAssessment, TimingAnalysis) {
        let (technical, assessment, timing) = tokio::join!(
            timeout(self.analyzer_timeout, self.technical.analyze(context)),
            timeout(self.analyzer_timeout, self.portfolio.assess(context)),
            timeout(self.analyzer_timeout, self.timing.assess(context)),
        );

        let technical = match technical {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => {
                log::warn!("signal analysis failed for {}: {}", context.symbol, e);
                TechnicalAnalysis::neutral("Signal analysis unavailable")
            }
            Err(_) => {
                log::warn!("signal analysis timed out for {}", context.symbol);
                TechnicalAnalysis::neutral("Signal analysis timed out")
            }
        };

        let assessment = match assessment {
            Ok(Ok(a)) => a,
            other => {
                match other {
                    Ok(Err(e)) => {
                        log::warn!("portfolio analysis failed for {}: {}", context.symbol, e)
                    }
                    _ => log::warn!("portfolio analysis timed out for {}", context.symbol),
                }
                ExposureAnalyzer::fallback_assessment(default_requested_size(context))
            }
        };

        let timing = match timing {
            Ok(Ok(t)) => t,
            other => {
                match other {
                    Ok(Err(e)) => log::warn!("timing analysis failed for {}: {}", context.symbol, e),
                    _ => log::warn!("timing analysis timed out for {}", context.symbol),
                }
                TimingAnalysis {
                    kind: OrderKind::Market,
                    urgency: Urgency::Medium,
                    confidence: 0.5,
                    entry_offset_percent: 0.0,
                    reasoning: vec!["Timing analysis unavailable, taking market".to_string()],
                }
            }
        };

        (technical, assessment, timing)
    }

    /// Optional prose enrichment. Display-only: failures and timeouts are
    /// dropped without touching the decision.
    async fn finish(&self, mut decision: Decision, context: &TradingContext) -> Decision {
        if let Some(rationale) = &self.rationale {
            let summary = format!(
                "{} {} {} at confidence {:.2}",
                decision.action.as_str(),
                decision.quantity,
                context.symbol,
                decision.confidence
            );
            match timeout(self.analyzer_timeout, rationale.narrate(&summary)).await {
                Ok(Ok(text)) => decision.reasoning.push(text),
                Ok(Err(e)) => log::debug!("rationale generation failed: {}", e),
                Err(_) => log::debug!("rationale generation timed out"),
            }
        }
        decision
    }
}

/// Weighted blend of the three analyzer outputs, clamped to the band that
/// keeps downstream gates meaningful
fn synthesize_confidence(
    technical: &TechnicalAnalysis,
    assessment: &PortfolioAssessment,
    timing: &TimingAnalysis,
) -> f64 {
    let verdict_confidence = match assessment.verdict() {
        RiskVerdict::Approve => 0.8,
        RiskVerdict::Reduce => 0.6,
        RiskVerdict::Reject => 0.3,
    };
    let heat_headroom = (100.0 - assessment.portfolio_heat).max(0.0) / 100.0;
    // Timing confidence is a coherence factor; scale it by the signal
    // confidence so timing alone can never carry a weak signal
    let timing_confidence = timing.confidence * technical.confidence;

    let blended = 0.4 * technical.confidence
        + 0.3 * heat_headroom
        + 0.2 * verdict_confidence
        + 0.1 * timing_confidence;
    blended.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Maps synthesized confidence onto a ladder tier, nudged down one notch
/// for conservative callers
fn tier_for_confidence(confidence: f64, context: &TradingContext) -> RiskTier {
    use crate::domain::models::RiskTolerance;

    let base = if confidence >= 0.8 {
        RiskTier::Aggressive
    } else if confidence >= 0.68 {
        RiskTier::High
    } else if confidence >= 0.55 {
        RiskTier::Medium
    } else if confidence >= 0.45 {
        RiskTier::Low
    } else {
        RiskTier::Conservative
    };

    match (context.risk_tolerance, base) {
        (RiskTolerance::Conservative, RiskTier::Aggressive) => RiskTier::High,
        (RiskTolerance::Conservative, RiskTier::High) => RiskTier::Medium,
        (RiskTolerance::Conservative, RiskTier::Medium) => RiskTier::Low,
        (RiskTolerance::Conservative, _) => RiskTier::Conservative,
        (RiskTolerance::Aggressive, RiskTier::Conservative) => RiskTier::Low,
        (_, tier) => tier,
    }
}

/// Turns the price-free timing preference into a priced order once the
/// trade direction is known
fn materialize_order(
    timing: &TimingAnalysis,
    side: OrderSide,
    snapshot: &MarketSnapshot,
    swing: &SwingLevels,
) -> OrderType {
    let price = snapshot.price;
    let offset = Decimal::from_f64(timing.entry_offset_percent / 100.0).unwrap_or_default();
    match timing.kind {
        OrderKind::Market => OrderType::Market,
        OrderKind::Limit => {
            // Limit waits for a better fill: below price for a buy
            let px = match side {
                OrderSide::Buy => price * (Decimal::ONE - offset),
                OrderSide::Sell => price * (Decimal::ONE + offset),
            };
            OrderType::Limit(px)
        }
        OrderKind::Stop => {
            // Stop confirms momentum through the nearest structural level
            // when one exists, buffered by at least one spread width
            let buffer = snapshot.spread().max(price * offset);
            let px = match side {
                OrderSide::Buy => swing
                    .nearest_resistance
                    .and_then(Decimal::from_f64)
                    .map(|level| level + buffer)
                    .unwrap_or_else(|| price * (Decimal::ONE + offset)),
                OrderSide::Sell => swing
                    .nearest_support
                    .and_then(Decimal::from_f64)
                    .map(|level| level - buffer)
                    .unwrap_or_else(|| price * (Decimal::ONE - offset)),
            };
            OrderType::Stop(px)
        }
    }
}

/// Requested size handed to the portfolio fallback when account data is
/// unusable: the bot cap when set, otherwise one notional-cap unit block
fn default_requested_size(context: &TradingContext) -> Decimal {
    if let Some(cap) = context.max_quantity {
        return cap;
    }
    let price = context.snapshot.price.to_f64().unwrap_or_default();
    let balance = context.account.balance.to_f64().unwrap_or_default();
    if price <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(balance * 0.05 / price).unwrap_or_default()
}
