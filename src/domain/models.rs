// src/domain/models.rs
use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chart timeframe for a strategy or an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Parse a timeframe code such as "M5" or "H1"
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "M1" | "1M" => Some(Timeframe::M1),
            "M5" | "5M" => Some(Timeframe::M5),
            "M15" | "15M" => Some(Timeframe::M15),
            "M30" | "30M" => Some(Timeframe::M30),
            "H1" | "1H" => Some(Timeframe::H1),
            "H4" | "4H" => Some(Timeframe::H4),
            "D1" | "1D" => Some(Timeframe::D1),
            _ => None,
        }
    }

    /// Length of one candle in minutes
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Timeframe::M1 => write!(f, "M1"),
            Timeframe::M5 => write!(f, "M5"),
            Timeframe::M15 => write!(f, "M15"),
            Timeframe::M30 => write!(f, "M30"),
            Timeframe::H1 => write!(f, "H1"),
            Timeframe::H4 => write!(f, "H4"),
            Timeframe::D1 => write!(f, "D1"),
        }
    }
}

/// Single OHLCV candle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candlestick {
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Candle series used by the technical and timing analyzers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candlestick>,
}

impl PriceHistory {
    pub fn new(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            candles: Vec::new(),
        }
    }

    pub fn add_candle(&mut self, candle: Candlestick) {
        self.candles.push(candle);
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.close.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn high_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.high.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn low_prices(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.low.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles
            .iter()
            .map(|c| c.volume.to_f64().unwrap_or_default())
            .collect()
    }

    pub fn last_candle(&self) -> Option<&Candlestick> {
        self.candles.last()
    }
}

/// Market condition label supplied by the caller alongside the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCondition {
    Trending,
    Ranging,
    Volatile,
    Calm,
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MarketCondition::Trending => write!(f, "TRENDING"),
            MarketCondition::Ranging => write!(f, "RANGING"),
            MarketCondition::Volatile => write!(f, "VOLATILE"),
            MarketCondition::Calm => write!(f, "CALM"),
        }
    }
}

/// Point-in-time market microstructure snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Decimal,
    /// Precomputed ATR for the evaluation timeframe, if the caller has one
    pub atr: Option<f64>,
    pub condition: Option<MarketCondition>,
    pub timestamp: i64,
}

impl MarketSnapshot {
    /// Bid/ask spread, zero when either side is missing
    pub fn spread(&self) -> Decimal {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if ask > bid => ask - bid,
            _ => Decimal::ZERO,
        }
    }

    /// Spread as a percent of the snapshot price
    pub fn spread_percent(&self) -> f64 {
        let price = self.price.to_f64().unwrap_or_default();
        if price <= 0.0 {
            return 0.0;
        }
        self.spread().to_f64().unwrap_or_default() / price * 100.0
    }
}

/// Strategy family, drives order-type preference and category rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyCategory {
    Breakout,
    Momentum,
    MeanReversion,
    SupportResistance,
    Scalping,
    News,
    Trend,
    Swing,
    Other,
}

impl fmt::Display for StrategyCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategyCategory::Breakout => write!(f, "BREAKOUT"),
            StrategyCategory::Momentum => write!(f, "MOMENTUM"),
            StrategyCategory::MeanReversion => write!(f, "MEAN_REVERSION"),
            StrategyCategory::SupportResistance => write!(f, "SUPPORT_RESISTANCE"),
            StrategyCategory::Scalping => write!(f, "SCALPING"),
            StrategyCategory::News => write!(f, "NEWS"),
            StrategyCategory::Trend => write!(f, "TREND"),
            StrategyCategory::Swing => write!(f, "SWING"),
            StrategyCategory::Other => write!(f, "OTHER"),
        }
    }
}

/// How a strategy wants its protective stop derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMethod {
    FixedPercent,
    AtrBased,
    SwingBased,
}

impl fmt::Display for StopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopMethod::FixedPercent => write!(f, "FIXED_PERCENT"),
            StopMethod::AtrBased => write!(f, "ATR_BASED"),
            StopMethod::SwingBased => write!(f, "SWING_BASED"),
        }
    }
}

/// Declarative risk-management rules carried by a strategy record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRules {
    /// Lower bound of risk per trade, percent of balance
    pub min_risk_percent: f64,
    /// Upper bound of risk per trade, percent of balance
    pub max_risk_percent: f64,
    /// Minimum acceptable reward-to-risk ratio, if the strategy declares one
    pub required_risk_reward: Option<f64>,
    pub stop_method: Option<StopMethod>,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            min_risk_percent: 0.5,
            max_risk_percent: 2.0,
            required_risk_reward: None,
            stop_method: None,
        }
    }
}

/// Declarative strategy record consumed by the validator and coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub name: String,
    pub category: StrategyCategory,
    /// Explicit timeframe allow-list; `None` means any timeframe is accepted
    pub allowed_timeframes: Option<Vec<Timeframe>>,
    pub entry_conditions: Vec<String>,
    pub exit_conditions: Vec<String>,
    pub required_indicators: Vec<String>,
    pub risk_rules: RiskRules,
    /// Minimum synthesized confidence, 0-100 scale
    pub confidence_threshold: f64,
    pub preferred_condition: Option<MarketCondition>,
}

/// Account snapshot at evaluation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: Decimal,
    /// Margin level percent; `None` when the broker does not report one
    pub margin_level: Option<f64>,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Open position as reported by the account provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub open_time: i64,
    pub strategy_category: StrategyCategory,
    pub timeframe: Timeframe,
}

impl Position {
    /// Unrealized PnL at the current price
    pub fn unrealized_pnl(&self) -> Decimal {
        let diff = match self.side {
            OrderSide::Buy => self.current_price - self.entry_price,
            OrderSide::Sell => self.entry_price - self.current_price,
        };
        diff * self.quantity
    }

    /// Unrealized PnL as a percent of the entry price
    pub fn pnl_percent(&self) -> f64 {
        let entry = self.entry_price.to_f64().unwrap_or_default();
        if entry <= 0.0 {
            return 0.0;
        }
        let diff = match self.side {
            OrderSide::Buy => self.current_price - self.entry_price,
            OrderSide::Sell => self.entry_price - self.current_price,
        };
        diff.to_f64().unwrap_or_default() / entry * 100.0
    }

    /// Realized reward multiple against the initial stop distance.
    /// `None` when no stop was set at entry.
    pub fn rr_multiple(&self) -> Option<f64> {
        let stop = self.stop_loss?;
        let risk = (self.entry_price - stop).abs().to_f64().unwrap_or_default();
        if risk <= 0.0 {
            return None;
        }
        let favorable = match self.side {
            OrderSide::Buy => self.current_price - self.entry_price,
            OrderSide::Sell => self.entry_price - self.current_price,
        };
        Some(favorable.to_f64().unwrap_or_default() / risk)
    }

    /// Notional exposure of the position
    pub fn exposure(&self) -> Decimal {
        (self.current_price * self.quantity).abs()
    }

    /// Minutes since the position was opened
    pub fn minutes_open(&self, now_ms: i64) -> i64 {
        ((now_ms - self.open_time) / 60_000).max(0)
    }
}

/// Caller-declared appetite for risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

/// Immutable input to one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub strategy: StrategyProfile,
    pub snapshot: MarketSnapshot,
    pub history: PriceHistory,
    pub account: AccountState,
    pub open_positions: Vec<Position>,
    pub risk_tolerance: RiskTolerance,
    /// Bot-level quantity cap, applied after portfolio and ladder sizing
    pub max_quantity: Option<Decimal>,
}

/// Directional read of the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TradeDirection::Bullish => write!(f, "BULLISH"),
            TradeDirection::Bearish => write!(f, "BEARISH"),
            TradeDirection::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Output of the technical signal analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub direction: TradeDirection,
    /// Signal strength, 1-10
    pub strength: u8,
    /// Confidence, 0-1
    pub confidence: f64,
    pub signals: Vec<String>,
}

impl TechnicalAnalysis {
    /// Neutral low-confidence result used when history is missing or short
    pub fn neutral(reason: &str) -> Self {
        Self {
            direction: TradeDirection::Neutral,
            strength: 1,
            confidence: 0.1,
            signals: vec![reason.to_string()],
        }
    }
}

/// Portfolio exposure risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Sizing verdict derived from the portfolio assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskVerdict {
    Approve,
    Reduce,
    Reject,
}

/// Output of the portfolio/risk analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAssessment {
    pub risk_level: RiskLevel,
    pub max_position_size: Decimal,
    pub recommended_position_size: Decimal,
    /// Composite exposure score, 0-100
    pub portfolio_heat: f64,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub can_trade: bool,
}

impl PortfolioAssessment {
    /// Sizing verdict consumed by confidence synthesis
    pub fn verdict(&self) -> RiskVerdict {
        if !self.can_trade || self.risk_level == RiskLevel::Critical {
            RiskVerdict::Reject
        } else if self.risk_level == RiskLevel::High || self.portfolio_heat > 60.0 {
            RiskVerdict::Reduce
        } else {
            RiskVerdict::Approve
        }
    }
}

/// One risk-tier option: stop/target geometry plus sizing for that tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub position_size: Decimal,
    pub risk_amount: Decimal,
    pub reward_amount: Decimal,
    pub risk_reward_ratio: f64,
    /// Risk per trade for this tier, percent of balance
    pub risk_percent: f64,
    pub reasoning: Vec<String>,
}

/// Named risk-percent preset within the position-size ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Conservative,
    Low,
    Medium,
    High,
    Aggressive,
}

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Conservative,
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
        RiskTier::Aggressive,
    ];
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RiskTier::Conservative => write!(f, "Conservative"),
            RiskTier::Low => write!(f, "Low"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::High => write!(f, "High"),
            RiskTier::Aggressive => write!(f, "Aggressive"),
        }
    }
}

/// One rung of the position-size ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderRung {
    pub tier: RiskTier,
    pub levels: RiskLevels,
}

/// Five risk-tiered candidate outcomes for one draft decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizeLadder {
    pub rungs: Vec<LadderRung>,
}

impl PositionSizeLadder {
    /// Rung for the requested tier, falling back to the safest rung when the
    /// tier is absent. The builder never emits an empty ladder.
    pub fn select(&self, tier: RiskTier) -> Option<&LadderRung> {
        self.rungs
            .iter()
            .find(|r| r.tier == tier)
            .or_else(|| self.rungs.first())
    }
}

/// Output of the strategy compliance validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCompliance {
    pub is_compliant: bool,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
    /// Deduction-based score, 0-100
    pub score: f64,
}

/// Terminal action of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
    Close,
    Modify,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
            TradeAction::Close => "CLOSE",
            TradeAction::Modify => "MODIFY",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit(Decimal),
    Stop(Decimal),
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit(price) => write!(f, "LIMIT {}", price),
            OrderType::Stop(price) => write!(f, "STOP {}", price),
        }
    }
}

/// How quickly the timing analyzer wants the order worked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Order-type preference before a direction is chosen. The coordinator
/// materializes the concrete priced `OrderType` once it knows the side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

/// Output of the order timing analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub kind: OrderKind,
    pub urgency: Urgency,
    /// Coherence factor; scaled by the signal confidence at synthesis
    pub confidence: f64,
    /// Offset from the snapshot price toward a better fill, percent
    pub entry_offset_percent: f64,
    pub reasoning: Vec<String>,
}

/// Final bounded decision for one evaluation. Never mutated after creation;
/// a new evaluation produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: TradeAction,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub risk_reward_ratio: f64,
    /// Synthesized confidence, 0-1
    pub confidence: f64,
    pub validated: bool,
    pub warnings: Vec<String>,
    pub reasoning: Vec<String>,
}

impl Decision {
    /// Fail-closed HOLD decision used when no safe evaluation is possible
    pub fn hold(warning: &str) -> Self {
        Self {
            action: TradeAction::Hold,
            order_type: OrderType::Market,
            quantity: Decimal::ZERO,
            stop_loss: None,
            take_profit: None,
            risk_reward_ratio: 0.0,
            confidence: 0.0,
            validated: false,
            warnings: vec![warning.to_string()],
            reasoning: Vec::new(),
        }
    }
}

/// Trade-management verdict for one monitoring cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagementAction {
    Hold,
    MoveToBreakeven,
    TrailStop,
    PartialClose,
    FullClose,
    ExtendTarget,
}

impl fmt::Display for ManagementAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ManagementAction::Hold => write!(f, "HOLD"),
            ManagementAction::MoveToBreakeven => write!(f, "MOVE_TO_BREAKEVEN"),
            ManagementAction::TrailStop => write!(f, "TRAIL_STOP"),
            ManagementAction::PartialClose => write!(f, "PARTIAL_CLOSE"),
            ManagementAction::FullClose => write!(f, "FULL_CLOSE"),
            ManagementAction::ExtendTarget => write!(f, "EXTEND_TARGET"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Management action emitted per cycle per open position. The caller applies
/// or discards it; it supersedes no prior action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeManagementAction {
    pub action: ManagementAction,
    pub new_stop_loss: Option<Decimal>,
    pub new_take_profit: Option<Decimal>,
    pub close_quantity: Option<Decimal>,
    pub priority: ActionPriority,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

impl TradeManagementAction {
    pub fn hold(reason: &str) -> Self {
        Self {
            action: ManagementAction::Hold,
            new_stop_loss: None,
            new_take_profit: None,
            close_quantity: None,
            priority: ActionPriority::Low,
            confidence: 0.5,
            reasoning: vec![reason.to_string()],
        }
    }
}

/// Current epoch milliseconds, the time base used across the domain
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
