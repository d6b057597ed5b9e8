// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the numeric analysis kernels. The analyzers convert
/// these into degraded conservative outputs instead of surfacing them.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Indicator calculation error: {0}")]
    IndicatorCalculation(String),

    #[error("Insufficient data for analysis: {0}")]
    InsufficientData(String),

    #[error("Level detection error: {0}")]
    LevelDetection(String),
}

/// External collaborator failures: market data, account data, strategy
/// store, rationale generation
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Market data unavailable: {0}")]
    MarketData(String),

    #[error("Account data unavailable: {0}")]
    AccountData(String),

    #[error("Strategy record unavailable: {0}")]
    StrategyStore(String),

    #[error("Rationale generation failed: {0}")]
    Rationale(String),
}

/// Failures of the evaluation itself where no safe default exists. The
/// coordinator's `evaluate` still wraps these into a fail-closed HOLD
/// decision before the caller ever sees them.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid trading context: {0}")]
    InvalidContext(String),
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type EvaluationResult<T> = Result<T, EvaluationError>;
