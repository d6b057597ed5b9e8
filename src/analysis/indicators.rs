// src/analysis/indicators.rs
use crate::domain::errors::{AnalysisError, AnalysisResult};

/// Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for SMA calculation. Need at least {} points, got {}",
            period,
            prices.len()
        )));
    }

    let mut result = Vec::with_capacity(prices.len() - period + 1);
    let mut sum = prices.iter().take(period).sum::<f64>();
    result.push(sum / period as f64);

    for i in period..prices.len() {
        sum = sum - prices[i - period] + prices[i];
        result.push(sum / period as f64);
    }

    Ok(result)
}

/// Exponential Moving Average (EMA)
pub fn calculate_ema(prices: &[f64], period: usize) -> AnalysisResult<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for EMA calculation. Need at least {} points, got {}",
            period,
            prices.len()
        )));
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let mut result = Vec::with_capacity(prices.len() - period + 1);

    // Seed with the SMA of the first window
    let first_sma = prices.iter().take(period).sum::<f64>() / period as f64;
    result.push(first_sma);

    for i in period..prices.len() {
        let previous = result[result.len() - 1];
        result.push((prices[i] - previous) * multiplier + previous);
    }

    Ok(result)
}

/// Relative Strength Index (RSI), latest value
pub fn calculate_rsi(prices: &[f64], period: usize) -> AnalysisResult<f64> {
    if prices.len() <= period || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for RSI calculation. Need at least {} points, got {}",
            period + 1,
            prices.len()
        )));
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);
    for window in prices.windows(2) {
        let change = window[1] - window[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss = losses.iter().take(period).sum::<f64>() / period as f64;

    // Wilder smoothing over the remaining changes
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss.abs() < f64::EPSILON {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}

/// MACD line, signal line and histogram
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> AnalysisResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    if prices.len() < slow_period + signal_period {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for MACD calculation. Need at least {} points, got {}",
            slow_period + signal_period,
            prices.len()
        )));
    }

    let fast_ema = calculate_ema(prices, fast_period)?;
    let slow_ema = calculate_ema(prices, slow_period)?;

    // EMAs with different periods have different lengths; align to the slow one
    let offset = fast_ema.len().saturating_sub(slow_ema.len());
    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, slow)| fast_ema[i + offset] - slow)
        .collect();

    let signal_line = calculate_ema(&macd_line, signal_period)?;

    let hist_offset = macd_line.len().saturating_sub(signal_line.len());
    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(i, signal)| macd_line[i + hist_offset] - signal)
        .collect();

    Ok((macd_line, signal_line, histogram))
}

/// Average True Range (ATR) series
pub fn calculate_atr(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> AnalysisResult<Vec<f64>> {
    let len = highs.len().min(lows.len()).min(closes.len());
    if len < period + 1 || period == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "Not enough data for ATR calculation. Need at least {} points, got {}",
            period + 1,
            len
        )));
    }

    let mut true_ranges = Vec::with_capacity(len - 1);
    for i in 1..len {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        true_ranges.push(tr);
    }

    let first_atr = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    let mut atr = Vec::with_capacity(true_ranges.len() - period + 1);
    atr.push(first_atr);

    for i in period..true_ranges.len() {
        let next = (atr[atr.len() - 1] * (period - 1) as f64 + true_ranges[i]) / period as f64;
        atr.push(next);
    }

    Ok(atr)
}

/// Latest ATR value, or `None` when the series is too short
pub fn latest_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    calculate_atr(highs, lows, closes, period)
        .ok()
        .and_then(|series| series.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_sliding_window() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = calculate_sma(&data, 3).unwrap();
        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 1e-9);
        assert!((result[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        assert!(matches!(
            calculate_sma(&data, 5),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn ema_tracks_rising_prices() {
        let data: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let result = calculate_ema(&data, 5).unwrap();
        // An EMA over a monotonically rising series is itself rising
        assert!(result.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let data: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let rsi = calculate_rsi(&data, 14).unwrap();
        assert!((rsi - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_mixed_series_in_range() {
        let data = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ];
        let rsi = calculate_rsi(&data, 14).unwrap();
        assert!(rsi > 0.0 && rsi < 100.0);
    }

    #[test]
    fn macd_insufficient_data() {
        let data = vec![1.0; 10];
        assert!(calculate_macd(&data, 12, 26, 9).is_err());
    }

    #[test]
    fn atr_constant_range() {
        // Every candle spans exactly 1.0 with no gaps, so ATR is 1.0
        let highs: Vec<f64> = (0..20).map(|i| 101.0 + i as f64 * 0.0).collect();
        let lows: Vec<f64> = (0..20).map(|_| 100.0).collect();
        let closes: Vec<f64> = (0..20).map(|_| 100.5).collect();
        let atr = calculate_atr(&highs, &lows, &closes, 14).unwrap();
        assert!((atr.last().unwrap() - 1.0).abs() < 1e-9);
    }
}
