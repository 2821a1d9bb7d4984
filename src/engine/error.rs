use chrono::{DateTime, Utc};
use thiserror::Error;

//errors that abort a backtest run
//per-bar conditions (malformed bars, unaffordable entries) never reach this type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("{}", empty_series_message(.symbol, .bars, .warmup))]
    EmptyInputSeries {
        symbol: Option<String>,
        bars: usize,
        warmup: usize,
    },
    #[error("Exit for {symbol} at {timestamp} (bar {bar_index}) has no open position in the ledger")]
    NoOpenPosition {
        symbol: String,
        timestamp: DateTime<Utc>,
        bar_index: usize,
    },
    #[error("Entry for {symbol} at {timestamp} (bar {bar_index}) found a position already open")]
    PositionAlreadyOpen {
        symbol: String,
        timestamp: DateTime<Utc>,
        bar_index: usize,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn empty_series_message(symbol: &Option<String>, bars: &usize, warmup: &usize) -> String {
    match symbol {
        None => "Input bar series is empty".to_string(),
        Some(symbol) => format!(
            "Series for {} has {} bars, fewer than the {}-bar warm-up window",
            symbol, bars, warmup
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let empty = BacktestError::EmptyInputSeries {
            symbol: None,
            bars: 0,
            warmup: 50,
        };
        assert_eq!(empty.to_string(), "Input bar series is empty");

        let short = BacktestError::EmptyInputSeries {
            symbol: Some("AAPL".into()),
            bars: 10,
            warmup: 50,
        };
        assert!(short.to_string().contains("AAPL has 10 bars"));
    }
}
