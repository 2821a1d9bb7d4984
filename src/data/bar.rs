use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//reasons a bar cannot be used for signal evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarError {
    #[error("Non-finite {field} value on {symbol} bar at {timestamp}")]
    NonFiniteField {
        symbol: String,
        timestamp: DateTime<Utc>,
        field: &'static str,
    },
    #[error("Non-positive {field} price ({value}) on {symbol} bar at {timestamp}")]
    NonPositivePrice {
        symbol: String,
        timestamp: DateTime<Utc>,
        field: &'static str,
        value: f64,
    },
    #[error("Missing indicator '{name}' on {symbol} bar at {timestamp}")]
    MissingIndicator {
        symbol: String,
        timestamp: DateTime<Utc>,
        name: String,
    },
}

//one ohlcv bar for one symbol, augmented with precomputed indicator values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    //indicator name -> value, crossover flags stored as 1.0 / 0.0
    #[serde(default)]
    pub indicators: IndexMap<String, f64>,
}

impl Bar {
    //creates a bar with no indicator values
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Bar {
            timestamp,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            indicators: IndexMap::new(),
        }
    }

    //builder-style helper to attach an indicator value
    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    //sets or replaces an indicator value
    pub fn set_indicator(&mut self, name: impl Into<String>, value: f64) {
        self.indicators.insert(name.into(), value);
    }

    //returns the indicator value, treating nan as missing
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().filter(|v| v.is_finite())
    }

    //returns a boolean flag column (any non-zero value is true)
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.indicator(name).map(|v| v != 0.0)
    }

    //true if the indicator column exists on this bar, even if it is nan
    pub fn has_indicator_column(&self, name: &str) -> bool {
        self.indicators.contains_key(name)
    }

    //checks that ohlc values are usable and every required indicator is present
    pub fn validate<S: AsRef<str>>(&self, required: &[S]) -> Result<(), BarError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];

        for (field, value) in prices {
            if !value.is_finite() {
                return Err(BarError::NonFiniteField {
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    field,
                });
            }
            if value <= 0.0 {
                return Err(BarError::NonPositivePrice {
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    field,
                    value,
                });
            }
        }

        if !self.volume.is_finite() {
            return Err(BarError::NonFiniteField {
                symbol: self.symbol.clone(),
                timestamp: self.timestamp,
                field: "volume",
            });
        }

        for name in required {
            let name = name.as_ref();
            if self.indicator(name).is_none() {
                return Err(BarError::MissingIndicator {
                    symbol: self.symbol.clone(),
                    timestamp: self.timestamp,
                    name: name.to_string(),
                });
            }
        }

        Ok(())
    }

    //true if the close can be used to value a position
    pub fn has_valid_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Bar::new(ts, "AAPL", close, close, close, close, 1000.0)
    }

    #[test]
    fn nan_indicator_reads_as_missing() {
        let b = bar(10.0).with_indicator("rsi", f64::NAN);
        assert!(b.has_indicator_column("rsi"));
        assert_eq!(b.indicator("rsi"), None);
    }

    #[test]
    fn flag_columns_decode_to_bool() {
        let b = bar(10.0)
            .with_indicator("macd_bullish_cross", 1.0)
            .with_indicator("macd_bearish_cross", 0.0);
        assert_eq!(b.flag("macd_bullish_cross"), Some(true));
        assert_eq!(b.flag("macd_bearish_cross"), Some(false));
        assert_eq!(b.flag("nope"), None);
    }

    #[test]
    fn validate_reports_missing_indicator() {
        let b = bar(10.0).with_indicator("rsi", 45.0);
        assert!(b.validate(&["rsi"]).is_ok());

        let err = b.validate(&["rsi", "ema_12"]).unwrap_err();
        assert!(matches!(err, BarError::MissingIndicator { ref name, .. } if name == "ema_12"));
    }

    #[test]
    fn validate_rejects_bad_prices() {
        let b = bar(f64::NAN);
        assert!(matches!(
            b.validate::<&str>(&[]),
            Err(BarError::NonFiniteField { .. })
        ));

        let b = bar(0.0);
        assert!(matches!(
            b.validate::<&str>(&[]),
            Err(BarError::NonPositivePrice { .. })
        ));
        assert!(!b.has_valid_close());
    }
}
