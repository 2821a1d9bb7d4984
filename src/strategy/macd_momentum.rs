use crate::config::MacdParams;
use crate::data::Bar;
use crate::portfolio::Position;
use crate::strategy::{
    close_below, crossed_above, crossed_below, ema_column, rsi_column, EntrySignal, ExitReason,
    ExitRules, Strategy,
};

//macd momentum strategy
//enters on a bullish macd crossover while rsi sits in a neutral band
//and price trades above both the short and long ema
//exits on take profit, stop loss, bearish macd crossover or close below the short ema
#[derive(Debug, Clone)]
pub struct MacdMomentumStrategy {
    params: MacdParams,
    exits: ExitRules,
    ema_short: String,
    ema_long: String,
    rsi: String,
}

impl MacdMomentumStrategy {
    pub fn new(params: MacdParams, exits: ExitRules) -> Self {
        MacdMomentumStrategy {
            ema_short: ema_column(params.ema_short),
            ema_long: ema_column(params.ema_long),
            rsi: rsi_column(params.rsi_period),
            params,
            exits,
        }
    }

    //flag column from the feed wins, otherwise derive from line/signal
    fn bullish_cross(&self, bars: &[Bar], index: usize) -> bool {
        bars[index]
            .flag("macd_bullish_cross")
            .or_else(|| crossed_above(bars, index, "macd_line", "macd_signal"))
            .unwrap_or(false)
    }

    fn bearish_cross(&self, bars: &[Bar], index: usize) -> bool {
        bars[index]
            .flag("macd_bearish_cross")
            .or_else(|| crossed_below(bars, index, "macd_line", "macd_signal"))
            .unwrap_or(false)
    }
}

impl Strategy for MacdMomentumStrategy {
    fn name(&self) -> &str {
        "MACD Momentum"
    }

    fn warmup(&self) -> usize {
        self.params.warmup
    }

    fn required_indicators(&self) -> Vec<String> {
        vec![
            self.ema_short.clone(),
            self.ema_long.clone(),
            self.rsi.clone(),
            "macd_line".to_string(),
            "macd_signal".to_string(),
        ]
    }

    fn should_entry(&self, bars: &[Bar], index: usize) -> Option<EntrySignal> {
        if index < self.params.warmup || index >= bars.len() {
            return None;
        }
        let bar = &bars[index];

        if !self.bullish_cross(bars, index) {
            return None;
        }

        let rsi = bar.indicator(&self.rsi)?;
        if rsi < self.params.rsi_lower || rsi > self.params.rsi_upper {
            return None;
        }

        let ema_short = bar.indicator(&self.ema_short)?;
        let ema_long = bar.indicator(&self.ema_long)?;
        if bar.close <= ema_short || bar.close <= ema_long {
            return None;
        }

        Some(EntrySignal::new([
            "macd bullish crossover".to_string(),
            format!("rsi {:.1} in [{}, {}]", rsi, self.params.rsi_lower, self.params.rsi_upper),
            format!("close above {}", self.ema_short),
            format!("close above {}", self.ema_long),
        ]))
    }

    fn should_exit(&self, bars: &[Bar], index: usize, position: &Position) -> Option<ExitReason> {
        let bar = bars.get(index)?;
        self.exits.evaluate(
            position,
            bar.close,
            self.bearish_cross(bars, index),
            close_below(bar, &self.ema_short),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(day: i64, close: f64, macd: f64, signal: f64, rsi: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar::new(start + Duration::days(day), "AAPL", close, close, close, close, 1.0)
            .with_indicator("ema_12", 100.0)
            .with_indicator("ema_26", 98.0)
            .with_indicator("rsi", rsi)
            .with_indicator("macd_line", macd)
            .with_indicator("macd_signal", signal)
    }

    fn strategy() -> MacdMomentumStrategy {
        let params = MacdParams {
            warmup: 1,
            ..MacdParams::default()
        };
        MacdMomentumStrategy::new(params, ExitRules::default())
    }

    #[test]
    fn enters_on_full_confluence() {
        let bars = vec![bar(0, 101.0, -0.5, 0.0, 50.0), bar(1, 102.0, 0.5, 0.0, 55.0)];
        let signal = strategy().should_entry(&bars, 1).unwrap();
        assert_eq!(signal.conditions.len(), 4);
        assert_eq!(signal.conditions[0], "macd bullish crossover");
    }

    #[test]
    fn respects_warmup_and_rsi_band() {
        let bars = vec![bar(0, 101.0, -0.5, 0.0, 50.0), bar(1, 102.0, 0.5, 0.0, 85.0)];
        let s = strategy();
        assert!(s.should_entry(&bars, 0).is_none());
        assert!(s.should_entry(&bars, 1).is_none());
    }

    #[test]
    fn requires_price_above_emas() {
        let bars = vec![bar(0, 99.0, -0.5, 0.0, 50.0), bar(1, 99.5, 0.5, 0.0, 50.0)];
        assert!(strategy().should_entry(&bars, 1).is_none());
    }

    #[test]
    fn flag_column_overrides_derived_cross() {
        let bars = vec![
            bar(0, 101.0, 1.0, 0.0, 50.0),
            bar(1, 102.0, 1.0, 0.0, 50.0).with_indicator("macd_bullish_cross", 1.0),
        ];
        assert!(strategy().should_entry(&bars, 1).is_some());
    }

    #[test]
    fn bearish_cross_is_trend_reversal() {
        let bars = vec![bar(0, 101.0, 0.5, 0.0, 50.0), bar(1, 101.0, -0.5, 0.0, 50.0)];
        let position = Position::new("AAPL".into(), 100.0, bars[0].timestamp, 10).unwrap();
        assert_eq!(
            strategy().should_exit(&bars, 1, &position),
            Some(ExitReason::TrendReversal)
        );
    }
}
