use crate::config::SmaParams;
use crate::data::Bar;
use crate::portfolio::Position;
use crate::strategy::{
    close_below, crossed_above, crossed_below, ema_column, sma_column, EntrySignal, ExitReason,
    ExitRules, Strategy,
};

//sma crossover strategy
//goes long when the fast sma crosses above the slow sma
//treats the opposite crossover as a trend reversal exit
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    params: SmaParams,
    exits: ExitRules,
    fast: String,
    slow: String,
    ema_short: Option<String>,
}

impl SmaCrossoverStrategy {
    pub fn new(params: SmaParams, exits: ExitRules) -> Self {
        SmaCrossoverStrategy {
            fast: sma_column(params.fast_window),
            slow: sma_column(params.slow_window),
            ema_short: params.exit_ema.map(ema_column),
            params,
            exits,
        }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn warmup(&self) -> usize {
        self.params.warmup
    }

    fn required_indicators(&self) -> Vec<String> {
        let mut names = vec![self.fast.clone(), self.slow.clone()];
        names.extend(self.ema_short.clone());
        names
    }

    fn should_entry(&self, bars: &[Bar], index: usize) -> Option<EntrySignal> {
        if index < self.params.warmup {
            return None;
        }

        //bullish crossover fast crosses above slow
        if crossed_above(bars, index, &self.fast, &self.slow)? {
            Some(EntrySignal::new([format!(
                "{} crossed above {}",
                self.fast, self.slow
            )]))
        } else {
            None
        }
    }

    fn should_exit(&self, bars: &[Bar], index: usize, position: &Position) -> Option<ExitReason> {
        let bar = bars.get(index)?;
        let reversal = crossed_below(bars, index, &self.fast, &self.slow).unwrap_or(false);
        let below_ema = self
            .ema_short
            .as_deref()
            .map_or(false, |column| close_below(bar, column));

        self.exits.evaluate(position, bar.close, reversal, below_ema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(day: i64, close: f64, fast: f64, slow: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar::new(start + Duration::days(day), "MSFT", close, close, close, close, 1.0)
            .with_indicator("sma_2", fast)
            .with_indicator("sma_4", slow)
    }

    fn strategy() -> SmaCrossoverStrategy {
        let params = SmaParams {
            fast_window: 2,
            slow_window: 4,
            exit_ema: None,
            warmup: 1,
        };
        SmaCrossoverStrategy::new(params, ExitRules::default())
    }

    #[test]
    fn enters_on_golden_cross() {
        let bars = vec![bar(0, 10.0, 9.0, 10.0), bar(1, 11.0, 10.5, 10.0)];
        let s = strategy();
        assert!(s.should_entry(&bars, 0).is_none());
        let signal = s.should_entry(&bars, 1).unwrap();
        assert_eq!(signal.to_string(), "sma_2 crossed above sma_4");
    }

    #[test]
    fn death_cross_exits() {
        let bars = vec![bar(0, 10.0, 10.5, 10.0), bar(1, 10.1, 9.5, 10.0)];
        let position = Position::new("MSFT".into(), 10.0, bars[0].timestamp, 5).unwrap();
        assert_eq!(
            strategy().should_exit(&bars, 1, &position),
            Some(ExitReason::TrendReversal)
        );
    }

    #[test]
    fn required_indicators_include_optional_ema() {
        let params = SmaParams {
            exit_ema: Some(10),
            ..SmaParams::default()
        };
        let s = SmaCrossoverStrategy::new(params, ExitRules::default());
        assert_eq!(s.required_indicators(), vec!["sma_20", "sma_50", "ema_10"]);
    }
}
