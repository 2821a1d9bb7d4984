use crate::config::RsiParams;
use crate::data::Bar;
use crate::portfolio::Position;
use crate::strategy::{
    close_below, ema_column, rsi_column, EntrySignal, ExitReason, ExitRules, Strategy,
};

//rsi mean reversion strategy
//buys when rsi drops below the oversold threshold
//an overbought reading counts as the trend reversal exit
#[derive(Debug, Clone)]
pub struct RsiReversionStrategy {
    params: RsiParams,
    exits: ExitRules,
    rsi: String,
    ema_short: Option<String>,
}

impl RsiReversionStrategy {
    pub fn new(params: RsiParams, exits: ExitRules) -> Self {
        RsiReversionStrategy {
            rsi: rsi_column(params.lookback),
            ema_short: params.exit_ema.map(ema_column),
            params,
            exits,
        }
    }
}

impl Strategy for RsiReversionStrategy {
    fn name(&self) -> &str {
        "RSI Reversion"
    }

    fn warmup(&self) -> usize {
        self.params.warmup
    }

    fn required_indicators(&self) -> Vec<String> {
        let mut names = vec![self.rsi.clone()];
        names.extend(self.ema_short.clone());
        names
    }

    fn should_entry(&self, bars: &[Bar], index: usize) -> Option<EntrySignal> {
        if index < self.params.warmup {
            return None;
        }

        let rsi = bars.get(index)?.indicator(&self.rsi)?;
        if rsi < self.params.oversold {
            Some(EntrySignal::new([format!(
                "{} {:.1} below {}",
                self.rsi, rsi, self.params.oversold
            )]))
        } else {
            None
        }
    }

    fn should_exit(&self, bars: &[Bar], index: usize, position: &Position) -> Option<ExitReason> {
        let bar = bars.get(index)?;
        let overbought = bar
            .indicator(&self.rsi)
            .map_or(false, |rsi| rsi > self.params.overbought);
        let below_ema = self
            .ema_short
            .as_deref()
            .map_or(false, |column| close_below(bar, column));

        self.exits.evaluate(position, bar.close, overbought, below_ema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(close: f64, rsi: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar::new(ts, "KO", close, close, close, close, 1.0).with_indicator("rsi", rsi)
    }

    fn strategy() -> RsiReversionStrategy {
        let params = RsiParams {
            warmup: 0,
            ..RsiParams::default()
        };
        RsiReversionStrategy::new(params, ExitRules::default())
    }

    #[test]
    fn oversold_entry() {
        let s = strategy();
        assert!(s.should_entry(&[bar(50.0, 25.0)], 0).is_some());
        assert!(s.should_entry(&[bar(50.0, 45.0)], 0).is_none());
        assert!(s.should_entry(&[bar(50.0, f64::NAN)], 0).is_none());
    }

    #[test]
    fn overbought_is_trend_reversal() {
        let bars = [bar(51.0, 75.0)];
        let position = Position::new("KO".into(), 50.0, bars[0].timestamp, 10).unwrap();
        assert_eq!(
            strategy().should_exit(&bars, 0, &position),
            Some(ExitReason::TrendReversal)
        );
    }
}
