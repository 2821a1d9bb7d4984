pub mod macd_momentum;
pub mod profile;
pub mod rsi_reversion;
pub mod sma_crossover;

use crate::data::Bar;
use crate::portfolio::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use profile::Profile;

//entry/exit decision interface implemented by every strategy
//implementations are pure: same bars and index always give the same answer
pub trait Strategy: Send + Sync {
    //returns the strategy name
    fn name(&self) -> &str;

    //leading bars skipped before entries are considered
    fn warmup(&self) -> usize;

    //indicator columns that must be present for a bar to be evaluated
    fn required_indicators(&self) -> Vec<String>;

    //decides whether to open a position on bars[index]
    fn should_entry(&self, bars: &[Bar], index: usize) -> Option<EntrySignal>;

    //decides whether to close the open position on bars[index]
    fn should_exit(&self, bars: &[Bar], index: usize, position: &Position) -> Option<ExitReason>;
}

//conditions that fired for an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub conditions: Vec<String>,
}

impl EntrySignal {
    pub fn new<I, S>(conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EntrySignal {
            conditions: conditions.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for EntrySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.conditions.join(" & "))
    }
}

//why a position was closed, in evaluation priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TrendReversal,
    BelowShortEma,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take profit",
            ExitReason::StopLoss => "stop loss",
            ExitReason::TrendReversal => "trend reversal",
            ExitReason::BelowShortEma => "below short ema",
            ExitReason::EndOfData => "end of data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//pnl-relative exit thresholds, both in percent (5.0 means 5%)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            take_profit_pct: 10.0,
            stop_loss_pct: 5.0,
        }
    }
}

impl ExitRules {
    //first trigger that fires wins:
    //take profit, stop loss, trend reversal, close below short ema
    pub fn evaluate(
        &self,
        position: &Position,
        price: f64,
        trend_reversal: bool,
        below_short_ema: bool,
    ) -> Option<ExitReason> {
        let pnl_pct = position.pnl_pct(price);

        if pnl_pct >= self.take_profit_pct {
            Some(ExitReason::TakeProfit)
        } else if pnl_pct <= -self.stop_loss_pct {
            Some(ExitReason::StopLoss)
        } else if trend_reversal {
            Some(ExitReason::TrendReversal)
        } else if below_short_ema {
            Some(ExitReason::BelowShortEma)
        } else {
            None
        }
    }
}

//true when column `a` crosses above column `b` between index - 1 and index
//none when either bar lacks one of the values
pub fn crossed_above(bars: &[Bar], index: usize, a: &str, b: &str) -> Option<bool> {
    let (prev, cur) = adjacent(bars, index)?;
    Some(
        prev.indicator(a)? <= prev.indicator(b)? && cur.indicator(a)? > cur.indicator(b)?,
    )
}

//true when column `a` crosses below column `b` between index - 1 and index
pub fn crossed_below(bars: &[Bar], index: usize, a: &str, b: &str) -> Option<bool> {
    let (prev, cur) = adjacent(bars, index)?;
    Some(
        prev.indicator(a)? >= prev.indicator(b)? && cur.indicator(a)? < cur.indicator(b)?,
    )
}

fn adjacent(bars: &[Bar], index: usize) -> Option<(&Bar, &Bar)> {
    if index == 0 || index >= bars.len() {
        return None;
    }
    Some((&bars[index - 1], &bars[index]))
}

//close below the named ema column, false when the column is missing
pub fn close_below(bar: &Bar, column: &str) -> bool {
    bar.indicator(column).map_or(false, |ema| bar.close < ema)
}

pub fn ema_column(period: usize) -> String {
    format!("ema_{}", period)
}

pub fn sma_column(period: usize) -> String {
    format!("sma_{}", period)
}

//the default 14 period rsi is published as plain "rsi"
pub fn rsi_column(period: usize) -> String {
    if period == crate::data::indicators::DEFAULT_RSI_PERIOD {
        "rsi".to_string()
    } else {
        format!("rsi_{}", period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn position(entry: f64) -> Position {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Position::new("AAPL".into(), entry, ts, 10).unwrap()
    }

    #[test]
    fn take_profit_wins_over_trend_reversal() {
        let rules = ExitRules::default();
        let reason = rules.evaluate(&position(100.0), 112.0, true, true);
        assert_eq!(reason, Some(ExitReason::TakeProfit));
        assert_eq!(reason.unwrap().to_string(), "take profit");
    }

    #[test]
    fn stop_loss_fires_on_threshold() {
        let rules = ExitRules::default();
        assert_eq!(
            rules.evaluate(&position(100.0), 95.0, true, false),
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn signal_triggers_follow_thresholds() {
        let rules = ExitRules::default();
        let p = position(100.0);
        assert_eq!(
            rules.evaluate(&p, 101.0, true, true),
            Some(ExitReason::TrendReversal)
        );
        assert_eq!(
            rules.evaluate(&p, 101.0, false, true),
            Some(ExitReason::BelowShortEma)
        );
        assert_eq!(rules.evaluate(&p, 101.0, false, false), None);
    }

    #[test]
    fn crossover_helpers_need_both_bars() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = vec![
            Bar::new(start, "X", 1.0, 1.0, 1.0, 1.0, 1.0)
                .with_indicator("a", 1.0)
                .with_indicator("b", 2.0),
            Bar::new(start + Duration::days(1), "X", 1.0, 1.0, 1.0, 1.0, 1.0)
                .with_indicator("a", 3.0)
                .with_indicator("b", 2.0),
            Bar::new(start + Duration::days(2), "X", 1.0, 1.0, 1.0, 1.0, 1.0)
                .with_indicator("a", f64::NAN)
                .with_indicator("b", 2.0),
        ];

        assert_eq!(crossed_above(&bars, 0, "a", "b"), None);
        assert_eq!(crossed_above(&bars, 1, "a", "b"), Some(true));
        assert_eq!(crossed_below(&bars, 1, "a", "b"), Some(false));
        assert_eq!(crossed_above(&bars, 2, "a", "b"), None);
    }

    #[test]
    fn column_names() {
        assert_eq!(ema_column(12), "ema_12");
        assert_eq!(sma_column(50), "sma_50");
        assert_eq!(rsi_column(14), "rsi");
        assert_eq!(rsi_column(7), "rsi_7");
    }
}
