use crate::portfolio::{ClosedPosition, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//trade side, long-only so buy opens and sell closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

//immutable audit record written for every buy and sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,

    //index of the bar within its symbol's series
    pub bar_index: usize,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub shares: u64,

    //sell only
    pub realized_pnl: Option<f64>,
    pub realized_pnl_pct: Option<f64>,

    //entry conditions or exit trigger
    pub reason: String,
}

impl Trade {
    //record for a freshly opened position
    pub fn buy(position: &Position, bar_index: usize, reason: impl Into<String>) -> Self {
        Trade {
            timestamp: position.entry_timestamp,
            bar_index,
            symbol: position.symbol.clone(),
            action: TradeAction::Buy,
            price: position.entry_price,
            shares: position.shares,
            realized_pnl: None,
            realized_pnl_pct: None,
            reason: reason.into(),
        }
    }

    //record for a fully liquidated position
    pub fn sell(closed: &ClosedPosition, bar_index: usize, reason: impl Into<String>) -> Self {
        Trade {
            timestamp: closed.exit_timestamp,
            bar_index,
            symbol: closed.position.symbol.clone(),
            action: TradeAction::Sell,
            price: closed.exit_price,
            shares: closed.position.shares,
            realized_pnl: Some(closed.realized_pnl),
            realized_pnl_pct: Some(closed.realized_pnl_pct),
            reason: reason.into(),
        }
    }

    //notional value of the trade
    pub fn notional_value(&self) -> f64 {
        self.price * self.shares as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Ledger;
    use chrono::TimeZone;

    #[test]
    fn records_mirror_ledger_outcomes() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut ledger = Ledger::new(1_000.0);

        let position = ledger.open("NVDA", 50.0, ts, 1_000.0).unwrap();
        let buy = Trade::buy(&position, 3, "macd bullish crossover");
        assert_eq!(buy.action, TradeAction::Buy);
        assert_eq!(buy.shares, 20);
        assert_eq!(buy.realized_pnl, None);
        assert_eq!(buy.notional_value(), 1_000.0);

        let closed = ledger.close("NVDA", 55.0, ts).unwrap();
        let sell = Trade::sell(&closed, 7, "take profit");
        assert_eq!(sell.action.as_str(), "SELL");
        assert_eq!(sell.realized_pnl, Some(100.0));
        assert_eq!(sell.realized_pnl_pct, Some(10.0));
        assert_eq!(sell.bar_index, 7);
    }
}
