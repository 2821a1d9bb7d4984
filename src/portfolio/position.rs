use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//an open long holding in one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    //ticker symbol
    pub symbol: String,

    //fill price of the opening buy
    pub entry_price: f64,

    //timestamp of the opening buy
    pub entry_timestamp: DateTime<Utc>,

    //whole shares held, always > 0 while open
    pub shares: u64,

    //shares * entry_price
    pub cost_basis: f64,

    //most recent valid close seen for this symbol
    pub last_price: f64,
}

impl Position {
    //creates a new position, returns none for zero shares or an unusable price
    pub fn new(
        symbol: String,
        entry_price: f64,
        entry_timestamp: DateTime<Utc>,
        shares: u64,
    ) -> Option<Self> {
        if shares == 0 || !entry_price.is_finite() || entry_price <= 0.0 {
            return None;
        }

        Some(Position {
            symbol,
            entry_price,
            entry_timestamp,
            shares,
            cost_basis: entry_price * shares as f64,
            last_price: entry_price,
        })
    }

    //unrealized pnl at a given price
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.shares as f64
    }

    //percentage move from entry to a given price (5.0 means +5%)
    pub fn pnl_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) * 100.0 / self.entry_price
    }

    //market value at a given price
    pub fn market_value(&self, price: f64) -> f64 {
        price * self.shares as f64
    }

    //market value at the last valued price
    pub fn current_value(&self) -> f64 {
        self.market_value(self.last_price)
    }
}
