use crate::portfolio::position::Position;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient cash to open {symbol}: required {required:.2}, available {available:.2}")]
    InsufficientCash {
        symbol: String,
        required: f64,
        available: f64,
    },
    #[error("No open position for {symbol}")]
    NoOpenPosition { symbol: String },
    #[error("Position already open for {symbol}")]
    PositionAlreadyOpen { symbol: String },
}

//outcome of fully liquidating a position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    pub proceeds: f64,
    pub realized_pnl: f64,
    pub realized_pnl_pct: f64,
}

//cash plus open long positions for a single backtest run
#[derive(Debug, Clone)]
pub struct Ledger {
    //uninvested cash, never negative
    cash: f64,

    //open positions by symbol, at most one per symbol
    open_positions: IndexMap<String, Position>,
}

impl Ledger {
    //creates a ledger holding only cash
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            cash: initial_capital,
            open_positions: IndexMap::new(),
        }
    }

    //buys floor(target_notional / price) shares
    //rejects the whole order rather than filling part of it
    pub fn open(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: DateTime<Utc>,
        target_notional: f64,
    ) -> Result<Position, LedgerError> {
        if self.open_positions.contains_key(symbol) {
            return Err(LedgerError::PositionAlreadyOpen {
                symbol: symbol.to_string(),
            });
        }

        let shares = if price.is_finite() && price > 0.0 && target_notional > 0.0 {
            (target_notional / price).floor() as u64
        } else {
            0
        };
        let required = shares as f64 * price;

        let position = match Position::new(symbol.to_string(), price, timestamp, shares) {
            Some(p) if required <= self.cash => p,
            _ => {
                return Err(LedgerError::InsufficientCash {
                    symbol: symbol.to_string(),
                    required,
                    available: self.cash,
                })
            }
        };

        self.cash -= position.cost_basis;
        self.open_positions
            .insert(symbol.to_string(), position.clone());

        Ok(position)
    }

    //sells the entire position at the given price
    pub fn close(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ClosedPosition, LedgerError> {
        let position =
            self.open_positions
                .shift_remove(symbol)
                .ok_or_else(|| LedgerError::NoOpenPosition {
                    symbol: symbol.to_string(),
                })?;

        let proceeds = position.market_value(price);
        let realized_pnl = position.unrealized_pnl(price);
        let realized_pnl_pct = position.pnl_pct(price);
        self.cash += proceeds;

        Ok(ClosedPosition {
            position,
            exit_price: price,
            exit_timestamp: timestamp,
            proceeds,
            realized_pnl,
            realized_pnl_pct,
        })
    }

    //unrealized pnl of an open position at a price, no mutation
    pub fn mark_to_market(&self, symbol: &str, price: f64) -> Result<f64, LedgerError> {
        self.open_positions
            .get(symbol)
            .map(|p| p.unrealized_pnl(price))
            .ok_or_else(|| LedgerError::NoOpenPosition {
                symbol: symbol.to_string(),
            })
    }

    //records the latest price for an open position, ignored when flat
    pub fn revalue(&mut self, symbol: &str, price: f64) {
        if let Some(position) = self.open_positions.get_mut(symbol) {
            position.last_price = price;
        }
    }

    //cash plus the market value of every open position
    pub fn total_value(&self) -> f64 {
        self.cash
            + self
                .open_positions
                .values()
                .map(Position::current_value)
                .sum::<f64>()
    }

    //returns the position for a symbol, or none if flat
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.get(symbol)
    }

    pub fn is_open(&self, symbol: &str) -> bool {
        self.open_positions.contains_key(symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }
}
