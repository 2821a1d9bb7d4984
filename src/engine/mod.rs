pub mod backtest;
pub mod error;
pub mod sweep;
pub mod trade;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult};
pub use error::BacktestError;
pub use sweep::{comparison_table, run_sweep, SweepJob, SweepOutcome};
pub use trade::{Trade, TradeAction};
