//a Rust-based signal-driven backtesting engine for stock strategies

pub mod config;
pub mod data;
pub mod engine;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfiguration, MacdParams, RsiParams, SmaParams, StrategyParams, StrategyType,
    };
    pub use crate::data::{group_by_symbol, indicators, load_csv, Bar, BarError};
    pub use crate::engine::{
        comparison_table, run_sweep, BacktestConfig, BacktestEngine, BacktestError,
        BacktestResult, SweepJob, SweepOutcome, Trade, TradeAction,
    };
    pub use crate::metrics::{
        summarize, write_equity_csv, write_json, write_trades_csv, EquityPoint, SharpeConfig,
        SummaryMetrics,
    };
    pub use crate::portfolio::{ClosedPosition, Ledger, LedgerError, Position};
    pub use crate::strategy::{
        macd_momentum::MacdMomentumStrategy, rsi_reversion::RsiReversionStrategy,
        sma_crossover::SmaCrossoverStrategy, EntrySignal, ExitReason, ExitRules, Profile,
        Strategy,
    };
}
