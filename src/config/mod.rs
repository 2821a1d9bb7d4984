pub mod backtest_config;

pub use backtest_config::{
    BacktestConfiguration, MacdParams, RsiParams, SmaParams, StrategyParams, StrategyType,
};
