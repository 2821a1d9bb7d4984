pub mod export;
pub mod summary;
pub mod timeseries;

pub use export::{write_equity_csv, write_json, write_trades_csv};
pub use summary::{summarize, SharpeConfig, SummaryMetrics};
pub use timeseries::{calculate_equity_curve, EquityPoint, EquitySample};
