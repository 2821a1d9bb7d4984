use crate::engine::backtest::BacktestResult;
use crate::engine::trade::{Trade, TradeAction};
use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//risk-free rate and annualization used for sharpe and sortino
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharpeConfig {
    //annual risk-free rate as a fraction (0.02 = 2%)
    //taken as a per-period rate when periods_per_year is none
    pub risk_free_rate: f64,

    //bars per year, none disables annualization
    pub periods_per_year: Option<f64>,
}

impl Default for SharpeConfig {
    fn default() -> Self {
        SharpeConfig {
            risk_free_rate: 0.0,
            periods_per_year: Some(252.0),
        }
    }
}

impl SharpeConfig {
    fn per_period_risk_free(&self) -> f64 {
        match self.periods_per_year {
            Some(periods) if periods > 0.0 => self.risk_free_rate / periods,
            _ => self.risk_free_rate,
        }
    }

    fn annualization(&self) -> f64 {
        match self.periods_per_year {
            Some(periods) if periods > 0.0 => periods.sqrt(),
            _ => 1.0,
        }
    }
}

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub profit_factor: Option<f64>,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub exposure: f64,
}

//aggregates a finished run into a backtest result
pub fn summarize(
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    initial_capital: f64,
    sharpe: &SharpeConfig,
) -> BacktestResult {
    let summary = SummaryMetrics::from_backtest(&equity_curve, &trades, initial_capital, sharpe);

    BacktestResult {
        trades,
        equity_curve,
        summary,
    }
}

impl SummaryMetrics {
    //calculate summary metrics from equity curve and trade log
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
        sharpe: &SharpeConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital > 0.0 {
            total_return * 100.0 / initial_capital
        } else {
            0.0
        };

        let (max_dd, max_dd_pct) = max_drawdown(equity_curve, initial_capital);

        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = calculate_returns(&equity_values);

        let trade_stats = calculate_trade_statistics(trades);

        SummaryMetrics {
            initial_capital,
            final_equity,
            total_return,
            total_return_pct,
            sharpe_ratio: calculate_sharpe_ratio(&returns, sharpe),
            sortino_ratio: calculate_sortino_ratio(&returns, sharpe),
            max_drawdown: max_dd,
            max_drawdown_pct: max_dd_pct,
            win_rate: trade_stats.win_rate,
            profit_factor: trade_stats.profit_factor,
            num_trades: trade_stats.num_trades,
            num_winning_trades: trade_stats.num_winning_trades,
            num_losing_trades: trade_stats.num_losing_trades,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            exposure: calculate_exposure(equity_curve),
        }
    }

    //builds the metric/value table
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        let mut row = |name: &str, value: String| {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(&value)]));
        };

        row("Metric", "Value".to_string());
        row("Initial Capital", format!("${:.2}", self.initial_capital));
        row("Final Equity", format!("${:.2}", self.final_equity));
        row(
            "Total Return",
            format!("${:.2} ({:.2}%)", self.total_return, self.total_return_pct),
        );
        row(
            "Max Drawdown",
            format!("${:.2} ({:.2}%)", self.max_drawdown, self.max_drawdown_pct),
        );
        row("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio));
        row("Sortino Ratio", format_ratio(self.sortino_ratio));
        row("Closed Trades", format!("{}", self.num_trades));
        row("Win Rate", format!("{:.2}%", self.win_rate * 100.0));
        row("Avg Win", format!("${:.2}", self.avg_win));
        row("Avg Loss", format!("${:.2}", self.avg_loss));
        row("Largest Win", format!("${:.2}", self.largest_win));
        row("Largest Loss", format!("${:.2}", self.largest_loss));
        row("Profit Factor", format_ratio(self.profit_factor));
        row("Exposure", format!("{:.2}%", self.exposure * 100.0));

        table
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        self.to_table().printstd();
    }
}

//ratios that are undefined without a downside print as n/a
pub fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

struct TradeStats {
    num_trades: usize,
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: Option<f64>,
    largest_win: f64,
    largest_loss: f64,
}

//statistics over closed trades, i.e. sell records
fn calculate_trade_statistics(trades: &[Trade]) -> TradeStats {
    let closed: Vec<f64> = trades
        .iter()
        .filter(|t| t.action == TradeAction::Sell)
        .filter_map(|t| t.realized_pnl)
        .collect();

    let winning: Vec<f64> = closed.iter().copied().filter(|&pnl| pnl > 0.0).collect();
    let losing: Vec<f64> = closed.iter().copied().filter(|&pnl| pnl < 0.0).collect();

    let win_rate = if closed.is_empty() {
        0.0
    } else {
        winning.len() as f64 / closed.len() as f64
    };

    let avg = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    let gross_profit: f64 = winning.iter().sum();
    let gross_loss: f64 = losing.iter().sum::<f64>().abs();

    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else {
        None
    };

    TradeStats {
        num_trades: closed.len(),
        num_winning_trades: winning.len(),
        num_losing_trades: losing.len(),
        win_rate,
        avg_win: avg(&winning),
        avg_loss: avg(&losing),
        profit_factor,
        largest_win: winning.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losing.iter().fold(0.0f64, |a, &b| a.min(b)),
    }
}

//mean excess return over the standard deviation of returns
//zero with fewer than two observations or a flat series
pub fn calculate_sharpe_ratio(returns: &[f64], config: &SharpeConfig) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let std_dev = returns.std_dev();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }

    let excess_mean = returns.mean() - config.per_period_risk_free();
    excess_mean / std_dev * config.annualization()
}

//like sharpe but only penalizes downside volatility
//none when there are no losing periods to measure
pub fn calculate_sortino_ratio(returns: &[f64], config: &SharpeConfig) -> Option<f64> {
    if returns.len() < 2 {
        return Some(0.0);
    }

    let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();
    if negative_returns.len() < 2 {
        return None;
    }

    let downside_dev = negative_returns.std_dev();
    if downside_dev == 0.0 {
        return None;
    }

    let excess_mean = returns.mean() - config.per_period_risk_free();
    Some(excess_mean / downside_dev * config.annualization())
}

//fraction of equity points with money in the market
fn calculate_exposure(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }

    let invested = equity_curve.iter().filter(|p| p.invested > 0.0).count();
    invested as f64 / equity_curve.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::timeseries::{calculate_equity_curve, EquitySample};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn sell(pnl: f64) -> Trade {
        Trade {
            timestamp: ts(0),
            bar_index: 0,
            symbol: "AAPL".into(),
            action: TradeAction::Sell,
            price: 10.0,
            shares: 1,
            realized_pnl: Some(pnl),
            realized_pnl_pct: Some(pnl * 10.0),
            reason: "stop loss".into(),
        }
    }

    fn curve(values: &[f64], initial: f64) -> Vec<EquityPoint> {
        let samples: Vec<EquitySample> = values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquitySample {
                timestamp: ts(i as i64),
                equity,
                invested: if i % 2 == 0 { equity } else { 0.0 },
            })
            .collect();
        calculate_equity_curve(&samples, initial)
    }

    #[test]
    fn sharpe_is_zero_for_short_series() {
        let config = SharpeConfig::default();
        assert_eq!(calculate_sharpe_ratio(&[], &config), 0.0);
        assert_eq!(calculate_sharpe_ratio(&[0.05], &config), 0.0);
        assert_eq!(calculate_sharpe_ratio(&[0.01, 0.01, 0.01], &config), 0.0);
    }

    #[test]
    fn sharpe_annualization_is_configurable() {
        let returns = [0.01, -0.005, 0.02, 0.0];
        let raw = SharpeConfig {
            risk_free_rate: 0.0,
            periods_per_year: None,
        };
        let daily = SharpeConfig::default();

        let unannualized = calculate_sharpe_ratio(&returns, &raw);
        let annualized = calculate_sharpe_ratio(&returns, &daily);
        assert!((annualized - unannualized * 252.0_f64.sqrt()).abs() < 1e-9);

        let with_rf = SharpeConfig {
            risk_free_rate: 0.02,
            periods_per_year: Some(252.0),
        };
        assert!(calculate_sharpe_ratio(&returns, &with_rf) < annualized);
    }

    #[test]
    fn trade_statistics_from_sells() {
        let trades = vec![sell(100.0), sell(-50.0), sell(200.0), sell(0.0)];
        let metrics = SummaryMetrics::from_backtest(
            &curve(&[1000.0], 1000.0),
            &trades,
            1000.0,
            &SharpeConfig::default(),
        );

        assert_eq!(metrics.num_trades, 4);
        assert_eq!(metrics.num_winning_trades, 2);
        assert_eq!(metrics.num_losing_trades, 1);
        assert_eq!(metrics.win_rate, 0.5);
        assert_eq!(metrics.profit_factor, Some(6.0));
        assert_eq!(metrics.avg_win, 150.0);
        assert_eq!(metrics.largest_loss, -50.0);
    }

    #[test]
    fn no_losses_leaves_profit_factor_undefined() {
        let metrics = SummaryMetrics::from_backtest(
            &curve(&[1000.0], 1000.0),
            &[sell(10.0)],
            1000.0,
            &SharpeConfig::default(),
        );
        assert_eq!(metrics.profit_factor, None);

        let empty =
            SummaryMetrics::from_backtest(&[], &[], 1000.0, &SharpeConfig::default());
        assert_eq!(empty.win_rate, 0.0);
        assert_eq!(empty.total_return, 0.0);
        assert_eq!(empty.final_equity, 1000.0);
    }

    #[test]
    fn returns_and_drawdown() {
        let metrics = SummaryMetrics::from_backtest(
            &curve(&[10_000.0, 12_000.0, 9_000.0, 11_000.0], 10_000.0),
            &[],
            10_000.0,
            &SharpeConfig::default(),
        );
        assert_eq!(metrics.total_return, 1_000.0);
        assert_eq!(metrics.total_return_pct, 10.0);
        assert_eq!(metrics.max_drawdown, 3_000.0);
        assert_eq!(metrics.max_drawdown_pct, 25.0);
        assert_eq!(metrics.exposure, 0.5);
    }

    #[test]
    fn table_has_a_row_per_metric() {
        let metrics = SummaryMetrics::from_backtest(&[], &[], 1.0, &SharpeConfig::default());
        assert_eq!(metrics.to_table().len(), 15);
    }
}
