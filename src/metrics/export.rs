use crate::engine::backtest::BacktestResult;
use crate::engine::trade::Trade;
use crate::metrics::timeseries::EquityPoint;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

//flat csv row for a trade, optional pnl columns stay empty on buys
#[derive(Serialize)]
struct TradeRow<'a> {
    timestamp: String,
    bar_index: usize,
    symbol: &'a str,
    action: &'static str,
    price: f64,
    shares: u64,
    realized_pnl: Option<f64>,
    realized_pnl_pct: Option<f64>,
    reason: &'a str,
}

#[derive(Serialize)]
struct EquityRow {
    timestamp: String,
    equity: f64,
    invested: f64,
    drawdown_pct: f64,
    returns: f64,
}

//writes the trade log as csv
pub fn write_trades_csv<P: AsRef<Path>>(trades: &[Trade], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create trades CSV: {:?}", path))?;

    for trade in trades {
        writer.serialize(TradeRow {
            timestamp: trade.timestamp.to_rfc3339(),
            bar_index: trade.bar_index,
            symbol: &trade.symbol,
            action: trade.action.as_str(),
            price: trade.price,
            shares: trade.shares,
            realized_pnl: trade.realized_pnl,
            realized_pnl_pct: trade.realized_pnl_pct,
            reason: &trade.reason,
        })?;
    }

    writer.flush()?;
    Ok(())
}

//writes the equity curve as csv
pub fn write_equity_csv<P: AsRef<Path>>(equity_curve: &[EquityPoint], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create equity CSV: {:?}", path))?;

    for point in equity_curve {
        writer.serialize(EquityRow {
            timestamp: point.timestamp.to_rfc3339(),
            equity: point.equity,
            invested: point.invested,
            drawdown_pct: point.drawdown_pct,
            returns: point.returns,
        })?;
    }

    writer.flush()?;
    Ok(())
}

//writes the whole result (trades, curve, summary) as pretty json
pub fn write_json<P: AsRef<Path>>(result: &BacktestResult, path: P) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json).context(format!("Failed to write JSON result: {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::trade::TradeAction;
    use crate::metrics::summary::{summarize, SharpeConfig};
    use crate::metrics::timeseries::{calculate_equity_curve, EquitySample};
    use chrono::{TimeZone, Utc};

    fn result() -> BacktestResult {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let trades = vec![
            Trade {
                timestamp: ts,
                bar_index: 0,
                symbol: "AAPL".into(),
                action: TradeAction::Buy,
                price: 100.0,
                shares: 10,
                realized_pnl: None,
                realized_pnl_pct: None,
                reason: "entry".into(),
            },
            Trade {
                timestamp: ts,
                bar_index: 1,
                symbol: "AAPL".into(),
                action: TradeAction::Sell,
                price: 110.0,
                shares: 10,
                realized_pnl: Some(100.0),
                realized_pnl_pct: Some(10.0),
                reason: "take profit".into(),
            },
        ];
        let curve = calculate_equity_curve(
            &[EquitySample {
                timestamp: ts,
                equity: 1_100.0,
                invested: 0.0,
            }],
            1_000.0,
        );
        summarize(trades, curve, 1_000.0, &SharpeConfig::default())
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        write_trades_csv(&result().trades, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,bar_index,symbol,action"));
        assert!(lines[1].contains("BUY,100.0,10,,,entry"));
        assert!(lines[2].ends_with("SELL,110.0,10,100.0,10.0,take profit"));
    }

    #[test]
    fn equity_csv_round_trips_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity.csv");
        write_equity_csv(&result().equity_curve, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "1100.0");
    }

    #[test]
    fn json_result_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let original = result();
        write_json(&original, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let reloaded: BacktestResult = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded.trades, original.trades);
        assert_eq!(reloaded.summary.profit_factor, None);
        assert!(text.contains("\"profit_factor\": null"));
    }
}
