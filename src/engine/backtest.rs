use crate::data::{group_by_symbol, Bar};
use crate::engine::error::BacktestError;
use crate::engine::trade::Trade;
use crate::metrics::{
    calculate_equity_curve, summarize, EquityPoint, EquitySample, SharpeConfig, SummaryMetrics,
};
use crate::portfolio::{Ledger, LedgerError};
use crate::strategy::{ExitReason, Strategy};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

//result of a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: SummaryMetrics,
}

//capital, sizing and reporting settings for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,

    //largest single position as a percent of total portfolio value
    pub max_position_pct: f64,

    //no new entries while cash is below this floor
    pub safe_net: f64,

    pub sharpe: SharpeConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            max_position_pct: 25.0,
            safe_net: 0.0,
            sharpe: SharpeConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !(self.max_position_pct > 0.0 && self.max_position_pct <= 100.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "max_position_pct must be in (0, 100], got {}",
                self.max_position_pct
            )));
        }
        if !self.safe_net.is_finite() || self.safe_net < 0.0 {
            return Err(BacktestError::InvalidConfig(format!(
                "safe_net must be non-negative, got {}",
                self.safe_net
            )));
        }
        if matches!(self.sharpe.periods_per_year, Some(p) if !(p > 0.0)) {
            return Err(BacktestError::InvalidConfig(
                "sharpe.periods_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

//per-symbol position state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolState {
    Flat,
    Open,
}

//bars sharing one timestamp, as (symbol slot, bar index)
type Timeline = BTreeMap<DateTime<Utc>, Vec<(usize, usize)>>;

//main backtest engine
//holds immutable input, every run builds its own ledger so runs are independent
pub struct BacktestEngine {
    config: BacktestConfig,
    series: Arc<IndexMap<String, Vec<Bar>>>,
}

impl BacktestEngine {
    //creates an engine over a mixed bar list, grouped by symbol
    pub fn new(config: BacktestConfig, bars: Vec<Bar>) -> Self {
        Self::from_series(config, group_by_symbol(&bars))
    }

    //creates an engine over per-symbol series that are already time ordered
    pub fn from_series(config: BacktestConfig, series: IndexMap<String, Vec<Bar>>) -> Self {
        Self::from_shared(config, Arc::new(series))
    }

    //creates an engine over series shared with other engines (parameter sweeps)
    pub fn from_shared(config: BacktestConfig, series: Arc<IndexMap<String, Vec<Bar>>>) -> Self {
        BacktestEngine { config, series }
    }

    //runs the backtest with the given strategy
    pub fn run(&self, strategy: &dyn Strategy) -> Result<BacktestResult, BacktestError> {
        let span = info_span!(
            "run_backtest",
            strategy = strategy.name(),
            symbols = self.series.len()
        );
        let _guard = span.enter();

        self.config.validate()?;
        self.check_series(strategy.warmup())?;

        let mut sim = Simulation::new(&self.config, strategy, self.series.as_ref());

        //main backtest loop
        for (timestamp, slots) in self.timeline() {
            sim.step(timestamp, &slots)?;
        }

        let equity_curve = calculate_equity_curve(&sim.samples, self.config.initial_capital);
        let result = summarize(
            sim.trades,
            equity_curve,
            self.config.initial_capital,
            &self.config.sharpe,
        );

        info!(
            trades = result.trades.len(),
            final_equity = result.summary.final_equity,
            total_return_pct = result.summary.total_return_pct,
            sharpe = result.summary.sharpe_ratio,
            "backtest finished"
        );

        Ok(result)
    }

    //empty input, or any series shorter than the warm-up window, aborts the run
    fn check_series(&self, warmup: usize) -> Result<(), BacktestError> {
        if self.series.values().all(|bars| bars.is_empty()) {
            return Err(BacktestError::EmptyInputSeries {
                symbol: None,
                bars: 0,
                warmup,
            });
        }

        for (symbol, bars) in self.series.iter() {
            if bars.len() < warmup {
                return Err(BacktestError::EmptyInputSeries {
                    symbol: Some(symbol.clone()),
                    bars: bars.len(),
                    warmup,
                });
            }
        }

        Ok(())
    }

    //merged timestamp order across symbols, symbols within a timestamp in input order
    fn timeline(&self) -> Timeline {
        let mut timeline = Timeline::new();
        for (slot, bars) in self.series.values().enumerate() {
            for (index, bar) in bars.iter().enumerate() {
                timeline
                    .entry(bar.timestamp)
                    .or_default()
                    .push((slot, index));
            }
        }
        timeline
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }
}

//mutable state owned by a single run
struct Simulation<'a> {
    config: &'a BacktestConfig,
    strategy: &'a dyn Strategy,
    series: &'a IndexMap<String, Vec<Bar>>,
    required: Vec<String>,
    ledger: Ledger,
    states: Vec<SymbolState>,

    //final bar index per symbol with a usable close, where open positions are liquidated
    final_valid: Vec<Option<usize>>,
    trades: Vec<Trade>,
    samples: Vec<EquitySample>,
}

impl<'a> Simulation<'a> {
    fn new(
        config: &'a BacktestConfig,
        strategy: &'a dyn Strategy,
        series: &'a IndexMap<String, Vec<Bar>>,
    ) -> Self {
        Simulation {
            config,
            strategy,
            series,
            required: strategy.required_indicators(),
            ledger: Ledger::new(config.initial_capital),
            states: vec![SymbolState::Flat; series.len()],
            final_valid: series
                .values()
                .map(|bars| bars.iter().rposition(Bar::has_valid_close))
                .collect(),
            trades: Vec::new(),
            samples: Vec::new(),
        }
    }

    fn symbol_bars(&self, slot: usize) -> (&'a str, &'a [Bar]) {
        let series: &'a IndexMap<String, Vec<Bar>> = self.series;
        match series.get_index(slot) {
            Some((symbol, bars)) => (symbol.as_str(), bars.as_slice()),
            None => ("", &[]),
        }
    }

    //processes every bar stamped with `timestamp`
    fn step(
        &mut self,
        timestamp: DateTime<Utc>,
        slots: &[(usize, usize)],
    ) -> Result<(), BacktestError> {
        //revalue first so sizing sees current prices
        let mut usable = Vec::with_capacity(slots.len());
        for &(slot, index) in slots {
            let (symbol, bars) = self.symbol_bars(slot);
            let bar = &bars[index];

            if bar.has_valid_close() {
                self.ledger.revalue(symbol, bar.close);
            }

            match bar.validate(&self.required) {
                Ok(()) => usable.push((slot, index)),
                Err(err) => warn!(symbol, bar_index = index, error = %err, "skipping malformed bar"),
            }
        }

        //exits free cash before any entry on the same timestamp
        let mut exited = Vec::new();
        for &(slot, index) in &usable {
            if self.states[slot] == SymbolState::Open && self.evaluate_exit(slot, index)? {
                exited.push(slot);
            }
        }

        for &(slot, index) in &usable {
            if self.states[slot] == SymbolState::Flat && !exited.contains(&slot) {
                self.evaluate_entry(slot, index)?;
            }
        }

        //a symbol with no usable close left is liquidated before equity is recorded
        for &(slot, index) in slots {
            if self.final_valid[slot] == Some(index) && self.states[slot] == SymbolState::Open {
                self.close(slot, index, ExitReason::EndOfData)?;
            }
        }

        debug_assert!(self.ledger.cash() >= 0.0, "cash went negative");

        let equity = self.ledger.total_value();
        self.samples.push(EquitySample {
            timestamp,
            equity,
            invested: equity - self.ledger.cash(),
        });

        Ok(())
    }

    //returns true when the position was closed
    fn evaluate_exit(&mut self, slot: usize, index: usize) -> Result<bool, BacktestError> {
        let (symbol, bars) = self.symbol_bars(slot);
        let bar = &bars[index];

        let position = self
            .ledger
            .get_position(symbol)
            .ok_or_else(|| BacktestError::NoOpenPosition {
                symbol: symbol.to_string(),
                timestamp: bar.timestamp,
                bar_index: index,
            })?;

        match self.strategy.should_exit(bars, index, position) {
            Some(reason) => {
                self.close(slot, index, reason)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn evaluate_entry(&mut self, slot: usize, index: usize) -> Result<(), BacktestError> {
        let (symbol, bars) = self.symbol_bars(slot);
        let bar = &bars[index];

        let signal = match self.strategy.should_entry(bars, index) {
            Some(signal) => signal,
            None => return Ok(()),
        };

        if self.ledger.cash() < self.config.safe_net {
            debug!(
                symbol,
                bar_index = index,
                cash = self.ledger.cash(),
                safe_net = self.config.safe_net,
                "entry suppressed, cash below safe net"
            );
            return Ok(());
        }

        let target = self.ledger.total_value() * self.config.max_position_pct / 100.0;

        match self.ledger.open(symbol, bar.close, bar.timestamp, target) {
            Ok(position) => {
                debug!(
                    symbol,
                    bar_index = index,
                    price = position.entry_price,
                    shares = position.shares,
                    reason = %signal,
                    "opened position"
                );
                self.trades.push(Trade::buy(&position, index, signal.to_string()));
                self.states[slot] = SymbolState::Open;
                Ok(())
            }
            Err(LedgerError::InsufficientCash {
                required, available, ..
            }) => {
                debug!(
                    symbol,
                    bar_index = index,
                    target,
                    required,
                    available,
                    "entry suppressed, insufficient cash"
                );
                Ok(())
            }
            Err(_) => Err(BacktestError::PositionAlreadyOpen {
                symbol: symbol.to_string(),
                timestamp: bar.timestamp,
                bar_index: index,
            }),
        }
    }

    fn close(
        &mut self,
        slot: usize,
        index: usize,
        reason: ExitReason,
    ) -> Result<(), BacktestError> {
        let (symbol, bars) = self.symbol_bars(slot);
        let bar = &bars[index];

        let closed = self
            .ledger
            .close(symbol, bar.close, bar.timestamp)
            .map_err(|_| BacktestError::NoOpenPosition {
                symbol: symbol.to_string(),
                timestamp: bar.timestamp,
                bar_index: index,
            })?;

        debug!(
            symbol,
            bar_index = index,
            price = closed.exit_price,
            realized_pnl = closed.realized_pnl,
            reason = %reason,
            "closed position"
        );

        self.trades.push(Trade::sell(&closed, index, reason.as_str()));
        self.states[slot] = SymbolState::Flat;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{EntrySignal, ExitRules};
    use crate::portfolio::Position;
    use chrono::{Duration, TimeZone};

    struct AlwaysIn;

    impl Strategy for AlwaysIn {
        fn name(&self) -> &str {
            "always in"
        }

        fn warmup(&self) -> usize {
            0
        }

        fn required_indicators(&self) -> Vec<String> {
            Vec::new()
        }

        fn should_entry(&self, _bars: &[Bar], _index: usize) -> Option<EntrySignal> {
            Some(EntrySignal::new(["always"]))
        }

        fn should_exit(&self, bars: &[Bar], index: usize, position: &Position) -> Option<ExitReason> {
            ExitRules::default().evaluate(position, bars[index].close, false, false)
        }
    }

    fn series(closes: &[f64]) -> IndexMap<String, Vec<Bar>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), "AAPL", c, c, c, c, 1.0))
            .collect();
        let mut map = IndexMap::new();
        map.insert("AAPL".to_string(), bars);
        map
    }

    #[test]
    fn ledger_desync_aborts_with_context() {
        let config = BacktestConfig::default();
        let data = series(&[10.0, 11.0]);
        let mut sim = Simulation::new(&config, &AlwaysIn, &data);

        //state says open but the ledger holds nothing
        sim.states[0] = SymbolState::Open;
        let ts = data["AAPL"][0].timestamp;
        let err = sim.step(ts, &[(0, 0)]).unwrap_err();

        assert_eq!(
            err,
            BacktestError::NoOpenPosition {
                symbol: "AAPL".into(),
                timestamp: ts,
                bar_index: 0,
            }
        );
    }

    #[test]
    fn invalid_config_aborts_before_simulating() {
        let config = BacktestConfig {
            max_position_pct: 150.0,
            ..BacktestConfig::default()
        };
        let engine = BacktestEngine::from_series(config, series(&[10.0]));
        assert!(matches!(
            engine.run(&AlwaysIn),
            Err(BacktestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn timeline_merges_symbols_in_time_order() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = vec![
            Bar::new(start + Duration::days(1), "B", 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(start, "A", 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(start + Duration::days(1), "A", 1.0, 1.0, 1.0, 1.0, 1.0),
        ];
        let engine = BacktestEngine::new(BacktestConfig::default(), bars);
        assert_eq!(engine.symbols(), vec!["B", "A"]);

        let timeline: Vec<_> = engine.timeline().into_values().collect();
        assert_eq!(timeline, vec![vec![(1, 0)], vec![(0, 0), (1, 1)]]);
    }
}
