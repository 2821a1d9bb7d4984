//runs independent backtests in parallel, one private ledger per job

use crate::data::Bar;
use crate::engine::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::engine::error::BacktestError;
use crate::metrics::summary::format_ratio;
use crate::strategy::{Profile, Strategy};
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

//one strategy/profile combination to evaluate
pub struct SweepJob {
    pub profile: Profile,
    pub config: BacktestConfig,
    pub strategy: Box<dyn Strategy>,
}

//outcome of a single job, failures do not stop the other jobs
pub struct SweepOutcome {
    pub strategy: String,
    pub profile: Profile,
    pub result: Result<BacktestResult, BacktestError>,
}

//runs every job over the same input series in parallel
//outcomes come back in job order
pub fn run_sweep(series: IndexMap<String, Vec<Bar>>, jobs: Vec<SweepJob>) -> Vec<SweepOutcome> {
    let shared = Arc::new(series);
    info!(jobs = jobs.len(), "starting parameter sweep");

    jobs.into_par_iter()
        .map(|job| {
            let engine = BacktestEngine::from_shared(job.config, Arc::clone(&shared));
            SweepOutcome {
                strategy: job.strategy.name().to_string(),
                profile: job.profile,
                result: engine.run(job.strategy.as_ref()),
            }
        })
        .collect()
}

//side-by-side comparison of sweep outcomes
pub fn comparison_table(outcomes: &[SweepOutcome]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(
        [
            "Strategy", "Profile", "Return %", "Sharpe", "Max DD %", "Win Rate", "Profit Factor",
            "Trades",
        ]
        .iter()
        .map(|h| Cell::new(h))
        .collect(),
    ));

    for outcome in outcomes {
        let mut cells = vec![
            Cell::new(&outcome.strategy),
            Cell::new(outcome.profile.name()),
        ];

        match &outcome.result {
            Ok(result) => {
                let s = &result.summary;
                cells.extend([
                    Cell::new(&format!("{:.2}", s.total_return_pct)),
                    Cell::new(&format!("{:.3}", s.sharpe_ratio)),
                    Cell::new(&format!("{:.2}", s.max_drawdown_pct)),
                    Cell::new(&format!("{:.2}%", s.win_rate * 100.0)),
                    Cell::new(&format_ratio(s.profit_factor)),
                    Cell::new(&format!("{}", s.num_trades)),
                ]);
            }
            Err(err) => cells.push(Cell::new(&format!("error: {}", err))),
        }

        table.add_row(Row::new(cells));
    }

    table
}
