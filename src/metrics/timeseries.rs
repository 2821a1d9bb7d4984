use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//raw portfolio valuation recorded by the simulation loop once per timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub invested: f64,
}

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,

    //market value held in open positions
    pub invested: f64,

    //percent below the running peak
    pub drawdown_pct: f64,

    //simple return versus the previous point
    pub returns: f64,
}

//builds the equity curve with drawdowns
//the running peak starts at the initial capital
pub fn calculate_equity_curve(samples: &[EquitySample], initial_capital: f64) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(samples.len());
    let mut peak = initial_capital;
    let mut prev_equity: Option<f64> = None;

    for sample in samples {
        if sample.equity > peak {
            peak = sample.equity;
        }

        let drawdown_pct = if peak > 0.0 {
            (peak - sample.equity) / peak * 100.0
        } else {
            0.0
        };

        let returns = match prev_equity {
            Some(prev) if prev > 0.0 => (sample.equity - prev) / prev,
            _ => 0.0,
        };

        curve.push(EquityPoint {
            timestamp: sample.timestamp,
            equity: sample.equity,
            invested: sample.invested,
            drawdown_pct,
            returns,
        });
        prev_equity = Some(sample.equity);
    }

    curve
}

//largest peak-to-trough decline as (absolute, percent)
//the two maxima are tracked independently and may come from different troughs
pub fn max_drawdown(equity_curve: &[EquityPoint], initial_capital: f64) -> (f64, f64) {
    let mut peak = initial_capital;
    let mut max_abs = 0.0f64;
    let mut max_pct = 0.0f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        max_abs = max_abs.max(peak - point.equity);
        if peak > 0.0 {
            max_pct = max_pct.max((peak - point.equity) / peak * 100.0);
        }
    }

    (max_abs, max_pct)
}

//calculates per-period returns from equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}
