//indicator series computed over close prices
//values inside each indicator's warm-up window are nan

use crate::data::bar::Bar;
use tracing::warn;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const DEFAULT_RSI_PERIOD: usize = 14;

//simple moving average
//a window holding any non-finite value yields nan, later windows recover
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut gaps = 0usize;
    for i in 0..values.len() {
        if values[i].is_finite() {
            sum += values[i];
        } else {
            gaps += 1;
        }

        if i >= period {
            let old = values[i - period];
            if old.is_finite() {
                sum -= old;
            } else {
                gaps -= 1;
            }
        }

        if i + 1 >= period && gaps == 0 {
            out[i] = sum / period as f64;
        }
    }
    out
}

//exponential moving average seeded with the sma of the first `period` finite values
//nan inputs are skipped and carry the previous average forward,
//so it can be chained on other series
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seen = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }

        match prev {
            Some(p) => {
                let next = alpha * value + (1.0 - alpha) * p;
                prev = Some(next);
                out[i] = next;
            }
            None => {
                seed_sum += value;
                seen += 1;
                if seen == period {
                    let seed = seed_sum / period as f64;
                    prev = Some(seed);
                    out[i] = seed;
                }
            }
        }
    }
    out
}

//relative strength index with wilder smoothing
//changes are measured between consecutive finite closes
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let mut prev_close: Option<f64> = None;
    let mut changes = 0usize;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let prev = match prev_close.replace(value) {
            Some(p) => p,
            None => continue,
        };

        let change = value - prev;
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        changes += 1;

        if changes <= period {
            avg_gain += gain;
            avg_loss += loss;
            if changes == period {
                avg_gain /= period as f64;
                avg_loss /= period as f64;
                out[i] = rsi_from_averages(avg_gain, avg_loss);
            }
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
            out[i] = rsi_from_averages(avg_gain, avg_loss);
        }
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

//macd line, signal line and histogram
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal: signal_line,
        histogram,
    }
}

//1.0 where `a` crosses above `b` on that index, 0.0 otherwise, nan when undefined
pub fn cross_above(a: &[f64], b: &[f64]) -> Vec<f64> {
    crossings(a, b, |pa, pb, ca, cb| pa <= pb && ca > cb)
}

//1.0 where `a` crosses below `b` on that index
pub fn cross_below(a: &[f64], b: &[f64]) -> Vec<f64> {
    crossings(a, b, |pa, pb, ca, cb| pa >= pb && ca < cb)
}

fn crossings(a: &[f64], b: &[f64], crossed: impl Fn(f64, f64, f64, f64) -> bool) -> Vec<f64> {
    let len = a.len().min(b.len());
    let mut out = vec![f64::NAN; len];
    for i in 1..len {
        let values = [a[i - 1], b[i - 1], a[i], b[i]];
        if values.iter().all(|v| v.is_finite()) {
            out[i] = if crossed(values[0], values[1], values[2], values[3]) {
                1.0
            } else {
                0.0
            };
        }
    }
    out
}

//an indicator column this module knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    MacdLine,
    MacdSignal,
    MacdHist,
    MacdBullishCross,
    MacdBearishCross,
}

impl IndicatorKind {
    //parses column names such as sma_20, ema_12, rsi, rsi_7, macd_line
    pub fn parse(name: &str) -> Option<Self> {
        let period = |prefix: &str| -> Option<usize> {
            name.strip_prefix(prefix)
                .and_then(|p| p.parse::<usize>().ok())
                .filter(|p| *p > 0)
        };

        match name {
            "rsi" => Some(IndicatorKind::Rsi(DEFAULT_RSI_PERIOD)),
            "macd_line" | "macd" => Some(IndicatorKind::MacdLine),
            "macd_signal" => Some(IndicatorKind::MacdSignal),
            "macd_hist" => Some(IndicatorKind::MacdHist),
            "macd_bullish_cross" => Some(IndicatorKind::MacdBullishCross),
            "macd_bearish_cross" => Some(IndicatorKind::MacdBearishCross),
            _ => period("sma_")
                .map(IndicatorKind::Sma)
                .or_else(|| period("ema_").map(IndicatorKind::Ema))
                .or_else(|| period("rsi_").map(IndicatorKind::Rsi)),
        }
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        match *self {
            IndicatorKind::Sma(p) => sma(closes, p),
            IndicatorKind::Ema(p) => ema(closes, p),
            IndicatorKind::Rsi(p) => rsi(closes, p),
            IndicatorKind::MacdLine => macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL).line,
            IndicatorKind::MacdSignal => macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL).signal,
            IndicatorKind::MacdHist => macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL).histogram,
            IndicatorKind::MacdBullishCross => {
                let m = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
                cross_above(&m.line, &m.signal)
            }
            IndicatorKind::MacdBearishCross => {
                let m = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
                cross_below(&m.line, &m.signal)
            }
        }
    }
}

//fills the named indicator columns on a single-symbol series
//columns already present in the feed are left untouched
//returns the names that were computed
pub fn augment<S: AsRef<str>>(bars: &mut [Bar], names: &[S]) -> Vec<String> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut computed = Vec::new();

    for name in names {
        let name = name.as_ref();
        if bars.iter().any(|b| b.has_indicator_column(name)) {
            continue;
        }

        let kind = match IndicatorKind::parse(name) {
            Some(k) => k,
            None => {
                warn!(indicator = name, "unknown indicator, cannot compute");
                continue;
            }
        };

        let series = kind.compute(&closes);
        for (bar, value) in bars.iter_mut().zip(series) {
            bar.set_indicator(name, value);
        }
        computed.push(name.to_string());
    }

    computed
}
