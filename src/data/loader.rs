use crate::data::bar::Bar;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

//column positions resolved from the csv header
struct Layout {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    symbol: Option<usize>,
    indicators: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let mut positions = [0usize; 6];
        for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(name).ok_or_else(|| anyhow!("Missing required column '{}'", name))?;
        }
        let symbol = find("symbol");

        //everything else is an indicator column
        let indicators = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(i) && Some(*i) != symbol)
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        Ok(Layout {
            timestamp: positions[0],
            open: positions[1],
            high: positions[2],
            low: positions[3],
            close: positions[4],
            volume: positions[5],
            symbol,
            indicators,
        })
    }
}

//loads indicator-augmented bars from a csv file
//files without a symbol column take the file stem (uppercased) as the symbol
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let headers = reader
        .headers()
        .context(format!("Failed to read CSV header from {:?}", path))?
        .clone();
    let layout = Layout::from_headers(&headers)
        .context(format!("Unsupported CSV layout in {:?}", path))?;

    let default_symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut bars = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = result.context(format!("Failed to parse CSV record at line {}", line))?;
        let bar = parse_record(&record, &layout, &default_symbol)
            .context(format!("Invalid CSV record at line {}", line))?;
        bars.push(bar);
    }

    //stable sort keeps input order for identical timestamps
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(bars)
}

fn parse_record(record: &StringRecord, layout: &Layout, default_symbol: &str) -> Result<Bar> {
    let field = |i: usize| record.get(i).unwrap_or("").trim();

    let timestamp = parse_timestamp(field(layout.timestamp))?;
    let symbol = match layout.symbol.map(field) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default_symbol.to_string(),
    };

    let mut bar = Bar::new(
        timestamp,
        symbol,
        parse_value(field(layout.open)),
        parse_value(field(layout.high)),
        parse_value(field(layout.low)),
        parse_value(field(layout.close)),
        parse_value(field(layout.volume)),
    );

    for (i, name) in &layout.indicators {
        bar.set_indicator(name.clone(), parse_value(field(*i)));
    }

    Ok(bar)
}

//parses a numeric or boolean cell, missing and unparseable cells become nan
pub fn parse_value(raw: &str) -> f64 {
    match raw.to_ascii_lowercase().as_str() {
        "" | "nan" | "null" | "none" | "na" => f64::NAN,
        "true" => 1.0,
        "false" => 0.0,
        other => other.parse::<f64>().unwrap_or(f64::NAN),
    }
}

//accepts rfc3339, "yyyy-mm-dd hh:mm:ss" and plain dates
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts.and_utc());
        }
    }
    bail!("Failed to parse timestamp '{}'", raw)
}

//splits a mixed bar list into per-symbol series, in order of first appearance
pub fn group_by_symbol(bars: &[Bar]) -> IndexMap<String, Vec<Bar>> {
    let mut groups: IndexMap<String, Vec<Bar>> = IndexMap::new();
    for bar in bars {
        groups.entry(bar.symbol.clone()).or_default().push(bar.clone());
    }
    for series in groups.values_mut() {
        series.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_indicator_columns_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "prices.csv",
            "timestamp,symbol,open,high,low,close,volume,rsi,macd_bullish_cross\n\
             2024-01-03,MSFT,11,12,10,11.5,200,,false\n\
             2024-01-02,MSFT,10,11,9,10.5,100,48.2,true\n",
        );

        let bars = load_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].symbol, "MSFT");
        assert_eq!(bars[0].indicator("rsi"), Some(48.2));
        assert_eq!(bars[0].flag("macd_bullish_cross"), Some(true));
        assert_eq!(bars[1].indicator("rsi"), None);
        assert!(bars[1].has_indicator_column("rsi"));
    }

    #[test]
    fn symbol_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "spy.csv",
            "timestamp,open,high,low,close,volume\n2024-01-02T00:00:00Z,1,1,1,1,1\n",
        );
        let bars = load_csv(&path).unwrap();
        assert_eq!(bars[0].symbol, "SPY");
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "bad.csv", "timestamp,open,high,low,volume\n");
        assert!(load_csv(&path).is_err());
    }

    #[test]
    fn parses_timestamp_formats() {
        assert!(parse_timestamp("2024-01-02T09:30:00-05:00").is_ok());
        assert!(parse_timestamp("2024-01-02 09:30:00").is_ok());
        assert!(parse_timestamp("2024-01-02").is_ok());
        assert!(parse_timestamp("01/02/2024").is_err());
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let ts = parse_timestamp("2024-01-02").unwrap();
        let bars = vec![
            Bar::new(ts, "B", 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(ts, "A", 1.0, 1.0, 1.0, 1.0, 1.0),
            Bar::new(ts, "B", 2.0, 2.0, 2.0, 2.0, 1.0),
        ];
        let groups = group_by_symbol(&bars);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(groups["B"].len(), 2);
    }
}
