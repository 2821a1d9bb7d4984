use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use stocksim::prelude::*;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "stocksim")]
#[command(about = "A Rust-based signal-driven backtesting engine for stocks", long_about = None)]
struct Cli {
    //log level, overridden by STOCKSIM_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    //log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run(RunArgs),

    //run every strategy x profile combination in parallel and compare
    Compare {
        #[command(flatten)]
        common: CommonArgs,

        //strategies to compare (macd, sma, rsi), defaults to all
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,

        //profiles to compare, defaults to all
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<String>,
    },

    //write a default configuration file
    InitConfig {
        //destination path
        #[arg(long, default_value = "stocksim.json")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    //json configuration file, flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    //path to csv data file
    #[arg(long)]
    data: Option<PathBuf>,

    //symbols to trade (comma separated), defaults to every symbol in the file
    #[arg(long, value_delimiter = ',')]
    symbol: Vec<String>,

    //initial capital
    #[arg(long)]
    initial_capital: Option<f64>,

    //max position size as percent of portfolio value
    #[arg(long)]
    max_position_pct: Option<f64>,

    //cash floor below which no entries are taken
    #[arg(long)]
    safe_net: Option<f64>,

    //take profit percent
    #[arg(long)]
    take_profit: Option<f64>,

    //stop loss percent
    #[arg(long)]
    stop_loss: Option<f64>,

    //annual risk-free rate for sharpe (0.02 = 2%)
    #[arg(long)]
    risk_free_rate: Option<f64>,

    //bars per year for annualization, 0 disables it
    #[arg(long)]
    periods_per_year: Option<f64>,

    //only use indicator columns present in the file
    #[arg(long)]
    no_compute_indicators: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    //strategy type (macd, sma, rsi)
    #[arg(long)]
    strategy: Option<String>,

    //risk profile (conservative, balanced, aggressive)
    #[arg(long)]
    profile: Option<String>,

    //warm-up bars before entries are allowed
    #[arg(long)]
    warmup: Option<usize>,

    //output options
    //output path for equity curve csv
    #[arg(long)]
    output_equity_csv: Option<PathBuf>,

    //output path for trades csv
    #[arg(long)]
    output_trades_csv: Option<PathBuf>,

    //output path for the full json result
    #[arg(long)]
    output_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Run(args) => run_backtest(args),
        Commands::Compare {
            common,
            strategies,
            profiles,
        } => compare(common, strategies, profiles),
        Commands::InitConfig { output } => {
            BacktestConfiguration::default().to_json_file(&output)?;
            println!("Default configuration written to {:?}", output);
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var("STOCKSIM_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| anyhow::anyhow!("invalid log filter: {err}"))?;

    if log_format.trim().eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

//loads the config file (or defaults) and applies flag overrides
fn resolve_config(common: &CommonArgs) -> Result<BacktestConfiguration> {
    let mut config = match &common.config {
        Some(path) => BacktestConfiguration::from_json_file(path)?,
        None => BacktestConfiguration::default(),
    };

    if let Some(data) = &common.data {
        config.data_path = data.clone();
    }
    if !common.symbol.is_empty() {
        config.symbols = common.symbol.clone();
    }
    if let Some(v) = common.initial_capital {
        config.initial_capital = v;
    }
    if let Some(v) = common.max_position_pct {
        config.max_position_pct = v;
    }
    if let Some(v) = common.safe_net {
        config.safe_net = v;
    }
    if let Some(v) = common.take_profit {
        config.exit_rules.take_profit_pct = v;
    }
    if let Some(v) = common.stop_loss {
        config.exit_rules.stop_loss_pct = v;
    }
    if let Some(v) = common.risk_free_rate {
        config.sharpe.risk_free_rate = v;
    }
    if let Some(v) = common.periods_per_year {
        config.sharpe.periods_per_year = if v > 0.0 { Some(v) } else { None };
    }
    if common.no_compute_indicators {
        config.compute_indicators = false;
    }

    Ok(config)
}

//loads bars, keeps the requested symbols and fills missing indicators
fn load_series(
    config: &BacktestConfiguration,
    indicators_needed: &[String],
) -> Result<IndexMap<String, Vec<Bar>>> {
    println!("Loading data from {:?}...", config.data_path);
    let all_bars = load_csv(&config.data_path)
        .context(format!("Failed to load data from {:?}", config.data_path))?;

    let mut series = group_by_symbol(&all_bars);
    if !config.symbols.is_empty() {
        series.retain(|symbol, _| config.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol)));
    }

    if series.is_empty() {
        anyhow::bail!("No data found for symbols {:?}", config.symbols);
    }

    for (symbol, bars) in series.iter_mut() {
        if config.compute_indicators {
            let computed = indicators::augment(bars, indicators_needed);
            if !computed.is_empty() {
                info!(symbol = %symbol, indicators = ?computed, "computed indicators");
            }
        }

        if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
            println!(
                "{}: {} bars from {} to {}",
                symbol,
                bars.len(),
                first.timestamp,
                last.timestamp
            );
        }
    }
    println!();

    Ok(series)
}

fn run_backtest(args: RunArgs) -> Result<()> {
    println!("Stocksim Backtesting Engine");
    println!("===========================\n");

    let mut config = resolve_config(&args.common)?;

    if let Some(name) = &args.strategy {
        let strategy_type = StrategyType::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))?;
        if strategy_type != config.strategy.strategy_type() {
            config.strategy = StrategyParams::default_for(strategy_type);
        }
    }
    if let Some(name) = &args.profile {
        config.profile =
            Profile::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown profile: {}", name))?;
    }
    if let Some(warmup) = args.warmup {
        match &mut config.strategy {
            StrategyParams::MacdMomentum(p) => p.warmup = warmup,
            StrategyParams::SmaCrossover(p) => p.warmup = warmup,
            StrategyParams::RsiReversion(p) => p.warmup = warmup,
        }
    }
    if args.output_equity_csv.is_some() {
        config.output_equity_csv = args.output_equity_csv;
    }
    if args.output_trades_csv.is_some() {
        config.output_trades_csv = args.output_trades_csv;
    }
    if args.output_json.is_some() {
        config.output_json = args.output_json;
    }

    config.validate()?;

    let strategy = config.build_strategy();
    let series = load_series(&config, &strategy.required_indicators())?;

    let engine_config = config.engine_config();
    println!("Strategy: {} ({} profile)", strategy.name(), config.profile);
    println!(
        "Take profit: {:.2}%, stop loss: {:.2}%",
        config.profile.apply_exits(config.exit_rules).take_profit_pct,
        config.profile.apply_exits(config.exit_rules).stop_loss_pct
    );
    println!("Initial capital: ${:.2}", engine_config.initial_capital);
    println!("Max position: {:.2}% of portfolio", engine_config.max_position_pct);
    println!("Safe net: ${:.2}\n", engine_config.safe_net);

    //run backtest
    println!("Running backtest...\n");
    let engine = BacktestEngine::from_series(engine_config, series);
    let result = engine.run(strategy.as_ref())?;

    //display results
    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    //save outputs if requested
    if let Some(path) = &config.output_equity_csv {
        write_equity_csv(&result.equity_curve, path)?;
        println!("\nEquity curve saved to {:?}", path);
    }

    if let Some(path) = &config.output_trades_csv {
        write_trades_csv(&result.trades, path)?;
        println!("Trades saved to {:?}", path);
    }

    if let Some(path) = &config.output_json {
        write_json(&result, path)?;
        println!("Result saved to {:?}", path);
    }

    Ok(())
}

fn compare(common: CommonArgs, strategies: Vec<String>, profiles: Vec<String>) -> Result<()> {
    let config = resolve_config(&common)?;
    config.validate()?;

    let strategy_types = if strategies.is_empty() {
        StrategyType::ALL.to_vec()
    } else {
        strategies
            .iter()
            .map(|s| StrategyType::parse(s).ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", s)))
            .collect::<Result<Vec<_>>>()?
    };

    let profiles = if profiles.is_empty() {
        Profile::ALL.to_vec()
    } else {
        profiles
            .iter()
            .map(|p| Profile::parse(p).ok_or_else(|| anyhow::anyhow!("Unknown profile: {}", p)))
            .collect::<Result<Vec<_>>>()?
    };

    let series = load_series(&config, &config.required_indicators(&strategy_types))?;
    let jobs = config.sweep_jobs(&strategy_types, &profiles);

    println!("Running {} backtests...\n", jobs.len());
    let outcomes = run_sweep(series, jobs);
    comparison_table(&outcomes).printstd();

    Ok(())
}
