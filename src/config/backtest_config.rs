use crate::engine::{BacktestConfig, BacktestError, SweepJob};
use crate::metrics::SharpeConfig;
use crate::strategy::{
    macd_momentum::MacdMomentumStrategy, rsi_reversion::RsiReversionStrategy,
    sma_crossover::SmaCrossoverStrategy, ExitRules, Profile, Strategy,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    MacdMomentum,
    SmaCrossover,
    RsiReversion,
}

impl StrategyType {
    pub const ALL: [StrategyType; 3] = [
        StrategyType::MacdMomentum,
        StrategyType::SmaCrossover,
        StrategyType::RsiReversion,
    ];

    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "macd" | "macd_momentum" => Some(StrategyType::MacdMomentum),
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            "rsi" | "rsi_reversion" => Some(StrategyType::RsiReversion),
            _ => None,
        }
    }
}

//macd momentum strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub warmup: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        MacdParams {
            ema_short: 12,
            ema_long: 26,
            rsi_period: 14,
            rsi_lower: 40.0,
            rsi_upper: 70.0,
            warmup: 50,
        }
    }
}

//sma crossover strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaParams {
    pub fast_window: usize,
    pub slow_window: usize,

    //ema period for the close-below-ema exit, none disables it
    pub exit_ema: Option<usize>,
    pub warmup: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            fast_window: 20,
            slow_window: 50,
            exit_ema: None,
            warmup: 50,
        }
    }
}

//rsi reversion strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub lookback: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub exit_ema: Option<usize>,
    pub warmup: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        RsiParams {
            lookback: 14,
            oversold: 30.0,
            overbought: 70.0,
            exit_ema: None,
            warmup: 20,
        }
    }
}

//strategy-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    MacdMomentum(MacdParams),
    SmaCrossover(SmaParams),
    RsiReversion(RsiParams),
}

impl StrategyParams {
    //default parameters for a strategy type
    pub fn default_for(strategy_type: StrategyType) -> Self {
        match strategy_type {
            StrategyType::MacdMomentum => StrategyParams::MacdMomentum(MacdParams::default()),
            StrategyType::SmaCrossover => StrategyParams::SmaCrossover(SmaParams::default()),
            StrategyType::RsiReversion => StrategyParams::RsiReversion(RsiParams::default()),
        }
    }

    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::MacdMomentum(_) => StrategyType::MacdMomentum,
            StrategyParams::SmaCrossover(_) => StrategyType::SmaCrossover,
            StrategyParams::RsiReversion(_) => StrategyType::RsiReversion,
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        let invalid = |msg: String| Err(BacktestError::InvalidConfig(msg));

        match self {
            StrategyParams::MacdMomentum(p) => {
                if p.ema_short == 0 || p.ema_long == 0 || p.rsi_period == 0 {
                    return invalid("macd periods must be positive".to_string());
                }
                if p.ema_short >= p.ema_long {
                    return invalid(format!(
                        "ema_short ({}) must be below ema_long ({})",
                        p.ema_short, p.ema_long
                    ));
                }
                if p.rsi_lower > p.rsi_upper {
                    return invalid(format!(
                        "rsi_lower ({}) above rsi_upper ({})",
                        p.rsi_lower, p.rsi_upper
                    ));
                }
            }
            StrategyParams::SmaCrossover(p) => {
                if p.fast_window == 0 || p.fast_window >= p.slow_window {
                    return invalid(format!(
                        "fast_window ({}) must be positive and below slow_window ({})",
                        p.fast_window, p.slow_window
                    ));
                }
            }
            StrategyParams::RsiReversion(p) => {
                if p.lookback == 0 || p.oversold >= p.overbought {
                    return invalid(format!(
                        "rsi lookback must be positive and oversold ({}) below overbought ({})",
                        p.oversold, p.overbought
                    ));
                }
            }
        }

        Ok(())
    }

    //builds the strategy with the given exit thresholds
    pub fn build(&self, exits: ExitRules) -> Box<dyn Strategy> {
        match self {
            StrategyParams::MacdMomentum(p) => Box::new(MacdMomentumStrategy::new(p.clone(), exits)),
            StrategyParams::SmaCrossover(p) => Box::new(SmaCrossoverStrategy::new(p.clone(), exits)),
            StrategyParams::RsiReversion(p) => Box::new(RsiReversionStrategy::new(p.clone(), exits)),
        }
    }
}

//complete backtest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfiguration {
    //data
    pub data_path: PathBuf,

    //symbols to trade, empty means every symbol in the file
    pub symbols: Vec<String>,

    //compute missing indicator columns from closes
    pub compute_indicators: bool,

    //account and sizing
    pub initial_capital: f64,
    pub max_position_pct: f64,
    pub safe_net: f64,

    //strategy
    pub strategy: StrategyParams,
    pub exit_rules: ExitRules,
    pub profile: Profile,

    //reporting
    pub sharpe: SharpeConfig,

    //optional output paths
    pub output_equity_csv: Option<PathBuf>,
    pub output_trades_csv: Option<PathBuf>,
    pub output_json: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        let engine = BacktestConfig::default();
        BacktestConfiguration {
            data_path: PathBuf::from("data.csv"),
            symbols: Vec::new(),
            compute_indicators: true,
            initial_capital: engine.initial_capital,
            max_position_pct: engine.max_position_pct,
            safe_net: engine.safe_net,
            strategy: StrategyParams::default_for(StrategyType::MacdMomentum),
            exit_rules: ExitRules::default(),
            profile: Profile::default(),
            sharpe: engine.sharpe,
            output_equity_csv: None,
            output_trades_csv: None,
            output_json: None,
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {:?}", path))?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)
            .context(format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    //checks engine and strategy settings before anything is loaded
    pub fn validate(&self) -> Result<(), BacktestError> {
        self.engine_config_for(self.profile).validate()?;
        self.strategy.validate()?;

        let exits = self.exit_rules;
        if !(exits.take_profit_pct > 0.0) || !(exits.stop_loss_pct > 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "take_profit_pct ({}) and stop_loss_pct ({}) must be positive",
                exits.take_profit_pct, exits.stop_loss_pct
            )));
        }

        Ok(())
    }

    //engine settings with the configured profile applied
    pub fn engine_config(&self) -> BacktestConfig {
        self.engine_config_for(self.profile)
    }

    //strategy with the configured profile applied
    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        self.build_strategy_for(&self.strategy, self.profile)
    }

    fn engine_config_for(&self, profile: Profile) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            max_position_pct: profile.apply_position_pct(self.max_position_pct),
            safe_net: self.safe_net,
            sharpe: self.sharpe,
        }
    }

    fn build_strategy_for(&self, params: &StrategyParams, profile: Profile) -> Box<dyn Strategy> {
        params.build(profile.apply_exits(self.exit_rules))
    }

    //one job per strategy x profile, keeping the configured parameters
    //for the configured strategy type and defaults for the others
    pub fn sweep_jobs(&self, strategies: &[StrategyType], profiles: &[Profile]) -> Vec<SweepJob> {
        let mut jobs = Vec::with_capacity(strategies.len() * profiles.len());

        for &strategy_type in strategies {
            let params = if strategy_type == self.strategy.strategy_type() {
                self.strategy.clone()
            } else {
                StrategyParams::default_for(strategy_type)
            };

            for &profile in profiles {
                jobs.push(SweepJob {
                    profile,
                    config: self.engine_config_for(profile),
                    strategy: self.build_strategy_for(&params, profile),
                });
            }
        }

        jobs
    }

    //every indicator column any of the given strategies needs
    pub fn required_indicators(&self, strategies: &[StrategyType]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &strategy_type in strategies {
            let params = if strategy_type == self.strategy.strategy_type() {
                self.strategy.clone()
            } else {
                StrategyParams::default_for(strategy_type)
            };
            for name in params.build(self.exit_rules).required_indicators() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}
