use crate::strategy::ExitRules;
use serde::{Deserialize, Serialize};
use std::fmt;

//named risk posture applied on top of a strategy's base thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

//multipliers applied to take profit, stop loss and position size
struct Scale {
    take_profit: f64,
    stop_loss: f64,
    position: f64,
}

impl Profile {
    pub const ALL: [Profile; 3] = [
        Profile::Conservative,
        Profile::Balanced,
        Profile::Aggressive,
    ];

    //parse profile from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "conservative" | "c" => Some(Profile::Conservative),
            "balanced" | "b" => Some(Profile::Balanced),
            "aggressive" | "a" => Some(Profile::Aggressive),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Conservative => "conservative",
            Profile::Balanced => "balanced",
            Profile::Aggressive => "aggressive",
        }
    }

    fn scale(&self) -> Scale {
        match self {
            Profile::Conservative => Scale {
                take_profit: 0.75,
                stop_loss: 0.6,
                position: 0.5,
            },
            Profile::Balanced => Scale {
                take_profit: 1.0,
                stop_loss: 1.0,
                position: 1.0,
            },
            Profile::Aggressive => Scale {
                take_profit: 1.5,
                stop_loss: 1.5,
                position: 1.5,
            },
        }
    }

    pub fn apply_exits(&self, rules: ExitRules) -> ExitRules {
        let scale = self.scale();
        ExitRules {
            take_profit_pct: rules.take_profit_pct * scale.take_profit,
            stop_loss_pct: rules.stop_loss_pct * scale.stop_loss,
        }
    }

    //scaled max position percent, capped at the whole portfolio
    pub fn apply_position_pct(&self, max_position_pct: f64) -> f64 {
        (max_position_pct * self.scale().position).min(100.0)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
