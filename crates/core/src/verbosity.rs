//! Diagnostic verbosity handed to the matcher, integrator and evaluators.

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Level;

/// How much diagnostic output a component emits.
///
/// Components receive this at construction and check it before emitting
/// `tracing` events, so two matchers in the same process can run at different
/// levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent,
    Error,
    #[default]
    Warning,
    Info,
    Debug,
}

impl Verbosity {
    pub fn enabled(self, level: Level) -> bool {
        let required = if level == Level::ERROR {
            Verbosity::Error
        } else if level == Level::WARN {
            Verbosity::Warning
        } else if level == Level::INFO {
            Verbosity::Info
        } else {
            Verbosity::Debug
        };
        self >= required
    }

    pub fn warnings(self) -> bool {
        self.enabled(Level::WARN)
    }

    pub fn info(self) -> bool {
        self.enabled(Level::INFO)
    }

    pub fn debug(self) -> bool {
        self.enabled(Level::DEBUG)
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::OFF,
            Verbosity::Error => LevelFilter::ERROR,
            Verbosity::Warning => LevelFilter::WARN,
            Verbosity::Info => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
        }
    }
}
