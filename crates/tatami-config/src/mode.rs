//! Server/build mode flag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Mode the process runs in.
///
/// Gates dev-only behaviors: stack traces in error state, per-request
/// artifact reload, and the debounced restart windows of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
    Test,
}

impl Mode {
    /// Whether dev-only behaviors are active.
    pub fn is_dev(self) -> bool {
        matches!(self, Mode::Development)
    }

    /// String form used in logs and serialized configs.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Test => "test",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            "test" => Ok(Mode::Test),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in [Mode::Development, Mode::Production, Mode::Test] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(matches!(
            "staging".parse::<Mode>(),
            Err(ConfigError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_only_development_is_dev() {
        assert!(Mode::Development.is_dev());
        assert!(!Mode::Production.is_dev());
        assert!(!Mode::Test.is_dev());
    }
}
