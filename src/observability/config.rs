use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::config::ConfigAccessor;

/// Key holding the log level
pub const LOG_LEVEL_KEY: &str = "log.level";

/// Key holding the log format (`json` or `text`)
pub const LOG_FORMAT_KEY: &str = "log.format";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl LogConfig {
    /// Read `log.level` / `log.format`, keeping defaults for missing or bad values
    pub fn from_properties(properties: &dyn ConfigAccessor) -> Self {
        let defaults = Self::default();
        Self {
            level: properties.get_or_default_string(LOG_LEVEL_KEY, &defaults.level),
            format: properties
                .get_string(LOG_FORMAT_KEY)
                .and_then(|format| format.parse().ok())
                .unwrap_or(defaults.format),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Properties;

    #[test]
    fn test_log_config_from_properties() {
        let mut properties = Properties::new();
        properties.set(LOG_LEVEL_KEY, "debug");
        properties.set(LOG_FORMAT_KEY, "TEXT");

        let config = LogConfig::from_properties(&properties);

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_unknown_format_keeps_default() {
        let mut properties = Properties::new();
        properties.set(LOG_FORMAT_KEY, "xml");

        assert_eq!(LogConfig::from_properties(&properties), LogConfig::default());
    }
}
