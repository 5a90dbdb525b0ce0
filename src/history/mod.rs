pub mod store;
pub mod downsample;
pub mod retention;
pub mod journal;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

const HOUR: u64 = 3_600;
const DAY: u64 = 24 * HOUR;

/// Chart windows offered to readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "1y")]
    Year,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::Day, Timeframe::Week, Timeframe::Month, Timeframe::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "24h",
            Timeframe::Week => "7d",
            Timeframe::Month => "1m",
            Timeframe::Year => "1y",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::Day => Duration::from_secs(DAY),
            Timeframe::Week => Duration::from_secs(7 * DAY),
            Timeframe::Month => Duration::from_secs(30 * DAY),
            Timeframe::Year => Duration::from_secs(365 * DAY),
        }
    }

    /// Downsampling bucket width; `None` serves every raw tick.
    pub fn bucket(&self) -> Option<Duration> {
        match self {
            Timeframe::Day => None,
            Timeframe::Week => Some(Duration::from_secs(15 * 60)),
            Timeframe::Month => Some(Duration::from_secs(HOUR)),
            Timeframe::Year => Some(Duration::from_secs(DAY)),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "24h" | "1d" => Ok(Timeframe::Day),
            "7d" | "1w" => Ok(Timeframe::Week),
            "1m" | "30d" => Ok(Timeframe::Month),
            "1y" | "365d" => Ok(Timeframe::Year),
            other => Err(format!("unknown timeframe '{}'", other)),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// JSON-lines tick journal; `None` keeps history in memory only.
    pub journal_path: Option<String>,
    pub raw_retention_days: u64,
    pub max_retention_days: u64,
    pub compaction_interval_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            journal_path: None,
            raw_retention_days: 35,
            max_retention_days: 400,
            compaction_interval_secs: HOUR,
        }
    }
}

impl HistoryConfig {
    pub fn compaction_interval(&self) -> Duration {
        Duration::from_secs(self.compaction_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_retention_days == 0 {
            return Err(Error::invalid_config("history.raw_retention_days", "must be positive"));
        }
        if self.max_retention_days < self.raw_retention_days {
            return Err(Error::invalid_config(
                "history.max_retention_days",
                "must not be shorter than raw_retention_days",
            ));
        }
        if self.compaction_interval_secs == 0 {
            return Err(Error::invalid_config("history.compaction_interval_secs", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("24h".parse::<Timeframe>(), Ok(Timeframe::Day));
        assert_eq!("7D".parse::<Timeframe>(), Ok(Timeframe::Week));
        assert_eq!("1m".parse::<Timeframe>(), Ok(Timeframe::Month));
        assert_eq!("1y".parse::<Timeframe>(), Ok(Timeframe::Year));
        assert!("5m".parse::<Timeframe>().is_err());

        for timeframe in Timeframe::ALL {
            assert_eq!(timeframe.as_str().parse::<Timeframe>(), Ok(timeframe));
        }
    }

    #[test]
    fn test_only_long_timeframes_downsample_coarsely() {
        assert_eq!(Timeframe::Day.bucket(), None);
        assert!(Timeframe::Year.bucket() > Timeframe::Month.bucket());
    }

    #[test]
    fn test_history_config_validation() {
        assert!(HistoryConfig::default().validate().is_ok());
        let config = HistoryConfig { max_retention_days: 10, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
