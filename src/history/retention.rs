use std::time::Duration;
use crate::history::HistoryConfig;
use crate::types::timestamp::Timestamp;

const HOUR: Duration = Duration::from_secs(3_600);
const DAY_SECS: u64 = 86_400;

pub struct RetentionPolicy {
    pub raw_retention: Duration,
    pub max_retention: Duration,
    pub compacted_bucket: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for RetentionPolicy {
    fn from(config: &HistoryConfig) -> Self {
        RetentionPolicy {
            raw_retention: Duration::from_secs(DAY_SECS * config.raw_retention_days),
            max_retention: Duration::from_secs(DAY_SECS * config.max_retention_days),
            compacted_bucket: HOUR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionClass {
    /// Every tick kept.
    Raw,
    /// Reduced to bucket extrema.
    Compacted,
    Expired,
}

impl RetentionPolicy {
    pub fn classify(&self, timestamp: Timestamp, now: Timestamp) -> RetentionClass {
        let age = now - timestamp;
        if age > self.max_retention {
            RetentionClass::Expired
        } else if age > self.raw_retention {
            RetentionClass::Compacted
        } else {
            RetentionClass::Raw
        }
    }
}
