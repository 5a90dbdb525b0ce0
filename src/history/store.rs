use std::cmp::Ordering;
use std::time::Duration;
use im::Vector;
use tokio::sync::RwLock;
use crate::error::{Error, Result};
use crate::history::downsample::downsample;
use crate::history::retention::{RetentionClass, RetentionPolicy};
use crate::history::Timeframe;
use crate::index::tick::IndexTick;
use crate::types::timestamp::Timestamp;
use crate::utils::helper::percent_change;

const DAY: Duration = Duration::from_secs(86_400);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub before: usize,
    pub after: usize,
    pub expired: usize,
    pub merged: usize,
}

impl CompactionReport {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Append-only series of committed ticks, ordered by timestamp.
///
/// Readers clone the `im::Vector` under the read lock, which shares structure
/// with the live series, so a query never sees a partially appended tick.
pub struct HistoryStore {
    ticks: RwLock<Vector<IndexTick>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        HistoryStore {
            ticks: RwLock::new(Vector::new()),
        }
    }

    pub async fn append(&self, tick: IndexTick) -> Result<()> {
        let mut ticks = self.ticks.write().await;

        if let Some(latest) = ticks.last() {
            if tick.timestamp <= latest.timestamp {
                return Err(Error::OutOfOrderTick {
                    timestamp: tick.timestamp,
                    latest: latest.timestamp,
                });
            }
        }

        ticks.push_back(tick);
        Ok(())
    }

    pub async fn latest(&self) -> Option<IndexTick> {
        self.ticks.read().await.last().cloned()
    }

    pub async fn snapshot(&self) -> Vector<IndexTick> {
        self.ticks.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.ticks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ticks.read().await.is_empty()
    }

    /// Ticks inside `timeframe` ending now, ascending, downsampled for the
    /// longer windows.
    pub async fn range(&self, timeframe: Timeframe) -> Vec<IndexTick> {
        self.range_ending_at(timeframe, Timestamp::now()).await
    }

    /// Ticks with timestamps in `(end - timeframe, end]`.
    pub async fn range_ending_at(&self, timeframe: Timeframe, end: Timestamp) -> Vec<IndexTick> {
        let snapshot = self.snapshot().await;
        let start = end.saturating_sub(timeframe.duration());

        let window = slice_between(&snapshot, start, end);
        match timeframe.bucket() {
            Some(bucket) => downsample(window.iter(), bucket),
            None => window.iter().cloned().collect(),
        }
    }

    /// Percentage move of the latest tick against the earliest one in the
    /// trailing 24 hours.
    pub async fn change_24h(&self) -> Option<f64> {
        let snapshot = self.snapshot().await;
        let latest = snapshot.last()?;
        let start = latest.timestamp.saturating_sub(DAY);

        let window = slice_between(&snapshot, start, latest.timestamp);
        let earliest = window.front()?;
        percent_change(earliest.avgx_final, latest.avgx_final)
    }

    /// Replace the series with `ticks`, e.g. from a journal on warm start.
    ///
    /// The input is sorted and ticks repeating a timestamp are dropped, keeping
    /// the first occurrence.
    pub async fn load(&self, mut ticks: Vec<IndexTick>) -> usize {
        ticks.sort_by_key(|t| t.timestamp);
        ticks.dedup_by_key(|t| t.timestamp);

        let count = ticks.len();
        *self.ticks.write().await = ticks.into_iter().collect();
        count
    }

    /// Apply `policy` relative to `now`: drop expired ticks and reduce ticks
    /// past raw retention to bucket extrema.
    pub async fn compact(&self, policy: &RetentionPolicy, now: Timestamp) -> CompactionReport {
        let mut ticks = self.ticks.write().await;
        let before = ticks.len();

        let mut expired = 0;
        let mut aged = Vec::new();
        let mut raw = Vector::new();
        for tick in ticks.iter() {
            match policy.classify(tick.timestamp, now) {
                RetentionClass::Expired => expired += 1,
                RetentionClass::Compacted => aged.push(tick.clone()),
                RetentionClass::Raw => raw.push_back(tick.clone()),
            }
        }

        let compacted = downsample(&aged, policy.compacted_bucket);
        let merged = aged.len() - compacted.len();

        let mut kept: Vector<IndexTick> = compacted.into_iter().collect();
        kept.append(raw);
        *ticks = kept;

        CompactionReport {
            before,
            after: ticks.len(),
            expired,
            merged,
        }
    }
}

fn slice_between(ticks: &Vector<IndexTick>, start: Timestamp, end: Timestamp) -> Vector<IndexTick> {
    let lower = partition_point(ticks, |t| t.timestamp <= start);
    let upper = partition_point(ticks, |t| t.timestamp <= end);
    if lower >= upper {
        return Vector::new();
    }
    ticks.clone().slice(lower..upper)
}

/// First index whose tick fails `pred`; `pred` must hold for a prefix.
fn partition_point(ticks: &Vector<IndexTick>, pred: impl Fn(&IndexTick) -> bool) -> usize {
    match ticks.binary_search_by(|t| if pred(t) { Ordering::Less } else { Ordering::Greater }) {
        Ok(index) | Err(index) => index,
    }
}
