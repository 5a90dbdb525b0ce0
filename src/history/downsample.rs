use std::time::Duration;
use crate::index::tick::IndexTick;

/// Reduce `ticks` (ascending) to at most four ticks per `bucket`.
///
/// Each bucket keeps its first and last tick and the ticks holding the
/// minimum and maximum `avgx_final`, in their original order. The output is
/// a subset of the input, so downsampling an already downsampled series with
/// the same bucket returns it unchanged.
pub fn downsample<'a, I>(ticks: I, bucket: Duration) -> Vec<IndexTick>
where
    I: IntoIterator<Item = &'a IndexTick>,
{
    let bucket_ms = (bucket.as_millis() as u64).max(1);
    let mut out = Vec::new();
    let mut current: Vec<&IndexTick> = Vec::new();
    let mut current_key = None;

    for tick in ticks {
        let key = tick.timestamp.as_millis() / bucket_ms;
        if current_key != Some(key) {
            flush_bucket(&current, &mut out);
            current.clear();
            current_key = Some(key);
        }
        current.push(tick);
    }
    flush_bucket(&current, &mut out);

    out
}

fn flush_bucket(bucket: &[&IndexTick], out: &mut Vec<IndexTick>) {
    if bucket.is_empty() {
        return;
    }

    let last = bucket.len() - 1;
    let mut min = 0;
    let mut max = 0;
    for (i, tick) in bucket.iter().enumerate() {
        if tick.avgx_final < bucket[min].avgx_final {
            min = i;
        }
        if tick.avgx_final > bucket[max].avgx_final {
            max = i;
        }
    }

    let mut keep = vec![0, min, max, last];
    keep.sort_unstable();
    keep.dedup();

    out.extend(keep.into_iter().map(|i| bucket[i].clone()));
}
