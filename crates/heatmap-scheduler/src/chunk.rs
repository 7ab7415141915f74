use std::num::NonZeroUsize;

/// Split `items` into exactly `k` contiguous buckets whose sizes differ by at
/// most one.
///
/// With `base = n / k` and `extra = n % k`, the first `extra` buckets hold
/// `base + 1` items and the rest hold `base`. Input order is preserved, so
/// concatenating the buckets gives back `items`. An empty input yields `k`
/// empty buckets.
pub fn chunk<T: Clone>(items: &[T], k: NonZeroUsize) -> Vec<Vec<T>> {
    let k = k.get();
    let base = items.len() / k;
    let extra = items.len() % k;

    let mut buckets = Vec::with_capacity(k);
    let mut start = 0;
    for slot in 0..k {
        let len = base + usize::from(slot < extra);
        buckets.push(items[start..start + len].to_vec());
        start += len;
    }
    buckets
}
