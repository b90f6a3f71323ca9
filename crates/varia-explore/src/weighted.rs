//! Weighted random choice used when no uncovered combination can extend a
//! variation.
//!
//! Candidates are grouped into buckets of equal weight, heaviest first.
//! Within a bucket, up to `2 * len` random draws are tried; if none is
//! accepted the bucket is swept in order before moving to the next one.

use rand::Rng;

/// Draw attempts per candidate in a bucket before sweeping it.
const DRAWS_PER_CANDIDATE: usize = 2;

/// Group `(item, weight)` pairs into equal-weight buckets, heaviest first.
/// Order within a bucket follows input order.
pub fn weight_buckets<T: Copy>(candidates: &[(T, f64)]) -> Vec<Vec<T>> {
    let mut sorted: Vec<(usize, T, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, &(item, w))| (i, item, w))
        .collect();
    sorted.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut buckets: Vec<Vec<T>> = Vec::new();
    let mut last_weight: Option<f64> = None;
    for (_, item, weight) in sorted {
        match (last_weight, buckets.last_mut()) {
            (Some(w), Some(bucket)) if w == weight => bucket.push(item),
            _ => {
                buckets.push(vec![item]);
                last_weight = Some(weight);
            }
        }
    }
    buckets
}

/// Pick the first candidate `accept` approves, preferring heavier buckets.
pub fn pick_weighted<T, R, F>(rng: &mut R, candidates: &[(T, f64)], mut accept: F) -> Option<T>
where
    T: Copy,
    R: Rng,
    F: FnMut(T) -> bool,
{
    for bucket in weight_buckets(candidates) {
        for _ in 0..DRAWS_PER_CANDIDATE * bucket.len() {
            let item = bucket[rng.gen_range(0..bucket.len())];
            if accept(item) {
                return Some(item);
            }
        }
        if let Some(&item) = bucket.iter().find(|&&item| accept(item)) {
            return Some(item);
        }
    }
    None
}
