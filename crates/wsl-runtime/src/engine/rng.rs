pub(super) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

pub(super) fn next_random_bounded(state: &mut u32, bound: u32) -> u32 {
    next_random_bounded_with(state, bound, next_random_u32)
}

pub(super) fn next_random_bounded_with<F>(state: &mut u32, bound: u32, mut next: F) -> u32
where
    F: FnMut(&mut u32) -> u32,
{
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    let mut candidate = next(state);
    while u64::from(candidate) >= threshold {
        candidate = next(state);
    }
    candidate % bound
}

/// Uniform integer in `[min, max]`. Callers guarantee `min <= max` and a
/// span that fits in `u32`.
pub(super) fn next_random_in_range(state: &mut u32, min: u32, max: u32) -> u32 {
    match (max - min).checked_add(1) {
        Some(span) => min + next_random_bounded(state, span),
        None => next_random_u32(state),
    }
}

pub(super) fn seed_from_time() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos() ^ (elapsed.as_secs() as u32))
        .unwrap_or(1)
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn next_random_bounded_with_covers_threshold_retry_path() {
        let mut state = 0u32;
        let mut values = vec![u32::MAX, 42u32].into_iter();
        let result = next_random_bounded_with(&mut state, 10, |_s| {
            values.next().expect("test values should be available")
        });
        assert_eq!(result, 2);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let mut state = 7u32;
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..1_000 {
            let value = next_random_in_range(&mut state, 3, 5);
            assert!((3..=5).contains(&value));
            seen_min |= value == 3;
            seen_max |= value == 5;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = 11u32;
        let mut b = 11u32;
        let left = (0..5).map(|_| next_random_in_range(&mut a, 1, 100)).collect::<Vec<_>>();
        let right = (0..5).map(|_| next_random_in_range(&mut b, 1, 100)).collect::<Vec<_>>();
        assert_eq!(left, right);
    }

    #[test]
    fn degenerate_range_returns_the_bound() {
        let mut state = 1u32;
        assert_eq!(next_random_in_range(&mut state, 4, 4), 4);
    }
}
