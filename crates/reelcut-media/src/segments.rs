//! Random placement of fixed-length segments.

use rand::Rng;

/// Pick `count` non-overlapping windows of `segment_secs` inside `duration`.
///
/// The source is split into `count` equal slots and one window is placed at a
/// random offset inside each slot, so windows never overlap and cover the
/// whole video. Starts are returned in ascending order, rounded down to
/// centiseconds.
pub fn random_slot_starts<R: Rng>(duration: f64, count: usize, segment_secs: f64, rng: &mut R) -> Vec<f64> {
    if count == 0 || duration < segment_secs * count as f64 {
        return Vec::new();
    }

    let slot = duration / count as f64;
    (0..count)
        .map(|i| {
            let slot_start = slot * i as f64;
            let latest = slot_start + slot - segment_secs;
            let start = if latest > slot_start {
                rng.random_range(slot_start..=latest)
            } else {
                slot_start
            };
            ((start * 100.0).floor() / 100.0).max(slot_start)
        })
        .collect()
}

/// How many `segment_secs` windows fit, capped at `max`.
pub fn fitting_count(duration: f64, segment_secs: f64, max: usize) -> usize {
    if duration <= 0.0 || segment_secs <= 0.0 {
        return 0;
    }
    ((duration / segment_secs).floor() as usize).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_windows_disjoint_and_inside() {
        let mut rng = StdRng::seed_from_u64(42);
        for duration in [6.0, 13.0, 60.0, 600.0] {
            let count = fitting_count(duration, 6.0, 10);
            let starts = random_slot_starts(duration, count, 6.0, &mut rng);
            assert_eq!(starts.len(), count);
            for pair in starts.windows(2) {
                assert!(pair[0] + 6.0 <= pair[1] + 1e-9, "{:?}", starts);
            }
            for s in &starts {
                assert!(*s >= 0.0 && s + 6.0 <= duration + 1e-9);
            }
        }
    }

    #[test]
    fn test_fitting_count() {
        assert_eq!(fitting_count(5.9, 6.0, 10), 0);
        assert_eq!(fitting_count(30.0, 6.0, 10), 5);
        assert_eq!(fitting_count(3600.0, 6.0, 10), 10);
        assert_eq!(fitting_count(19.0, 4.0, 5), 4);
    }

    #[test]
    fn test_too_short_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_slot_starts(10.0, 3, 6.0, &mut rng).is_empty());
    }
}
