//! Random "quick start" cut generation.
//!
//! Picks a handful of non-overlapping windows sized to the source duration so a
//! user can process a video without typing any timestamps.

use rand::Rng;
use thiserror::Error;

use crate::time_range::TimeRange;

/// Sampling attempts allowed per requested clip before giving up on it.
pub const ATTEMPTS_PER_CLIP: usize = 50;

/// Upper bound on the trailing buffer kept free at the end of the video.
pub const MAX_TRAILING_BUFFER_SECS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RandomCutError {
    #[error("Video duration must be a positive number of seconds (got {0})")]
    InvalidDuration(f64),

    #[error("Video is too short for random cuts: {duration:.1}s available, at least {required:.1}s needed")]
    InsufficientDuration { duration: f64, required: f64 },
}

/// Clip count and per-clip duration bounds for one duration bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutProfile {
    pub count: usize,
    pub min_secs: u32,
    pub max_secs: u32,
}

impl CutProfile {
    /// Select the profile for a source of `duration` seconds.
    pub fn for_duration(duration: f64) -> Self {
        match duration {
            d if d < 30.0 => Self { count: 3, min_secs: 4, max_secs: 6 },
            d if d < 60.0 => Self { count: 3, min_secs: 6, max_secs: 10 },
            d if d < 120.0 => Self { count: 4, min_secs: 10, max_secs: 15 },
            _ => Self { count: 5, min_secs: 15, max_secs: 30 },
        }
    }

    /// Shortest source this profile can be laid out on.
    pub fn required_secs(&self, duration: f64) -> f64 {
        (self.count as u32 * self.min_secs) as f64 + trailing_buffer(duration)
    }
}

fn trailing_buffer(duration: f64) -> f64 {
    (duration * 0.1).min(MAX_TRAILING_BUFFER_SECS)
}

/// Generate random cuts using the thread-local RNG.
pub fn generate_random_cuts(duration: f64) -> Result<Vec<TimeRange>, RandomCutError> {
    generate_random_cuts_with_rng(duration, &mut rand::rng())
}

/// Generate random cuts with a caller-supplied RNG.
///
/// Endpoints are whole seconds. The result is sorted by start time and no two
/// ranges overlap. A clip that cannot be placed within the attempt budget is
/// dropped; an empty result is reported as insufficient duration.
pub fn generate_random_cuts_with_rng<R: Rng>(
    duration: f64,
    rng: &mut R,
) -> Result<Vec<TimeRange>, RandomCutError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(RandomCutError::InvalidDuration(duration));
    }

    let profile = CutProfile::for_duration(duration);
    let required = profile.required_secs(duration);
    if required > duration {
        return Err(RandomCutError::InsufficientDuration { duration, required });
    }

    let usable = duration - trailing_buffer(duration);
    let mut accepted: Vec<(u32, u32)> = Vec::with_capacity(profile.count);

    for _ in 0..profile.count {
        for _ in 0..ATTEMPTS_PER_CLIP {
            let len = rng.random_range(profile.min_secs..=profile.max_secs);
            let latest_start = (usable - len as f64).floor();
            if latest_start < 0.0 {
                continue;
            }
            let start = rng.random_range(0..=latest_start as u32);
            let end = start + len;

            let collides = accepted.iter().any(|&(s, e)| start < e && s < end);
            if !collides {
                accepted.push((start, end));
                break;
            }
        }
    }

    if accepted.is_empty() {
        return Err(RandomCutError::InsufficientDuration { duration, required });
    }

    accepted.sort_by_key(|&(start, _)| start);

    Ok(accepted
        .into_iter()
        .map(|(start, end)| TimeRange::from_seconds(start as f64, end as f64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_profile_breakpoints() {
        assert_eq!(CutProfile::for_duration(20.0), CutProfile { count: 3, min_secs: 4, max_secs: 6 });
        assert_eq!(CutProfile::for_duration(30.0), CutProfile { count: 3, min_secs: 6, max_secs: 10 });
        assert_eq!(CutProfile::for_duration(59.9), CutProfile { count: 3, min_secs: 6, max_secs: 10 });
        assert_eq!(CutProfile::for_duration(60.0), CutProfile { count: 4, min_secs: 10, max_secs: 15 });
        assert_eq!(CutProfile::for_duration(120.0), CutProfile { count: 5, min_secs: 15, max_secs: 30 });
        assert_eq!(CutProfile::for_duration(3600.0), CutProfile { count: 5, min_secs: 15, max_secs: 30 });
    }

    #[test]
    fn test_ten_second_video_is_rejected() {
        let err = generate_random_cuts(10.0).unwrap_err();
        assert!(matches!(err, RandomCutError::InsufficientDuration { .. }));
    }

    #[test]
    fn test_invalid_duration() {
        assert!(matches!(
            generate_random_cuts(0.0),
            Err(RandomCutError::InvalidDuration(_))
        ));
        assert!(matches!(
            generate_random_cuts(f64::NAN),
            Err(RandomCutError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_cuts_are_sorted_disjoint_and_in_bounds() {
        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let duration = 300.0;
            let cuts = generate_random_cuts_with_rng(duration, &mut rng).unwrap();
            let profile = CutProfile::for_duration(duration);

            assert!(!cuts.is_empty() && cuts.len() <= profile.count);
            for pair in cuts.windows(2) {
                assert!(pair[0].start_secs() <= pair[1].start_secs());
                assert!(!pair[0].overlaps(&pair[1]));
            }
            for cut in &cuts {
                let len = cut.duration_secs();
                assert!(len >= profile.min_secs as f64 && len <= profile.max_secs as f64);
                assert!(cut.end_secs() <= duration - MAX_TRAILING_BUFFER_SECS);
            }
        }
    }

    #[test]
    fn test_same_seed_same_cuts() {
        let a = generate_random_cuts_with_rng(90.0, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate_random_cuts_with_rng(90.0, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_video_fits_buffer() {
        let mut rng = StdRng::seed_from_u64(1);
        let cuts = generate_random_cuts_with_rng(25.0, &mut rng).unwrap();
        for cut in &cuts {
            assert!(cut.end_secs() <= 25.0 - 2.0);
        }
    }
}
