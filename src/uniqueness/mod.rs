use log::warn;

use crate::sampler::ParameterVector;

/// Euclidean distance between two rounded parameter vectors.
///
/// Both vectors must come from the same effect selection; extra slots on
/// either side are ignored.
pub fn distance(a: &ParameterVector, b: &ParameterVector) -> f64 {
    a.rounded_slots()
        .iter()
        .zip(b.rounded_slots().iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// True if `candidate` is farther than `min_distance` from every accepted vector.
pub fn is_unique(
    candidate: &ParameterVector,
    accepted: &[ParameterVector],
    min_distance: f64,
) -> bool {
    accepted
        .iter()
        .map(|prev| distance(candidate, prev))
        .fold(f64::INFINITY, f64::min)
        > min_distance
}

/// Outcome of one bounded uniqueness search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accepted {
    pub vector: ParameterVector,
    /// Number of candidates drawn, including the accepted one.
    pub attempts: u32,
    /// The cap was reached and the last candidate was taken regardless of distance.
    pub fell_back: bool,
}

/// Accepted-vector bookkeeping for one source item within one request.
#[derive(Debug)]
pub struct UniquenessGuard {
    accepted: Vec<ParameterVector>,
    min_distance: f64,
    max_attempts: u32,
}

impl UniquenessGuard {
    pub fn new(min_distance: f64, max_attempts: u32) -> Self {
        Self {
            accepted: Vec::new(),
            min_distance,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn accepted(&self) -> &[ParameterVector] {
        &self.accepted
    }

    /// Draw candidates from `sample` until one is distinct from everything
    /// accepted so far, or the attempt cap is hit.
    pub fn draw<F>(&mut self, mut sample: F) -> Accepted
    where
        F: FnMut() -> ParameterVector,
    {
        let mut attempts = 0;
        loop {
            let candidate = sample();
            attempts += 1;

            // Nothing to compare when no continuous effect is enabled.
            if candidate.is_empty() || is_unique(&candidate, &self.accepted, self.min_distance) {
                return self.accept(candidate, attempts, false);
            }

            if attempts >= self.max_attempts {
                warn!(
                    "no distinct parameter vector after {} attempts, using last sample {:?}",
                    attempts, candidate
                );
                return self.accept(candidate, attempts, true);
            }
        }
    }

    fn accept(&mut self, vector: ParameterVector, attempts: u32, fell_back: bool) -> Accepted {
        self.accepted.push(vector);
        Accepted {
            vector,
            attempts,
            fell_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EffectBounds, EffectSelection, DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_DISTANCE};
    use crate::sampler::ParameterSampler;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct WarnCapture;

    impl log::Log for WarnCapture {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: WarnCapture = WarnCapture;

    fn crop(v: f64) -> ParameterVector {
        ParameterVector {
            crop: Some(v),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_set_is_unique() {
        assert!(is_unique(&crop(0.1), &[], DEFAULT_MIN_DISTANCE));
    }

    #[test]
    fn test_close_vector_is_rejected() {
        let accepted = [crop(0.10)];
        assert!(!is_unique(&crop(0.15), &accepted, DEFAULT_MIN_DISTANCE));
        assert!(is_unique(&crop(0.18), &accepted, DEFAULT_MIN_DISTANCE));
    }

    #[test]
    fn test_rounding_applies_before_distance() {
        // 0.0704 rounds to 0.070, which is inside a 0.0702 threshold
        assert!(!is_unique(&crop(0.0704), &[crop(0.0)], 0.0702));
    }

    #[test]
    fn test_multi_slot_distance() {
        let a = ParameterVector {
            contrast: Some(0.0),
            rotation: Some(3.0),
            ..Default::default()
        };
        let b = ParameterVector {
            contrast: Some(4.0),
            rotation: Some(0.0),
            ..Default::default()
        };
        assert!((distance(&a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_after_exactly_max_attempts() {
        let mut guard = UniquenessGuard::new(DEFAULT_MIN_DISTANCE, DEFAULT_MAX_ATTEMPTS);
        let first = guard.draw(|| crop(0.2));
        assert_eq!(first.attempts, 1);
        assert!(!first.fell_back);

        let mut calls = 0;
        let second = guard.draw(|| {
            calls += 1;
            crop(0.2)
        });
        assert_eq!(calls, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(second.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(second.fell_back);
        assert_eq!(guard.accepted().len(), 2);
    }

    #[test]
    fn test_fallback_is_logged_as_warning() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Warn);

        let mut guard = UniquenessGuard::new(DEFAULT_MIN_DISTANCE, 3);
        guard.draw(|| crop(0.123));
        let got = guard.draw(|| crop(0.123));
        assert!(got.fell_back);

        let warnings = WARNINGS.lock().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.contains("no distinct parameter vector after 3 attempts")),
            "captured: {warnings:?}"
        );
    }

    #[test]
    fn test_resamples_until_distinct() {
        let mut guard = UniquenessGuard::new(DEFAULT_MIN_DISTANCE, DEFAULT_MAX_ATTEMPTS);
        guard.draw(|| crop(0.10));
        let mut seq = [0.11, 0.12, 0.30].into_iter();
        let got = guard.draw(|| crop(seq.next().unwrap()));
        assert_eq!(got.attempts, 3);
        assert!(!got.fell_back);
        assert_eq!(got.vector.crop, Some(0.30));
    }

    #[test]
    fn test_empty_vectors_never_fall_back() {
        let mut guard = UniquenessGuard::new(DEFAULT_MIN_DISTANCE, DEFAULT_MAX_ATTEMPTS);
        for _ in 0..5 {
            let got = guard.draw(ParameterVector::default);
            assert_eq!(got.attempts, 1);
            assert!(!got.fell_back);
        }
    }

    #[test]
    fn test_spread_batch_is_pairwise_distinct() {
        let mut rng = StdRng::seed_from_u64(9);
        let sampler = ParameterSampler::new(EffectBounds::default());
        let effects = EffectSelection::all();
        let mut guard = UniquenessGuard::new(DEFAULT_MIN_DISTANCE, DEFAULT_MAX_ATTEMPTS);
        for _ in 0..10 {
            let got = guard.draw(|| sampler.sample(&mut rng, &effects, 100));
            assert!(!got.fell_back);
        }
        let accepted = guard.accepted();
        for (i, a) in accepted.iter().enumerate() {
            for b in &accepted[i + 1..] {
                assert!(distance(a, b) > DEFAULT_MIN_DISTANCE);
            }
        }
    }
}
