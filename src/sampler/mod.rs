use rand::Rng;

use crate::config::{self, Bounds, EffectBounds, EffectSelection};

/// Sampled magnitudes for the enabled continuous effects of one variant.
///
/// Disabled effects have no slot. Flip is a coin-flip and never part of the vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterVector {
    pub contrast: Option<f64>,
    pub brightness: Option<f64>,
    pub rotation: Option<f64>,
    pub crop: Option<f64>,
}

impl ParameterVector {
    /// Slots in application order, rounded for comparison.
    pub fn rounded_slots(&self) -> Vec<f64> {
        [
            (self.contrast, config::CONTRAST_DECIMALS),
            (self.brightness, config::BRIGHTNESS_DECIMALS),
            (self.rotation, config::ROTATION_DECIMALS),
            (self.crop, config::CROP_DECIMALS),
        ]
        .into_iter()
        .filter_map(|(slot, decimals)| slot.map(|v| config::round_to(v, decimals)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.contrast.is_none()
            && self.brightness.is_none()
            && self.rotation.is_none()
            && self.crop.is_none()
    }
}

/// Draw uniformly from `[min * intensity/100, max * intensity/100]`.
///
/// Intensity is not range-checked. A negative intensity flips the scaled
/// interval, which is reordered rather than rejected.
pub fn scale_range<R: Rng>(rng: &mut R, min: f64, max: f64, intensity: i32) -> f64 {
    let factor = intensity as f64 / 100.0;
    let (lo, hi) = (min * factor, max * factor);
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if lo == hi {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Draws parameter vectors from a fixed bound table.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSampler {
    bounds: EffectBounds,
}

impl ParameterSampler {
    pub fn new(bounds: EffectBounds) -> Self {
        Self { bounds }
    }

    /// One draw per enabled effect, in application order.
    pub fn sample<R: Rng>(
        &self,
        rng: &mut R,
        effects: &EffectSelection,
        intensity: i32,
    ) -> ParameterVector {
        let mut draw = |enabled: bool, b: Bounds| {
            enabled.then(|| scale_range(rng, b.min, b.max, intensity))
        };

        ParameterVector {
            contrast: draw(effects.contrast, self.bounds.contrast),
            brightness: draw(effects.brightness, self.bounds.brightness),
            rotation: draw(effects.rotation, self.bounds.rotation),
            crop: draw(effects.crop, self.bounds.crop),
        }
    }
}

/// Coin-flip for the horizontal mirror.
pub fn flip_coin<R: Rng>(rng: &mut R, effects: &EffectSelection, probability: f64) -> bool {
    effects.flip && rng.gen_bool(probability.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_intensity_collapses_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for (min, max) in [(-4.0, 4.0), (0.1, 0.35), (-25.0, 25.0), (2.0, 9.0)] {
            assert_eq!(scale_range(&mut rng, min, max, 0), 0.0);
        }
    }

    #[test]
    fn test_full_intensity_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let v = scale_range(&mut rng, 0.10, 0.35, 100);
            assert!((0.10..=0.35).contains(&v), "{v} out of range");
            let v = scale_range(&mut rng, -4.0, 4.0, 100);
            assert!((-4.0..=4.0).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn test_half_intensity_halves_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let v = scale_range(&mut rng, 0.10, 0.35, 50);
            assert!((0.05..=0.175).contains(&v));
        }
    }

    #[test]
    fn test_negative_intensity_does_not_panic() {
        let mut rng = StdRng::seed_from_u64(4);
        let v = scale_range(&mut rng, 0.10, 0.35, -100);
        assert!((-0.35..=-0.10).contains(&v));
    }

    #[test]
    fn test_sample_fills_only_enabled_slots() {
        let mut rng = StdRng::seed_from_u64(5);
        let sampler = ParameterSampler::new(EffectBounds::default());
        let effects = EffectSelection {
            rotation: true,
            crop: true,
            flip: true,
            ..Default::default()
        };
        let v = sampler.sample(&mut rng, &effects, 100);
        assert!(v.contrast.is_none());
        assert!(v.brightness.is_none());
        assert!(v.rotation.is_some());
        assert!(v.crop.is_some());
        assert_eq!(v.rounded_slots().len(), 2);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let sampler = ParameterSampler::new(EffectBounds::default());
        let effects = EffectSelection::all();
        let a = sampler.sample(&mut StdRng::seed_from_u64(42), &effects, 70);
        let b = sampler.sample(&mut StdRng::seed_from_u64(42), &effects, 70);
        assert_eq!(a, b);
    }

    #[test]
    fn test_flip_requires_selection() {
        let mut rng = StdRng::seed_from_u64(6);
        let off = EffectSelection::default();
        assert!((0..100).all(|_| !flip_coin(&mut rng, &off, 1.0)));
        let on = EffectSelection {
            flip: true,
            ..Default::default()
        };
        assert!(flip_coin(&mut rng, &on, 1.0));
    }

    #[test]
    fn test_rounded_slots_precision() {
        let v = ParameterVector {
            contrast: Some(0.123_456),
            rotation: Some(12.345_6),
            ..Default::default()
        };
        assert_eq!(v.rounded_slots(), vec![0.123, 12.35]);
    }
}
