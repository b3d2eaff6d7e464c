use log::debug;

use crate::config::{Config, SmoothingMode};

/// In-place bar smoothing. Holds the Monstercat weight table and the SGS
/// scratch buffer so neither is reallocated per tick.
#[derive(Debug, Default)]
pub struct Smoother {
    weight_key: Option<(usize, u64)>,
    weights: Vec<f64>,
    scratch: Vec<f64>,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute `weight[k] = factor^k` when detail or factor moved.
    pub fn refresh(&mut self, cfg: &Config) -> bool {
        let key = (cfg.detail, cfg.mcat_smoothing_factor.to_bits());
        if self.weight_key == Some(key) {
            return false;
        }

        let factor = cfg.mcat_smoothing_factor;
        self.weights = (0..cfg.detail).map(|k| factor.powi(k as i32)).collect();
        self.weight_key = Some(key);
        debug!("monstercat weights rebuilt for {} bars, factor {}", cfg.detail, factor);
        true
    }

    pub fn monstercat_weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn apply(&mut self, bars: &mut [f64], cfg: &Config) {
        match cfg.smoothing {
            SmoothingMode::None => {}
            SmoothingMode::Monstercat => {
                self.refresh(cfg);
                monstercat(bars, &self.weights);
            }
            SmoothingMode::Sgs => {
                sgs(bars, &mut self.scratch, cfg.sgs_points, cfg.sgs_passes);
            }
        }
    }

    /// Pixel-space pass run after scaling. Monstercat keeps a minimum visible
    /// height of `bar_min_height`, capped at `height - 1`.
    pub fn apply_floor(&self, bars: &mut [f64], cfg: &Config, height: f64) {
        if cfg.smoothing == SmoothingMode::Monstercat {
            lift_to_floor(bars, cfg.bar_min_height.min(height - 1.0));
        }
    }
}

/// Let every bar pull its neighbours up, decaying by `weights[distance]`.
/// Bar 0 is left alone; nothing is ever lowered.
pub fn monstercat(bars: &mut [f64], weights: &[f64]) {
    let len = bars.len();
    for i in 1..len {
        let source = bars[i];
        for j in 0..len {
            if j == i {
                continue;
            }
            let Some(&weight) = weights.get(i.abs_diff(j)) else {
                continue;
            };
            let proposal = source / weight;
            if proposal > bars[j] {
                bars[j] = proposal;
            }
        }
    }
}

/// Symmetric moving average over `points` bars, repeated `passes` times.
/// The outer `points / 2` bars on each side pass through unchanged.
pub fn sgs(bars: &mut [f64], scratch: &mut Vec<f64>, points: usize, passes: usize) {
    let pivot = points / 2;
    let len = bars.len();
    let window = 2 * pivot + 1;
    if pivot == 0 || len < window {
        return;
    }

    scratch.clear();
    scratch.resize(len, 0.0);

    for _ in 0..passes {
        scratch[..pivot].copy_from_slice(&bars[..pivot]);
        scratch[len - pivot..].copy_from_slice(&bars[len - pivot..]);
        for i in pivot..len - pivot {
            let sum: f64 = bars[i - pivot..=i + pivot].iter().sum();
            scratch[i] = sum / window as f64;
        }
        bars.copy_from_slice(&scratch[..]);
    }
}

/// Raise drawn bars shorter than `min_height` to it. Bar 0 and empty bars
/// stay put, so silence still draws nothing.
pub fn lift_to_floor(bars: &mut [f64], min_height: f64) {
    for bar in bars.iter_mut().skip(1) {
        if *bar > 0.0 && *bar < min_height {
            *bar = min_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weights(factor: f64, len: usize) -> Vec<f64> {
        (0..len).map(|k| factor.powi(k as i32)).collect()
    }

    #[test]
    fn monstercat_cascades_from_a_peak() {
        let mut bars = vec![0.0, 0.0, 80.0, 0.0, 0.0];
        monstercat(&mut bars, &weights(2.0, 5));
        assert_eq!(bars, vec![20.0, 40.0, 80.0, 40.0, 20.0]);
    }

    #[test]
    fn floor_lifts_only_drawn_bars() {
        let mut bars = vec![0.5, 1.0, 0.0, 7.0];
        lift_to_floor(&mut bars, 5.0);
        // bar 0 is skipped and an empty bar stays empty
        assert_eq!(bars, vec![0.5, 5.0, 0.0, 7.0]);
    }

    #[test]
    fn floor_is_monstercat_only_and_capped_by_height() {
        let mut smoother = Smoother::new();
        let cfg = Config {
            smoothing: SmoothingMode::Monstercat,
            ..Config::default()
        };
        let mut bars = vec![0.0, 0.2, 0.0];
        smoother.apply_floor(&mut bars, &cfg, 4.0);
        assert_eq!(bars, vec![0.0, 3.0, 0.0]);

        let mut untouched = vec![0.0, 0.2, 0.0];
        smoother.apply_floor(&mut untouched, &Config::default(), 100.0);
        assert_eq!(untouched, vec![0.0, 0.2, 0.0]);
    }

    #[test]
    fn monstercat_leaves_silence_silent() {
        let mut bars = vec![0.0; 6];
        monstercat(&mut bars, &weights(1.5, 6));
        assert!(bars.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn weight_cache_only_rebuilds_on_change() {
        let cfg = Config::default();
        let mut smoother = Smoother::new();
        assert!(smoother.refresh(&cfg));
        let before = smoother.monstercat_weights().to_vec();
        assert!(!smoother.refresh(&cfg));
        assert_eq!(smoother.monstercat_weights(), before.as_slice());
        assert_eq!(before.len(), 32);
        assert_eq!(before[2], 2.25);

        let cfg = Config {
            mcat_smoothing_factor: 2.0,
            ..cfg
        };
        assert!(smoother.refresh(&cfg));
        assert_eq!(smoother.monstercat_weights()[3], 8.0);
    }

    #[test]
    fn sgs_averages_the_interior() {
        let mut bars = vec![3.0, 0.0, 9.0, 0.0, 3.0];
        let mut scratch = Vec::new();
        sgs(&mut bars, &mut scratch, 3, 1);
        assert_eq!(bars, vec![3.0, 4.0, 3.0, 4.0, 3.0]);
    }

    #[test]
    fn sgs_passes_feed_into_each_other() {
        let mut once = vec![0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0];
        let mut twice = once.clone();
        let mut scratch = Vec::new();
        sgs(&mut once, &mut scratch, 3, 1);
        sgs(&mut twice, &mut scratch, 3, 2);

        assert_eq!(once, vec![0.0, 0.0, 3.0, 3.0, 3.0, 0.0, 0.0]);
        assert_eq!(twice, vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn sgs_leaves_short_arrays_alone() {
        let mut bars = vec![1.0, 7.0];
        let mut scratch = Vec::new();
        sgs(&mut bars, &mut scratch, 5, 3);
        assert_eq!(bars, vec![1.0, 7.0]);
    }

    #[test]
    fn no_smoothing_is_a_pass_through() {
        let cfg = Config::default();
        let mut bars = vec![1.0, 50.0, 2.0];
        Smoother::new().apply(&mut bars, &cfg);
        assert_eq!(bars, vec![1.0, 50.0, 2.0]);
    }

    proptest! {
        #[test]
        fn monstercat_never_lowers(
            bars in prop::collection::vec(0.0f64..1000.0, 1..64),
            factor in 1.0f64..4.0,
        ) {
            let mut smoothed = bars.clone();
            monstercat(&mut smoothed, &weights(factor, bars.len()));
            for (before, after) in bars.iter().zip(&smoothed) {
                prop_assert!(after >= before);
            }
        }

        #[test]
        fn sgs_keeps_the_edges(
            bars in prop::collection::vec(0.0f64..1000.0, 1..64),
            half in 0usize..5,
        ) {
            let points = 2 * half + 1;
            let mut smoothed = bars.clone();
            let mut scratch = Vec::new();
            sgs(&mut smoothed, &mut scratch, points, 1);

            let edge = half.min(bars.len());
            prop_assert_eq!(&smoothed[..edge], &bars[..edge]);
            prop_assert_eq!(&smoothed[bars.len() - edge..], &bars[bars.len() - edge..]);
        }
    }
}
