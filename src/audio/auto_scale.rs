use log::debug;
use std::collections::VecDeque;

use crate::config::Config;

/// Wall-clock span, in seconds, covered by half the history.
pub const AUTO_SCALE_SPAN_SECS: f64 = 30.0;
/// Fraction of the history treated as the short-term window.
pub const RESET_WINDOW: f64 = 0.1;
/// Short-term vs long-term deviation, in standard deviations, that triggers a reset.
pub const DEVIATION_TO_RESET: f64 = 1.0;
/// Fraction of the oldest history dropped on reset.
pub const ERASE_PERCENT: f64 = 0.75;

const MIN_CEILING: f64 = 1.0;

/// Rolling estimate of how loud the recent past was, used to map raw
/// magnitudes into the pixel range.
///
/// Each tick pushes the frame's tallest raw bar. The display ceiling sits two
/// standard deviations above the moving average, so ordinary peaks fill the
/// height without clipping all the time. When the short-term average drifts
/// away from the long-term one (a new track, a volume change) most of the old
/// history is thrown away so the scale catches up quickly.
#[derive(Debug)]
pub struct AutoScaler {
    history: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    sum_sq: f64,
    mean: f64,
    std_dev: f64,
}

impl AutoScaler {
    pub fn new(cfg: &Config) -> Self {
        let capacity = Self::capacity_for(cfg);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            sum_sq: 0.0,
            mean: 0.0,
            std_dev: 0.0,
        }
    }

    fn capacity_for(cfg: &Config) -> usize {
        let ticks = 2.0 * AUTO_SCALE_SPAN_SECS * cfg.sample_rate as f64 / cfg.sample_size() as f64;
        (ticks as usize).max(1)
    }

    /// Follow sample rate / fps changes. History is kept, only trimmed.
    pub fn refresh(&mut self, cfg: &Config) {
        let capacity = Self::capacity_for(cfg);
        if capacity == self.capacity {
            return;
        }

        debug!("auto-scale history {} -> {} frames", self.capacity, capacity);
        self.capacity = capacity;
        if self.history.len() > capacity {
            let excess = self.history.len() - capacity;
            self.history.drain(..excess);
            self.recompute();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Record one frame's peak magnitude.
    pub fn push(&mut self, frame_max: f64) {
        let value = if frame_max.is_finite() { frame_max.max(0.0) } else { 0.0 };

        self.history.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        while self.history.len() > self.capacity {
            if let Some(old) = self.history.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        self.update_stats();

        let window = (self.capacity as f64 * RESET_WINDOW) as usize;
        if window == 0 || self.history.len() <= window {
            return;
        }

        let recent: f64 = self.history.iter().rev().take(window).sum::<f64>() / window as f64;
        if (recent - self.mean).abs() > DEVIATION_TO_RESET * self.std_dev {
            let erase = (self.history.len() as f64 * ERASE_PERCENT) as usize;
            debug!(
                "auto-scale reset: recent {:.1} vs mean {:.1} (sd {:.1}), dropping {} frames",
                recent, self.mean, self.std_dev, erase
            );
            self.history.drain(..erase);
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.sum = self.history.iter().sum();
        self.sum_sq = self.history.iter().map(|v| v * v).sum();
        self.update_stats();
    }

    fn update_stats(&mut self) {
        let n = self.history.len();
        if n == 0 {
            self.mean = 0.0;
            self.std_dev = 0.0;
            return;
        }
        self.mean = self.sum / n as f64;
        let variance = (self.sum_sq / n as f64 - self.mean * self.mean).max(0.0);
        self.std_dev = variance.sqrt();
    }

    /// Magnitude that maps to the full bar height. Never below 1.0.
    pub fn ceiling(&self) -> f64 {
        let ceiling = self.mean + 2.0 * self.std_dev;
        if ceiling.is_finite() {
            ceiling.max(MIN_CEILING)
        } else {
            MIN_CEILING
        }
    }

    /// Map raw magnitudes into `[0, height - 1]` against the current ceiling.
    pub fn scale(&self, bars: &mut [f64], height: f64) {
        let ceiling = self.ceiling();
        let top = (height - 1.0).max(0.0);
        for bar in bars.iter_mut() {
            *bar = (*bar / ceiling * height - 1.0).clamp(0.0, top);
        }
    }
}

/// Fixed linear mapping used when auto-scale is off.
pub fn scale_manual(bars: &mut [f64], size: f64, boost: f64, height: f64) {
    let top = (height - 1.0).max(0.0);
    for bar in bars.iter_mut() {
        let value = *bar * size + boost;
        *bar = if value.is_finite() { value.clamp(0.0, top) } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capacity_spans_a_fixed_wall_clock_window() {
        let scaler = AutoScaler::new(&Config::default());
        assert_eq!(scaler.capacity(), 1800);

        let fast = AutoScaler::new(&Config {
            fps: 60,
            ..Config::default()
        });
        assert_eq!(fast.capacity(), 3600);
    }

    #[test]
    fn silence_keeps_the_ceiling_at_one() {
        let mut scaler = AutoScaler::new(&Config::default());
        for _ in 0..500 {
            scaler.push(0.0);
        }
        assert_eq!(scaler.ceiling(), 1.0);

        let mut bars = vec![0.0; 8];
        scaler.scale(&mut bars, 100.0);
        assert!(bars.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn steady_level_scales_to_full_height() {
        let mut scaler = AutoScaler::new(&Config::default());
        for _ in 0..100 {
            scaler.push(50.0);
        }
        assert!((scaler.mean() - 50.0).abs() < 1e-9);
        assert!(scaler.std_dev() < 1e-6);

        let mut bars = vec![50.0, 25.0, 0.0];
        scaler.scale(&mut bars, 100.0);
        assert!((bars[0] - 99.0).abs() < 1e-6);
        assert!((bars[1] - 49.0).abs() < 1e-6);
        assert_eq!(bars[2], 0.0);
    }

    #[test]
    fn loudness_jump_erases_old_history() {
        let mut scaler = AutoScaler::new(&Config::default());
        for _ in 0..1000 {
            scaler.push(10.0);
        }
        assert_eq!(scaler.len(), 1000);

        // a sustained jump pulls the short window away from the mean
        let mut reset = false;
        for _ in 0..100 {
            let before = scaler.len();
            scaler.push(1000.0);
            if scaler.len() < before {
                reset = true;
                break;
            }
        }
        assert!(reset);
        assert!(scaler.len() < 300);
    }

    #[test]
    fn history_is_bounded() {
        let cfg = Config {
            sample_rate: 1,
            fps: 1,
            ..Config::default()
        };
        let mut scaler = AutoScaler::new(&cfg);
        assert_eq!(scaler.capacity(), 60);
        for i in 0..1000 {
            scaler.push((i % 7) as f64);
        }
        assert!(scaler.len() <= scaler.capacity());
    }

    #[test]
    fn manual_scale_clamps_into_range() {
        let mut bars = vec![-3.0, 10.0, 500.0];
        scale_manual(&mut bars, 2.0, 1.0, 100.0);
        assert_eq!(bars, vec![0.0, 21.0, 99.0]);
    }

    proptest! {
        #[test]
        fn ceiling_is_at_least_one(values in prop::collection::vec(0.0f64..1e7, 0..400)) {
            let mut scaler = AutoScaler::new(&Config::default());
            for v in values {
                scaler.push(v);
                prop_assert!(scaler.ceiling() >= 1.0);
            }
        }

        #[test]
        fn scaled_bars_stay_below_height(
            values in prop::collection::vec(0.0f64..1e7, 1..64),
            height in 1.0f64..2000.0,
        ) {
            let mut scaler = AutoScaler::new(&Config::default());
            scaler.push(values.iter().cloned().fold(0.0, f64::max));
            let mut bars = values.clone();
            scaler.scale(&mut bars, height);
            prop_assert!(bars.iter().all(|b| *b >= 0.0 && *b < height));
        }
    }
}
