use log::warn;
use serde::{Deserialize, Serialize};

/// Largest gravity / falloff weight accepted. Anything at or above 1.0 would
/// freeze the bars forever.
pub const MAX_DECAY_WEIGHT: f64 = 0.99;

/// Bounds for the log-frequency high-pass curve (its natural log divides the
/// emphasis, so it has to stay clear of 1.0).
pub const HPF_CURVE_MIN: f64 = 1.1;
pub const HPF_CURVE_MAX: f64 = 100.0;

pub const MAX_DETAIL: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    #[default]
    None,
    Monstercat,
    Sgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFreqQuality {
    /// One Lanczos sample per bar, taken at the bar's target frequency.
    #[default]
    Fast,
    /// Several Lanczos samples averaged across the bar's log-frequency span.
    Precise,
}

impl LogFreqQuality {
    /// Lanczos samples taken per bar. Fast samples only the bar's own target
    /// frequency; Precise spreads eight samples across its log span.
    pub fn samples_per_bar(self) -> usize {
        match self {
            LogFreqQuality::Fast => 1,
            LogFreqQuality::Precise => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// Raw samples go straight into the FFT.
    #[default]
    None,
    Hann,
}

/// Everything the engine reads per tick.
///
/// Values are only trusted after [`Config::sanitized`]; the engine calls it at
/// the update boundary, so callers may hand over whatever the user typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Analysis
    pub detail: usize,
    pub fps: u32,
    pub sample_rate: u32,
    pub stereo: bool,
    pub low_cutoff_freq: f64,
    pub high_cutoff_freq: f64,
    pub window: WindowFunction,

    // Log frequency mapping
    pub log_freq_scale: bool,
    pub log_freq_quality: LogFreqQuality,
    pub log_freq_start: f64,
    pub log_freq_use_hpf: bool,
    pub log_freq_hpf_curve: f64,

    // Smoothing
    pub smoothing: SmoothingMode,
    pub mcat_smoothing_factor: f64,
    pub sgs_points: usize,
    pub sgs_passes: usize,

    // Scaling
    pub use_auto_scale: bool,
    pub scale_size: f64,
    pub scale_boost: f64,

    // Decay
    pub gravity: f64,
    pub falloff_weight: f64,
    pub bar_min_height: f64,

    // Geometry
    pub bar_height: u32,
    pub bar_width: u32,
    pub bar_space: u32,
    pub stereo_space: u32,
    pub wire_thickness: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detail: 32,
            fps: 30,
            sample_rate: 44100,
            stereo: false,
            low_cutoff_freq: 30.0,
            high_cutoff_freq: 22050.0,
            window: WindowFunction::None,

            log_freq_scale: false,
            log_freq_quality: LogFreqQuality::Fast,
            log_freq_start: 40.0,
            log_freq_use_hpf: true,
            log_freq_hpf_curve: 20.0,

            smoothing: SmoothingMode::None,
            mcat_smoothing_factor: 1.5,
            sgs_points: 3,
            sgs_passes: 2,

            use_auto_scale: true,
            scale_size: 1.0,
            scale_boost: 0.0,

            gravity: 0.8,
            falloff_weight: 0.95,
            bar_min_height: 5.0,

            bar_height: 100,
            bar_width: 5,
            bar_space: 2,
            stereo_space: 0,
            wire_thickness: 5,
        }
    }
}

impl Config {
    /// Frames consumed per tick.
    pub fn sample_size(&self) -> usize {
        (self.sample_rate / self.fps.max(1)).max(1) as usize
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    pub fn channel_count(&self) -> usize {
        if self.stereo {
            2
        } else {
            1
        }
    }

    /// Pixel budget available to a single channel.
    pub fn channel_height(&self) -> f64 {
        if self.stereo {
            (self.bar_height / 2).max(1) as f64
        } else {
            self.bar_height.max(1) as f64
        }
    }

    /// Clamp every field into the range the engine can work with.
    pub fn sanitized(&self) -> Config {
        let mut cfg = self.clone();

        if cfg.detail == 0 || cfg.detail > MAX_DETAIL {
            let detail = cfg.detail.clamp(1, MAX_DETAIL);
            warn!("detail {} out of range, using {}", cfg.detail, detail);
            cfg.detail = detail;
        }

        if cfg.fps == 0 {
            warn!("fps of 0 is invalid, using 1");
            cfg.fps = 1;
        }

        if cfg.sample_rate < cfg.fps {
            warn!(
                "sample rate {} is below the frame rate {}, raising it",
                cfg.sample_rate, cfg.fps
            );
            cfg.sample_rate = cfg.fps;
        }

        let nyquist = cfg.nyquist();
        if !(cfg.high_cutoff_freq > 0.0 && cfg.high_cutoff_freq <= nyquist) {
            warn!(
                "high cutoff {} Hz outside (0, {}], clamping",
                cfg.high_cutoff_freq, nyquist
            );
            cfg.high_cutoff_freq = if cfg.high_cutoff_freq.is_finite() && cfg.high_cutoff_freq > 0.0 {
                cfg.high_cutoff_freq.min(nyquist)
            } else {
                nyquist
            };
        }

        if !(cfg.low_cutoff_freq > 0.0 && cfg.low_cutoff_freq < cfg.high_cutoff_freq) {
            let low = cfg.high_cutoff_freq / 2.0;
            warn!(
                "low cutoff {} Hz must lie in (0, {}), using {}",
                cfg.low_cutoff_freq, cfg.high_cutoff_freq, low
            );
            cfg.low_cutoff_freq = low;
        }

        if !(cfg.log_freq_start > 0.0 && cfg.log_freq_start < cfg.high_cutoff_freq) {
            let start = cfg.low_cutoff_freq;
            warn!(
                "log frequency start {} Hz must lie in (0, {}), using {}",
                cfg.log_freq_start, cfg.high_cutoff_freq, start
            );
            cfg.log_freq_start = start;
        }

        if !(HPF_CURVE_MIN..=HPF_CURVE_MAX).contains(&cfg.log_freq_hpf_curve) {
            let curve = if cfg.log_freq_hpf_curve.is_nan() {
                HPF_CURVE_MIN
            } else {
                cfg.log_freq_hpf_curve.clamp(HPF_CURVE_MIN, HPF_CURVE_MAX)
            };
            warn!("hpf curve {} out of range, using {}", cfg.log_freq_hpf_curve, curve);
            cfg.log_freq_hpf_curve = curve;
        }

        if cfg.sgs_points == 0 || cfg.sgs_points % 2 == 0 {
            let points = (cfg.sgs_points | 1).max(1);
            warn!("sgs points must be odd, using {} instead of {}", points, cfg.sgs_points);
            cfg.sgs_points = points;
        }

        // NaN fails every comparison; also treat it as "no smoothing"
        if !(cfg.mcat_smoothing_factor >= 1.0) {
            warn!(
                "monstercat factor {} would amplify neighbours, using 1.0",
                cfg.mcat_smoothing_factor
            );
            cfg.mcat_smoothing_factor = 1.0;
        }

        cfg.gravity = clamp_decay("gravity", cfg.gravity);
        cfg.falloff_weight = clamp_decay("falloff weight", cfg.falloff_weight);

        let min_height = if cfg.stereo { 2 } else { 1 };
        if cfg.bar_height < min_height {
            warn!("bar height {} too small, using {}", cfg.bar_height, min_height);
            cfg.bar_height = min_height;
        }

        if !cfg.bar_min_height.is_finite() || cfg.bar_min_height < 0.0 {
            cfg.bar_min_height = 0.0;
        }
        if !cfg.scale_size.is_finite() {
            cfg.scale_size = 1.0;
        }
        if !cfg.scale_boost.is_finite() {
            cfg.scale_boost = 0.0;
        }

        cfg
    }
}

fn clamp_decay(name: &str, value: f64) -> f64 {
    if (0.0..=MAX_DECAY_WEIGHT).contains(&value) {
        return value;
    }
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_DECAY_WEIGHT)
    };
    warn!("{} {} outside [0, {}], using {}", name, value, MAX_DECAY_WEIGHT, clamped);
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_size_matches_thirty_fps() {
        let cfg = Config::default();
        assert_eq!(cfg.sample_size(), 1470);
    }

    #[test]
    fn zero_detail_and_zero_rate_are_clamped() {
        let cfg = Config {
            detail: 0,
            sample_rate: 0,
            fps: 0,
            ..Config::default()
        }
        .sanitized();

        assert_eq!(cfg.detail, 1);
        assert_eq!(cfg.fps, 1);
        assert!(cfg.sample_rate >= cfg.fps);
        assert!(cfg.sample_size() >= 1);
        assert!(cfg.low_cutoff_freq > 0.0);
        assert!(cfg.low_cutoff_freq < cfg.high_cutoff_freq);
        assert!(cfg.high_cutoff_freq <= cfg.nyquist());
    }

    #[test]
    fn cutoffs_are_ordered_after_sanitizing() {
        let cfg = Config {
            low_cutoff_freq: 30000.0,
            high_cutoff_freq: 50000.0,
            ..Config::default()
        }
        .sanitized();

        assert_eq!(cfg.high_cutoff_freq, 22050.0);
        assert!(cfg.low_cutoff_freq > 0.0 && cfg.low_cutoff_freq < cfg.high_cutoff_freq);
    }

    #[test]
    fn even_sgs_points_become_odd() {
        let cfg = Config {
            sgs_points: 4,
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.sgs_points, 5);

        let cfg = Config {
            sgs_points: 0,
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.sgs_points, 1);
    }

    #[test]
    fn decay_weights_stay_below_one() {
        let cfg = Config {
            gravity: 1.5,
            falloff_weight: -0.2,
            ..Config::default()
        }
        .sanitized();

        assert_eq!(cfg.gravity, MAX_DECAY_WEIGHT);
        assert_eq!(cfg.falloff_weight, 0.0);
    }

    #[test]
    fn stereo_splits_the_height_budget() {
        let cfg = Config {
            stereo: true,
            bar_height: 100,
            ..Config::default()
        };
        assert_eq!(cfg.channel_count(), 2);
        assert_eq!(cfg.channel_height(), 50.0);
    }

    #[test]
    fn log_quality_sample_counts() {
        assert_eq!(LogFreqQuality::Fast.samples_per_bar(), 1);
        assert_eq!(LogFreqQuality::Precise.samples_per_bar(), 8);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "detail": 64, "smoothing": "monstercat" }"#)
            .expect("valid config json");

        assert_eq!(cfg.detail, 64);
        assert_eq!(cfg.smoothing, SmoothingMode::Monstercat);
        assert_eq!(cfg.sample_rate, 44100);
    }

    #[test]
    fn sanitizing_a_valid_config_is_a_no_op() {
        let cfg = Config::default();
        assert_eq!(cfg.sanitized(), cfg);
    }
}
