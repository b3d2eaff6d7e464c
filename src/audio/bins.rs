use log::debug;
use rustfft::num_complex::Complex;

use crate::config::{Config, LogFreqQuality};

/// Lanczos kernel radius used when resampling onto log frequencies.
const LANCZOS_A: i64 = 3;

/// Applied to log-mapped bars when auto-scale is off, so that a scale of 1.0
/// lands in the same range as the linear mapper.
pub const LOG_MANUAL_ATTENUATION: f64 = 1e-4;

/// Reference detail the high-pass curve is tuned for.
const HPF_REFERENCE_DETAIL: f64 = 32.0;

/// Parameters the cached tables depend on. A tick whose config produces the
/// same key reuses the tables untouched.
#[derive(Debug, Clone, PartialEq)]
struct TableKey {
    detail: usize,
    sample_size: usize,
    sample_rate: u32,
    low_cutoff_freq: f64,
    high_cutoff_freq: f64,
    log_freq_scale: bool,
    log_freq_start: f64,
    log_freq_quality: LogFreqQuality,
}

impl TableKey {
    fn from_config(cfg: &Config) -> Self {
        Self {
            detail: cfg.detail,
            sample_size: cfg.sample_size(),
            sample_rate: cfg.sample_rate,
            low_cutoff_freq: cfg.low_cutoff_freq,
            high_cutoff_freq: cfg.high_cutoff_freq,
            log_freq_scale: cfg.log_freq_scale,
            log_freq_start: cfg.log_freq_start,
            log_freq_quality: cfg.log_freq_quality,
        }
    }
}

/// Turns one complex spectrum into `detail` raw bar magnitudes.
#[derive(Debug, Default)]
pub struct BinMapper {
    key: Option<TableKey>,
    /// Lower FFT bin of every bar plus one closing boundary (`detail + 1` entries).
    cutoff_bins: Vec<usize>,
    /// Target frequency of every bar in log mode.
    target_freqs: Vec<f64>,
    /// Fractional FFT bin positions sampled per bar in log mode, flattened
    /// with a stride of `samples_per_bar`.
    sample_positions: Vec<f64>,
    samples_per_bar: usize,
    magnitudes: Vec<f64>,
}

impl BinMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the cutoff and log-frequency tables if anything they depend on
    /// changed since the last call. Returns true when a rebuild happened.
    pub fn refresh(&mut self, cfg: &Config) -> bool {
        let key = TableKey::from_config(cfg);
        if self.key.as_ref() == Some(&key) {
            return false;
        }

        self.cutoff_bins = linear_cutoffs(cfg);
        if cfg.log_freq_scale {
            self.build_log_tables(cfg);
        } else {
            self.target_freqs.clear();
            self.sample_positions.clear();
            self.samples_per_bar = 0;
        }

        debug!(
            "rebuilt bin tables: detail={} sample_size={} log={}",
            key.detail, key.sample_size, key.log_freq_scale
        );
        self.key = Some(key);
        true
    }

    fn build_log_tables(&mut self, cfg: &Config) {
        let detail = cfg.detail;
        let start = cfg.log_freq_start;
        let ratio = cfg.high_cutoff_freq / start;
        let bin_hz = cfg.sample_rate as f64 / cfg.sample_size() as f64;
        let last = detail.saturating_sub(1).max(1) as f64;
        let freq_at = |t: f64| {
            if detail == 1 {
                start
            } else {
                start * ratio.powf(t.clamp(0.0, last) / last)
            }
        };

        self.target_freqs = (0..detail).map(|i| freq_at(i as f64)).collect();

        let per_bar = cfg.log_freq_quality.samples_per_bar();
        self.samples_per_bar = per_bar;
        self.sample_positions.clear();
        self.sample_positions.reserve(detail * per_bar);
        for i in 0..detail {
            if per_bar == 1 {
                self.sample_positions.push(self.target_freqs[i] / bin_hz);
                continue;
            }
            // spread evenly across the bar's span in log-index space
            for j in 0..per_bar {
                let t = i as f64 - 0.5 + (j as f64 + 0.5) / per_bar as f64;
                self.sample_positions.push(freq_at(t) / bin_hz);
            }
        }
    }

    pub fn cutoff_bins(&self) -> &[usize] {
        &self.cutoff_bins
    }

    pub fn target_frequencies(&self) -> &[f64] {
        &self.target_freqs
    }

    /// Fill `out` with one magnitude per bar. `out` is resized to `detail`.
    pub fn map(&mut self, spectrum: &[Complex<f64>], cfg: &Config, out: &mut Vec<f64>) {
        out.clear();
        out.resize(cfg.detail, 0.0);
        if spectrum.is_empty() {
            return;
        }

        if cfg.log_freq_scale {
            self.map_log(spectrum, cfg, out);
        } else {
            self.map_linear(spectrum, cfg.detail, out);
        }
    }

    fn map_linear(&self, spectrum: &[Complex<f64>], detail: usize, out: &mut [f64]) {
        let last_bin = spectrum.len() - 1;

        for (i, bar) in out.iter_mut().enumerate() {
            let (Some(&low), Some(&next)) = (self.cutoff_bins.get(i), self.cutoff_bins.get(i + 1))
            else {
                continue;
            };
            let high = next.saturating_sub(1).max(low).min(last_bin);
            if low > high {
                continue;
            }

            let sum: f64 = spectrum[low..=high].iter().map(|c| c.norm()).sum();
            let mean = sum / (high - low + 1) as f64;
            let boost = (2.0 + i as f64).log2() * (100.0 / detail as f64);
            *bar = (mean * boost).sqrt();
        }
    }

    fn map_log(&mut self, spectrum: &[Complex<f64>], cfg: &Config, out: &mut [f64]) {
        self.magnitudes.clear();
        self.magnitudes.extend(spectrum.iter().map(|c| c.norm()));

        let per_bar = self.samples_per_bar.max(1);
        let detail_mul = (HPF_REFERENCE_DETAIL + 2.0).ln() / (cfg.detail as f64 + 2.0).ln();
        let curve = cfg.log_freq_hpf_curve.ln();

        for (i, bar) in out.iter_mut().enumerate() {
            let positions = self
                .sample_positions
                .get(i * per_bar..(i + 1) * per_bar)
                .unwrap_or(&[]);
            if positions.is_empty() {
                continue;
            }

            let sum: f64 = positions
                .iter()
                .map(|&x| lanczos_sample(&self.magnitudes, x))
                .sum();
            let mut value = sum / positions.len() as f64;

            if cfg.log_freq_use_hpf {
                value *= (i as f64 + 2.0).ln() / curve * detail_mul;
            }
            if !cfg.use_auto_scale {
                value *= LOG_MANUAL_ATTENUATION;
            }

            *bar = value.max(0.0);
        }
    }
}

/// Lower FFT bin for each bar boundary, strictly increasing.
fn linear_cutoffs(cfg: &Config) -> Vec<usize> {
    let detail = cfg.detail;
    let low = cfg.low_cutoff_freq;
    let high = cfg.high_cutoff_freq;
    let nyquist = cfg.nyquist();
    let half = cfg.sample_size() as f64 / 2.0;

    let freq_const = (low / high).log10() / (1.0 / (detail as f64 + 1.0) - 1.0);

    let mut bins = Vec::with_capacity(detail + 1);
    for n in 0..=detail {
        let exponent = -freq_const + (n as f64 + 1.0) / (detail as f64 + 1.0) * freq_const;
        let fc = high * 10f64.powf(exponent);
        let mut bin = (fc / nyquist * half).floor().max(0.0) as usize;

        if let Some(&prev) = bins.last() {
            if bin <= prev {
                bin = prev + 1;
            }
        }
        bins.push(bin);
    }
    bins
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

fn lanczos_kernel(x: f64) -> f64 {
    let a = LANCZOS_A as f64;
    if x.abs() >= a {
        0.0
    } else {
        sinc(x) * sinc(x / a)
    }
}

/// Windowed-sinc interpolation of `data` at fractional index `x`. Taps that
/// fall outside the data are skipped.
fn lanczos_sample(data: &[f64], x: f64) -> f64 {
    if !x.is_finite() || data.is_empty() {
        return 0.0;
    }

    let base = x.floor() as i64;
    let mut acc = 0.0;
    for k in (base - LANCZOS_A + 1)..=(base + LANCZOS_A) {
        if k < 0 || k as usize >= data.len() {
            continue;
        }
        acc += data[k as usize] * lanczos_kernel(x - k as f64);
    }
    acc.max(0.0)
}
