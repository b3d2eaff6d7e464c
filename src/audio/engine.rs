use log::{debug, warn};

use super::auto_scale::scale_manual;
use super::sleep::SleepDecision;
use super::{
    AutoScaler, BarFrame, BinMapper, Channel, Falloff, FftStage, SampleBuffer, SleepGovernor,
    SleepState, Smoother,
};
use crate::config::Config;
use crate::error::EngineError;

const CHANNELS: [Channel; 2] = [Channel::Left, Channel::Right];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The FFT could not be planned or run; retried next tick.
    Fft(EngineError),
}

/// Result of one [`SpectrumEngine::tick`]. Never an error: every failure is
/// local to the tick and leaves the previous bars in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// New bars were computed.
    Processed,
    /// Silence governor is holding analysis off; bars untouched.
    Sleeping,
    /// Governor woke up on this tick; analysis resumes on the next one.
    Woke,
    Skipped(SkipReason),
    /// Another entry point held the lock, so the tick was dropped.
    Contended,
}

/// Sample buffer in, bar heights out.
///
/// Runs FFT, bin mapping, smoothing, scaling and falloff in that order, once
/// per tick. All cached tables are refreshed lazily from the current config.
pub struct SpectrumEngine {
    config: Config,
    fft: FftStage,
    mapper: BinMapper,
    smoother: Smoother,
    scaler: AutoScaler,
    governor: SleepGovernor,
    raw: [Vec<f64>; 2],
    falloff: [Falloff; 2],
}

impl SpectrumEngine {
    pub fn new(config: Config) -> Self {
        let config = config.sanitized();
        let detail = config.detail;
        let mut engine = Self {
            scaler: AutoScaler::new(&config),
            config,
            fft: FftStage::new(),
            mapper: BinMapper::new(),
            smoother: Smoother::new(),
            governor: SleepGovernor::new(),
            raw: [vec![0.0; detail], vec![0.0; detail]],
            falloff: [Falloff::new(detail), Falloff::new(detail)],
        };
        engine.refresh_tables();
        engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Swap in a new configuration. Bars survive a detail change where they
    /// overlap; toggling stereo restarts the right channel from zero.
    pub fn update(&mut self, config: Config) {
        let config = config.sanitized();
        if config == self.config {
            return;
        }

        if config.stereo != self.config.stereo {
            debug!("stereo {} -> {}", self.config.stereo, config.stereo);
            self.falloff[Channel::Right.index()] = Falloff::new(config.detail);
        }
        self.config = config;
        self.refresh_tables();
    }

    fn refresh_tables(&mut self) {
        let cfg = &self.config;
        self.mapper.refresh(cfg);
        self.smoother.refresh(cfg);
        self.scaler.refresh(cfg);
        for (raw, falloff) in self.raw.iter_mut().zip(self.falloff.iter_mut()) {
            raw.resize(cfg.detail, 0.0);
            falloff.resize(cfg.detail);
        }
    }

    /// Advance one frame. `seconds` is the time since the previous tick and
    /// only matters to the sleep timer.
    pub fn tick(&mut self, samples: &SampleBuffer, seconds: f64) -> TickOutcome {
        match self.governor.begin_tick(seconds) {
            SleepDecision::Skip => return TickOutcome::Sleeping,
            SleepDecision::Wake => return TickOutcome::Woke,
            SleepDecision::Process => {}
        }

        self.refresh_tables();

        let size = self.config.sample_size();
        if let Err(err) = self.fft.prepare(size, self.config.window) {
            warn!("skipping tick: {}", err);
            return TickOutcome::Skipped(SkipReason::Fft(err));
        }

        let silent = self.fft.load(samples, self.config.stereo);
        if self.governor.observe(silent) {
            return TickOutcome::Sleeping;
        }

        if let Err(err) = self.fft.execute() {
            warn!("skipping tick: {}", err);
            return TickOutcome::Skipped(SkipReason::Fft(err));
        }

        let channels = self.config.channel_count();
        for channel in &CHANNELS[..channels] {
            let raw = &mut self.raw[channel.index()];
            self.mapper.map(self.fft.spectrum(*channel), &self.config, raw);
            self.smoother.apply(raw, &self.config);
        }

        let height = self.config.channel_height();
        if self.config.use_auto_scale {
            let frame_max = self.raw[..channels]
                .iter()
                .flat_map(|bars| bars.iter().copied())
                .fold(0.0, f64::max);
            self.scaler.push(frame_max);
            for raw in &mut self.raw[..channels] {
                self.scaler.scale(raw, height);
            }
        } else {
            for raw in &mut self.raw[..channels] {
                scale_manual(raw, self.config.scale_size, self.config.scale_boost, height);
            }
        }

        for raw in &mut self.raw[..channels] {
            self.smoother.apply_floor(raw, &self.config, height);
        }

        for (raw, falloff) in self.raw[..channels].iter().zip(self.falloff.iter_mut()) {
            falloff.apply(raw, self.config.gravity, self.config.falloff_weight);
        }

        TickOutcome::Processed
    }

    /// Gravity-blended bars of one channel.
    pub fn bars(&self, channel: Channel) -> &[f64] {
        self.falloff[channel.index()].current()
    }

    pub fn peaks(&self, channel: Channel) -> &[f64] {
        self.falloff[channel.index()].peaks()
    }

    pub fn frame(&self) -> BarFrame {
        let channels = self.config.channel_count();
        BarFrame {
            bars: self.falloff[..channels]
                .iter()
                .map(|f| f.current().to_vec())
                .collect(),
            peaks: self.falloff[..channels]
                .iter()
                .map(|f| f.peaks().to_vec())
                .collect(),
            sleeping: self.governor.is_sleeping(),
        }
    }

    pub fn sleep_state(&self) -> SleepState {
        self.governor.state()
    }

    pub fn cutoff_bins(&self) -> &[usize] {
        self.mapper.cutoff_bins()
    }

    pub fn monstercat_weights(&self) -> &[f64] {
        self.smoother.monstercat_weights()
    }

    pub fn target_frequencies(&self) -> &[f64] {
        self.mapper.target_frequencies()
    }

    pub fn auto_scaler(&self) -> &AutoScaler {
        &self.scaler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StereoSample;
    use crate::config::SmoothingMode;

    fn noise(len: usize, seed: u32) -> SampleBuffer {
        // small LCG so the test is deterministic
        let mut state = seed;
        let frames = (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let l = (state >> 16) as i16;
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let r = (state >> 16) as i16;
                StereoSample::new(l, r)
            })
            .collect();
        SampleBuffer::from_frames(frames)
    }

    #[test]
    fn new_engine_sanitizes_its_config() {
        let engine = SpectrumEngine::new(Config {
            detail: 0,
            ..Config::default()
        });
        assert_eq!(engine.config().detail, 1);
        assert_eq!(engine.bars(Channel::Left).len(), 1);
    }

    #[test]
    fn processed_bars_fit_the_height() {
        let cfg = Config {
            smoothing: SmoothingMode::Monstercat,
            ..Config::default()
        };
        let mut engine = SpectrumEngine::new(cfg.clone());
        let samples = noise(cfg.sample_size(), 7);
        for _ in 0..10 {
            assert_eq!(engine.tick(&samples, 1.0 / 30.0), TickOutcome::Processed);
        }

        let bars = engine.bars(Channel::Left);
        assert_eq!(bars.len(), 32);
        assert!(bars.iter().all(|b| b.is_finite() && *b >= 0.0 && *b < 100.0));
        assert!(bars.iter().any(|b| *b > 0.0));
    }

    #[test]
    fn stereo_channels_use_half_the_height() {
        let cfg = Config {
            stereo: true,
            gravity: 0.0,
            ..Config::default()
        };
        let mut engine = SpectrumEngine::new(cfg.clone());
        engine.tick(&noise(cfg.sample_size(), 3), 1.0 / 30.0);

        let frame = engine.frame();
        assert!(frame.is_stereo());
        for bars in &frame.bars {
            assert!(bars.iter().all(|b| *b < 50.0));
        }
    }

    #[test]
    fn monstercat_keeps_silence_flat() {
        let cfg = Config {
            smoothing: SmoothingMode::Monstercat,
            ..Config::default()
        };
        let mut engine = SpectrumEngine::new(cfg.clone());
        let zeros = SampleBuffer::new(cfg.sample_size());
        for _ in 0..30 {
            assert_eq!(engine.tick(&zeros, 1.0 / 30.0), TickOutcome::Processed);
        }
        assert!(engine.bars(Channel::Left).iter().all(|b| *b == 0.0));
        assert_eq!(engine.auto_scaler().ceiling(), 1.0);
    }

    #[test]
    fn monstercat_floor_is_in_pixels() {
        let cfg = Config {
            smoothing: SmoothingMode::Monstercat,
            gravity: 0.0,
            ..Config::default()
        };
        let mut engine = SpectrumEngine::new(cfg.clone());
        engine.tick(&noise(cfg.sample_size(), 21), 1.0 / 30.0);

        let bars = engine.bars(Channel::Left);
        assert!(bars[1..].iter().all(|b| *b == 0.0 || *b >= cfg.bar_min_height));
        assert!(bars.iter().all(|b| *b < 100.0));
    }

    #[test]
    fn detail_change_resizes_every_array() {
        let mut engine = SpectrumEngine::new(Config::default());
        engine.tick(&noise(1470, 1), 1.0 / 30.0);

        engine.update(Config {
            detail: 48,
            stereo: true,
            ..Config::default()
        });
        assert_eq!(engine.cutoff_bins().len(), 49);
        assert_eq!(engine.monstercat_weights().len(), 48);
        assert_eq!(engine.tick(&noise(1470, 2), 1.0 / 30.0), TickOutcome::Processed);
        assert_eq!(engine.bars(Channel::Left).len(), 48);
        assert_eq!(engine.peaks(Channel::Right).len(), 48);
    }

    #[test]
    fn fps_change_replans_the_fft() {
        let mut engine = SpectrumEngine::new(Config::default());
        engine.update(Config {
            fps: 60,
            ..Config::default()
        });
        assert_eq!(engine.tick(&noise(735, 4), 1.0 / 60.0), TickOutcome::Processed);
        assert_eq!(*engine.cutoff_bins().last().unwrap_or(&0), 367);
    }

    #[test]
    fn short_buffer_is_processed_as_is() {
        let mut engine = SpectrumEngine::new(Config::default());
        assert_eq!(engine.tick(&noise(100, 9), 1.0 / 30.0), TickOutcome::Processed);
        assert_eq!(engine.tick(&SampleBuffer::default(), 1.0 / 30.0), TickOutcome::Processed);
    }
}
