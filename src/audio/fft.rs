use log::debug;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::{Channel, SampleBuffer};
use crate::config::WindowFunction;
use crate::error::EngineError;

/// Real-input FFT over one tick's worth of frames, one transform per active
/// channel. Buffers and the plan are reused across ticks and only rebuilt
/// when the frame count or window changes.
pub struct FftStage {
    planner: FftPlanner<f64>,
    fft: Option<Arc<dyn Fft<f64>>>,
    size: usize,
    window_kind: WindowFunction,
    window: Vec<f64>,
    buffers: [Vec<Complex<f64>>; 2],
    scratch: Vec<Complex<f64>>,
    channels: usize,
}

impl FftStage {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            size: 0,
            window_kind: WindowFunction::None,
            window: Vec::new(),
            buffers: [Vec::new(), Vec::new()],
            scratch: Vec::new(),
            channels: 1,
        }
    }

    /// Make sure a plan for `size` points exists. Cheap when nothing changed.
    pub fn prepare(&mut self, size: usize, window: WindowFunction) -> Result<(), EngineError> {
        if size == 0 {
            self.fft = None;
            return Err(EngineError::FftPlan { size });
        }

        if self.fft.is_some() && self.size == size && self.window_kind == window {
            return Ok(());
        }

        debug!("planning {}-point FFT ({:?} window)", size, window);
        let fft = self.planner.plan_fft_forward(size);
        if fft.len() != size {
            self.fft = None;
            return Err(EngineError::FftPlan { size });
        }

        self.scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        for buffer in &mut self.buffers {
            buffer.clear();
            buffer.resize(size, Complex::new(0.0, 0.0));
        }
        self.window = Self::make_window(window, size);
        self.window_kind = window;
        self.size = size;
        self.fft = Some(fft);
        Ok(())
    }

    fn make_window(kind: WindowFunction, size: usize) -> Vec<f64> {
        match kind {
            WindowFunction::None => vec![1.0; size],
            WindowFunction::Hann if size < 2 => vec![1.0; size],
            WindowFunction::Hann => (0..size)
                .map(|i| {
                    let phase = 2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64;
                    0.5 * (1.0 - phase.cos())
                })
                .collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of usable complex bins per spectrum.
    pub fn results(&self) -> usize {
        self.size / 2 + 1
    }

    /// Copy the frames into the FFT inputs and report whether the tick was
    /// silent, i.e. no analysed channel carries a positive sample.
    ///
    /// A short buffer is zero padded; extra frames are ignored.
    pub fn load(&mut self, samples: &SampleBuffer, stereo: bool) -> bool {
        self.channels = if stereo { 2 } else { 1 };
        let frames = samples.frames();
        let mut silent_left = true;
        let mut silent_right = true;

        for i in 0..self.size {
            let w = self.window.get(i).copied().unwrap_or(1.0);
            let (left, right) = match frames.get(i) {
                Some(frame) if stereo => (frame.l as f64, frame.r as f64),
                Some(frame) => (frame.mono(), 0.0),
                None => (0.0, 0.0),
            };

            if left > 0.0 {
                silent_left = false;
            }
            if right > 0.0 {
                silent_right = false;
            }

            self.buffers[0][i] = Complex::new(left * w, 0.0);
            if stereo {
                self.buffers[1][i] = Complex::new(right * w, 0.0);
            }
        }

        if stereo {
            silent_left && silent_right
        } else {
            silent_left
        }
    }

    /// Transform every loaded channel in place.
    pub fn execute(&mut self) -> Result<(), EngineError> {
        let fft = self
            .fft
            .as_ref()
            .ok_or(EngineError::FftPlan { size: self.size })?;

        for buffer in self.buffers.iter_mut().take(self.channels) {
            fft.process_with_scratch(buffer, &mut self.scratch);
        }
        Ok(())
    }

    /// The non-redundant half of the last transform for `channel`.
    pub fn spectrum(&self, channel: Channel) -> &[Complex<f64>] {
        let buffer = &self.buffers[channel.index()];
        let end = self.results().min(buffer.len());
        &buffer[..end]
    }
}

impl Default for FftStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StereoSample;

    fn sine(freq: f64, rate: f64, len: usize, amplitude: f64) -> SampleBuffer {
        let frames = (0..len)
            .map(|i| {
                let v = (amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / rate).sin()) as i16;
                StereoSample::new(v, v)
            })
            .collect();
        SampleBuffer::from_frames(frames)
    }

    #[test]
    fn zero_size_plan_is_an_error() {
        let mut stage = FftStage::new();
        assert_eq!(
            stage.prepare(0, WindowFunction::None),
            Err(EngineError::FftPlan { size: 0 })
        );
        assert!(stage.execute().is_err());
    }

    #[test]
    fn spectrum_has_half_plus_one_bins() {
        let mut stage = FftStage::new();
        stage.prepare(1470, WindowFunction::None).expect("plan");
        stage.load(&SampleBuffer::new(1470), false);
        stage.execute().expect("execute");
        assert_eq!(stage.spectrum(Channel::Left).len(), 736);
    }

    #[test]
    fn silence_means_no_positive_sample() {
        let mut stage = FftStage::new();
        stage.prepare(64, WindowFunction::None).expect("plan");

        assert!(stage.load(&SampleBuffer::new(64), false));

        let negative = SampleBuffer::from_frames(vec![StereoSample::new(-100, -100); 64]);
        assert!(stage.load(&negative, true));

        let mut one_blip = SampleBuffer::new(64);
        one_blip.frames_mut()[10] = StereoSample::new(0, 3);
        assert!(!stage.load(&one_blip, true));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut stage = FftStage::new();
        stage.prepare(1024, WindowFunction::Hann).expect("plan");
        // bin 64 of a 1024 point transform at 44.1 kHz
        let freq = 64.0 * 44100.0 / 1024.0;
        stage.load(&sine(freq, 44100.0, 1024, 10000.0), false);
        stage.execute().expect("execute");

        let spectrum = stage.spectrum(Channel::Left);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(64));
    }

    #[test]
    fn short_buffers_are_zero_padded() {
        let mut stage = FftStage::new();
        stage.prepare(128, WindowFunction::None).expect("plan");
        let short = SampleBuffer::from_frames(vec![StereoSample::new(1000, 1000); 10]);
        assert!(!stage.load(&short, false));
        stage.execute().expect("execute");
        // DC bin equals the sum of the ten non-zero samples
        let dc = stage.spectrum(Channel::Left)[0];
        assert!((dc.re - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn replanning_only_happens_on_change() {
        let mut stage = FftStage::new();
        stage.prepare(256, WindowFunction::None).expect("plan");
        let first = stage.fft.as_ref().map(Arc::as_ptr);
        stage.prepare(256, WindowFunction::None).expect("plan");
        assert_eq!(stage.fft.as_ref().map(Arc::as_ptr), first);

        stage.prepare(512, WindowFunction::None).expect("plan");
        assert_eq!(stage.size(), 512);
        assert_eq!(stage.results(), 257);
    }
}
