pub mod auto_scale;
pub mod bins;
pub mod engine;
pub mod falloff;
pub mod fft;
pub mod processor;
pub mod sleep;
pub mod smoothing;

pub use auto_scale::AutoScaler;
pub use bins::BinMapper;
pub use engine::{SkipReason, SpectrumEngine, TickOutcome};
pub use falloff::Falloff;
pub use fft::FftStage;
pub use processor::Visualizer;
pub use sleep::{SleepGovernor, SleepState};
pub use smoothing::Smoother;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// One interleaved PCM frame as delivered by a fifo or capture callback.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct StereoSample {
    pub l: i16,
    pub r: i16,
}

impl StereoSample {
    pub fn new(l: i16, r: i16) -> Self {
        Self { l, r }
    }

    /// Convert a float sample pair in [-1, 1] to 16 bit.
    pub fn from_f32(l: f32, r: f32) -> Self {
        Self {
            l: (l.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
            r: (r.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
        }
    }

    pub fn mono(&self) -> f64 {
        (self.l as f64 + self.r as f64) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// Fixed-capacity frame buffer, refilled by an audio source before every tick.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    frames: Vec<StereoSample>,
}

impl SampleBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            frames: vec![StereoSample::default(); len],
        }
    }

    pub fn from_frames(frames: Vec<StereoSample>) -> Self {
        Self { frames }
    }

    /// Resize to `len` frames, zeroing everything.
    pub fn resize(&mut self, len: usize) {
        self.frames.clear();
        self.frames.resize(len, StereoSample::default());
    }

    pub fn clear(&mut self) {
        self.frames.fill(StereoSample::default());
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[StereoSample] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [StereoSample] {
        &mut self.frames
    }

    /// Raw byte view, used by sources that read PCM straight off a pipe.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.frames)
    }
}

/// Snapshot of the visible output, handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarFrame {
    /// Gravity-blended bar heights, one vector per active channel.
    pub bars: Vec<Vec<f64>>,
    /// Peak-hold envelope, same shape as `bars`.
    pub peaks: Vec<Vec<f64>>,
    pub sleeping: bool,
}

impl BarFrame {
    pub fn channel(&self, channel: Channel) -> Option<&[f64]> {
        self.bars.get(channel.index()).map(Vec::as_slice)
    }

    pub fn is_stereo(&self) -> bool {
        self.bars.len() > 1
    }

    pub fn detail(&self) -> usize {
        self.bars.first().map_or(0, Vec::len)
    }
}
