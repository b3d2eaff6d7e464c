pub mod capture;
pub mod fifo;
pub mod wav;

pub use capture::HostCapture;
pub use fifo::FifoSource;
pub use wav::WavSource;

use crate::audio::SampleBuffer;
use crate::error::SourceError;

/// Where the samples for each tick come from. Every variant fills the buffer
/// without blocking; a source with nothing new leaves silence or the previous
/// frames behind.
#[derive(Default)]
pub enum AudioSource {
    #[default]
    Silent,
    Fifo(FifoSource),
    HostCapture(HostCapture),
    WavFile(WavSource),
}

impl AudioSource {
    pub fn fill(&mut self, buffer: &mut SampleBuffer) -> Result<(), SourceError> {
        match self {
            AudioSource::Silent => {
                buffer.clear();
                Ok(())
            }
            AudioSource::Fifo(fifo) => fifo.fill(buffer),
            AudioSource::HostCapture(capture) => capture.fill(buffer),
            AudioSource::WavFile(wav) => wav.fill(buffer),
        }
    }

    /// Native rate of the source, when it has one.
    pub fn sample_rate(&self) -> Option<u32> {
        match self {
            AudioSource::HostCapture(capture) => Some(capture.sample_rate()),
            AudioSource::WavFile(wav) => Some(wav.sample_rate()),
            AudioSource::Silent | AudioSource::Fifo(_) => None,
        }
    }

    /// True once a finite source has nothing left to play.
    pub fn is_finished(&self) -> bool {
        matches!(self, AudioSource::WavFile(wav) if wav.is_finished())
    }

    pub fn name(&self) -> &'static str {
        match self {
            AudioSource::Silent => "silent",
            AudioSource::Fifo(_) => "fifo",
            AudioSource::HostCapture(_) => "capture",
            AudioSource::WavFile(_) => "wav",
        }
    }
}
