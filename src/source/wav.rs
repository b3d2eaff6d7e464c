use hound::{SampleFormat, WavReader};
use log::{debug, info};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::audio::{SampleBuffer, StereoSample};
use crate::error::SourceError;

/// Plays a WAV file through the engine, one buffer's worth of frames per
/// tick, for offline analysis.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    channels: usize,
    bits: u16,
    format: SampleFormat,
    sample_rate: u32,
    frames_read: u64,
    finished: bool,
    scratch: Vec<f32>,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        info!(
            "opened {}: {} Hz, {} channels, {} bit {:?}",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        if spec.channels == 0 {
            return Err(SourceError::Wav(hound::Error::FormatError("no channels")));
        }

        Ok(Self {
            reader,
            channels: spec.channels as usize,
            bits: spec.bits_per_sample,
            format: spec.sample_format,
            sample_rate: spec.sample_rate,
            frames_read: 0,
            finished: false,
            scratch: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total number of frames in the file.
    pub fn duration(&self) -> u32 {
        self.reader.duration()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Overwrite `buffer` with the next frames; past the end it is zero filled.
    pub fn fill(&mut self, buffer: &mut SampleBuffer) -> Result<(), SourceError> {
        buffer.clear();
        if self.finished {
            return Ok(());
        }

        let wanted = buffer.len() * self.channels;
        self.scratch.clear();
        match self.format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    self.scratch.push(sample?);
                }
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (self.bits.clamp(1, 32) - 1)) as f32;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    self.scratch.push(sample? as f32 * scale);
                }
            }
        }

        let frames = self.scratch.len() / self.channels;
        for (slot, frame) in buffer
            .frames_mut()
            .iter_mut()
            .zip(self.scratch.chunks_exact(self.channels))
        {
            let l = frame[0];
            let r = if self.channels > 1 { frame[1] } else { l };
            *slot = StereoSample::from_f32(l, r);
        }

        self.frames_read += frames as u64;
        if self.scratch.len() < wanted {
            debug!("end of wav after {} frames", self.frames_read);
            self.finished = true;
        }
        Ok(())
    }
}
