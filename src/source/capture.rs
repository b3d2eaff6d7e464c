use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use std::thread::{self, JoinHandle};

use crate::audio::{SampleBuffer, StereoSample};
use crate::error::SourceError;

/// Live input from a host audio device.
///
/// The cpal callback converts whatever the device delivers into stereo
/// `i16` frames and ships them over a channel. Each tick drains the channel
/// into the sample buffer as a ring, so the buffer always holds the most
/// recent `sample_size` frames.
///
/// cpal streams cannot move between threads, so the stream lives on its own
/// thread for as long as this handle exists.
pub struct HostCapture {
    receiver: Receiver<Vec<StereoSample>>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    write_index: usize,
    sample_rate: u32,
    device_name: String,
}

impl HostCapture {
    /// Open the named input device, or the default one when `device` is None.
    pub fn new(device: Option<&str>) -> Result<Self> {
        let (frame_sender, receiver) = crossbeam_channel::unbounded();
        let (ready_sender, ready) = crossbeam_channel::bounded(1);
        let (shutdown, shutdown_signal) = crossbeam_channel::bounded::<()>(1);
        let wanted = device.map(str::to_owned);

        let worker = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || match open_stream(wanted.as_deref(), frame_sender) {
                Ok((stream, sample_rate, name)) => {
                    let _ = ready_sender.send(Ok((sample_rate, name)));
                    // park until the handle is dropped
                    let _ = shutdown_signal.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_sender.send(Err(format!("{:#}", err)));
                }
            })
            .context("failed to spawn capture thread")?;

        let (sample_rate, device_name) = ready
            .recv()
            .context("capture thread exited before reporting")?
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            receiver,
            shutdown: Some(shutdown),
            worker: Some(worker),
            write_index: 0,
            sample_rate,
            device_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Copy every pending frame into `buffer`, wrapping at its end.
    pub fn fill(&mut self, buffer: &mut SampleBuffer) -> Result<(), SourceError> {
        drain_into(&self.receiver, &mut self.write_index, buffer)
    }
}

impl Drop for HostCapture {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capture thread panicked");
            }
        }
        info!("closed capture on {}", self.device_name);
    }
}

fn open_stream(
    device: Option<&str>,
    sender: Sender<Vec<StereoSample>>,
) -> Result<(Stream, u32, String)> {
    let host = cpal::default_host();
    let device = match device {
        Some(name) => find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .context("no input device available")?,
    };

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let supported = device
        .default_input_config()
        .with_context(|| format!("failed to get input config for '{}'", device_name))?;

    info!(
        "capturing from {}: {} Hz, {} channels, {:?}",
        device_name,
        supported.sample_rate().0,
        supported.channels(),
        supported.sample_format()
    );

    let sample_rate = supported.sample_rate().0;
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let stream = match format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, sender),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, sender),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, sender),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, sender),
        other => Err(anyhow::anyhow!("unsupported sample format {:?}", other)),
    }?;
    stream.play().context("failed to start capture stream")?;

    Ok((stream, sample_rate, device_name))
}

fn drain_into(
    receiver: &Receiver<Vec<StereoSample>>,
    write_index: &mut usize,
    buffer: &mut SampleBuffer,
) -> Result<(), SourceError> {
    let frames = buffer.frames_mut();
    loop {
        match receiver.try_recv() {
            Ok(chunk) => {
                if frames.is_empty() {
                    continue;
                }
                for frame in chunk {
                    if *write_index >= frames.len() {
                        *write_index = 0;
                    }
                    frames[*write_index] = frame;
                    *write_index += 1;
                }
            }
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => return Err(SourceError::Disconnected),
        }
    }
}

fn find_input_device(host: &cpal::Host, name: &str) -> Result<Device> {
    let devices = host
        .input_devices()
        .context("failed to enumerate input devices")?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(anyhow::anyhow!("no input device named '{}'", name))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sender: Sender<Vec<StereoSample>>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    debug!("building {}-channel input stream", channels);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let frames = interleaved_to_stereo(data, channels);
            if let Err(err) = sender.send(frames) {
                debug!("capture receiver gone, dropping {} frames", err.0.len());
            }
        },
        |err| {
            warn!("capture stream: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

/// Mono input is duplicated to both sides; extra channels are ignored.
fn interleaved_to_stereo<T>(data: &[T], channels: usize) -> Vec<StereoSample>
where
    T: Sample,
    f32: FromSample<T>,
{
    if channels == 0 {
        return Vec::new();
    }
    data.chunks_exact(channels)
        .map(|frame| {
            let l = frame[0].to_sample::<f32>();
            let r = if channels > 1 { frame[1].to_sample::<f32>() } else { l };
            StereoSample::from_f32(l, r)
        })
        .collect()
}
