use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::audio::SampleBuffer;
use crate::error::SourceError;

/// Reads that may hit an empty pipe before the tick gives up on it.
pub const MAX_READ_ATTEMPTS: u32 = 100;

/// Non-blocking reader for a named pipe carrying interleaved native-endian
/// `i16` stereo frames, the format MPD's fifo output writes.
///
/// The pipe is (re)opened lazily, so a missing path or a writer that went
/// away costs one failed open per tick and nothing else.
pub struct FifoSource {
    path: PathBuf,
    file: Option<File>,
    open_failed: bool,
}

impl FifoSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let mut source = Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            open_failed: false,
        };
        if let Err(err) = source.open() {
            debug!("fifo not ready yet: {}", err);
        }
        source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        match open_nonblocking(&self.path) {
            Ok(file) => {
                info!("opened fifo {}", self.path.display());
                self.file = Some(file);
                self.open_failed = false;
                Ok(())
            }
            Err(err) => {
                // one warning per outage, not one per tick
                if !self.open_failed {
                    warn!("failed to open fifo '{}': {}", self.path.display(), err);
                }
                self.open_failed = true;
                Err(SourceError::Fifo {
                    path: self.path.display().to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            info!("closed fifo {}", self.path.display());
        }
    }

    /// Fill `buffer` with the next frames. Whatever could not be read is left
    /// zeroed.
    pub fn fill(&mut self, buffer: &mut SampleBuffer) -> Result<(), SourceError> {
        buffer.clear();
        if self.file.is_none() {
            self.open()?;
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let bytes = buffer.as_bytes_mut();
        let mut offset = 0;
        let mut attempts = 0;

        while offset < bytes.len() {
            match file.read(&mut bytes[offset..]) {
                Ok(0) => {
                    debug!("fifo at end of stream after {} bytes", offset);
                    break;
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    attempts += 1;
                    if attempts > MAX_READ_ATTEMPTS {
                        debug!(
                            "fifo dried up after {} of {} bytes, reopening next tick",
                            offset,
                            bytes.len()
                        );
                        bytes.fill(0);
                        self.close();
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    bytes.fill(0);
                    self.close();
                    return Err(err.into());
                }
            }
        }

        // a torn frame at the end would shift the channels of the next read
        let whole = offset - offset % std::mem::size_of::<crate::audio::StereoSample>();
        bytes[whole..].fill(0);
        Ok(())
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(_path: &Path) -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "named pipes are only supported on unix hosts",
    ))
}
