use thiserror::Error;

/// Failures inside a single engine tick. All of them are transient: the tick
/// is dropped, the previous bars stay on screen and the next tick retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("cannot plan a {size}-point FFT")]
    FftPlan { size: usize },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fifo '{path}': {reason}")]
    Fifo { path: String, reason: String },

    #[error("audio device: {0}")]
    Device(String),

    #[error("wav file: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio source disconnected")]
    Disconnected,
}
