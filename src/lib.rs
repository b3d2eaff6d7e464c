//! Real-time audio spectrum bars.
//!
//! A [`SpectrumEngine`](audio::SpectrumEngine) turns a buffer of stereo PCM
//! frames into `detail` bar heights per tick: FFT, bin aggregation (linear or
//! log-frequency), optional smoothing, scaling into the pixel range and a
//! gravity/peak falloff. [`Visualizer`](audio::Visualizer) wraps the engine
//! and an [`AudioSource`](source::AudioSource) behind a lock so tick, update
//! and render can come from different threads, and [`graphics`] lays the
//! resulting bars out as drawable primitives.

pub mod audio;
pub mod config;
pub mod error;
pub mod graphics;
pub mod source;

pub use audio::{BarFrame, SpectrumEngine, TickOutcome, Visualizer};
pub use config::Config;
pub use error::{EngineError, SourceError};
