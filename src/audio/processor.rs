use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use super::{BarFrame, SampleBuffer, SpectrumEngine, TickOutcome};
use crate::config::Config;
use crate::source::AudioSource;

struct VisualizerState {
    engine: SpectrumEngine,
    buffer: SampleBuffer,
    source: AudioSource,
    source_failing: bool,
}

impl VisualizerState {
    fn apply(&mut self, config: Config) {
        self.engine.update(config);
        let size = self.engine.config().sample_size();
        if self.buffer.len() != size {
            debug!("sample buffer {} -> {} frames", self.buffer.len(), size);
            self.buffer.resize(size);
        }
    }

    fn tick(&mut self, seconds: f64) -> TickOutcome {
        match self.source.fill(&mut self.buffer) {
            Ok(()) => self.source_failing = false,
            Err(err) if !self.source_failing => {
                warn!("{} source: {}", self.source.name(), err);
                self.source_failing = true;
            }
            Err(err) => debug!("{} source: {}", self.source.name(), err),
        }
        self.engine.tick(&self.buffer, seconds)
    }
}

/// Thread-safe front end tying an audio source to a [`SpectrumEngine`].
///
/// `tick`, `update` and `render` may be called from different threads.
/// Configuration changes travel over a channel and are applied at the start
/// of the next tick, newest first. A tick that finds the state busy is
/// dropped instead of waiting.
#[derive(Clone)]
pub struct Visualizer {
    state: Arc<Mutex<VisualizerState>>,
    updates: Sender<Config>,
    pending: Receiver<Config>,
}

impl Visualizer {
    pub fn new(config: Config, source: AudioSource) -> Self {
        let engine = SpectrumEngine::new(config);
        let buffer = SampleBuffer::new(engine.config().sample_size());
        info!(
            "visualizer ready: {} bars, {} frames per tick, {} source",
            engine.config().detail,
            engine.config().sample_size(),
            source.name()
        );

        let (updates, pending) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(Mutex::new(VisualizerState {
                engine,
                buffer,
                source,
                source_failing: false,
            })),
            updates,
            pending,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VisualizerState> {
        // a panic elsewhere leaves the bars readable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a configuration; it takes effect on the next tick.
    pub fn update(&self, config: Config) {
        if self.updates.send(config).is_err() {
            warn!("configuration channel closed, update dropped");
        }
    }

    pub fn tick(&self, seconds: f64) -> TickOutcome {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::WouldBlock) => return TickOutcome::Contended,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if let Some(config) = self.pending.try_iter().last() {
            state.apply(config);
        }
        state.tick(seconds)
    }

    /// Snapshot of the current bars. The lock is released before returning.
    pub fn render(&self) -> BarFrame {
        self.lock().engine.frame()
    }

    /// Configuration currently in effect, after sanitizing.
    pub fn config(&self) -> Config {
        self.lock().engine.config().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().source.is_finished()
    }

    /// Run `f` with the engine while holding the state lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&SpectrumEngine) -> R) -> R {
        f(&self.lock().engine)
    }
}
