use log::debug;

/// Consecutive silent ticks tolerated before analysis is suspended.
pub const SILENCE_TICKS_TO_SLEEP: u32 = 30;
/// Seconds spent asleep before analysis is attempted again.
pub const SLEEP_DURATION_SECS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepState {
    #[default]
    Active,
    Sleeping,
}

/// What the engine should do with the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    Process,
    /// Still asleep; leave the bars alone.
    Skip,
    /// The timer ran out on this tick. Nothing is processed until the next one.
    Wake,
}

/// Suspends analysis after a run of silent ticks and wakes up on a timer.
///
/// Waking does not clear the silence count: if the very next tick is still
/// silent the governor goes straight back to sleep.
#[derive(Debug, Clone, Default)]
pub struct SleepGovernor {
    state: SleepState,
    silent_ticks: u32,
    asleep_for: f64,
}

impl SleepGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SleepState {
        self.state
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == SleepState::Sleeping
    }

    pub fn silent_ticks(&self) -> u32 {
        self.silent_ticks
    }

    /// Called at the start of a tick, before any audio is looked at.
    pub fn begin_tick(&mut self, seconds: f64) -> SleepDecision {
        if self.state == SleepState::Active {
            return SleepDecision::Process;
        }

        if seconds.is_finite() && seconds > 0.0 {
            self.asleep_for += seconds;
        }
        if self.asleep_for >= SLEEP_DURATION_SECS {
            debug!("waking after {:.2}s of silence", self.asleep_for);
            self.state = SleepState::Active;
            self.asleep_for = 0.0;
            SleepDecision::Wake
        } else {
            SleepDecision::Skip
        }
    }

    /// Feed the silence flag of an active tick. Returns true when this tick
    /// put the governor to sleep.
    pub fn observe(&mut self, silent: bool) -> bool {
        if !silent {
            self.silent_ticks = 0;
            return false;
        }

        self.silent_ticks = self.silent_ticks.saturating_add(1);
        if self.silent_ticks > SILENCE_TICKS_TO_SLEEP && self.state == SleepState::Active {
            debug!("{} silent ticks, suspending analysis", self.silent_ticks);
            self.state = SleepState::Sleeping;
            self.asleep_for = 0.0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
