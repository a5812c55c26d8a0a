/// Outcome of driving the countdown by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Nothing observable happened (paused, stopped, or already at zero).
    Idle,
    /// One second was taken off the clock.
    Counted(u32),
    /// The clock reached zero on this step. Reported once per configuration.
    Expired,
}

/// A one-second-resolution countdown bound to a single exam part.
///
/// The timer does not own a clock. The runtime calls [`CountdownTimer::tick`]
/// once per elapsed second, so the timer stays deterministic under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    remaining: u32,
    running: bool,
    fired: bool,
}

impl CountdownTimer {
    /// A stopped timer at zero that will never fire until reset.
    pub fn stopped() -> Self {
        Self {
            remaining: 0,
            running: false,
            fired: true,
        }
    }

    /// Discards any previous countdown and starts counting from `secs`.
    ///
    /// A zero duration expires immediately.
    pub fn reset(&mut self, secs: u32) -> TimerOutcome {
        self.remaining = secs;
        self.running = true;
        self.fired = false;
        if secs == 0 {
            self.fired = true;
            self.running = false;
            return TimerOutcome::Expired;
        }
        TimerOutcome::Idle
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.fired = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        if !self.fired && self.remaining > 0 {
            self.running = true;
        }
    }

    pub fn tick(&mut self) -> TimerOutcome {
        if !self.running || self.fired {
            return TimerOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.fired = true;
            self.running = false;
            TimerOutcome::Expired
        } else {
            TimerOutcome::Counted(self.remaining)
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::stopped()
    }
}

/// Renders seconds as `m:ss`.
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
