use eyre::Result;
use std::time::{Duration, Instant};

/// Period of one tick at `rate_hz`.
///
/// Fails for rates that are not positive or whose period does not fit in a
/// `Duration` (e.g. `1e-30` Hz).
pub fn tick_period(rate_hz: f64) -> Result<Duration> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(eyre::eyre!("Tick rate {} Hz must be positive", rate_hz));
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .map_err(|e| eyre::eyre!("Tick rate {} Hz has no usable period: {}", rate_hz, e))
}

/// Fixed-rate tick pacing for hosts that have no physics clock of their own.
///
/// `wait` sleeps until the next tick deadline. A tick that overran its
/// period does not cause a burst of catch-up ticks; the schedule restarts
/// from the current instant instead.
#[derive(Debug, Clone)]
pub struct TickPacer {
    period: Duration,
    next_deadline: Instant,
}

impl TickPacer {
    pub fn new(rate_hz: f64) -> Result<Self> {
        let period = tick_period(rate_hz)?;
        Ok(Self {
            period,
            next_deadline: Instant::now() + period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn reset(&mut self) {
        self.next_deadline = Instant::now() + self.period;
    }

    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            std::thread::sleep(self.next_deadline - now);
            self.next_deadline += self.period;
        } else {
            self.next_deadline = now + self.period;
        }
    }
}
