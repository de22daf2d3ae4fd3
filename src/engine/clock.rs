//! Internal clock for frame I/O pacing

use std::thread;
use std::time::{Duration, Instant};

/// If the caller falls further behind than this, pacing restarts from now
/// instead of letting frames through in a burst.
const MAX_LAG: Duration = Duration::from_millis(100);

/// Blocks frame I/O so that samples flow at the configured rate
#[derive(Debug)]
pub struct Pacer {
    rate: u32,
    channels: usize,
    deadline: Option<Instant>,
}

impl Pacer {
    pub fn new(rate: u32, channels: usize) -> Self {
        Self {
            rate: rate.max(1),
            channels: channels.max(1),
            deadline: None,
        }
    }

    /// Duration of `samples` interleaved samples
    pub fn period(&self, samples: usize) -> Duration {
        let frames = (samples / self.channels) as u64;
        Duration::from_nanos(frames * 1_000_000_000 / self.rate as u64)
    }

    /// Wait until `samples` are due, returns the time spent sleeping
    pub fn wait(&mut self, samples: usize) -> Duration {
        let now = Instant::now();
        let deadline = match self.deadline {
            Some(deadline) if deadline + MAX_LAG >= now => deadline,
            _ => now,
        };

        let slept = deadline.saturating_duration_since(now);
        if !slept.is_zero() {
            thread::sleep(slept);
        }

        self.deadline = Some(deadline + self.period(samples));
        slept
    }
}
