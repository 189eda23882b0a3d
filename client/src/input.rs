use rand::Rng;
use std::time::Duration;

/// Decides when the bot presses next.
///
/// Presses are spaced by a base interval plus a random jitter so several
/// bots do not hit the server in lockstep.
#[derive(Debug, Clone)]
pub struct PressPacer {
    interval: Duration,
    jitter: Duration,
    presses_sent: u32,
}

impl PressPacer {
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self {
            interval,
            jitter,
            presses_sent: 0,
        }
    }

    /// Delay until the next press, in `[interval, interval + jitter]`.
    pub fn next_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.interval;
        }
        self.interval + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }

    pub fn record_press(&mut self) {
        self.presses_sent += 1;
    }

    pub fn presses_sent(&self) -> u32 {
        self.presses_sent
    }
}
