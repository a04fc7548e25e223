use std::{
    cell::Cell,
    time::{SystemTime, UNIX_EPOCH},
};

/// Wall-clock source for animation. Values are milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn at(ms: f64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, delta_ms: f64) {
        self.now.set((self.now.get() + delta_ms).max(0.0));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Identifies one requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Host animation-frame facility: one callback per display refresh.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Scheduler that queues requests for an external loop to fire.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next: u64,
    pending: Vec<FrameToken>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every frame requested so far.
    pub fn take_due(&mut self) -> Vec<FrameToken> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameToken {
        self.next += 1;
        let token = FrameToken(self.next);
        self.pending.push(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.pending.retain(|pending| *pending != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_runs_backwards_past_zero() {
        let clock = ManualClock::at(10.0);
        clock.advance(5.0);
        assert_eq!(clock.now_ms(), 15.0);
        clock.advance(-100.0);
        assert_eq!(clock.now_ms(), 0.0);
    }

    #[test]
    fn frame_queue_hands_out_and_cancels_tokens() {
        let mut queue = FrameQueue::new();
        let first = queue.request_frame();
        let second = queue.request_frame();
        assert_ne!(first, second);

        queue.cancel_frame(first);
        assert_eq!(queue.take_due(), vec![second]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn system_clock_reads_epoch_milliseconds() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000.0);
    }
}
