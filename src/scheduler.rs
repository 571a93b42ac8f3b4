//! Converts wall-clock frame time into whole fixed-size simulation steps.

use std::time::Duration;

/// Millisecond accumulator behind the frame loop.
///
/// Each frame the time since the previous frame start is added to the
/// unsimulated remainder, and as many whole steps as fit are taken out of it.
/// The remainder left over always stays below one step.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    step_ms: u64,
    unsimulated_ms: u64,
    frame_start_ms: Option<u64>,
    /// Most steps simulated in one frame. Whole steps beyond it are dropped.
    max_catch_up: Option<u32>,
    dropped_steps: u64,
}

impl FrameScheduler {
    pub fn new(step_ms: u64) -> Self {
        Self {
            step_ms: step_ms.max(1),
            unsimulated_ms: 0,
            frame_start_ms: None,
            max_catch_up: None,
            dropped_steps: 0,
        }
    }

    pub fn with_catch_up_limit(mut self, max_steps: u32) -> Self {
        self.max_catch_up = Some(max_steps);
        self
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Milliseconds carried over to the next frame.
    pub fn remainder_ms(&self) -> u64 {
        self.unsimulated_ms
    }

    pub fn dropped_steps(&self) -> u64 {
        self.dropped_steps
    }

    /// Add `elapsed_ms` of wall-clock time and return the number of steps to simulate.
    pub fn accumulate(&mut self, elapsed_ms: u64) -> u32 {
        self.unsimulated_ms += elapsed_ms;
        let due = self.unsimulated_ms / self.step_ms;
        self.unsimulated_ms -= due * self.step_ms;

        let due = u32::try_from(due).unwrap_or(u32::MAX);
        match self.max_catch_up {
            Some(max) if due > max => {
                let dropped = due - max;
                self.dropped_steps += u64::from(dropped);
                log::warn!("Simulation fell behind, dropped {dropped} steps");
                max
            }
            _ => due,
        }
    }

    /// Mark the start of a frame at `now_ms` and return how many steps it must simulate.
    pub fn begin_frame(&mut self, now_ms: u64) -> u32 {
        let elapsed = self
            .frame_start_ms
            .map_or(0, |start| now_ms.saturating_sub(start));
        self.frame_start_ms = Some(now_ms);
        self.accumulate(elapsed)
    }

    /// How long to sleep at `now_ms` to keep the frame within one step's budget.
    /// `None` when the frame already used its budget.
    pub fn end_frame(&self, now_ms: u64) -> Option<Duration> {
        let start = self.frame_start_ms?;
        let spent = now_ms.saturating_sub(start);
        (spent < self.step_ms).then(|| Duration::from_millis(self.step_ms - spent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_frames_take_one_step_each() {
        let mut s = FrameScheduler::new(16);
        assert_eq!(s.begin_frame(1000), 0);
        let steps: Vec<u32> = [16, 16, 16].iter().map(|&dt| s.accumulate(dt)).collect();
        assert_eq!(steps, vec![1, 1, 1]);
        assert_eq!(s.remainder_ms(), 0);
    }

    #[test]
    fn remainder_carries_forward() {
        let mut s = FrameScheduler::new(16);
        assert_eq!(s.accumulate(10), 0);
        assert_eq!(s.remainder_ms(), 10);
        assert_eq!(s.accumulate(10), 1);
        assert_eq!(s.remainder_ms(), 4);
        assert_eq!(s.accumulate(100), 6);
        assert_eq!(s.remainder_ms(), 8);
    }

    #[test]
    fn elapsed_time_is_conserved() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let mut s = FrameScheduler::new(16);
        let (mut elapsed, mut simulated) = (0u64, 0u64);
        for _ in 0..10_000 {
            let dt = rng.u64(0..80);
            elapsed += dt;
            simulated += u64::from(s.accumulate(dt));
            assert!(simulated * 16 <= elapsed);
            assert!(elapsed - simulated * 16 < 16);
            assert_eq!(elapsed - simulated * 16, s.remainder_ms());
        }
    }

    #[test]
    fn catch_up_limit_drops_whole_steps_only() {
        let mut s = FrameScheduler::new(16).with_catch_up_limit(4);
        // A 1 second stall
        assert_eq!(s.accumulate(1000), 4);
        assert_eq!(s.dropped_steps(), 58);
        assert_eq!(s.remainder_ms(), 8);
        assert_eq!(s.accumulate(16), 1);
    }

    #[test]
    fn sleeps_only_when_under_budget() {
        let mut s = FrameScheduler::new(16);
        assert_eq!(s.end_frame(5), None, "no frame started yet");
        s.begin_frame(100);
        assert_eq!(s.end_frame(105), Some(Duration::from_millis(11)));
        assert_eq!(s.end_frame(116), None);
        assert_eq!(s.end_frame(140), None);

        // The next frame starts after the sleep and sees the whole frame time
        assert_eq!(s.begin_frame(116), 1);
        assert_eq!(s.remainder_ms(), 0);
    }
}
