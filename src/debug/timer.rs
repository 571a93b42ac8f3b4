use instant::Instant;

/// Which phase of a frame is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FramePhase {
    Input = 0,
    Simulation = 1,
    Draw = 2,
}

impl FramePhase {
    pub const ALL: [FramePhase; 3] = [Self::Input, Self::Simulation, Self::Draw];

    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Simulation => "Sim",
            Self::Draw => "Draw",
        }
    }
}

/// Per-phase timing with exponential moving average smoothing.
pub struct PhaseTimers {
    /// EMA-smoothed duration in microseconds per phase.
    pub durations_us: [f64; 3],
    /// Timestamp when `begin()` was called.
    start: Instant,
}

const EMA_ALPHA: f64 = 0.1;

impl PhaseTimers {
    pub fn new() -> Self {
        Self {
            durations_us: [0.0; 3],
            start: Instant::now(),
        }
    }

    /// Call before a phase runs.
    pub fn begin(&mut self) {
        self.start = Instant::now();
    }

    /// Call after a phase finishes. Records elapsed time for `phase`.
    pub fn end(&mut self, phase: FramePhase) {
        let elapsed_us = self.start.elapsed().as_secs_f64() * 1_000_000.0;
        self.record(phase, elapsed_us);
    }

    fn record(&mut self, phase: FramePhase, elapsed_us: f64) {
        let idx = phase as usize;
        self.durations_us[idx] =
            self.durations_us[idx] * (1.0 - EMA_ALPHA) + elapsed_us * EMA_ALPHA;
    }

    /// Sum of all phase durations (microseconds).
    pub fn total_us(&self) -> f64 {
        self.durations_us.iter().sum()
    }

    /// One-line summary, e.g. `Input 12us | Sim 840us | Draw 95us`.
    pub fn summary(&self) -> String {
        FramePhase::ALL
            .iter()
            .map(|p| format!("{} {:.0}us", p.label(), self.durations_us[*p as usize]))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_converges_towards_samples() {
        let mut t = PhaseTimers::new();
        t.record(FramePhase::Simulation, 100.0);
        assert!((t.durations_us[1] - 10.0).abs() < 1e-9);
        for _ in 0..200 {
            t.record(FramePhase::Simulation, 100.0);
        }
        assert!((t.durations_us[1] - 100.0).abs() < 1e-3);
        assert_eq!(t.durations_us[0], 0.0);
        assert!((t.total_us() - t.durations_us[1]).abs() < 1e-9);
        assert!(t.summary().starts_with("Input 0us | Sim 100us"));
    }
}
