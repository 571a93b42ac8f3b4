//! Frame performance diagnostics: the on-screen FPS/idle line, per-phase
//! timers and the periodic frame statistics log.

pub mod timer;

use std::collections::VecDeque;

use instant::Instant;

/// How many milliseconds of past frames the FPS line is computed over.
const PERF_TICKS_WINDOW: u64 = 1000;
/// How often to log frame statistics (seconds).
const FPS_LOG_INTERVAL: f64 = 5.0;

/// Rolling window of recent frames: (total ms, idle ms) each.
#[derive(Debug, Default)]
pub struct Performance {
    frames: VecDeque<(u64, u64)>,
}

impl Performance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame that took `total_ms`, of which `idle_ms` were spent sleeping.
    pub fn record_frame(&mut self, total_ms: u64, idle_ms: u64) {
        self.frames.push_back((total_ms, idle_ms));
        // Keep just enough frames to cover the window
        let mut sum: u64 = self.frames.iter().map(|f| f.0).sum();
        while let Some(&(front, _)) = self.frames.front() {
            if sum - front > PERF_TICKS_WINDOW {
                sum -= front;
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn info(&self) -> String {
        let (total, idle) = self
            .frames
            .iter()
            .fold((0u64, 0u64), |(t, i), f| (t + f.0, i + f.1));
        if total < PERF_TICKS_WINDOW {
            return "CALCULATING FPS...".to_owned();
        }
        let fps = self.frames.len() as f64 * 1000.0 / total as f64;
        let idle_pct = idle as f64 * 100.0 / total as f64;
        format!("FPS:{fps:4.2} IDLE:{idle_pct:4.2}%")
    }
}

/// Logs frame timing every `FPS_LOG_INTERVAL` seconds.
pub struct FrameStats {
    frame_count: u64,
    last_log_time: Instant,
    frame_time_sum: f64,
    frame_time_min: f64,
    frame_time_max: f64,
    frames_since_log: u32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            last_log_time: Instant::now(),
            frame_time_sum: 0.0,
            frame_time_min: f64::MAX,
            frame_time_max: 0.0,
            frames_since_log: 0,
        }
    }

    pub fn record_frame(&mut self, dt: f64) {
        self.frame_count += 1;
        self.frames_since_log += 1;
        self.frame_time_sum += dt;
        self.frame_time_min = self.frame_time_min.min(dt);
        self.frame_time_max = self.frame_time_max.max(dt);

        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed >= FPS_LOG_INTERVAL {
            let avg_ms = (self.frame_time_sum / self.frames_since_log as f64) * 1000.0;
            let fps = self.frames_since_log as f64 / elapsed;
            log::info!(
                "FPS: {:.0} | avg: {:.2}ms | min: {:.2}ms | max: {:.2}ms | total frames: {}",
                fps,
                avg_ms,
                self.frame_time_min * 1000.0,
                self.frame_time_max * 1000.0,
                self.frame_count,
            );
            self.last_log_time = Instant::now();
            self.frame_time_sum = 0.0;
            self.frame_time_min = f64::MAX;
            self.frame_time_max = 0.0;
            self.frames_since_log = 0;
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
