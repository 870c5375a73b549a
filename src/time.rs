//! Simulation clock.
//!
//! Everything in the engine is driven by a [`FrameTime`]: the current clock
//! value, which becomes the birth time of particles emitted this frame, and
//! the delta since the previous frame, which advances emitter schedules.
//! The lifecycle evaluator must see the same `time` the emitters saw.
//!
//! # Example
//!
//! ```ignore
//! use pixie::time::Clock;
//!
//! let mut clock = Clock::new();
//!
//! // In your render loop:
//! let frame = clock.update();
//! engine.frame(frame);
//!
//! // Headless or in tests:
//! let frame = clock.advance(1.0 / 60.0);
//! ```

use std::time::{Duration, Instant};

/// Clock value and step for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Simulation seconds since the clock started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
}

impl FrameTime {
    /// Create a frame time.
    pub const fn new(time: f32, delta: f32) -> Self {
        Self { time, delta }
    }
}

/// Frame clock with pause, time scale and optional fixed step.
///
/// Simulation time is accumulated from scaled deltas, so pausing or
/// changing the scale never makes it jump.
#[derive(Debug)]
pub struct Clock {
    /// When the last frame occurred.
    last_frame: Instant,
    /// Accumulated simulation time in seconds.
    elapsed_secs: f32,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Fixed delta time for deterministic updates (optional).
    fixed_delta: Option<f32>,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
    /// Upper bound on a single real-time step, so a stalled window does not
    /// release a whole schedule at once.
    max_delta: f32,
}

impl Clock {
    /// Create a clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
            max_delta: 0.25,
        }
    }

    /// Sample the wall clock. Call once per frame.
    pub fn update(&mut self) -> FrameTime {
        let now = Instant::now();
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        let step = self.fixed_delta.unwrap_or(raw_delta.min(self.max_delta));
        self.advance(step)
    }

    /// Step the clock by `delta` seconds (scaled, ignored while paused).
    pub fn advance(&mut self, delta: f32) -> FrameTime {
        self.delta_secs = if self.paused {
            0.0
        } else {
            delta.max(0.0) * self.time_scale
        };
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;
        self.frame_time()
    }

    /// Current frame time without advancing.
    pub fn frame_time(&self) -> FrameTime {
        FrameTime::new(self.elapsed_secs, self.delta_secs)
    }

    /// Total simulation time in seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Time since last frame in seconds (delta time).
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Whether time is currently paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current time scale multiplier.
    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Toggle pause state. While paused, `delta()` is 0 and time stands still.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("clock {}", if self.paused { "paused" } else { "resumed" });
    }

    /// Set a fixed delta time for deterministic updates.
    ///
    /// Pass `None` to use real frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Set time scale multiplier.
    ///
    /// - `1.0` = normal speed
    /// - `0.5` = half speed (slow motion)
    /// - `2.0` = double speed
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = Clock::new();
        assert_eq!(clock.frame(), 0);
        assert!(!clock.is_paused());
        assert_eq!(clock.time_scale(), 1.0);
        assert_eq!(clock.frame_time(), FrameTime::default());
    }

    #[test]
    fn test_clock_update() {
        let mut clock = Clock::new();
        thread::sleep(Duration::from_millis(10));
        let frame = clock.update();

        assert!(frame.time > 0.0);
        assert!(frame.delta > 0.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_advance_accumulates() {
        let mut clock = Clock::new();
        clock.advance(0.5);
        let frame = clock.advance(0.25);
        assert_eq!(frame, FrameTime::new(0.75, 0.25));
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = Clock::new();
        clock.advance(1.0);
        clock.toggle_pause();
        let frame = clock.advance(1.0);
        assert_eq!(frame, FrameTime::new(1.0, 0.0));

        clock.toggle_pause();
        assert_eq!(clock.advance(1.0).time, 2.0);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = Clock::new();
        clock.set_time_scale(2.0);
        assert_eq!(clock.advance(0.5).delta, 1.0);

        // Negative scale should clamp to 0
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta() {
        let mut clock = Clock::new();
        clock.set_fixed_delta(Some(1.0 / 60.0));

        thread::sleep(Duration::from_millis(50));
        clock.update();

        let expected = 1.0 / 60.0;
        assert!((clock.delta() - expected).abs() < 0.0001);
    }
}
