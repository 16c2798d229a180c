use std::time::{Duration, Instant};

use crate::types::RendererConfig;

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
}

impl TimeSample {
    pub fn new(seconds: f32) -> Self {
        Self { seconds }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    /// Creates a system time source initialised to `Instant::now()`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.origin.elapsed().as_secs_f32())
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    /// Constructs a fixed time source that always returns the provided time.
    pub fn new(time: f32) -> Self {
        Self {
            time: time.max(0.0),
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time)
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds the time source requested by the renderer configuration.
pub fn time_source_for(config: &RendererConfig) -> BoxedTimeSource {
    match config.fixed_time {
        Some(time) => Box::new(FixedTimeSource::new(time)),
        None => Box::new(SystemTimeSource::new()),
    }
}

/// Paces redraws to a target frame rate.
///
/// The scheduler keeps a single due time. A frame is due once `now` reaches
/// it; rendering advances it by one interval, or re-anchors it to `now` when
/// the loop has fallen more than one interval behind so a stall does not
/// trigger a burst of catch-up frames.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    next_due: Option<Instant>,
}

impl FrameScheduler {
    /// Creates a scheduler targeting `fps` frames per second.
    ///
    /// Non-positive or non-finite rates fall back to one frame per second.
    pub fn new(fps: f32) -> Self {
        Self {
            interval: interval_for(fps),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Changes the target rate; the current due time is kept.
    pub fn set_target_fps(&mut self, fps: f32) {
        self.interval = interval_for(fps);
    }

    /// Returns true when a new frame should be drawn at `now`.
    pub fn ready_for_frame(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// Instant at which the next frame becomes due, if one has been drawn.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Records that a frame was drawn at `now`.
    pub fn mark_rendered(&mut self, now: Instant) {
        let next = match self.next_due {
            Some(due) if now.saturating_duration_since(due) < self.interval => due + self.interval,
            _ => now + self.interval,
        };
        self.next_due = Some(next);
    }
}

fn interval_for(fps: f32) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(1.0 / f64::from(fps))
    } else {
        tracing::warn!(fps, "invalid frame rate; falling back to 1 fps");
        Duration::from_secs(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_due_immediately() {
        let scheduler = FrameScheduler::new(30.0);
        assert!(scheduler.ready_for_frame(Instant::now()));
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn frames_are_spaced_by_interval() {
        let mut scheduler = FrameScheduler::new(30.0);
        let start = Instant::now();
        scheduler.mark_rendered(start);
        let interval = scheduler.interval();
        assert_eq!(scheduler.next_deadline(), Some(start + interval));
        assert!(!scheduler.ready_for_frame(start + interval / 2));
        assert!(scheduler.ready_for_frame(start + interval));

        // Slightly late frames keep the original cadence.
        let late = start + interval + Duration::from_millis(2);
        scheduler.mark_rendered(late);
        assert_eq!(scheduler.next_deadline(), Some(start + interval * 2));
    }

    #[test]
    fn stalls_reanchor_instead_of_bursting() {
        let mut scheduler = FrameScheduler::new(30.0);
        let start = Instant::now();
        scheduler.mark_rendered(start);
        let interval = scheduler.interval();
        let stalled = start + interval * 10;
        scheduler.mark_rendered(stalled);
        assert_eq!(scheduler.next_deadline(), Some(stalled + interval));
    }

    #[test]
    fn retargeting_changes_interval() {
        let mut scheduler = FrameScheduler::new(30.0);
        scheduler.set_target_fps(60.0);
        let expected = Duration::from_secs_f64(1.0 / 60.0);
        assert_eq!(scheduler.interval(), expected);
        scheduler.set_target_fps(0.0);
        assert_eq!(scheduler.interval(), Duration::from_secs(1));
    }

    #[test]
    fn fixed_time_source_never_advances() {
        let mut source = FixedTimeSource::new(2.5);
        assert_eq!(source.sample(), TimeSample::new(2.5));
        assert_eq!(source.sample(), TimeSample::new(2.5));
        source.reset();
        assert_eq!(source.sample(), TimeSample::new(2.5));
        assert_eq!(FixedTimeSource::new(-1.0).sample().seconds, 0.0);
    }

    #[test]
    fn system_time_source_is_monotonic() {
        let mut source = SystemTimeSource::new();
        let first = source.sample();
        let second = source.sample();
        assert!(first.seconds >= 0.0);
        assert!(second.seconds >= first.seconds);
    }

    #[test]
    fn config_selects_time_source() {
        let mut config = RendererConfig::default();
        config.fixed_time = Some(4.0);
        assert_eq!(time_source_for(&config).sample().seconds, 4.0);
    }
}
