//! Frame-synchronized render loop.
//!
//! The host calls [`RenderScheduler::on_frame`] whenever the display is ready
//! for a new frame (the terminal loop paces this with [`FramePacer`]). Each
//! tick that finds a pending request pulls one [`AnalysisFrame`], draws it,
//! and requests the next tick. Cancellation drops the frame source, so a tick
//! can never read from a released input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::surface::Surface;
use super::visualizations::Visualization;
use crate::analysis::{AnalysisFrame, FrameSource};

/// Shared flag that is true only while the owning recording session is recording.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, live: bool) {
        self.0.store(live, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cooperative scheduler that draws at most one frame per host tick.
pub struct RenderScheduler<S: Surface> {
    strategy: Box<dyn Visualization>,
    surface: S,
    source: Option<Box<dyn FrameSource>>,
    liveness: Option<Liveness>,
    pending: bool,
    frames: u64,
    last_tick: Option<Instant>,
    last_delta: Duration,
    level: u8,
}

impl<S: Surface> RenderScheduler<S> {
    pub fn new(strategy: Box<dyn Visualization>, surface: S) -> Self {
        Self {
            strategy,
            surface,
            source: None,
            liveness: None,
            pending: false,
            frames: 0,
            last_tick: None,
            last_delta: Duration::ZERO,
            level: 0,
        }
    }

    /// Begins requesting ticks that sample `source` while `liveness` holds.
    pub fn start(&mut self, source: Box<dyn FrameSource>, liveness: Liveness) {
        self.cancel();
        tracing::debug!("Render loop started with {} strategy", self.strategy.name());
        self.source = Some(source);
        self.liveness = Some(liveness);
        self.pending = true;
    }

    /// Stops all future ticks and drops the frame source.
    ///
    /// Returns `false` when nothing was scheduled, so repeated calls are no-ops.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.pending || self.source.is_some();
        self.pending = false;
        self.source = None;
        self.liveness = None;
        self.last_tick = None;
        self.level = 0;
        if was_running {
            tracing::debug!("Render loop cancelled after {} frames", self.frames);
        }
        was_running
    }

    /// Whether a tick has been requested.
    pub fn is_scheduled(&self) -> bool {
        self.pending
    }

    /// Runs one tick. Returns `true` if a frame was drawn.
    ///
    /// Taking `&mut self` means two ticks can never draw at once; a host that
    /// shares the scheduler across threads has to lock it first.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;

        if !self.liveness.as_ref().is_some_and(Liveness::is_live) {
            tracing::debug!("Dropping stale frame tick: session is no longer recording");
            self.cancel();
            return false;
        }

        let Some(source) = self.source.as_mut() else {
            return false;
        };
        let frame = AnalysisFrame {
            frequency: source.sample_frequency(),
            time: source.sample_time(),
        };
        self.strategy.draw(&mut self.surface, &frame);
        self.level = frame.level();

        if let Some(previous) = self.last_tick {
            self.last_delta = now.saturating_duration_since(previous);
        }
        self.last_tick = Some(now);
        self.frames += 1;
        self.pending = true;
        true
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Frames drawn since construction.
    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    /// Measured interval between the two most recent frames.
    pub fn last_frame_interval(&self) -> Duration {
        self.last_delta
    }

    /// Input level of the most recent frame, 0-100.
    pub fn level(&self) -> u8 {
        self.level
    }
}

/// Paces host ticks to a target refresh rate without busy-waiting.
///
/// The host sleeps (or polls for input) for [`FramePacer::until_next_frame`]
/// and then asks [`FramePacer::frame_due`].
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(frame_rate: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / frame_rate.clamp(1, 240) as f64);
        Self {
            interval,
            next: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left before the next frame is due.
    pub fn until_next_frame(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    /// Returns `true` and schedules the following frame if one is due at `now`.
    ///
    /// A host that fell behind skips the missed frames instead of bursting.
    pub fn frame_due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }
}
