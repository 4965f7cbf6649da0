//! Live input handle and the tap bus that fans captured audio out to readers.
//!
//! The device callback is the only writer: it hands every block of mono PCM to
//! [`TapBus::dispatch`], which forwards it to channel taps (the recording
//! session) as immutable [`InputEvent`]s and copies it into window taps (the
//! signal analyzer). Readers never touch the device stream directly.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Locks a mutex, recovering the data if the audio thread panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event posted to a channel tap by the capture callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A block of mono 16-bit PCM in stream order.
    Chunk(Vec<i16>),
    /// The underlying stream failed or ended.
    Ended(String),
}

/// Identifies a tap attached to a [`TapBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapId(u64);

/// Fixed-capacity window over the most recent samples, normalized to [-1, 1].
#[derive(Debug)]
pub struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    /// Creates a window of `capacity` samples, initially silent.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends PCM samples, discarding the oldest to keep the capacity fixed.
    pub fn push(&mut self, data: &[i16]) {
        let skip = data.len().saturating_sub(self.capacity);
        for &sample in &data[skip..] {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample as f32 / 32768.0);
        }
    }

    /// Copies the most recent `out.len()` samples into `out`, oldest first.
    pub fn snapshot(&self, out: &mut [f32]) {
        let start = self.samples.len().saturating_sub(out.len());
        let missing = out.len().saturating_sub(self.samples.len());
        out[..missing].fill(0.0);
        for (slot, &sample) in out[missing..].iter_mut().zip(self.samples.range(start..)) {
            *slot = sample;
        }
    }

    /// Resets the window to silence.
    pub fn clear(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
    }
}

enum TapKind {
    Channel(mpsc::Sender<InputEvent>),
    Window(Arc<Mutex<SampleWindow>>),
}

struct Tap {
    id: TapId,
    kind: TapKind,
}

/// Fan-out point between the device callback and the session's readers.
pub struct TapBus {
    taps: Mutex<Vec<Tap>>,
    released: AtomicBool,
    next_id: AtomicU64,
}

impl Default for TapBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TapBus {
    pub fn new() -> Self {
        Self {
            taps: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    fn attach(&self, kind: TapKind) -> Result<TapId> {
        let mut taps = lock(&self.taps);
        // Checked under the lock so a concurrent release cannot slip in between.
        if self.is_released() {
            return Err(PipelineError::InputReleased);
        }
        let id = TapId(self.next_id.fetch_add(1, Ordering::Relaxed));
        taps.push(Tap { id, kind });
        Ok(id)
    }

    /// Removes a tap. Returns `false` if it was not attached.
    pub fn detach(&self, id: TapId) -> bool {
        let mut taps = lock(&self.taps);
        let before = taps.len();
        taps.retain(|tap| tap.id != id);
        taps.len() != before
    }

    /// Forwards a block of samples to every tap. Called from the device callback.
    pub fn dispatch(&self, data: &[i16]) {
        if data.is_empty() || self.is_released() {
            return;
        }
        let mut taps = lock(&self.taps);
        taps.retain(|tap| match &tap.kind {
            TapKind::Channel(tx) => tx.send(InputEvent::Chunk(data.to_vec())).is_ok(),
            TapKind::Window(window) => {
                lock(window).push(data);
                true
            }
        });
    }

    /// Notifies channel taps that the stream has ended.
    pub fn end(&self, reason: &str) {
        if self.is_released() {
            return;
        }
        let taps = lock(&self.taps);
        for tap in taps.iter() {
            if let TapKind::Channel(tx) = &tap.kind {
                let _ = tx.send(InputEvent::Ended(reason.to_string()));
            }
        }
    }

    /// Marks the bus released and drops all taps. Returns `true` only the first time.
    fn release(&self) -> bool {
        let mut taps = lock(&self.taps);
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        taps.clear();
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn tap_count(&self) -> usize {
        lock(&self.taps).len()
    }
}

/// An exclusively held, open input stream and the taps reading from it.
///
/// Only the capture gateway releases it; dropping an unreleased handle
/// releases it as a last resort so the device never stays open.
pub struct LiveInput {
    id: Uuid,
    device_name: String,
    sample_rate: u32,
    bus: Arc<TapBus>,
    stream: Option<Box<dyn Any>>,
}

impl LiveInput {
    /// Wraps an open stream. `stream` is kept alive until release; dropping it
    /// must stop the underlying tracks.
    pub fn new(
        device_name: impl Into<String>,
        sample_rate: u32,
        bus: Arc<TapBus>,
        stream: Box<dyn Any>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_name: device_name.into(),
            sample_rate,
            bus,
            stream: Some(stream),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Attaches a tap that receives chunk and end-of-stream events in stream order.
    pub fn attach_channel(&self) -> Result<(TapId, mpsc::Receiver<InputEvent>)> {
        let (tx, rx) = mpsc::channel();
        let id = self.bus.attach(TapKind::Channel(tx))?;
        Ok((id, rx))
    }

    /// Attaches a tap that keeps the latest `capacity` samples.
    pub fn attach_window(&self, capacity: usize) -> Result<(TapId, Arc<Mutex<SampleWindow>>)> {
        let window = Arc::new(Mutex::new(SampleWindow::new(capacity)));
        let id = self.bus.attach(TapKind::Window(Arc::clone(&window)))?;
        Ok((id, window))
    }

    pub(crate) fn bus(&self) -> &Arc<TapBus> {
        &self.bus
    }

    pub fn is_released(&self) -> bool {
        self.bus.is_released()
    }

    /// Drops every tap and stops the stream. Returns `true` only the first time.
    pub(crate) fn release(&mut self) -> bool {
        let first = self.bus.release();
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        if first {
            tracing::info!("Live input {} ({}) released", self.id, self.device_name);
        }
        first
    }
}

impl Drop for LiveInput {
    fn drop(&mut self) {
        if !self.is_released() {
            tracing::warn!("Live input {} dropped without release", self.id);
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> LiveInput {
        LiveInput::new("test", 16000, Arc::new(TapBus::new()), Box::new(()))
    }

    #[test]
    fn test_window_keeps_latest_samples() {
        let mut window = SampleWindow::new(4);
        window.push(&[16384, 16384, 16384]);
        window.push(&[-16384, -16384, -16384]);

        let mut out = [0.0; 4];
        window.snapshot(&mut out);
        assert_eq!(out, [0.5, -0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_window_snapshot_pads_with_silence() {
        let mut window = SampleWindow::new(2);
        window.push(&[32767]);
        let mut out = [1.0; 4];
        window.snapshot(&mut out);
        assert_eq!(out[..2], [0.0, 0.0]);
        assert!(out[3] > 0.99);
    }

    #[test]
    fn test_channel_tap_receives_events_in_order() {
        let input = input();
        let (_, rx) = input.attach_channel().unwrap();
        input.bus().dispatch(&[1, 2]);
        input.bus().dispatch(&[3]);
        input.bus().end("unplugged");

        assert_eq!(rx.try_recv().unwrap(), InputEvent::Chunk(vec![1, 2]));
        assert_eq!(rx.try_recv().unwrap(), InputEvent::Chunk(vec![3]));
        assert_eq!(
            rx.try_recv().unwrap(),
            InputEvent::Ended("unplugged".to_string())
        );
    }

    #[test]
    fn test_no_taps_after_release() {
        let mut input = input();
        let (_, rx) = input.attach_channel().unwrap();
        assert!(input.release());
        assert!(!input.release());

        assert!(matches!(
            input.attach_window(8),
            Err(PipelineError::InputReleased)
        ));
        input.bus().dispatch(&[1]);
        assert!(rx.try_recv().is_err());
        assert_eq!(input.bus().tap_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_prunes_tap() {
        let input = input();
        let (_, rx) = input.attach_channel().unwrap();
        drop(rx);
        input.bus().dispatch(&[1]);
        assert_eq!(input.bus().tap_count(), 0);
    }
}
