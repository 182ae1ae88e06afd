use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    /// Creates a new time sample.
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
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
    frame: u64,
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
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    /// Constructs a fixed time source that always returns the provided time.
    pub fn new(time: f32) -> Self {
        Self { time, frame: 0 }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Supplies the animation progress that drives the distortion collapse.
///
/// Called once per frame on the render thread; implementations return the
/// latest value they know about.
pub trait ProgressSource {
    fn progress(&mut self) -> f32;
}

impl<F> ProgressSource for F
where
    F: FnMut() -> f32,
{
    fn progress(&mut self) -> f32 {
        self()
    }
}

pub type BoxedProgressSource = Box<dyn ProgressSource>;

/// Clamps a progress value into `[0, 1]`; NaN collapses to 0.
pub fn clamp_progress(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantProgress(pub f32);

impl ProgressSource for ConstantProgress {
    fn progress(&mut self) -> f32 {
        self.0
    }
}

/// Progress fed from another thread. The channel holds at most one pending
/// value, so a renderer that stops drawing never lets it grow.
#[derive(Debug)]
pub struct ChannelProgress {
    rx: Receiver<f32>,
    latest: f32,
    // dropped with the reader; the sender watches it for disconnection
    _alive: Sender<()>,
}

impl ChannelProgress {
    pub fn new(initial: f32) -> (ProgressSender, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let (alive_tx, alive_rx) = crossbeam_channel::bounded(0);
        (
            ProgressSender {
                tx,
                evict: rx.clone(),
                reader: alive_rx,
            },
            Self {
                rx,
                latest: clamp_progress(initial),
                _alive: alive_tx,
            },
        )
    }
}

impl ProgressSource for ChannelProgress {
    fn progress(&mut self) -> f32 {
        if let Ok(value) = self.rx.try_recv() {
            self.latest = clamp_progress(value);
        }
        self.latest
    }
}

/// Producer half of [`ChannelProgress`].
#[derive(Debug)]
pub struct ProgressSender {
    tx: Sender<f32>,
    evict: Receiver<f32>,
    reader: Receiver<()>,
}

impl ProgressSender {
    /// Replaces any value the reader has not taken yet with `value`.
    ///
    /// Returns `false` once the [`ChannelProgress`] has been dropped.
    pub fn publish(&self, value: f32) -> bool {
        if let Err(TryRecvError::Disconnected) = self.reader.try_recv() {
            return false;
        }
        let _stale = self.evict.try_recv();
        self.tx.try_send(value).is_ok()
    }
}
