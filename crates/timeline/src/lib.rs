use std::time::{Duration, Instant};

use fxconfig::{EasingName, KeyframeConfig, RepeatMode, TimelineConfig};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimelineError {
    #[error("timeline needs at least one keyframe")]
    Empty,
    #[error("keyframe at {at:?} has value {value} outside [0, 1]")]
    ValueOutOfRange { at: Duration, value: f32 },
    #[error("two keyframes share the time {0:?}")]
    DuplicateTime(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Step,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => t * t * (3.0 - 2.0 * t),
            Easing::Step => {
                if t >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl From<EasingName> for Easing {
    fn from(name: EasingName) -> Self {
        match name {
            EasingName::Linear => Easing::Linear,
            EasingName::EaseIn => Easing::EaseIn,
            EasingName::EaseOut => Easing::EaseOut,
            EasingName::EaseInOut => Easing::EaseInOut,
            EasingName::Step => Easing::Step,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub at: Duration,
    pub value: f32,
    /// Shapes the segment that starts at this keyframe.
    pub easing: Easing,
}

impl From<&KeyframeConfig> for Keyframe {
    fn from(config: &KeyframeConfig) -> Self {
        Self {
            at: config.at,
            value: config.value,
            easing: config.easing.into(),
        }
    }
}

/// Keyframed progress curve in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    keyframes: Vec<Keyframe>,
    repeat: RepeatMode,
}

impl Timeline {
    pub fn new(mut keyframes: Vec<Keyframe>, repeat: RepeatMode) -> Result<Self, TimelineError> {
        if keyframes.is_empty() {
            return Err(TimelineError::Empty);
        }
        for keyframe in &keyframes {
            if !(0.0..=1.0).contains(&keyframe.value) {
                return Err(TimelineError::ValueOutOfRange {
                    at: keyframe.at,
                    value: keyframe.value,
                });
            }
        }
        keyframes.sort_by_key(|keyframe| keyframe.at);
        if let Some(pair) = keyframes.windows(2).find(|pair| pair[0].at == pair[1].at) {
            return Err(TimelineError::DuplicateTime(pair[0].at));
        }
        Ok(Self { keyframes, repeat })
    }

    pub fn from_config(config: &TimelineConfig) -> Result<Self, TimelineError> {
        Self::new(
            config.keyframes.iter().map(Keyframe::from).collect(),
            config.repeat,
        )
    }

    /// Time of the last keyframe; one pass over the curve.
    pub fn duration(&self) -> Duration {
        self.keyframes
            .last()
            .map(|keyframe| keyframe.at)
            .unwrap_or_default()
    }

    pub fn value_at(&self, elapsed: Duration) -> f32 {
        let local = self.local_time(elapsed);
        let first = self.keyframes[0];
        if local <= first.at {
            return first.value;
        }
        for pair in self.keyframes.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if local <= to.at {
                let span = (to.at - from.at).as_secs_f32();
                let t = (local - from.at).as_secs_f32() / span;
                let eased = from.easing.apply(t);
                return from.value + (to.value - from.value) * eased;
            }
        }
        self.keyframes[self.keyframes.len() - 1].value
    }

    fn local_time(&self, elapsed: Duration) -> Duration {
        let total = self.duration();
        if total.is_zero() {
            return elapsed;
        }
        match self.repeat {
            RepeatMode::Once => elapsed.min(total),
            RepeatMode::Loop => wrap(elapsed, total),
            RepeatMode::PingPong => {
                let phase = wrap(elapsed, total * 2);
                if phase > total {
                    total * 2 - phase
                } else {
                    phase
                }
            }
        }
    }
}

fn wrap(elapsed: Duration, period: Duration) -> Duration {
    let nanos = elapsed.as_nanos() % period.as_nanos();
    Duration::from_nanos(nanos as u64)
}

/// A timeline anchored to a wall-clock start.
#[derive(Debug, Clone)]
pub struct Playhead {
    timeline: Timeline,
    origin: Instant,
}

impl Playhead {
    pub fn start(timeline: Timeline, origin: Instant) -> Self {
        Self { timeline, origin }
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        self.timeline
            .value_at(now.saturating_duration_since(self.origin))
    }

    pub fn sample(&self) -> f32 {
        self.value_at(Instant::now())
    }
}
