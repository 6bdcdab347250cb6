use cgmath::Point3;
use std::time::Instant;

pub trait Interpolatable {
    fn interpolate(self, other: Self, factor: f32) -> Self;
}

impl Interpolatable for Point3<f32> {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        let diff = other - self;
        self + diff * factor
    }
}

/// Given two values p1 and p2, estimates a relative value R such that `p1 + (p2 - p1) * R == iso`.
/// The result is clamped to `[0, 1]`; nearly equal values give the midpoint.
pub fn interpolation_factor(p1: f32, p2: f32, iso: f32) -> f32 {
    let denom = p2 - p1;
    if denom.abs() < 1e-12 {
        0.5
    } else {
        ((iso - p1) / denom).clamp(0., 1.)
    }
}

/// Measures one phase of an extraction and logs it when dropped, along with how many items the
/// phase produced if [`record`](Self::record) was called.
///
/// ```text
/// Segmentation: 1.204ms (3120 strips)
/// ```
pub struct PhaseTimer {
    phase: &'static str,
    level: log::Level,
    start: Instant,
    produced: Option<(usize, &'static str)>,
}

impl PhaseTimer {
    /// A timer for a pipeline phase, logged at DEBUG level.
    pub fn debug(phase: &'static str) -> Self {
        Self::at(log::Level::Debug, phase)
    }

    /// A timer for a step inside a phase, logged at TRACE level.
    pub fn trace(phase: &'static str) -> Self {
        Self::at(log::Level::Trace, phase)
    }

    fn at(level: log::Level, phase: &'static str) -> Self {
        Self {
            phase,
            level,
            start: Instant::now(),
            produced: None,
        }
    }

    /// Sets the item count reported with the timing. A later call replaces the earlier one.
    pub fn record(&mut self, count: usize, unit: &'static str) {
        self.produced = Some((count, unit));
    }

    fn message(&self) -> String {
        let elapsed = self.start.elapsed();
        match self.produced {
            Some((count, unit)) => format!("{}: {:.3?} ({} {})", self.phase, elapsed, count, unit),
            None => format!("{}: {:.3?}", self.phase, elapsed),
        }
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if log::log_enabled!(self.level) {
            log::log!(self.level, "{}", self.message());
        }
    }
}
