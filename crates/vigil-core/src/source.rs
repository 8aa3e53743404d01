//! Sample producers consumed by a session on every tick.
//!
//! A [`SampleSource`] gets the previous sample (if any) and returns the next
//! one. [`RandomWalkSource`] reproduces the bounded random-walk simulation
//! used by the built-in profiles; [`FnSource`] adapts any closure.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};
use crate::sample::{Sample, unix_ms_now};

/// Producer of samples for one subject.
pub trait SampleSource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Produce the next sample given the one produced before it.
    fn produce_sample(&mut self, previous: Option<&Sample>) -> Sample;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn produce_sample(&mut self, previous: Option<&Sample>) -> Sample {
        (**self).produce_sample(previous)
    }
}

// ---------------------------------------------------------------------------
// Random walk
// ---------------------------------------------------------------------------

/// How a simulated field evolves between samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkKind {
    /// Moves by a uniform step in `[-step, +step)`, clamped to the bounds.
    #[default]
    Gauge,
    /// Grows by a whole number in `[0, step)`.
    Counter,
}

/// Simulation parameters for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWalk {
    #[serde(default)]
    pub kind: WalkKind,
    pub start: f64,
    pub step: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl FieldWalk {
    pub fn gauge(start: f64, step: f64, min: f64, max: f64) -> Self {
        Self {
            kind: WalkKind::Gauge,
            start,
            step,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn counter(start: f64, step: f64) -> Self {
        Self {
            kind: WalkKind::Counter,
            start,
            step,
            min: None,
            max: None,
        }
    }

    /// Replace the clamping bounds; `None` leaves that side open.
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    fn validate(&self, field: &str) -> Result<()> {
        if !self.start.is_finite() || !self.step.is_finite() || self.step < 0.0 {
            return Err(VigilError::invalid_config(format!(
                "walk for '{field}' needs a finite start and a non-negative step"
            )));
        }
        if let (Some(lo), Some(hi)) = (self.min, self.max)
            && lo > hi
        {
            return Err(VigilError::invalid_config(format!(
                "walk for '{field}' has min {lo} above max {hi}"
            )));
        }
        Ok(())
    }

    fn clamp(&self, v: f64) -> f64 {
        let v = self.min.map_or(v, |lo| v.max(lo));
        self.max.map_or(v, |hi| v.min(hi))
    }

    fn next(&self, previous: Option<f64>, rng: &mut StdRng) -> f64 {
        let Some(prev) = previous else {
            return self.clamp(self.start);
        };
        match self.kind {
            WalkKind::Gauge => {
                let delta = rng.random::<f64>() * 2.0 * self.step - self.step;
                self.clamp(prev + delta)
            }
            WalkKind::Counter => self.clamp(prev + (rng.random::<f64>() * self.step).floor()),
        }
    }
}

/// Bounded random-walk simulator over a set of fields.
#[derive(Debug)]
pub struct RandomWalkSource {
    name: String,
    fields: BTreeMap<String, FieldWalk>,
    rng: StdRng,
    /// `(start, step)` for synthetic timestamps instead of the wall clock.
    synthetic_clock: Option<(u64, u64)>,
}

impl RandomWalkSource {
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, FieldWalk>) -> Result<Self> {
        for (field, walk) in &fields {
            walk.validate(field)?;
        }
        Ok(Self {
            name: name.into(),
            fields,
            rng: StdRng::from_os_rng(),
            synthetic_clock: None,
        })
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Emit `start`, `start + step_ms`, ... instead of wall-clock timestamps.
    pub fn with_synthetic_clock(mut self, start: u64, step_ms: u64) -> Self {
        self.synthetic_clock = Some((start, step_ms));
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldWalk> {
        &self.fields
    }

    fn next_timestamp(&self, previous: Option<&Sample>) -> u64 {
        let last = previous.map(Sample::timestamp);
        match (self.synthetic_clock, last) {
            (Some((start, _)), None) => start,
            (Some((_, step)), Some(ts)) => ts.saturating_add(step),
            (None, last) => unix_ms_now().max(last.unwrap_or(0)),
        }
    }
}

impl SampleSource for RandomWalkSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce_sample(&mut self, previous: Option<&Sample>) -> Sample {
        let mut sample = Sample::new(self.next_timestamp(previous));
        for (field, walk) in &self.fields {
            let prev = previous.and_then(|p| p.get(field));
            sample = sample.with(field.clone(), walk.next(prev, &mut self.rng));
        }
        sample
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Wraps a closure as a [`SampleSource`].
pub struct FnSource<F> {
    name: String,
    produce: F,
}

impl<F> FnSource<F>
where
    F: FnMut(Option<&Sample>) -> Sample + Send,
{
    pub fn new(name: impl Into<String>, produce: F) -> Self {
        Self {
            name: name.into(),
            produce,
        }
    }
}

impl<F> SampleSource for FnSource<F>
where
    F: FnMut(Option<&Sample>) -> Sample + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn produce_sample(&mut self, previous: Option<&Sample>) -> Sample {
        (self.produce)(previous)
    }
}

impl<F> std::fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSource").field("name", &self.name).finish()
    }
}
