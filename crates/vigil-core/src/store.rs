//! Fixed-capacity rolling window of samples.
//!
//! The store keeps the most recent `capacity` samples in timestamp order and
//! silently evicts the oldest one when a new sample arrives on a full window.
//!
//! Schema policy: a store may declare a field set. Every declared field must
//! be present in an appended sample (a subset is rejected); extra fields are
//! accepted and kept (a superset is fine). A store without a declared field
//! set accepts any sample.

use std::collections::{BTreeSet, VecDeque};

use crate::error::{Result, VigilError};
use crate::sample::Sample;

/// Largest window a store accepts.
pub const MAX_CAPACITY: usize = 100_000;

/// Rolling FIFO window of [`Sample`]s.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: VecDeque<Sample>,
    capacity: usize,
    schema: Option<BTreeSet<String>>,
}

impl SampleStore {
    /// Create a store that accepts any field set.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(VigilError::invalid_config("store capacity must be at least 1"));
        }
        if capacity > MAX_CAPACITY {
            return Err(VigilError::invalid_config(format!(
                "store capacity {capacity} exceeds the maximum of {MAX_CAPACITY}"
            )));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            schema: None,
        })
    }

    /// Create a store that requires every field in `fields`.
    pub fn with_schema<I, S>(capacity: usize, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::new(capacity)?;
        let schema: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        if !schema.is_empty() {
            store.schema = Some(schema);
        }
        Ok(store)
    }

    /// Check a sample against the ordering and schema invariants without storing it.
    pub fn validate(&self, sample: &Sample) -> Result<()> {
        if let Some(last) = self.samples.back()
            && sample.timestamp() < last.timestamp()
        {
            return Err(VigilError::invalid_sample(format!(
                "clock regression: timestamp {} precedes last stored {}",
                sample.timestamp(),
                last.timestamp()
            )));
        }

        if let Some((name, value)) = sample.fields().iter().find(|(_, v)| !v.is_finite()) {
            return Err(VigilError::invalid_sample(format!(
                "field '{name}' is not finite ({value})"
            )));
        }

        if let Some(schema) = &self.schema {
            let missing: Vec<&str> = schema
                .iter()
                .filter(|f| !sample.contains(f))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(VigilError::invalid_sample(format!(
                    "incompatible schema: missing field(s) {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Append a sample, returning the evicted oldest sample when the window was full.
    pub fn append(&mut self, sample: Sample) -> Result<Option<Sample>> {
        self.validate(&sample)?;
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        Ok(evicted)
    }

    /// Ordered copy of the window, oldest first. Never the live buffer.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Declared field set, if any.
    pub fn schema(&self) -> Option<&BTreeSet<String>> {
        self.schema.as_ref()
    }

    /// Drop every sample. Capacity and schema are kept.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(ts: u64, value: f64) -> Sample {
        Sample::new(ts).with("cpu", value)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SampleStore::new(0).unwrap_err();
        assert!(matches!(err, VigilError::InvalidConfig { .. }));
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        assert!(SampleStore::new(MAX_CAPACITY).is_ok());
        let err = SampleStore::new(MAX_CAPACITY + 1).unwrap_err();
        assert!(matches!(err, VigilError::InvalidConfig { .. }));
        assert!(SampleStore::new(usize::MAX).is_err());
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SampleStore::new(30).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.capacity(), 30);
        assert!(store.last().is_none());
        assert!(store.schema().is_none());
    }

    #[test]
    fn test_empty_schema_means_no_schema() {
        let store = SampleStore::with_schema(3, Vec::<String>::new()).unwrap();
        assert!(store.schema().is_none());
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    #[test]
    fn test_bounded_buffer_keeps_most_recent() {
        let mut store = SampleStore::new(5).unwrap();
        for i in 0..12u64 {
            store.append(cpu(i, i as f64)).unwrap();
            assert!(store.len() <= 5);
        }
        assert_eq!(store.len(), 5);
        let kept: Vec<u64> = store.snapshot().iter().map(Sample::timestamp).collect();
        assert_eq!(kept, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_append_returns_evicted_sample() {
        let mut store = SampleStore::new(2).unwrap();
        assert!(store.append(cpu(1, 10.0)).unwrap().is_none());
        assert!(store.append(cpu(2, 20.0)).unwrap().is_none());
        let evicted = store.append(cpu(3, 30.0)).unwrap().unwrap();
        assert_eq!(evicted.get("cpu"), Some(10.0));
    }

    #[test]
    fn test_capacity_one() {
        let mut store = SampleStore::new(1).unwrap();
        store.append(cpu(1, 1.0)).unwrap();
        store.append(cpu(2, 2.0)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().get("cpu"), Some(2.0));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_clock_regression_rejected() {
        let mut store = SampleStore::new(3).unwrap();
        store.append(cpu(100, 1.0)).unwrap();
        let err = store.append(cpu(99, 2.0)).unwrap_err();
        assert!(matches!(err, VigilError::InvalidSample { .. }));
        assert!(err.to_string().contains("clock regression"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_equal_timestamps_accepted() {
        let mut store = SampleStore::new(3).unwrap();
        store.append(cpu(100, 1.0)).unwrap();
        store.append(cpu(100, 2.0)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let mut store = SampleStore::new(3).unwrap();
        let err = store.append(cpu(1, f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("not finite"));
        assert!(store.append(cpu(1, f64::INFINITY)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_schema_rejects_subset() {
        let mut store = SampleStore::with_schema(3, ["cpu", "memory"]).unwrap();
        let err = store.append(cpu(1, 10.0)).unwrap_err();
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_schema_accepts_superset() {
        let mut store = SampleStore::with_schema(3, ["cpu"]).unwrap();
        let s = Sample::new(1).with("cpu", 10.0).with("temperature", 60.0);
        store.append(s).unwrap();
        assert_eq!(store.last().unwrap().get("temperature"), Some(60.0));
    }

    // -----------------------------------------------------------------------
    // Snapshot isolation
    // -----------------------------------------------------------------------

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut store = SampleStore::new(3).unwrap();
        store.append(cpu(1, 10.0)).unwrap();
        let snap = store.snapshot();
        store.append(cpu(2, 20.0)).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear_keeps_capacity_and_schema() {
        let mut store = SampleStore::with_schema(3, ["cpu"]).unwrap();
        store.append(cpu(5, 1.0)).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 3);
        assert!(store.schema().is_some());
        // An older timestamp is fine after a reset.
        store.append(cpu(1, 1.0)).unwrap();
    }
}
