//! Pure KPI derivations over a window snapshot.
//!
//! Every function here is a deterministic function of the slice it is given.
//! Empty windows yield `None` rather than dividing by zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::score::{RatioConfig, ScoreConfig};
use crate::sample::Sample;

/// Relative change (in percent) below which a trend is reported as flat.
const FLAT_TOLERANCE_PERCENT: f64 = 0.5;

/// Direction of the latest movement of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Latest movement of a field relative to its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Change from the previous value in percent of the previous value.
    pub change_percent: f64,
}

/// Read-only KPI snapshot computed from a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub current: Option<Sample>,
    pub sample_count: usize,
    /// Window capacity of the store the snapshot came from; 0 for a bare slice.
    #[serde(default)]
    pub capacity: usize,
    pub average: BTreeMap<String, f64>,
    pub peak: BTreeMap<String, f64>,
    pub minimum: BTreeMap<String, f64>,
    pub std_dev: BTreeMap<String, f64>,
    pub ratios: BTreeMap<String, f64>,
    pub scores: BTreeMap<String, f64>,
    pub trends: BTreeMap<String, Trend>,
}

impl DerivedMetrics {
    /// False at session start, before the first sample lands.
    pub fn has_data(&self) -> bool {
        self.current.is_some()
    }
}

/// Latest sample, or `None` on an empty window.
pub fn current(samples: &[Sample]) -> Option<&Sample> {
    samples.last()
}

fn values(samples: &[Sample], field: &str) -> Vec<f64> {
    samples.iter().filter_map(|s| s.get(field)).collect()
}

/// Arithmetic mean of `field` over the samples that carry it.
pub fn average(samples: &[Sample], field: &str) -> Option<f64> {
    let v = values(samples, field);
    if v.is_empty() {
        return None;
    }
    Some(Statistics::mean(&v))
}

/// Maximum of `field`.
pub fn peak(samples: &[Sample], field: &str) -> Option<f64> {
    let v = values(samples, field);
    if v.is_empty() {
        return None;
    }
    Some(Statistics::max(&v))
}

/// Minimum of `field`.
pub fn minimum(samples: &[Sample], field: &str) -> Option<f64> {
    let v = values(samples, field);
    if v.is_empty() {
        return None;
    }
    Some(Statistics::min(&v))
}

/// Sample standard deviation of `field`; needs at least two values.
pub fn std_dev(samples: &[Sample], field: &str) -> Option<f64> {
    let v = values(samples, field);
    if v.len() < 2 {
        return None;
    }
    Some(Statistics::std_dev(&v))
}

/// `round(100 * numerator / total)`, defined as 0 when `total` is 0.
pub fn percentage(numerator: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    (100.0 * numerator / total).round()
}

/// Movement of `field` between its last two observations.
pub fn trend(samples: &[Sample], field: &str) -> Option<Trend> {
    let mut recent = samples.iter().rev().filter_map(|s| s.get(field));
    let latest = recent.next()?;
    let previous = recent.next()?;
    let delta = latest - previous;

    let change_percent = if previous == 0.0 {
        0.0
    } else {
        delta / previous.abs() * 100.0
    };
    let flat = if previous == 0.0 {
        delta.abs() < f64::EPSILON
    } else {
        change_percent.abs() < FLAT_TOLERANCE_PERCENT
    };

    let direction = if flat {
        TrendDirection::Flat
    } else if delta > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };
    Some(Trend {
        direction,
        change_percent,
    })
}

/// Compute the full KPI snapshot for a window.
pub fn derive(
    samples: &[Sample],
    ratios: &[RatioConfig],
    scores: &[ScoreConfig],
) -> DerivedMetrics {
    let Some(latest) = current(samples) else {
        return DerivedMetrics::default();
    };

    let fields: BTreeSet<&str> = samples.iter().flat_map(Sample::field_names).collect();
    let mut out = DerivedMetrics {
        current: Some(latest.clone()),
        sample_count: samples.len(),
        ..Default::default()
    };

    for field in fields {
        let per_field = [
            (&mut out.average, average(samples, field)),
            (&mut out.peak, peak(samples, field)),
            (&mut out.minimum, minimum(samples, field)),
            (&mut out.std_dev, std_dev(samples, field)),
        ];
        for (map, value) in per_field {
            if let Some(v) = value {
                map.insert(field.to_string(), v);
            }
        }
        if let Some(t) = trend(samples, field) {
            out.trends.insert(field.to_string(), t);
        }
    }

    for ratio in ratios {
        if let Some(v) = ratio.evaluate(latest) {
            out.ratios.insert(ratio.name.clone(), v);
        }
    }
    for score in scores {
        if let Some(v) = score.evaluate(latest) {
            out.scores.insert(score.name.clone(), v);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::score::ScoreComponent;

    fn cpu_series(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(i as u64).with("cpu", v))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Empty window
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_window_has_no_data() {
        let empty: Vec<Sample> = Vec::new();
        assert!(current(&empty).is_none());
        assert_eq!(average(&empty, "cpu"), None);
        assert_eq!(peak(&empty, "cpu"), None);
        assert_eq!(minimum(&empty, "cpu"), None);
        assert_eq!(std_dev(&empty, "cpu"), None);
        assert_eq!(trend(&empty, "cpu"), None);
        let m = derive(&empty, &[], &[]);
        assert!(!m.has_data());
        assert_eq!(m.sample_count, 0);
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    #[test]
    fn test_average_and_peak() {
        let s = cpu_series(&[10.0, 20.0, 90.0]);
        assert_eq!(average(&s, "cpu"), Some(40.0));
        assert_eq!(peak(&s, "cpu"), Some(90.0));
        assert_eq!(minimum(&s, "cpu"), Some(10.0));
        assert_eq!(current(&s).unwrap().get("cpu"), Some(90.0));
    }

    #[test]
    fn test_average_ignores_samples_without_field() {
        let s = vec![
            Sample::new(1).with("cpu", 10.0),
            Sample::new(2).with("memory", 50.0),
            Sample::new(3).with("cpu", 30.0),
        ];
        assert_eq!(average(&s, "cpu"), Some(20.0));
        assert_eq!(average(&s, "disk"), None);
    }

    #[test]
    fn test_std_dev() {
        let s = cpu_series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let sd = std_dev(&s, "cpu").unwrap();
        // Sample (n - 1) standard deviation of the classic series.
        assert!((sd - 2.138_089_935).abs() < 1e-6);
        assert_eq!(std_dev(&cpu_series(&[1.0]), "cpu"), None);
    }

    // -----------------------------------------------------------------------
    // Percentages
    // -----------------------------------------------------------------------

    #[test]
    fn test_percentage_rounds() {
        assert_eq!(percentage(1.0, 3.0), 33.0);
        assert_eq!(percentage(2.0, 3.0), 67.0);
        assert_eq!(percentage(50.0, 50.0), 100.0);
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(0.0, 0.0), 0.0);
    }

    // -----------------------------------------------------------------------
    // Trends
    // -----------------------------------------------------------------------

    #[test]
    fn test_trend_directions() {
        let up = trend(&cpu_series(&[50.0, 60.0]), "cpu").unwrap();
        assert_eq!(up.direction, TrendDirection::Up);
        assert!((up.change_percent - 20.0).abs() < 1e-9);

        let down = trend(&cpu_series(&[60.0, 45.0]), "cpu").unwrap();
        assert_eq!(down.direction, TrendDirection::Down);
        assert!((down.change_percent + 25.0).abs() < 1e-9);

        let flat = trend(&cpu_series(&[1000.0, 1001.0]), "cpu").unwrap();
        assert_eq!(flat.direction, TrendDirection::Flat);

        assert!(trend(&cpu_series(&[1.0]), "cpu").is_none());
    }

    #[test]
    fn test_trend_from_zero() {
        let t = trend(&cpu_series(&[0.0, 3.0]), "cpu").unwrap();
        assert_eq!(t.direction, TrendDirection::Up);
        assert_eq!(t.change_percent, 0.0);
    }

    // -----------------------------------------------------------------------
    // Full derivation
    // -----------------------------------------------------------------------

    #[test]
    fn test_derive_bundles_everything() {
        let samples = vec![
            Sample::new(1).with("errors", 2.0).with("requests", 100.0).with("latency", 50.0),
            Sample::new(2).with("errors", 5.0).with("requests", 200.0).with("latency", 150.0),
        ];
        let ratios = vec![RatioConfig::new("error_rate", "errors", "requests")];
        let scores = vec![ScoreConfig::new(
            "performance",
            vec![ScoreComponent::new("latency", 1.0, 0.0, 200.0).inverted()],
        )];
        let m = derive(&samples, &ratios, &scores);

        assert!(m.has_data());
        assert_eq!(m.sample_count, 2);
        assert_eq!(m.average["latency"], 100.0);
        assert_eq!(m.peak["errors"], 5.0);
        assert_eq!(m.minimum["requests"], 100.0);
        assert_eq!(m.ratios["error_rate"], 3.0);
        assert_eq!(m.scores["performance"], 25.0);
        assert_eq!(m.trends["latency"].direction, TrendDirection::Up);
        assert!(m.std_dev.contains_key("latency"));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let s = cpu_series(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        assert_eq!(derive(&s, &[], &[]), derive(&s, &[], &[]));
    }
}
