//! Rolling KPI derivation: aggregates, trends, ratios and composite scores.

pub mod derive;
pub mod score;

pub use derive::{
    DerivedMetrics, Trend, TrendDirection, average, current, derive, minimum, peak, percentage,
    std_dev, trend,
};
pub use score::{RatioConfig, ScoreComponent, ScoreConfig};
