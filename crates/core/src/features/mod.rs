//! Feature construction, aggregation and corpus statistics.

pub mod aggregate;
pub mod builder;
pub mod outlier;
pub mod stats;

pub use builder::UtteranceFeatureBuilder;
pub use outlier::remove_outliers;
pub use stats::StreamingStats;
