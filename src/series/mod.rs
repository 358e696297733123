pub mod aggregator;

pub use aggregator::SeriesAggregator;
