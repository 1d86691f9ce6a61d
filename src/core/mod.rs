pub mod aggregator;
pub mod alerts;
pub mod store;
pub mod timeseries;
