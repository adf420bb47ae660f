pub mod engine;
pub mod market_data;
pub mod store;
pub mod telemetry;
