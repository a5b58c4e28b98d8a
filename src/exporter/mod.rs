// Prometheus exposition of the published gauges

pub mod gauges;
pub mod server;


pub use gauges::PublishedGauges;
pub use server::MetricsEndpoint;
