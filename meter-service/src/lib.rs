pub mod api;
pub mod config;
pub mod drafting;
pub mod extraction;
pub mod gemini;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod seed;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;
pub mod validation;

pub use pipeline::{Envelope, Pipeline};
