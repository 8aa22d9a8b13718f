//! HTTP API surface

mod analyze;
mod health;
mod sse;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use sse::analysis_event_stream;
