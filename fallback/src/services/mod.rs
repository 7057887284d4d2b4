//! Real service implementations behind the engine's traits

pub mod clock;
pub mod credentials;
pub mod http_transport;
pub mod metrics_sink;
pub mod result_cache;

#[cfg(test)]
pub mod tests;

pub use clock::*;
pub use credentials::*;
pub use http_transport::*;
pub use metrics_sink::*;
pub use result_cache::*;
