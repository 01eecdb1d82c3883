// externally visible interfaces
pub mod auth;
pub mod bridge_config;
pub mod cloud;
pub mod credential;
pub mod cycle;
pub mod error;
pub mod home_assistant;
pub mod http_config;
pub mod http_wrapper;
pub mod metric_collector;
pub mod projector;
pub mod pushback;
pub mod scratch;
pub mod sensors;
pub mod sleeper;
pub mod telemetry;

// scripted fakes for this crate's tests and the bridge's integration tests
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
