//! Telemetry: structured logging and Prometheus metrics.
//!
//! ```rust,no_run
//! use saas_core::telemetry::{init_logging, init_metrics, LoggingConfig, MetricsConfig};
//!
//! init_logging(&LoggingConfig::default(), "production").expect("Failed to initialize logging");
//! let metrics = init_metrics(&MetricsConfig::default()).expect("Failed to initialize metrics");
//! println!("{}", metrics.render());
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, MetricsConfig, MetricsHandle, RequestDurationHistogram, RequestTimer};
