//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! connector / executor / local wallet produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via `metrics`)
//!
//! Consumers:
//!     → stdout / stderr log output
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Keys and signed payloads are never logged
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
