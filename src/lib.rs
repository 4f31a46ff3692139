//! geoserve Library
//!
//! Read-only geolocation lookups over HTTP, backed by one or more MaxMind
//! DB files. Exposes the components for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{build_router, ApiServer, ApiState};
pub use adapters::outbound::MaxMindBackend;
pub use application::{DispatchError, GeoResponse, LookupService};
pub use config::{load_config, Config};
pub use domain::entities::{DatabaseMetadata, GeoRecord};
pub use domain::ports::{GeoBackend, LookupError};
pub use domain::services::CapabilityRegistry;
pub use domain::value_objects::{QueryKind, RoutingMode};
pub use infrastructure::{AccessLogger, AsyncLogSink, LogSinkError, ShutdownController};
