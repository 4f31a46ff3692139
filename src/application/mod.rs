//! Application Layer
//!
//! Use cases orchestrating the domain on behalf of inbound adapters.

mod lookup_service;

pub use lookup_service::{DispatchError, GeoResponse, LookupService, METADATA_KIND};
