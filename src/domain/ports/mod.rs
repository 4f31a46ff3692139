mod geo_backend;

pub use geo_backend::{GeoBackend, LookupError};
