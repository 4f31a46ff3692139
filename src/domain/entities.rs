//! Domain Entities - Core business objects
//!
//! These entities represent what a geo database hands back to the
//! service. The service never inspects geographic content; it only routes
//! to it and serializes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A kind-specific lookup result, already in its serializable shape.
///
/// The shape depends on the query kind and the database that answered;
/// the router treats it as opaque.
pub type GeoRecord = serde_json::Value;

/// Descriptive metadata of an opened geo database.
///
/// Mirrors the metadata section every MaxMind DB file carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub binary_format_major_version: u16,
    pub binary_format_minor_version: u16,
    /// Seconds since the Unix epoch when the database was built
    pub build_epoch: u64,
    /// e.g. "GeoIP2-City", "GeoLite2-Country", "GeoIP2-ISP"
    pub database_type: String,
    /// Description per language code
    pub description: BTreeMap<String, String>,
    /// 4 or 6
    pub ip_version: u16,
    pub languages: Vec<String>,
    pub node_count: u32,
    pub record_size: u16,
}

impl DatabaseMetadata {
    /// Minimal metadata for a database of the given type.
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            binary_format_major_version: 2,
            binary_format_minor_version: 0,
            build_epoch: 0,
            database_type: database_type.into(),
            description: BTreeMap::new(),
            ip_version: 6,
            languages: Vec::new(),
            node_count: 0,
            record_size: 24,
        }
    }
}
