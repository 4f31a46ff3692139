//! Geo Backend Port
//!
//! Defines the interface of an opened geo database.

use crate::domain::entities::{DatabaseMetadata, GeoRecord};
use crate::domain::value_objects::QueryKind;
use std::net::IpAddr;

/// Failure of a single backend lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The database schema has no field set for this kind
    #[error("database does not support {0} lookups")]
    UnsupportedKind(QueryKind),
    /// No usable address was supplied
    #[error("invalid address")]
    InvalidAddress,
    #[error("address {0} not found in database")]
    AddressNotFound(IpAddr),
    /// Any other reader failure (corrupt data, decoding error)
    #[error("backend error: {0}")]
    Backend(String),
}

/// An opened geo database answering kind-specific address lookups.
///
/// This is an outbound port. Implementations must be safe for concurrent
/// read-only use; the service shares one handle across all requests.
pub trait GeoBackend: Send + Sync {
    /// Look up `ip` for the given kind.
    ///
    /// `None` stands for an absent or unparseable address. It is also what
    /// capability probing passes: a backend must still answer
    /// `UnsupportedKind` for kinds its schema lacks, and some other outcome
    /// for kinds it supports.
    fn lookup(&self, kind: QueryKind, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError>;

    /// Descriptive metadata of the underlying database.
    fn metadata(&self) -> DatabaseMetadata;
}
