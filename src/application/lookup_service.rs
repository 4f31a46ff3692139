//! Lookup Service - Main application use case
//!
//! Resolves a raw `(kind, ip)` pair through the capability registry,
//! invokes the backend and serializes what comes back. This is the
//! primary interface for the HTTP adapter.

use crate::domain::entities::GeoRecord;
use crate::domain::ports::LookupError;
use crate::domain::services::{CapabilityRegistry, MetadataDocument};
use crate::domain::value_objects::QueryKind;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;

/// Literal accepted in the kind position that returns backend metadata.
pub const METADATA_KIND: &str = "metadata";

/// Why a lookup produced no record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The kind literal is not a known query kind
    #[error("unknown query kind {0:?}")]
    UnknownKind(String),
    /// The kind is known but no backend answers it
    #[error("no database serves {0} lookups")]
    KindNotServed(QueryKind),
    /// The address was rejected or is not in the database
    #[error("bad address: {0}")]
    BadAddress(LookupError),
    #[error("backend failure: {0}")]
    Backend(LookupError),
    #[error("failed to serialize response: {0}")]
    Serialization(String),
}

impl From<LookupError> for DispatchError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::UnsupportedKind(kind) => Self::KindNotServed(kind),
            LookupError::InvalidAddress | LookupError::AddressNotFound(_) => {
                Self::BadAddress(err)
            }
            LookupError::Backend(_) => Self::Backend(err),
        }
    }
}

/// Successful outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeoResponse {
    Record(GeoRecord),
    Metadata(MetadataDocument),
}

/// Lookup service - stateless apart from the shared registry.
#[derive(Debug, Clone)]
pub struct LookupService {
    registry: Arc<CapabilityRegistry>,
}

impl LookupService {
    /// Create a new lookup service over a built registry.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve `(kind_raw, ip_raw)` to a record.
    ///
    /// The address is parsed permissively: anything that is not an IP
    /// literal reaches the backend as `None`, and the backend decides
    /// whether that is a bad address.
    pub fn dispatch(&self, kind_raw: &str, ip_raw: &str) -> Result<GeoResponse, DispatchError> {
        if kind_raw == METADATA_KIND {
            return Ok(GeoResponse::Metadata(self.registry.metadata()));
        }

        let kind = QueryKind::from_literal(kind_raw)
            .ok_or_else(|| DispatchError::UnknownKind(kind_raw.to_string()))?;

        let backend = self
            .registry
            .resolve(kind)
            .ok_or(DispatchError::KindNotServed(kind))?;

        let ip = ip_raw.parse::<IpAddr>().ok();
        let record = backend.lookup(kind, ip)?;

        Ok(GeoResponse::Record(record))
    }

    /// Metadata of every routed backend.
    pub fn metadata(&self) -> GeoResponse {
        GeoResponse::Metadata(self.registry.metadata())
    }

    /// Serialize a response to its JSON body.
    pub fn render(response: &GeoResponse) -> Result<Vec<u8>, DispatchError> {
        serde_json::to_vec(response).map_err(|e| DispatchError::Serialization(e.to_string()))
    }

    /// Dispatch and serialize in one step.
    pub fn handle(&self, kind_raw: &str, ip_raw: &str) -> Result<Vec<u8>, DispatchError> {
        let response = self.dispatch(kind_raw, ip_raw)?;
        Self::render(&response)
    }
}
