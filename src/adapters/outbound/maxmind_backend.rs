//! MaxMind Geo Backend
//!
//! Implements GeoBackend over a MaxMind DB file using the `maxminddb` crate.

use crate::domain::entities::{DatabaseMetadata, GeoRecord};
use crate::domain::ports::{GeoBackend, LookupError};
use crate::domain::value_objects::QueryKind;
use maxminddb::{geoip2, MaxMindDBError, Metadata, Reader};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// MaxMind DB backend.
///
/// Which kinds it answers follows from the `database_type` recorded in
/// the file's metadata; the record layouts are the `geoip2` models.
pub struct MaxMindBackend {
    reader: Arc<Reader<Vec<u8>>>,
    kinds: Vec<QueryKind>,
}

impl MaxMindBackend {
    /// Load a database from a file path.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self::from_reader(reader))
    }

    /// Load a database from an in-memory buffer.
    pub fn from_bytes(buf: Vec<u8>) -> anyhow::Result<Self> {
        let reader = Reader::from_source(buf)?;
        Ok(Self::from_reader(reader))
    }

    fn from_reader(reader: Reader<Vec<u8>>) -> Self {
        let kinds = supported_kinds(&reader.metadata.database_type);
        if kinds.is_empty() {
            tracing::warn!(
                "unrecognized database type {:?}, no lookups will be served from it",
                reader.metadata.database_type
            );
        }
        Self {
            reader: Arc::new(reader),
            kinds,
        }
    }

    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }

    /// Kinds this database's schema answers.
    pub fn kinds(&self) -> &[QueryKind] {
        &self.kinds
    }

    fn decode<'de, T>(&'de self, ip: IpAddr) -> Result<GeoRecord, LookupError>
    where
        T: Deserialize<'de> + Serialize,
    {
        let record: T = self
            .reader
            .lookup(ip)
            .map_err(|e| map_reader_error(e, ip))?;
        to_record(&record)
    }
}

impl GeoBackend for MaxMindBackend {
    fn lookup(&self, kind: QueryKind, ip: Option<IpAddr>) -> Result<GeoRecord, LookupError> {
        let ip = precheck(&self.kinds, kind, ip)?;
        match kind {
            QueryKind::AnonymousIp => self.decode::<geoip2::AnonymousIp>(ip),
            QueryKind::City => self.decode::<geoip2::City>(ip),
            QueryKind::ConnectionType => self.decode::<geoip2::ConnectionType>(ip),
            QueryKind::Country => self.decode::<geoip2::Country>(ip),
            QueryKind::Domain => self.decode::<geoip2::Domain>(ip),
            QueryKind::Isp => self.decode::<geoip2::Isp>(ip),
        }
    }

    fn metadata(&self) -> DatabaseMetadata {
        DatabaseMetadata::from(&self.reader.metadata)
    }
}

impl From<&Metadata> for DatabaseMetadata {
    fn from(meta: &Metadata) -> Self {
        Self {
            binary_format_major_version: meta.binary_format_major_version,
            binary_format_minor_version: meta.binary_format_minor_version,
            build_epoch: meta.build_epoch,
            database_type: meta.database_type.clone(),
            description: meta.description.clone(),
            ip_version: meta.ip_version,
            languages: meta.languages.clone(),
            node_count: meta.node_count,
            record_size: meta.record_size,
        }
    }
}

/// A missing address is the caller's problem; anything else is the database's.
fn map_reader_error(err: MaxMindDBError, ip: IpAddr) -> LookupError {
    match err {
        MaxMindDBError::AddressNotFoundError(_) => LookupError::AddressNotFound(ip),
        other => LookupError::Backend(other.to_string()),
    }
}

fn to_record<T: Serialize>(record: &T) -> Result<GeoRecord, LookupError> {
    serde_json::to_value(record).map_err(|e| LookupError::Backend(e.to_string()))
}

/// Schema check first, then address presence.
///
/// An unsupported kind must win over a missing address so capability
/// probing with no address can tell the two apart.
fn precheck(
    kinds: &[QueryKind],
    kind: QueryKind,
    ip: Option<IpAddr>,
) -> Result<IpAddr, LookupError> {
    if !kinds.contains(&kind) {
        return Err(LookupError::UnsupportedKind(kind));
    }
    ip.ok_or(LookupError::InvalidAddress)
}

/// Kinds answered by a database of the given `database_type`.
pub fn supported_kinds(database_type: &str) -> Vec<QueryKind> {
    use QueryKind::*;

    match database_type {
        "GeoIP2-Anonymous-IP" => vec![AnonymousIp],
        "GeoIP2-City"
        | "GeoIP2-City-Africa"
        | "GeoIP2-City-Asia-Pacific"
        | "GeoIP2-City-Europe"
        | "GeoIP2-City-North-America"
        | "GeoIP2-City-South-America"
        | "GeoIP2-Precision-City"
        | "GeoLite2-City"
        | "GeoIP2-Enterprise"
        | "DBIP-City-Lite"
        | "DBIP-Location (compat=City)" => vec![City, Country],
        "GeoIP2-Connection-Type" => vec![ConnectionType],
        "GeoIP2-Country" | "GeoLite2-Country" | "DBIP-Country" | "DBIP-Country-Lite" => {
            vec![Country]
        }
        "GeoIP2-Domain" => vec![Domain],
        "GeoIP2-ISP" | "GeoIP2-Precision-ISP" => vec![Isp],
        _ => Vec::new(),
    }
}
