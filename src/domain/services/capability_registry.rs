//! Capability Registry Service
//!
//! Pure domain logic for deciding which backend answers which query kind.
//! Built once at startup and read-only afterwards.

use crate::domain::entities::DatabaseMetadata;
use crate::domain::ports::{GeoBackend, LookupError};
use crate::domain::value_objects::{QueryKind, RoutingMode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Routing table from query kind to the backend that answers it.
///
/// Two shapes exist:
/// - probed: every backend was asked for every kind, first answer wins
/// - universal: one backend answers everything, unsupported kinds surface
///   at request time
///
/// The table is never mutated after construction, so it can be shared
/// behind an `Arc` without locking.
#[derive(Clone)]
pub struct CapabilityRegistry {
    routes: Routes,
}

#[derive(Clone)]
enum Routes {
    Probed(BTreeMap<QueryKind, Arc<dyn GeoBackend>>),
    Universal(Arc<dyn GeoBackend>),
}

/// Metadata document served by `/v1/metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataDocument {
    /// Probed mode: metadata of the backend serving each kind
    ByKind(BTreeMap<QueryKind, DatabaseMetadata>),
    /// Universal mode: metadata of the only backend
    Single(DatabaseMetadata),
}

/// Errors assembling a registry for a routing mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no databases to route to")]
    NoBackends,
    #[error("single routing mode needs exactly one database, got {0}")]
    SingleModeBackendCount(usize),
}

impl CapabilityRegistry {
    /// Probe `backends` in order and merge them into one table.
    ///
    /// Each backend is asked for every kind in [`QueryKind::ALL`] order
    /// with an empty address. `UnsupportedKind` excludes the kind; any
    /// other outcome (an invalid-address error included) means the schema
    /// has the field set. The first backend to claim a kind keeps it.
    ///
    /// Never fails: a backend that supports nothing contributes nothing.
    pub fn build(backends: &[Arc<dyn GeoBackend>]) -> Self {
        let mut table: BTreeMap<QueryKind, Arc<dyn GeoBackend>> = BTreeMap::new();

        for (index, backend) in backends.iter().enumerate() {
            for kind in QueryKind::ALL {
                if let Err(LookupError::UnsupportedKind(_)) = backend.lookup(kind, None) {
                    continue;
                }
                if table.contains_key(&kind) {
                    tracing::debug!(
                        "backend #{} also supports {}, keeping earlier registration",
                        index,
                        kind
                    );
                    continue;
                }
                tracing::debug!("registered backend #{} for {}", index, kind);
                table.insert(kind, Arc::clone(backend));
            }
        }

        Self {
            routes: Routes::Probed(table),
        }
    }

    /// Route every kind to `backend` without probing.
    pub fn universal(backend: Arc<dyn GeoBackend>) -> Self {
        Self {
            routes: Routes::Universal(backend),
        }
    }

    /// Assemble the registry for a routing mode.
    ///
    /// `Auto` picks universal routing for exactly one backend and probing
    /// otherwise.
    pub fn for_mode(
        mode: RoutingMode,
        backends: &[Arc<dyn GeoBackend>],
    ) -> Result<Self, RegistryError> {
        if backends.is_empty() {
            return Err(RegistryError::NoBackends);
        }
        match mode.resolve(backends.len()) {
            RoutingMode::Single => match backends {
                [only] => Ok(Self::universal(Arc::clone(only))),
                _ => Err(RegistryError::SingleModeBackendCount(backends.len())),
            },
            _ => Ok(Self::build(backends)),
        }
    }

    /// Backend answering `kind`, if any.
    pub fn resolve(&self, kind: QueryKind) -> Option<&Arc<dyn GeoBackend>> {
        match &self.routes {
            Routes::Probed(table) => table.get(&kind),
            Routes::Universal(backend) => Some(backend),
        }
    }

    /// Kinds this registry routes, in probe order.
    pub fn kinds(&self) -> Vec<QueryKind> {
        match &self.routes {
            Routes::Probed(table) => table.keys().copied().collect(),
            Routes::Universal(_) => QueryKind::ALL.to_vec(),
        }
    }

    /// Routing mode this registry was built in (`Probe` or `Single`).
    pub fn mode(&self) -> RoutingMode {
        match &self.routes {
            Routes::Probed(_) => RoutingMode::Probe,
            Routes::Universal(_) => RoutingMode::Single,
        }
    }

    /// Metadata of the routed backends.
    pub fn metadata(&self) -> MetadataDocument {
        match &self.routes {
            Routes::Probed(table) => MetadataDocument::ByKind(
                table
                    .iter()
                    .map(|(kind, backend)| (*kind, backend.metadata()))
                    .collect(),
            ),
            Routes::Universal(backend) => MetadataDocument::Single(backend.metadata()),
        }
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("mode", &self.mode())
            .field("kinds", &self.kinds())
            .finish()
    }
}
