//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Category of geolocation answer a database can provide.
///
/// The set is closed: every backend is probed against exactly these kinds,
/// in the order of [`QueryKind::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Anonymous IP flags (VPN, hosting provider, Tor exit node, ...)
    AnonymousIp,
    /// City, subdivisions, location and postal data
    City,
    /// Connection type (Cable/DSL, Cellular, Corporate, ...)
    ConnectionType,
    /// Country, continent and registered country
    Country,
    /// Second level domain
    Domain,
    /// ISP, organization and autonomous system
    Isp,
}

impl QueryKind {
    /// All kinds in probe order.
    pub const ALL: [QueryKind; 6] = [
        Self::AnonymousIp,
        Self::City,
        Self::ConnectionType,
        Self::Country,
        Self::Domain,
        Self::Isp,
    ];

    /// Parse the URL literal of a kind.
    ///
    /// # Examples
    /// ```
    /// use geoserve::domain::value_objects::QueryKind;
    ///
    /// assert_eq!(QueryKind::from_literal("city"), Some(QueryKind::City));
    /// assert_eq!(QueryKind::from_literal("bogus"), None);
    /// ```
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            "anonymousip" => Some(Self::AnonymousIp),
            "city" => Some(Self::City),
            "connectiontype" => Some(Self::ConnectionType),
            "country" => Some(Self::Country),
            "domain" => Some(Self::Domain),
            "isp" => Some(Self::Isp),
            _ => None,
        }
    }

    /// URL literal of this kind, also used as the metadata key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnonymousIp => "anonymousip",
            Self::City => "city",
            Self::ConnectionType => "connectiontype",
            Self::Country => "country",
            Self::Domain => "domain",
            Self::Isp => "isp",
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the routing table is assembled from the opened databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// `Single` for exactly one database, `Probe` otherwise.
    Auto,
    /// Probe every database and merge, first registration wins.
    Probe,
    /// Treat the only database as answering every kind.
    Single,
}

impl RoutingMode {
    /// Parse a routing mode, case-insensitively. Unknown values yield `None`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "probe" => Some(Self::Probe),
            "single" => Some(Self::Single),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Probe => "probe",
            Self::Single => "single",
        }
    }

    /// Resolve `Auto` against the number of configured databases.
    pub fn resolve(self, database_count: usize) -> Self {
        match self {
            Self::Auto if database_count == 1 => Self::Single,
            Self::Auto => Self::Probe,
            other => other,
        }
    }
}

impl Default for RoutingMode {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
