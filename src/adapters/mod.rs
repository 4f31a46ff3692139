//! Adapters
//!
//! Inbound: the HTTP API. Outbound: the MaxMind DB backend.

pub mod inbound;
pub mod outbound;
