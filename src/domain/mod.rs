//! Domain Layer
//!
//! Query kinds, backend port and the capability registry. No I/O here.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
