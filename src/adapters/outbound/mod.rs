mod maxmind_backend;

pub use maxmind_backend::{supported_kinds, MaxMindBackend};
