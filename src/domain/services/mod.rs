mod capability_registry;

pub use capability_registry::{CapabilityRegistry, MetadataDocument, RegistryError};
