mod policy;

pub use policy::{destination_as_payload, DestinationPolicy, ValueAsDestination};

use dashmap::DashMap;
use tracing::info;

/// Explicit registration table mapping logical binding names to physical
/// destination names. Built once at process start; the first registration
/// for a binding wins.
#[derive(Default)]
pub struct DestinationRegistry {
    bindings: DashMap<String, String>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, binding: &str, destination: &str) {
        self.bindings.entry(binding.to_string()).or_insert_with(|| {
            info!(binding, destination, "registering binding");
            destination.to_string()
        });
    }

    pub fn resolve(&self, binding: &str) -> Option<String> {
        self.bindings
            .get(binding)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
