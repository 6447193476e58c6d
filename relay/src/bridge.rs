use std::sync::Arc;

use broker::BrokerClient;
use internals::Headers;
use routing::DestinationRegistry;
use tracing::{error, info};

/// Manual dispatch seam: resolves a logical binding and hands the body to
/// the broker client. No retry; the caller owns resubmission on failure.
pub struct MessageBridge {
    client: Arc<dyn BrokerClient>,
    registry: Arc<DestinationRegistry>,
}

impl MessageBridge {
    pub fn new(client: Arc<dyn BrokerClient>, registry: Arc<DestinationRegistry>) -> Self {
        Self { client, registry }
    }

    /// Returns whether the broker accepted the hand-off locally; this is not
    /// an end-to-end delivery confirmation. Unregistered bindings are used
    /// as destination names verbatim.
    pub fn send(&self, binding: &str, body: &str) -> bool {
        let destination = self
            .registry
            .resolve(binding)
            .unwrap_or_else(|| binding.to_string());
        info!(binding, destination = %destination, "manual send");

        match self.client.publish(&destination, body, Headers::new()) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, binding, "manual send rejected");
                false
            }
        }
    }
}
