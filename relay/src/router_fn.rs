use std::sync::Arc;

use broker::{BrokerClient, BrokerError, SubscribeOptions, SubscriptionHandle};
use routing::destination_as_payload;
use tracing::{error, info};

/// Message-driven dynamic routing: each payload arriving on the request
/// destination is republished to the destination named by its own value.
/// Acknowledgment stays framework-managed; the interesting part is the
/// producer side.
pub fn spawn_dynamic_router(
    client: Arc<dyn BrokerClient>,
    source_destination: &str,
    outbound_destination: &str,
) -> Result<SubscriptionHandle, BrokerError> {
    let republish = client.clone();
    let outbound = outbound_destination.to_string();
    client.subscribe(
        source_destination,
        SubscribeOptions::default(),
        Arc::new(move |inbound| {
            let value = inbound.message.payload;
            let (payload, headers) = destination_as_payload(&value);
            info!(destination = %value, "routing by payload value");
            // the sendto header overrides the outbound destination
            if let Err(e) = republish.publish(&outbound, &payload, headers) {
                error!(error = %e, destination = %value, "dynamic route failed");
            }
        }),
    )
}
