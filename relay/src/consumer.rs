use std::sync::Arc;

use broker::{BrokerClient, BrokerError, InboundMessage, SubscribeOptions, SubscriptionHandle};
use internals::{int_header, Record, DELAY_HEADER};
use tracing::{debug, error, info, warn};

/// What became of a single delivery's acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// Manual ack went through.
    Acked { delivery_tag: u64 },
    /// No transport ack context on the delivery; the framework owns
    /// acknowledgment and the handler takes no action.
    AutoManaged,
    /// The ack was attempted (or its context was malformed) and failed;
    /// logged and swallowed so the dispatch loop keeps running.
    Failed,
}

/// Sink handler: log the record, then settle the delivery.
///
/// The business section runs first and is contained here - a payload that
/// is not a record, or an unreadable informational header, never reaches
/// the ack step as an error.
pub fn handle_record(inbound: &InboundMessage) -> AckOutcome {
    match serde_json::from_str::<Record>(&inbound.message.payload) {
        Ok(record) => info!(
            name = %record.name,
            id = record.id,
            delay_time_ms = record.delay_time_ms,
            "received record"
        ),
        Err(e) => warn!(
            error = %e,
            payload = %inbound.message.payload,
            "received non-record payload"
        ),
    }
    debug!(headers = ?inbound.message.headers, "delivery headers");
    match int_header(&inbound.message.headers, DELAY_HEADER) {
        Ok(Some(delay_ms)) => debug!(delay_ms, "message carried a delay"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "unreadable delay header"),
    }

    let delivery = match inbound.delivery() {
        Ok(Some(delivery)) => delivery,
        Ok(None) => return AckOutcome::AutoManaged,
        Err(e) => {
            error!(error = %e, "malformed acknowledgment context");
            return AckOutcome::Failed;
        }
    };

    match delivery.channel.basic_ack(delivery.delivery_tag, false) {
        Ok(()) => {
            debug!(delivery_tag = delivery.delivery_tag, "delivery acked");
            AckOutcome::Acked {
                delivery_tag: delivery.delivery_tag,
            }
        }
        Err(e) => {
            // the consumer loop must survive an acknowledgment transport fault
            error!(
                error = %e,
                delivery_tag = delivery.delivery_tag,
                "manual ack failed"
            );
            AckOutcome::Failed
        }
    }
}

/// Wires the sink to its destination with manual acknowledgment.
pub fn spawn_record_sink(
    client: &dyn BrokerClient,
    destination: &str,
) -> Result<SubscriptionHandle, BrokerError> {
    client.subscribe(
        destination,
        SubscribeOptions::manual(),
        Arc::new(|inbound| {
            handle_record(&inbound);
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingChannel;
    use broker::AckChannel;
    use internals::{HeaderValue, Headers, Message, DELIVERY_TAG_HEADER};

    fn inbound_with_tag(
        payload: &str,
        delivery_tag: i64,
        channel: Arc<RecordingChannel>,
    ) -> InboundMessage {
        let mut headers = Headers::new();
        headers.insert(
            DELIVERY_TAG_HEADER.to_string(),
            HeaderValue::Int(delivery_tag),
        );
        InboundMessage {
            message: Message::new(payload, headers),
            channel: Some(channel as Arc<dyn AckChannel>),
        }
    }

    #[test]
    fn acks_exactly_once_with_the_exact_tag() {
        let channel = RecordingChannel::working();
        let inbound = inbound_with_tag(
            r#"{"name":"n","id":3,"delayTime":6500}"#,
            42,
            channel.clone(),
        );

        let outcome = handle_record(&inbound);

        assert_eq!(outcome, AckOutcome::Acked { delivery_tag: 42 });
        assert_eq!(*channel.acks.lock().unwrap(), vec![(42, false)]);
        assert!(channel.nacks.lock().unwrap().is_empty());
    }

    #[test]
    fn no_ack_context_means_no_ack_calls() {
        let inbound = InboundMessage {
            message: Message::new("plain", Headers::new()),
            channel: None,
        };

        assert_eq!(handle_record(&inbound), AckOutcome::AutoManaged);
    }

    #[test]
    fn ack_transport_fault_is_swallowed() {
        let channel = RecordingChannel::failing();
        let inbound = inbound_with_tag("payload", 7, channel.clone());

        let outcome = handle_record(&inbound);

        assert_eq!(outcome, AckOutcome::Failed);
        assert!(channel.acks.lock().unwrap().is_empty());
    }

    #[test]
    fn business_fault_does_not_block_the_ack() {
        let channel = RecordingChannel::working();
        let inbound = inbound_with_tag("this is not json", 9, channel.clone());

        let outcome = handle_record(&inbound);

        assert_eq!(outcome, AckOutcome::Acked { delivery_tag: 9 });
        assert_eq!(*channel.acks.lock().unwrap(), vec![(9, false)]);
    }

    #[test]
    fn tag_without_channel_is_malformed_not_acked() {
        let mut headers = Headers::new();
        headers.insert(DELIVERY_TAG_HEADER.to_string(), HeaderValue::Int(5));
        let inbound = InboundMessage {
            message: Message::new("payload", headers),
            channel: None,
        };

        assert_eq!(handle_record(&inbound), AckOutcome::Failed);
    }

    #[test]
    fn channel_without_tag_is_malformed_not_acked() {
        let channel = RecordingChannel::working();
        let inbound = InboundMessage {
            message: Message::new("payload", Headers::new()),
            channel: Some(channel.clone() as Arc<dyn AckChannel>),
        };

        assert_eq!(handle_record(&inbound), AckOutcome::Failed);
        assert!(channel.acks.lock().unwrap().is_empty());
    }
}
