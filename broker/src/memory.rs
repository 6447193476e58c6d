use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use internals::{
    int_header, str_header, HeaderError, HeaderValue, Headers, Message, DELAY_HEADER,
    DELIVERY_TAG_HEADER, SENDTO_DESTINATION_HEADER,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::acks::{AckChannel, ChannelLedger};
use crate::client::{
    BrokerClient, BrokerError, DeliveryHandler, InboundMessage, SubscribeOptions,
    SubscriptionHandle,
};
use crate::queue::{DestinationQueue, DEFAULT_QUEUE_CAPACITY};

const IDLE_POLL: Duration = Duration::from_millis(100);
const DISPATCH_BUFFER: usize = 4;

/// Broker state shared by every link: named bounded destination queues.
pub struct InMemoryBroker {
    destinations: DashMap<String, Arc<DestinationQueue>>,
    capacity: usize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            destinations: DashMap::new(),
            capacity,
        }
    }

    /// Declares the destination if it does not exist yet; an existing queue
    /// is returned untouched.
    #[instrument(skip_all, fields(destination = %name))]
    pub fn ensure_destination(&self, name: &str) -> Arc<DestinationQueue> {
        self.destinations
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("declaring destination");
                Arc::new(DestinationQueue::new(name.to_string(), self.capacity))
            })
            .clone()
    }

    pub fn destination(&self, name: &str) -> Option<Arc<DestinationQueue>> {
        self.destinations
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Messages currently buffered on a destination; 0 for unknown names.
    pub fn depth(&self, name: &str) -> usize {
        self.destination(name).map(|queue| queue.len()).unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Client adapter over an in-process broker connection.
#[derive(Clone)]
pub struct BrokerLink {
    broker: Arc<InMemoryBroker>,
}

impl BrokerLink {
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self { broker }
    }
}

impl BrokerClient for BrokerLink {
    #[instrument(skip_all, fields(destination = %destination))]
    fn publish(
        &self,
        destination: &str,
        payload: &str,
        headers: Headers,
    ) -> Result<(), BrokerError> {
        // dynamic routing: the sendto header wins over the positional destination
        let target = match str_header(&headers, SENDTO_DESTINATION_HEADER)? {
            Some(value) => value.to_string(),
            None => destination.to_string(),
        };

        let delay_ms = match int_header(&headers, DELAY_HEADER)? {
            Some(value) => u64::try_from(value).map_err(|_| HeaderError::TypeMismatch {
                header: DELAY_HEADER,
                expected: "non-negative integer",
            })?,
            None => 0,
        };

        let queue = self.broker.ensure_destination(&target);
        let message = Message::new(payload, headers);
        let uuid = message.uuid;

        if delay_ms == 0 {
            queue.enqueue(message)?;
            debug!(uuid = %uuid, target = %target, "message enqueued");
            return Ok(());
        }

        info!(uuid = %uuid, delay_ms, target = %target, "deferring delivery");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            // the hand-off was already reported; a late overflow can only be logged
            if let Err(e) = queue.enqueue(message) {
                warn!(error = %e, uuid = %uuid, "delayed delivery dropped");
            }
        });
        Ok(())
    }

    fn subscribe(
        &self,
        destination: &str,
        options: SubscribeOptions,
        handler: DeliveryHandler,
    ) -> Result<SubscriptionHandle, BrokerError> {
        let queue = self.broker.ensure_destination(destination);
        let ledger = options
            .manual_ack
            .then(|| Arc::new(ChannelLedger::new(queue.clone(), options.ack_deadline)));

        let span = info_span!(
            "subscription",
            destination = %destination,
            manual_ack = %options.manual_ack
        );
        span.in_scope(|| info!("starting subscription"));

        let (tx, rx) = mpsc::channel(DISPATCH_BUFFER);
        let pump_ledger = ledger.clone();
        let pump = tokio::spawn(
            async move {
                loop {
                    let message = match queue.dequeue() {
                        Ok(message) => message,
                        Err(e) => {
                            error!(error = %e, "destination unavailable, stopping pump");
                            return;
                        }
                    };

                    match message {
                        Some(mut message) => {
                            let channel = match &pump_ledger {
                                Some(ledger) => {
                                    let delivery_tag = ledger.track(message.clone());
                                    message.headers.insert(
                                        DELIVERY_TAG_HEADER.to_string(),
                                        HeaderValue::Int(delivery_tag as i64),
                                    );
                                    Some(ledger.clone() as Arc<dyn AckChannel>)
                                }
                                None => None,
                            };
                            let inbound = InboundMessage { message, channel };
                            if tx.send(inbound).await.is_err() {
                                warn!("dispatch channel closed, stopping pump");
                                return;
                            }
                        }
                        None => {
                            if let Some(ledger) = &pump_ledger {
                                ledger.sweep_expired();
                            }
                            // notify_waiters does not wake later sleepers, so cap the wait
                            let _ = tokio::time::timeout(IDLE_POLL, queue.notify.notified()).await;
                        }
                    }
                }
            }
            .instrument(span.clone()),
        );

        let dispatch = tokio::spawn(
            async move {
                let mut deliveries = ReceiverStream::new(rx);
                while let Some(inbound) = deliveries.next().await {
                    handler(inbound);
                }
            }
            .instrument(span),
        );

        Ok(SubscriptionHandle::new(pump, dispatch))
    }
}
