use std::sync::Arc;
use std::time::Duration;

use internals::{int_header, HeaderError, Headers, Message, DELIVERY_TAG_HEADER};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::acks::{AckChannel, DEFAULT_ACK_DEADLINE};

#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("destination '{destination}' is full (capacity: {capacity})")]
    QueueFull {
        destination: String,
        capacity: usize,
    },

    #[error(transparent)]
    InvalidHeader(#[from] HeaderError),

    #[error("internal broker error: {0}")]
    Internal(String),
}

/// One delivery handed to a subscription handler. Consumed exactly once,
/// then settled through the channel back-reference (if any).
pub struct InboundMessage {
    pub message: Message,
    /// Back-reference to the acknowledgment channel; present only for
    /// manual-ack subscriptions. Not owned by the delivery.
    pub channel: Option<Arc<dyn AckChannel>>,
}

/// Typed acknowledgment context extracted from a delivery.
pub struct Delivery {
    pub channel: Arc<dyn AckChannel>,
    pub delivery_tag: u64,
}

impl InboundMessage {
    /// Resolves the manual-ack context, if any. Partially present or
    /// mistyped transport headers are an error, never a silent auto-ack.
    pub fn delivery(&self) -> Result<Option<Delivery>, HeaderError> {
        let tag = int_header(&self.message.headers, DELIVERY_TAG_HEADER)?;
        match (&self.channel, tag) {
            (None, None) => Ok(None),
            (Some(channel), Some(tag)) => {
                let delivery_tag = u64::try_from(tag).map_err(|_| HeaderError::TypeMismatch {
                    header: DELIVERY_TAG_HEADER,
                    expected: "non-negative integer",
                })?;
                Ok(Some(Delivery {
                    channel: channel.clone(),
                    delivery_tag,
                }))
            }
            (Some(_), None) => Err(HeaderError::Missing(DELIVERY_TAG_HEADER)),
            (None, Some(_)) => Err(HeaderError::ChannelMissing),
        }
    }
}

pub type DeliveryHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub struct SubscribeOptions {
    /// Attach a channel and delivery tag to every delivery; the handler owns
    /// acknowledgment.
    pub manual_ack: bool,
    /// How long a manual-ack delivery may stay unsettled before the broker
    /// takes it back.
    pub ack_deadline: Duration,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            manual_ack: false,
            ack_deadline: DEFAULT_ACK_DEADLINE,
        }
    }
}

impl SubscribeOptions {
    pub fn manual() -> Self {
        Self {
            manual_ack: true,
            ..Self::default()
        }
    }
}

/// Client-side seam over the broker connection: everything the service layer
/// needs from the transport.
pub trait BrokerClient: Send + Sync {
    /// Hands a message to the broker. `Ok` means the broker accepted it
    /// locally, not that it was delivered end to end.
    fn publish(&self, destination: &str, payload: &str, headers: Headers)
        -> Result<(), BrokerError>;

    /// Registers `handler` for every message arriving on `destination`.
    fn subscribe(
        &self,
        destination: &str,
        options: SubscribeOptions,
        handler: DeliveryHandler,
    ) -> Result<SubscriptionHandle, BrokerError>;
}

/// Keeps the subscription tasks alive; aborting ends delivery.
pub struct SubscriptionHandle {
    pump: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(pump: JoinHandle<()>, dispatch: JoinHandle<()>) -> Self {
        Self { pump, dispatch }
    }

    pub fn abort(&self) {
        self.pump.abort();
        self.dispatch.abort();
    }
}
