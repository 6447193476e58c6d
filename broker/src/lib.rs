mod acks;
mod client;
mod memory;
mod queue;

pub use acks::{AckChannel, AckError, AckRecord, ChannelLedger, DEFAULT_ACK_DEADLINE};
pub use client::{
    BrokerClient, BrokerError, Delivery, DeliveryHandler, InboundMessage, SubscribeOptions,
    SubscriptionHandle,
};
pub use memory::{BrokerLink, InMemoryBroker};
pub use queue::{DestinationQueue, DEFAULT_QUEUE_CAPACITY};
