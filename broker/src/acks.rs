use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use internals::Message;
use thiserror::Error;
use tracing::{debug, warn};

use crate::queue::DestinationQueue;

pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AckError {
    #[error("unknown delivery tag: {0}")]
    UnknownDeliveryTag(u64),

    #[error("delivery tag {0} already settled")]
    AlreadySettled(u64),

    #[error("channel is closed")]
    ChannelClosed,
}

/// Acknowledgment surface handed to message handlers through the delivery
/// back-reference.
pub trait AckChannel: Send + Sync {
    /// Settles one delivery; with `multiple`, every outstanding tag up to
    /// and including `delivery_tag` (cumulative, AMQP semantics).
    fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), AckError>;

    /// Settles one delivery negatively, optionally returning the message to
    /// its source queue.
    fn basic_nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), AckError>;
}

pub struct AckRecord {
    message: Message,
    timestamp: Instant,
    deadline: Duration,
}

impl AckRecord {
    fn new(message: Message, deadline: Duration) -> Self {
        AckRecord {
            message,
            timestamp: Instant::now(),
            deadline,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.timestamp + self.deadline <= Instant::now()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

/// Per-subscription ledger of unacknowledged deliveries. Tags are scoped to
/// the channel and increase monotonically from 1; a settled tag can never be
/// settled again.
pub struct ChannelLedger {
    queue: Arc<DestinationQueue>,
    records: DashMap<u64, AckRecord>,
    next_tag: AtomicU64,
    deadline: Duration,
    closed: AtomicBool,
}

impl ChannelLedger {
    pub fn new(queue: Arc<DestinationQueue>, deadline: Duration) -> Self {
        Self {
            queue,
            records: DashMap::new(),
            next_tag: AtomicU64::new(1),
            deadline,
            closed: AtomicBool::new(false),
        }
    }

    /// Assigns the next delivery tag and starts tracking the delivery. The
    /// stored copy has no tag header, so a redelivery gets a fresh tag.
    pub fn track(&self, message: Message) -> u64 {
        let delivery_tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        self.records
            .insert(delivery_tag, AckRecord::new(message, self.deadline));
        debug!(delivery_tag, "tracking delivery");
        delivery_tag
    }

    pub fn unacked(&self) -> usize {
        self.records.len()
    }

    /// Marks the channel unusable; every later ack or nack fails with
    /// [`AckError::ChannelClosed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Returns deliveries whose deadline passed to the source queue and
    /// settles their records. Reports how many were requeued.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<u64> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_deadline_exceeded())
            .map(|entry| *entry.key())
            .collect();

        let mut requeued = 0;
        for delivery_tag in expired {
            if let Some((_, record)) = self.records.remove(&delivery_tag) {
                warn!(delivery_tag, "ack deadline exceeded, requeueing");
                if self.queue.requeue(record.into_message()).is_ok() {
                    requeued += 1;
                }
            }
        }
        requeued
    }

    fn settle(&self, delivery_tag: u64) -> Result<AckRecord, AckError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(AckError::ChannelClosed);
        }
        match self.records.remove(&delivery_tag) {
            Some((_, record)) => Ok(record),
            None if delivery_tag < self.next_tag.load(Ordering::Relaxed) => {
                Err(AckError::AlreadySettled(delivery_tag))
            }
            None => Err(AckError::UnknownDeliveryTag(delivery_tag)),
        }
    }
}

impl AckChannel for ChannelLedger {
    fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), AckError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(AckError::ChannelClosed);
        }

        if multiple {
            // note: individual tags may already be settled - keep going, the
            // cumulative ack covers whatever is still outstanding
            let pending: Vec<u64> = self
                .records
                .iter()
                .map(|entry| *entry.key())
                .filter(|tag| *tag <= delivery_tag)
                .collect();
            for tag in pending {
                let _ = self.settle(tag);
            }
            debug!(delivery_tag, "cumulative ack applied");
            return Ok(());
        }

        self.settle(delivery_tag)?;
        debug!(delivery_tag, "ack applied");
        Ok(())
    }

    fn basic_nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), AckError> {
        let record = self.settle(delivery_tag)?;
        if requeue {
            if let Err(e) = self.queue.requeue(record.into_message()) {
                warn!(error = %e, delivery_tag, "requeue on nack failed");
            }
        }
        debug!(delivery_tag, requeue, "nack applied");
        Ok(())
    }
}
