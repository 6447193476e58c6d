use std::collections::VecDeque;
use std::sync::Mutex;

use internals::Message;
use tokio::sync::Notify;

use crate::client::BrokerError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A single named destination: a bounded FIFO buffer plus a wakeup for
/// subscription pumps.
pub struct DestinationQueue {
    pub name: String,
    buffer: Mutex<VecDeque<Message>>,
    capacity: usize,
    pub notify: Notify,
}

impl DestinationQueue {
    pub fn new(name: String, capacity: usize) -> Self {
        Self {
            name,
            buffer: Mutex::new(VecDeque::new()),
            capacity,
            notify: Notify::new(),
        }
    }

    pub fn enqueue(&self, message: Message) -> Result<(), BrokerError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| BrokerError::Internal("destination buffer poisoned".to_string()))?;

        if buffer.len() >= self.capacity {
            return Err(BrokerError::QueueFull {
                destination: self.name.clone(),
                capacity: self.capacity,
            });
        }

        buffer.push_back(message);
        drop(buffer);

        self.notify.notify_waiters();
        Ok(())
    }

    /// Puts a delivery back at the head so redelivery preserves age order.
    /// Redelivered messages bypass the capacity check; dropping them would
    /// lose data the broker already accepted.
    pub fn requeue(&self, message: Message) -> Result<(), BrokerError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| BrokerError::Internal("destination buffer poisoned".to_string()))?;

        buffer.push_front(message);
        drop(buffer);

        self.notify.notify_waiters();
        Ok(())
    }

    pub fn dequeue(&self) -> Result<Option<Message>, BrokerError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| BrokerError::Internal("destination buffer poisoned".to_string()))?;
        Ok(buffer.pop_front())
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
