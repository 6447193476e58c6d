//! Stubs shared by the unit tests in this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use broker::{
    AckChannel, AckError, BrokerClient, BrokerError, DeliveryHandler, SubscribeOptions,
    SubscriptionHandle,
};
use internals::Headers;

/// `BrokerClient` stub recording every publish; acceptance is configurable.
pub struct RecordingClient {
    pub published: Mutex<Vec<(String, String, Headers)>>,
    accept: AtomicBool,
}

impl RecordingClient {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
            accept: AtomicBool::new(false),
        })
    }
}

impl BrokerClient for RecordingClient {
    fn publish(
        &self,
        destination: &str,
        payload: &str,
        headers: Headers,
    ) -> Result<(), BrokerError> {
        self.published
            .lock()
            .unwrap()
            .push((destination.to_string(), payload.to_string(), headers));
        if self.accept.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(BrokerError::Internal("transport rejected hand-off".to_string()))
        }
    }

    fn subscribe(
        &self,
        _destination: &str,
        _options: SubscribeOptions,
        _handler: DeliveryHandler,
    ) -> Result<SubscriptionHandle, BrokerError> {
        todo!("stub has no inbound side")
    }
}

/// `AckChannel` stub recording settlements; can be switched to fail every
/// call like a broken transport.
pub struct RecordingChannel {
    pub acks: Mutex<Vec<(u64, bool)>>,
    pub nacks: Mutex<Vec<(u64, bool)>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            acks: Mutex::new(Vec::new()),
            nacks: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            acks: Mutex::new(Vec::new()),
            nacks: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        })
    }
}

impl AckChannel for RecordingChannel {
    fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), AckError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(AckError::ChannelClosed);
        }
        self.acks.lock().unwrap().push((delivery_tag, multiple));
        Ok(())
    }

    fn basic_nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), AckError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(AckError::ChannelClosed);
        }
        self.nacks.lock().unwrap().push((delivery_tag, requeue));
        Ok(())
    }
}
