use std::sync::Arc;
use std::time::Duration;

use broker::BrokerClient;
use internals::{HeaderValue, Headers, Record, DELAY_HEADER};
use rand::Rng;
use tracing::{error, info};
use uuid::Uuid;

/// Delay attribute stamped on every emitted record, milliseconds.
pub const RECORD_DELAY_MS: u64 = 6500;

/// Stateless factory for periodic records. Each call is independent; the
/// poll loop that drives it lives elsewhere.
pub struct Emitter {
    delay_ms: u64,
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_delay(RECORD_DELAY_MS)
    }

    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    /// Produces one record plus the headers telling the broker to defer its
    /// delivery by the record's own delay attribute.
    pub fn emit(&self) -> (Record, Headers) {
        let record = Record {
            name: Uuid::new_v4().to_string(),
            id: rand::thread_rng().gen_range(0..100),
            delay_time_ms: self.delay_ms,
        };
        let mut headers = Headers::new();
        headers.insert(
            DELAY_HEADER.to_string(),
            HeaderValue::Int(self.delay_ms as i64),
        );
        (record, headers)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll loop publishing one record per tick until the task is aborted. The
/// record is dropped once the broker accepts it; publish failures are logged
/// and the loop carries on.
pub async fn run_supplier(
    client: Arc<dyn BrokerClient>,
    destination: String,
    period: Duration,
    emitter: Emitter,
) {
    loop {
        let (record, headers) = emitter.emit();
        info!(name = %record.name, id = record.id, "emitting record");
        match serde_json::to_string(&record) {
            Ok(payload) => {
                if let Err(e) = client.publish(&destination, &payload, headers) {
                    error!(error = %e, destination = %destination, "failed to publish record");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize record"),
        }
        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingClient;
    use internals::int_header;

    #[test]
    fn emitted_records_have_the_demo_shape() {
        let emitter = Emitter::new();
        let (record, headers) = emitter.emit();

        assert_eq!(record.delay_time_ms, 6500);
        assert!(record.id < 100);
        assert_eq!(int_header(&headers, DELAY_HEADER).unwrap(), Some(6500));
    }

    #[test]
    fn consecutive_records_get_distinct_names() {
        let emitter = Emitter::new();
        let (first, _) = emitter.emit();
        let (second, _) = emitter.emit();
        assert_ne!(first.name, second.name);
    }

    #[tokio::test]
    async fn supplier_loop_publishes_serialized_records() {
        let client = RecordingClient::accepting();
        let supplier = tokio::spawn(run_supplier(
            client.clone(),
            "records".to_string(),
            Duration::from_millis(10),
            Emitter::with_delay(25),
        ));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while client.published.lock().unwrap().len() < 2 {
            assert!(std::time::Instant::now() < deadline, "supplier never published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        supplier.abort();

        let published = client.published.lock().unwrap();
        let (destination, payload, headers) = &published[0];
        assert_eq!(destination, "records");
        assert_eq!(int_header(headers, DELAY_HEADER).unwrap(), Some(25));

        let record: Record = serde_json::from_str(payload).unwrap();
        assert_eq!(record.delay_time_ms, 25);
        assert!(record.id < 100);
    }
}
