use internals::{HeaderValue, Headers, SENDTO_DESTINATION_HEADER};

/// Producer-side routing decision: a destination computed from payload
/// content rather than static configuration.
pub trait DestinationPolicy: Send + Sync {
    fn destination(&self, payload: &str) -> String;
}

/// The demo strategy: the payload value is the destination name, verbatim.
/// Total over all strings.
pub struct ValueAsDestination;

impl DestinationPolicy for ValueAsDestination {
    fn destination(&self, payload: &str) -> String {
        payload.to_string()
    }
}

/// Builds the outbound pair for a dynamically routed value: the payload is
/// forwarded as-is and the sendto header carries the routing decision.
pub fn destination_as_payload(value: &str) -> (String, Headers) {
    let mut headers = Headers::new();
    headers.insert(
        SENDTO_DESTINATION_HEADER.to_string(),
        HeaderValue::Str(ValueAsDestination.destination(value)),
    );
    (value.to_string(), headers)
}
