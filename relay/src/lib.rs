pub mod bridge;
pub mod consumer;
pub mod emitter;
pub mod http;
pub mod router_fn;

#[cfg(test)]
mod test_support;

/// Binding used by the manual dispatch endpoint.
pub const OUTBOUND_BINDING: &str = "toStream-out-0";
