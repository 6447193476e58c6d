use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Scheduling hint: defer visible delivery by this many milliseconds.
pub const DELAY_HEADER: &str = "delay";
/// Producer-side dynamic routing override; the value names the destination.
pub const SENDTO_DESTINATION_HEADER: &str = "sendto.destination";
/// Broker-assigned identifier of an unacknowledged delivery, scoped to a channel.
pub const DELIVERY_TAG_HEADER: &str = "deliveryTag";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    #[error("missing header: '{0}'")]
    Missing(&'static str),

    #[error("header '{header}' is not a {expected}")]
    TypeMismatch {
        header: &'static str,
        expected: &'static str,
    },

    #[error("delivery tag present without a channel reference")]
    ChannelMissing,
}

#[derive(Clone, PartialEq, Debug)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(value) => Some(value),
            HeaderValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(value) => Some(*value),
            HeaderValue::Str(_) => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

pub type Headers = HashMap<String, HeaderValue>;

/// Typed read of an integer header. An absent header is fine, a mistyped
/// value is a boundary error.
pub fn int_header(headers: &Headers, name: &'static str) -> Result<Option<i64>, HeaderError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value.as_int().map(Some).ok_or(HeaderError::TypeMismatch {
            header: name,
            expected: "integer",
        }),
    }
}

/// Typed read of a string header, same contract as [`int_header`].
pub fn str_header<'a>(
    headers: &'a Headers,
    name: &'static str,
) -> Result<Option<&'a str>, HeaderError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or(HeaderError::TypeMismatch {
            header: name,
            expected: "string",
        }),
    }
}

#[derive(Clone, PartialEq, Default, Debug)]
pub struct Message {
    pub uuid: Uuid,
    pub payload: String,
    pub headers: Headers,
}

impl Message {
    pub fn new(payload: impl Into<String>, headers: Headers) -> Self {
        Message {
            uuid: Uuid::new_v4(),
            payload: payload.into(),
            headers,
        }
    }
}

/// Domain record produced by the periodic supplier.
///
/// `delay_time_ms` travels as `delayTime` on the wire.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub id: u32,
    #[serde(rename = "delayTime")]
    pub delay_time_ms: u64,
}
