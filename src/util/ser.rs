//! Helpful serialization tools.
//!
//! Binary structures go over the wire as DER (via `rasn`), anything that talks
//! to the CA is JSON, and the glue between the two is standard base64.

use crate::error::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use rasn::{Decode, Encode};

/// Serialize an object to DER.
pub(crate) fn serialize<T: Encode>(obj: &T) -> Result<Vec<u8>> {
    Ok(rasn::der::encode(obj)?)
}

/// Deserialize an object from DER.
pub(crate) fn deserialize<T: Decode>(bytes: &[u8]) -> Result<T> {
    Ok(rasn::der::decode(bytes)?)
}

/// Convert bytes to base64
pub fn base64_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    STANDARD.encode(bytes.as_ref())
}

/// Convert base64 to bytes
pub fn base64_decode<T: AsRef<[u8]>>(bytes: T) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(bytes.as_ref())?)
}

/// Cut a (possibly huge) response body down to something that fits in an
/// error message or log line.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        return body.to_string();
    }
    let cut = body.chars().take(max).collect::<String>();
    format!("{}...", cut)
}

/// A default implementation for (de)serializing an object to or from binary
/// format.
pub trait SerdeBinary: Encode + Decode {
    /// Serialize this message
    fn serialize_binary(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Deserialize this message
    fn deserialize_binary(slice: &[u8]) -> Result<Self> {
        deserialize(slice)
    }
}

pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String>::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(de::Error::custom)
    }
}
