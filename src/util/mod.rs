//! Utilities. OBVIOUSLY.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;

pub mod ser;
#[cfg(test)]
pub(crate) mod test;

/// Allows an object to hand back a copy of itself with everything that must
/// not reach a hash or signature stripped out.
///
/// Implementations never touch `self`: the caller's instance stays exactly as
/// it was and the stripped copy is a brand new object.
pub trait Canonical: Clone {
    /// Return a copy of this object with the non-canonical parts removed.
    fn canonical(&self) -> Self;

    /// Returns whether or not this object has any non-canonical parts.
    fn has_transient(&self) -> bool;
}

/// A library-local representation of a time.
///
/// The CA wants its time bounds as ISO-8601 UTC with millisecond precision
/// (`2024-01-02T03:04:05.678Z`), which is what both `Display` and the serde
/// implementation produce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(#[serde(with = "crate::util::ser::timestamp")] DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from the current date/time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from milliseconds since the unix epoch.
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Milliseconds since the unix epoch.
    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Format as `YYYY-MM-DDTHH:MM:SS.sssZ`
    pub fn to_iso8601_millis(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Deref for Timestamp {
    type Target = DateTime<Utc>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(date: DateTime<Utc>) -> Self {
        Self(date)
    }
}

impl FromStr for Timestamp {
    type Err = chrono::format::ParseError;
    fn from_str(s: &str) -> std::result::Result<Timestamp, Self::Err> {
        let datetime: DateTime<Utc> = s.parse()?;
        Ok(Timestamp(datetime))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_iso8601_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_iso8601_millis() {
        let ts = Timestamp::from_str("2028-09-30T06:34:22.5Z").unwrap();
        assert_eq!(ts.to_iso8601_millis(), "2028-09-30T06:34:22.500Z");
        assert_eq!(format!("{}", ts), "2028-09-30T06:34:22.500Z");

        let ts2 = Timestamp::from_millis(0).unwrap();
        assert_eq!(ts2.to_iso8601_millis(), "1970-01-01T00:00:00.000Z");
        assert_eq!(Timestamp::from_millis(ts.millis()).unwrap(), ts);
    }

    #[test]
    fn timestamp_offset_normalized_to_utc() {
        let ts = Timestamp::from_str("2028-09-30T08:34:22.123+02:00").unwrap();
        assert_eq!(ts.to_iso8601_millis(), "2028-09-30T06:34:22.123Z");
    }

    #[test]
    fn timestamp_serde_json() {
        let ts = Timestamp::from_str("2028-09-30T06:34:22.001Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#""2028-09-30T06:34:22.001Z""#);
        let ts2: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, ts2);
    }
}
