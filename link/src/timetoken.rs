//! Timetoken: the service's position marker in the event stream.
//!
//! A timetoken is a 17-digit count of 100ns ticks since the Unix epoch plus
//! the region of the edge that produced it. The subscribe loop keeps the last
//! one it received and sends it back on the next long-poll so the stream
//! resumes without gaps or duplicates.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Position in the service's event stream (`{t, r}` on the wire).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timetoken {
    /// 100ns ticks since the Unix epoch; `0` asks the service for "now".
    #[serde(rename = "t", with = "ticks")]
    pub timestamp: u64,
    /// Region of the edge that issued the timetoken.
    #[serde(rename = "r", default)]
    pub region: u32,
}

impl Timetoken {
    /// Ticks per millisecond.
    pub const TICKS_PER_MILLI: u64 = 10_000;

    /// The "start from now" cursor used for the first long-poll of a session.
    pub const NOW: Timetoken = Timetoken {
        timestamp: 0,
        region: 0,
    };

    /// Create a timetoken from its raw parts.
    pub fn new(timestamp: u64, region: u32) -> Self {
        Self { timestamp, region }
    }

    /// Create a timetoken without region information.
    pub fn from_timestamp(timestamp: u64) -> Self {
        Self::new(timestamp, 0)
    }

    /// Whether this is the "now" marker rather than a real stream position.
    pub fn is_now(&self) -> bool {
        self.timestamp == 0
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp / Self::TICKS_PER_MILLI
    }

    /// Convert to `SystemTime`
    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.timestamp.saturating_mul(100))
    }

    /// Parse the decimal timestamp form (`"15628652479932717"`).
    pub fn parse(s: &str) -> Result<Self, String> {
        s.trim()
            .parse::<u64>()
            .map(Self::from_timestamp)
            .map_err(|e| format!("Failed to parse timetoken '{}': {}", s, e))
    }
}

impl fmt::Display for Timetoken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp)
    }
}

impl From<u64> for Timetoken {
    fn from(value: u64) -> Self {
        Self::from_timestamp(value)
    }
}

/// The service encodes the tick count as a JSON string; numbers are accepted too.
pub(crate) mod ticks {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        struct TicksVisitor;

        impl<'de> Visitor<'de> for TicksVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a timetoken as a decimal string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
                u64::try_from(v).map_err(|_| E::custom("negative timetoken"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                v.parse::<u64>().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TicksVisitor)
    }
}
