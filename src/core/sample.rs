//! Timestamped readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped scalar reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Acquisition time
    pub timestamp: DateTime<Utc>,
    /// Reading
    #[serde(with = "reading")]
    pub value: f64,
}

impl Sample {
    /// Create a sample
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Create a sample stamped with the current time
    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }

    /// Render the push-transport message `{"timestamp": ..., "value": ...}`
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Serde adapter for readings.
///
/// Finite values are plain numbers. `NaN`, `inf` and `-inf` are written as
/// strings, which JSON cannot otherwise carry, and read back from either form.
pub mod reading {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Serialize a reading
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    /// Deserialize a reading from a number or a numeric string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(ReadingVisitor)
    }

    struct ReadingVisitor;

    impl<'de> Visitor<'de> for ReadingVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}
