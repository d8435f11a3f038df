use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed transition identifier backed by ULID.
///
/// Used purely for log correlation: every transition attempt carries one so
/// that guard, middleware, and commit log lines can be tied together. State
/// identity uses the monotonic `u64` in `StateMeta`, not this.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct TransitionId(pub ulid::Ulid);

impl TransitionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn from_ulid(id: ulid::Ulid) -> Self {
        Self(id)
    }
}

impl Default for TransitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TransitionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransitionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(TransitionId(id))
    }
}

impl Serialize for TransitionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TransitionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<TransitionId>()
            .map_err(|_| serde::de::Error::custom("invalid transition id"))
    }
}
