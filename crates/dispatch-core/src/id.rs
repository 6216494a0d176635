//! Identity types for the dispatch board
//!
//! Board entities are addressed by opaque [`EntityId`]s. The wire format
//! carries them either as JSON numbers (server-minted ids and legacy
//! time-based ids) or as JSON strings (the built-in locations), so the
//! id keeps its canonical text and decides the JSON form when serialized.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Doctor or location identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    #[inline]
    pub fn numeric(id: u64) -> Self {
        EntityId(id.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value if the id is a canonical decimal integer.
    ///
    /// `"17"` is numeric, `"017"` and `"repos"` are not.
    pub fn as_u64(&self) -> Option<u64> {
        let s = self.0.as_str();
        let canonical = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit())
            && (s.len() == 1 || !s.starts_with('0'));
        if canonical {
            s.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId::numeric(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_u64() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}

struct EntityIdVisitor;

impl<'de> Visitor<'de> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or non-negative integer identifier")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
        Ok(EntityId::numeric(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
        u64::try_from(v)
            .map(EntityId::numeric)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntityId, E> {
        if v.is_finite() && v.fract() == 0.0 && v >= 0.0 && v < u64::MAX as f64 {
            Ok(EntityId::numeric(v as u64))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
        Ok(EntityId::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<EntityId, E> {
        Ok(EntityId(v))
    }
}

/// Connection identity, unique for the lifetime of the server process
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(pub u64);

impl SessionId {
    #[inline]
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({:016x})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Monotonic source of fresh numeric entity ids.
///
/// The allocator only moves forward: observing an id larger than anything
/// handed out so far raises the floor, so a minted id never repeats one
/// the board has already seen.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    /// Start above `floor`
    pub fn seeded(floor: u64) -> Self {
        IdAllocator { last: floor }
    }

    /// Raise the floor past `id` if it is numeric
    pub fn observe(&mut self, id: &EntityId) {
        if let Some(n) = id.as_u64() {
            self.last = self.last.max(n);
        }
    }

    pub fn observe_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EntityId>) {
        for id in ids {
            self.observe(id);
        }
    }

    /// Next numeric id, or `None` once `u64::MAX` has been handed out
    pub fn next_id(&mut self) -> Option<EntityId> {
        self.last = self.last.checked_add(1)?;
        Some(EntityId::numeric(self.last))
    }

    /// Highest id handed out or observed
    pub fn last(&self) -> u64 {
        self.last
    }
}
