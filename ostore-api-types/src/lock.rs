use std::fmt;

use serde::{Deserialize, Serialize};

/// Lock view of a DSS row
///
/// The DSS persists a free-form owner string next to each device and
/// medium row; an empty string means unlocked. `External` only ever
/// exists in memory: it marks a row we observed as locked by another
/// scheduler instance, so that selection loops skip it without
/// re-querying.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LockState {
    /// Nobody holds the row
    Unlocked,
    /// The row is locked by the given owner string
    Owner(String),
    /// Memory-only marker: locked by an owner that is not us
    External,
}

impl LockState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LockState::Unlocked)
    }

    pub fn is_external(&self) -> bool {
        matches!(self, LockState::External)
    }

    /// Owner string, if the row is locked and the owner is known.
    pub fn owner(&self) -> Option<&str> {
        match self {
            LockState::Owner(owner) => Some(owner),
            LockState::Unlocked | LockState::External => None,
        }
    }

    pub fn owned_by(&self, owner: &str) -> bool {
        self.owner() == Some(owner)
    }

    /// Collapse a freshly queried lock into the local view: rows held
    /// by anyone but `owner` become [LockState::External].
    pub fn localize(self, owner: &str) -> Self {
        match self {
            LockState::Owner(ref o) if o != owner => LockState::External,
            other => other,
        }
    }
}

impl Default for LockState {
    fn default() -> Self {
        LockState::Unlocked
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => write!(f, "unlocked"),
            LockState::Owner(owner) => write!(f, "locked by '{}'", owner),
            LockState::External => write!(f, "locked externally"),
        }
    }
}

impl Serialize for LockState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LockState::Owner(owner) => serializer.serialize_str(owner),
            // `External` is never persisted - on the wire it reads as
            // an unlocked row and is recomputed on the next query.
            LockState::Unlocked | LockState::External => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for LockState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let owner = String::deserialize(deserializer)?;
        if owner.is_empty() {
            Ok(LockState::Unlocked)
        } else {
            Ok(LockState::Owner(owner))
        }
    }
}
