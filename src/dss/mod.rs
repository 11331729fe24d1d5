//! DSS client interface
//!
//! The DSS (Distributed Storage State) holds the authoritative
//! device, medium and object tables. The scheduler consumes a small
//! slice of it: filtered queries, per-row lock/unlock keyed by an
//! owner string, and medium updates. Queries take JSON filter
//! expressions over the rows' serde attribute paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ostore_api_types::{DeviceInfo, Family, MediumId, MediumInfo};

pub mod filter;

mod memory;
pub use memory::MemoryDss;

/// Object location row, consumed by locate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub oid: String,
    pub uuid: String,
    pub version: u32,
    /// Medium holding the object data
    pub medium: MediumId,
}

/// DSS access error
#[derive(thiserror::Error, Debug)]
pub enum DssError {
    /// A lock mutation lost against the current holder
    #[error("row is locked by '{0}'")]
    Locked(String),
    /// Unlock of a row nobody holds
    #[error("row is not locked")]
    NotLocked,
    /// The addressed row does not exist
    #[error("no such row")]
    NoSuchRow,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Client side of the DSS
///
/// Lock mutations are atomic per row: `*_lock` either installs
/// `owner` on an unlocked row or fails with [DssError::Locked], and
/// `*_unlock` only succeeds for the current holder. Updates never
/// touch the lock column.
pub trait Dss {
    fn device_get(&self, filter: &Value) -> Result<Vec<DeviceInfo>, DssError>;

    fn media_get(&self, filter: &Value) -> Result<Vec<MediumInfo>, DssError>;

    fn object_get(&self, filter: &Value) -> Result<Vec<ObjectInfo>, DssError>;

    /// Persist a medium row (everything but the lock column).
    fn media_update(&self, medium: &MediumInfo) -> Result<(), DssError>;

    fn device_lock(&self, family: Family, serial: &str, owner: &str) -> Result<(), DssError>;

    fn device_unlock(&self, family: Family, serial: &str, owner: &str) -> Result<(), DssError>;

    fn media_lock(&self, id: &MediumId, owner: &str) -> Result<(), DssError>;

    fn media_unlock(&self, id: &MediumId, owner: &str) -> Result<(), DssError>;
}
