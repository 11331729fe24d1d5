//! Basic API types shared by the ostore crates.
//!
//! These mirror the DSS table rows (devices, media) and the enums used
//! by the scheduler. Everything here is plain data with serde
//! round-trip support; behavior lives in the consumer crates.

use serde::{Deserialize, Serialize};

mod lock;
pub use lock::LockState;

mod media;
pub use media::{AddrType, FsDescr, FsStatus, FsType, MediaStats, MediumId, MediumInfo};

mod device;
pub use device::{DeviceInfo, DeviceState};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Storage family
///
/// The family decides which LDM adapters drive a resource.
pub enum Family {
    /// Tape cartridges handled through a robotic library
    Tape,
    /// Directory trees on an already mounted filesystem
    Dir,
}
serde_plain::derive_display_from_serialize!(Family);
serde_plain::derive_fromstr_from_deserialize!(Family);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Administrative status of a DSS resource
///
/// Locked resources are invisible to the scheduler.
pub enum AdmStatus {
    /// Resource may be used
    Unlocked,
    /// Resource is administratively excluded
    Locked,
    /// Resource is marked failed by an administrator
    Failed,
}
serde_plain::derive_display_from_serialize!(AdmStatus);
serde_plain::derive_fromstr_from_deserialize!(AdmStatus);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Media/drive selection policy for PUT
pub enum PutPolicy {
    /// Prefer the candidate leaving the least free space
    BestFit,
    /// Stop at the first candidate with enough free space
    FirstFit,
}
serde_plain::derive_display_from_serialize!(PutPolicy);
serde_plain::derive_fromstr_from_deserialize!(PutPolicy);
