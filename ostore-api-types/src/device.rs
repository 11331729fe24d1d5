use serde::{Deserialize, Serialize};

use crate::{AdmStatus, Family, LockState};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Operational status of a drive
pub enum DeviceState {
    /// No medium inside the drive
    Empty,
    /// Medium inside the drive, filesystem not mounted
    Loaded,
    /// Medium inside the drive, filesystem mounted
    Mounted,
    /// Drive is unusable until re-checked
    Failed,
    /// Status not yet known, matches any state in lookups
    Unspec,
}
serde_plain::derive_display_from_serialize!(DeviceState);
serde_plain::derive_fromstr_from_deserialize!(DeviceState);

/// Device DSS row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub family: Family,
    /// Drive serial number, the stable identity of the device
    pub serial: String,
    /// Drive model as registered in the DSS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Host owning the device
    pub host: String,
    pub adm_status: AdmStatus,
    #[serde(default)]
    pub lock: LockState,
}
