//! Scheduler configuration
//!
//! One JSON document configures a scheduler instance: the mount point
//! prefix, the family it serves, the library control device, the PUT
//! policy, and the drive/medium compatibility tables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{format_err, Error};
use serde::{Deserialize, Serialize};

use ostore_api_types::{Family, PutPolicy};

/// Models belonging to a named drive class
///
/// Example: drive type "LTO5_drive" covering the model strings
/// reported by half-height and full-height LTO5 drives.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriveTypeConfig {
    pub models: Vec<String>,
}

/// Drive classes able to read and write a medium model
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TapeTypeConfig {
    pub drive_rw: Vec<String>,
}

fn default_mount_prefix() -> String {
    String::from("/mnt/ostore-")
}

fn default_family() -> Family {
    Family::Tape
}

fn default_lib_device() -> String {
    String::from("/dev/changer")
}

fn default_policy() -> PutPolicy {
    PutPolicy::BestFit
}

/// Scheduler instance configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LrsConfig {
    /// Path prefix for mount points
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,
    /// Family this instance schedules
    #[serde(default = "default_family")]
    pub default_family: Family,
    /// Library control device
    #[serde(default = "default_lib_device")]
    pub lib_device: String,
    /// Medium/drive selection policy for PUT
    #[serde(default = "default_policy")]
    pub policy: PutPolicy,
    /// Drive class name to model strings
    #[serde(default)]
    pub drive_type: HashMap<String, DriveTypeConfig>,
    /// Medium model to compatible drive class names
    #[serde(default)]
    pub tape_type: HashMap<String, TapeTypeConfig>,
}

impl Default for LrsConfig {
    fn default() -> Self {
        LrsConfig {
            mount_prefix: default_mount_prefix(),
            default_family: default_family(),
            lib_device: default_lib_device(),
            policy: default_policy(),
            drive_type: HashMap::new(),
            tape_type: HashMap::new(),
        }
    }
}

impl LrsConfig {
    /// Read the configuration from a JSON document.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|err| format_err!("unable to read config {:?} - {}", path, err))?;
        let config = serde_json::from_str(&data)
            .map_err(|err| format_err!("unable to parse config {:?} - {}", path, err))?;
        Ok(config)
    }
}
