//! Local Device Manager (LDM) adapters
//!
//! Primitive operations against the host's hardware: device path
//! resolution, robotic library moves, filesystem mount/umount/format
//! and IO flushing. The scheduler only ever talks to the traits
//! defined here; one adapter set exists per storage family.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod error;
pub use error::LdmError;

pub mod posix;

mod virtual_device;
pub use virtual_device::VirtualDeviceList;

mod virtual_library;
pub use virtual_library::VirtualLibrary;

mod virtual_fs;
pub use virtual_fs::VirtualFs;

mod virtual_io;
pub use virtual_io::VirtualIo;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Kind of a library element
pub enum ElementType {
    /// Media transport (robotic arm)
    Arm,
    /// Storage slot
    Slot,
    /// Import/export slot
    ImpExp,
    /// Data transfer element (drive)
    Drive,
    /// Not determined
    Unknown,
}
serde_plain::derive_display_from_serialize!(ElementType);

/// Address of a library element
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LibAddr {
    pub typ: ElementType,
    pub index: u64,
}

impl LibAddr {
    pub fn new(typ: ElementType, index: u64) -> Self {
        LibAddr { typ, index }
    }

    pub fn is_drive(&self) -> bool {
        self.typ == ElementType::Drive
    }
}

impl fmt::Display for LibAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.typ, self.index)
    }
}

/// Library view of one drive
#[derive(Clone, Debug)]
pub struct DriveElementInfo {
    pub addr: LibAddr,
    /// Does the drive contain a medium?
    pub full: bool,
    /// Label of the contained medium, if the library knows it
    pub medium_id: Option<String>,
}

/// OS view of a device node
#[derive(Clone, Debug, Default)]
pub struct DeviceSpec {
    pub model: Option<String>,
    pub serial: Option<String>,
}

/// Space counters of a filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct FsSpace {
    pub used: u64,
    pub avail: u64,
    /// The filesystem refuses further writes
    pub read_only: bool,
}

/// Device path resolution and identification
pub trait DeviceAdapter {
    /// Resolve the OS device path from a serial number.
    fn lookup(&mut self, serial: &str) -> Result<PathBuf, LdmError>;

    /// Query the OS view of the device behind `path`.
    fn query(&mut self, path: &Path) -> Result<DeviceSpec, LdmError>;
}

/// Robotic library operations
///
/// Implementations open and close their control device per call, so
/// handles carry no long-lived hardware state.
pub trait LibraryAdapter {
    /// Library view of the drive with the given serial.
    fn drive_lookup(&mut self, serial: &str) -> Result<DriveElementInfo, LdmError>;

    /// Element currently holding the medium with the given label.
    fn media_lookup(&mut self, label: &str) -> Result<LibAddr, LdmError>;

    /// Move a medium from `src` to `dst`.
    fn media_move(&mut self, src: LibAddr, dst: LibAddr) -> Result<(), LdmError>;

    /// Pick an empty storage slot.
    fn free_slot(&mut self) -> Result<LibAddr, LdmError>;
}

/// Filesystem operations on a medium
pub trait FsAdapter {
    /// Mount point of the filesystem on `device`, if currently mounted.
    fn mounted(&mut self, device: &Path) -> Result<Option<PathBuf>, LdmError>;

    fn mount(&mut self, device: &Path, mount_path: &Path, label: &str) -> Result<(), LdmError>;

    fn umount(&mut self, device: &Path, mount_path: &Path) -> Result<(), LdmError>;

    /// Create the filesystem; returns the initial space counters.
    fn format(&mut self, device: &Path, label: &str) -> Result<FsSpace, LdmError>;

    /// Space counters and flags for a mounted filesystem root.
    fn df(&mut self, root: &Path) -> Result<FsSpace, LdmError>;
}

/// Post-IO flushing
pub trait IoAdapter {
    /// Flush pending data under a mount root.
    ///
    /// Returns true when the medium reported a global error (e.g. end
    /// of tape), in which case it must not be written again.
    fn flush(&mut self, root: &Path) -> Result<bool, LdmError>;
}
