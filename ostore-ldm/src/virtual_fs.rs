// Note: This is only for test and debug

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;

use crate::{FsAdapter, FsSpace, LdmError};

const DEFAULT_CAPACITY: u64 = 64 * 1024 * 1024;

struct VirtualFilesystem {
    used: u64,
    avail: u64,
    read_only: bool,
}

struct Mount {
    root: PathBuf,
    label: String,
}

#[derive(Default)]
struct FsState {
    filesystems: HashMap<String, VirtualFilesystem>,
    // keyed by device path
    mounts: HashMap<PathBuf, Mount>,
    capacities: HashMap<String, u64>,
}

/// In-memory filesystem layer
///
/// Media are identified by label. Tests pre-register formatted media
/// with [VirtualFs::add_filesystem] or set a capacity for media that
/// the scheduler will format itself.
#[derive(Clone, Default)]
pub struct VirtualFs {
    state: Arc<Mutex<FsState>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already formatted filesystem.
    pub fn add_filesystem(&self, label: &str, used: u64, avail: u64) {
        let mut state = self.state.lock().unwrap();
        state.filesystems.insert(
            label.to_string(),
            VirtualFilesystem {
                used,
                avail,
                read_only: false,
            },
        );
    }

    /// Capacity [VirtualFs::format] will report for the given label.
    pub fn set_capacity(&self, label: &str, avail: u64) {
        let mut state = self.state.lock().unwrap();
        state.capacities.insert(label.to_string(), avail);
    }

    /// Make an existing filesystem report itself read-only.
    pub fn set_read_only(&self, label: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(fs) = state.filesystems.get_mut(label) {
            fs.read_only = true;
        }
    }

    /// Account `bytes` of writes against the filesystem.
    pub fn consume(&self, label: &str, bytes: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(fs) = state.filesystems.get_mut(label) {
            fs.used += bytes;
            fs.avail = fs.avail.saturating_sub(bytes);
        }
    }

    /// Number of active mounts, for test inspection.
    pub fn mount_count(&self) -> usize {
        self.state.lock().unwrap().mounts.len()
    }
}

impl FsAdapter for VirtualFs {
    fn mounted(&mut self, device: &Path) -> Result<Option<PathBuf>, LdmError> {
        let state = self.state.lock().unwrap();
        Ok(state.mounts.get(device).map(|mount| mount.root.clone()))
    }

    fn mount(&mut self, device: &Path, mount_path: &Path, label: &str) -> Result<(), LdmError> {
        let mut state = self.state.lock().unwrap();
        if !state.filesystems.contains_key(label) {
            return Err(LdmError::sys(
                Errno::ENOENT,
                format!("no filesystem with label '{}'", label),
            ));
        }
        if state.mounts.contains_key(device) {
            return Err(LdmError::sys(
                Errno::EBUSY,
                format!("device {:?} is already mounted", device),
            ));
        }
        state.mounts.insert(
            device.to_owned(),
            Mount {
                root: mount_path.to_owned(),
                label: label.to_string(),
            },
        );
        Ok(())
    }

    fn umount(&mut self, device: &Path, _mount_path: &Path) -> Result<(), LdmError> {
        let mut state = self.state.lock().unwrap();
        match state.mounts.remove(device) {
            Some(_) => Ok(()),
            None => Err(LdmError::sys(
                Errno::EINVAL,
                format!("device {:?} is not mounted", device),
            )),
        }
    }

    fn format(&mut self, _device: &Path, label: &str) -> Result<FsSpace, LdmError> {
        let mut state = self.state.lock().unwrap();
        let avail = state
            .capacities
            .get(label)
            .copied()
            .unwrap_or(DEFAULT_CAPACITY);
        state.filesystems.insert(
            label.to_string(),
            VirtualFilesystem {
                used: 0,
                avail,
                read_only: false,
            },
        );
        Ok(FsSpace {
            used: 0,
            avail,
            read_only: false,
        })
    }

    fn df(&mut self, root: &Path) -> Result<FsSpace, LdmError> {
        let state = self.state.lock().unwrap();
        let mount = state
            .mounts
            .values()
            .find(|mount| mount.root == root)
            .ok_or_else(|| {
                LdmError::sys(Errno::ENOENT, format!("nothing mounted at {:?}", root))
            })?;
        // mount() checked the label
        let fs = &state.filesystems[&mount.label];
        Ok(FsSpace {
            used: fs.used,
            avail: fs.avail,
            read_only: fs.read_only,
        })
    }
}
