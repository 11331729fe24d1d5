//! Device descriptors and state transitions
//!
//! A descriptor merges three views of one drive: the DSS row, the OS
//! device node, and the library element. The medium record moves
//! into the descriptor on load and out again on unload; while it is
//! in, the descriptor owns it.

use std::path::{Path, PathBuf};

use log::{info, warn};
use nix::errno::Errno;

use ostore_api_types::{DeviceInfo, DeviceState, MediumInfo};
use ostore_ldm::{FsAdapter, LibAddr, LibraryAdapter};

use crate::dss::Dss;

use super::SchedError;

pub struct DeviceDescr {
    /// DSS identity
    pub info: DeviceInfo,
    /// Resolved OS device path
    pub path: PathBuf,
    /// Model as reported by the OS
    pub sys_model: Option<String>,
    /// Serial as reported by the OS
    pub sys_serial: Option<String>,
    /// Mount point, set while mounted
    pub mount_path: Option<PathBuf>,
    /// Library element holding this drive
    pub lib_addr: Option<LibAddr>,
    /// Label the library reports for the contained medium
    pub medium_id: Option<String>,
    /// Owned medium record, present while loaded or mounted
    pub medium: Option<MediumInfo>,
    pub state: DeviceState,
    /// True iff this instance holds the DSS device lock
    pub locked_local: bool,
}

impl DeviceDescr {
    pub fn new(info: DeviceInfo) -> Self {
        DeviceDescr {
            info,
            path: PathBuf::new(),
            sys_model: None,
            sys_serial: None,
            mount_path: None,
            lib_addr: None,
            medium_id: None,
            medium: None,
            state: DeviceState::Unspec,
            locked_local: false,
        }
    }

    pub fn serial(&self) -> &str {
        &self.info.serial
    }

    /// Model string used for compatibility checks: the OS view wins
    /// over the DSS row.
    pub fn drive_model(&self) -> Option<&str> {
        self.sys_model.as_deref().or(self.info.model.as_deref())
    }

    /// Free space on the loaded medium, 0 when empty.
    pub fn medium_free(&self) -> u64 {
        self.medium
            .as_ref()
            .map(|medium| medium.stats.phys_spc_free)
            .unwrap_or(0)
    }

    /// State/content consistency, as observable by clients.
    pub fn state_consistent(&self) -> bool {
        match self.state {
            DeviceState::Mounted => self.mount_path.is_some() && self.medium.is_some(),
            DeviceState::Loaded => self.mount_path.is_none() && self.medium.is_some(),
            DeviceState::Empty => self.mount_path.is_none() && self.medium.is_none(),
            DeviceState::Failed | DeviceState::Unspec => true,
        }
    }
}

fn mount_point(prefix: &str, dev_path: &Path) -> Result<PathBuf, SchedError> {
    match dev_path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Ok(PathBuf::from(format!("{}{}", prefix, name))),
        None => Err(SchedError::Invalid(format!(
            "device path {:?} has no usable file name",
            dev_path
        ))),
    }
}

/// empty -> loaded
///
/// Moves the medium from wherever the library holds it into this
/// drive. A drive-to-drive motion the library refuses with EINVAL is
/// reported as `Busy` and leaves the drive untouched, so the caller
/// can retry once the source drive has unloaded.
pub(crate) fn load(
    dev: &mut DeviceDescr,
    lib: &mut dyn LibraryAdapter,
    medium: MediumInfo,
) -> Result<(), SchedError> {
    if dev.medium.is_some() {
        return Err(SchedError::Invalid(format!(
            "drive '{}' already holds a medium",
            dev.serial()
        )));
    }

    let dst = match dev.lib_addr {
        Some(addr) => addr,
        None => {
            return Err(SchedError::Invalid(format!(
                "library address of drive '{}' is unknown",
                dev.serial()
            )))
        }
    };

    let src = match lib.media_lookup(&medium.id.id) {
        Ok(addr) => addr,
        Err(err) => {
            dev.state = DeviceState::Failed;
            return Err(err.into());
        }
    };

    info!(
        "loading medium '{}' ({} -> {}) into drive '{}'",
        medium.id, src, dst, dev.serial()
    );

    if let Err(err) = lib.media_move(src, dst) {
        if err.is_errno(Errno::EINVAL) && src.is_drive() && dst.is_drive() {
            return Err(SchedError::Busy(format!(
                "medium '{}' sits in another drive ({})",
                medium.id, src
            )));
        }
        dev.state = DeviceState::Failed;
        return Err(err.into());
    }

    dev.medium_id = Some(medium.id.id.clone());
    dev.medium = Some(medium);
    dev.state = DeviceState::Loaded;
    Ok(())
}

/// loaded -> mounted
///
/// Reuses a pre-existing mount when the filesystem layer reports
/// one; otherwise mounts at `<prefix><basename(device-path)>`.
pub(crate) fn mount(
    dev: &mut DeviceDescr,
    fs: &mut dyn FsAdapter,
    mount_prefix: &str,
) -> Result<(), SchedError> {
    let label = match &dev.medium {
        Some(medium) => medium.fs.label.clone(),
        None => {
            return Err(SchedError::Invalid(format!(
                "drive '{}' has no medium to mount",
                dev.serial()
            )))
        }
    };

    match fs.mounted(&dev.path) {
        Ok(Some(root)) => {
            dev.mount_path = Some(root);
            dev.state = DeviceState::Mounted;
            return Ok(());
        }
        Ok(None) => { /* not mounted yet */ }
        Err(err) => {
            dev.state = DeviceState::Failed;
            return Err(err.into());
        }
    }

    let root = mount_point(mount_prefix, &dev.path)?;

    info!("mounting '{}' from drive '{}' at {:?}", label, dev.serial(), root);

    if let Err(err) = fs.mount(&dev.path, &root, &label) {
        dev.state = DeviceState::Failed;
        return Err(err.into());
    }

    dev.mount_path = Some(root);
    dev.state = DeviceState::Mounted;
    Ok(())
}

/// mounted -> loaded
pub(crate) fn umount(dev: &mut DeviceDescr, fs: &mut dyn FsAdapter) -> Result<(), SchedError> {
    let root = match &dev.mount_path {
        Some(root) => root.clone(),
        None => {
            return Err(SchedError::Invalid(format!(
                "drive '{}' is not mounted",
                dev.serial()
            )))
        }
    };

    info!("unmounting {:?} on drive '{}'", root, dev.serial());

    if let Err(err) = fs.umount(&dev.path, &root) {
        dev.state = DeviceState::Failed;
        return Err(err.into());
    }

    dev.mount_path = None;
    dev.state = DeviceState::Loaded;
    Ok(())
}

/// loaded -> empty
///
/// Moves the medium to a free slot chosen by the library and
/// releases the medium DSS lock, which the caller acquired by
/// convention before loading.
pub(crate) fn unload(
    dev: &mut DeviceDescr,
    lib: &mut dyn LibraryAdapter,
    dss: &dyn Dss,
    owner: &str,
) -> Result<(), SchedError> {
    let src = match dev.lib_addr {
        Some(addr) => addr,
        None => {
            return Err(SchedError::Invalid(format!(
                "library address of drive '{}' is unknown",
                dev.serial()
            )))
        }
    };

    let medium = match dev.medium.take() {
        Some(medium) => medium,
        None => {
            return Err(SchedError::Invalid(format!(
                "drive '{}' has no medium to unload",
                dev.serial()
            )))
        }
    };

    let dst = match lib.free_slot() {
        Ok(addr) => addr,
        Err(err) => {
            dev.medium = Some(medium);
            dev.state = DeviceState::Failed;
            return Err(err.into());
        }
    };

    info!(
        "unloading medium '{}' from drive '{}' to {}",
        medium.id, dev.serial(), dst
    );

    if let Err(err) = lib.media_move(src, dst) {
        dev.medium = Some(medium);
        dev.state = DeviceState::Failed;
        return Err(err.into());
    }

    dev.medium_id = None;
    dev.state = DeviceState::Empty;

    if medium.lock.owned_by(owner) {
        if let Err(err) = dss.media_unlock(&medium.id, owner) {
            warn!("unable to release lock on '{}' - {}", medium.id, err);
            dev.state = DeviceState::Failed;
            return Err(err.into());
        }
    }

    Ok(())
}
