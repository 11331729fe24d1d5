//! POSIX directory adapters
//!
//! For the `dir` family a "drive" is a directory on an already
//! mounted filesystem and the medium inside it never moves. The
//! library is therefore trivial: every medium sits in its own drive
//! forever, and moves are not supported.

use std::fs::File;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::statvfs::{statvfs, FsFlags};

use crate::{
    DeviceAdapter, DeviceSpec, DriveElementInfo, ElementType, FsAdapter, FsSpace, IoAdapter,
    LdmError, LibAddr, LibraryAdapter,
};

const FS_LABEL_FILE: &str = ".fs_label";

fn basename(path: &Path) -> Result<String, LdmError> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => Err(LdmError::sys(
            Errno::EINVAL,
            format!("path {:?} has no usable file name", path),
        )),
    }
}

fn space_of(path: &Path) -> Result<FsSpace, LdmError> {
    let stat = statvfs(path).map_err(|err| {
        LdmError::sys(
            err,
            format!("statvfs on {:?} failed - {}", path, err.desc()),
        )
    })?;

    let frsize = stat.fragment_size() as u64;
    Ok(FsSpace {
        used: (stat.blocks() as u64 - stat.blocks_free() as u64) * frsize,
        avail: stat.blocks_available() as u64 * frsize,
        read_only: stat.flags().contains(FsFlags::ST_RDONLY),
    })
}

/// Resolves dir-family "serials" below a fixed root directory
pub struct PosixDeviceAdapter {
    root: PathBuf,
}

impl PosixDeviceAdapter {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        PosixDeviceAdapter { root: root.into() }
    }
}

impl DeviceAdapter for PosixDeviceAdapter {
    fn lookup(&mut self, serial: &str) -> Result<PathBuf, LdmError> {
        let path = self.root.join(serial);
        if !path.is_dir() {
            return Err(LdmError::sys(
                Errno::ENOENT,
                format!("no directory device {:?}", path),
            ));
        }
        Ok(path)
    }

    fn query(&mut self, path: &Path) -> Result<DeviceSpec, LdmError> {
        if !path.is_dir() {
            return Err(LdmError::sys(
                Errno::ENOENT,
                format!("no directory device {:?}", path),
            ));
        }
        Ok(DeviceSpec {
            model: None,
            serial: Some(basename(path)?),
        })
    }
}

/// Degenerate library for directory media
///
/// A directory medium shares its id with its drive and is permanently
/// loaded there.
pub struct DirLibrary;

impl LibraryAdapter for DirLibrary {
    fn drive_lookup(&mut self, serial: &str) -> Result<DriveElementInfo, LdmError> {
        Ok(DriveElementInfo {
            addr: LibAddr::new(ElementType::Drive, 0),
            full: true,
            medium_id: Some(serial.to_string()),
        })
    }

    fn media_lookup(&mut self, _label: &str) -> Result<LibAddr, LdmError> {
        Ok(LibAddr::new(ElementType::Drive, 0))
    }

    fn media_move(&mut self, _src: LibAddr, _dst: LibAddr) -> Result<(), LdmError> {
        Err(LdmError::sys(
            Errno::EOPNOTSUPP,
            "directory media cannot move",
        ))
    }

    fn free_slot(&mut self) -> Result<LibAddr, LdmError> {
        Err(LdmError::sys(Errno::EOPNOTSUPP, "directory library has no slots"))
    }
}

/// Filesystem adapter treating a directory as an always-mounted medium
pub struct PosixFs;

impl PosixFs {
    fn read_label(&self, device: &Path) -> Result<String, LdmError> {
        let label = std::fs::read_to_string(device.join(FS_LABEL_FILE))?;
        Ok(label.trim_end().to_string())
    }
}

impl FsAdapter for PosixFs {
    fn mounted(&mut self, device: &Path) -> Result<Option<PathBuf>, LdmError> {
        if device.join(FS_LABEL_FILE).is_file() {
            Ok(Some(device.to_owned()))
        } else {
            Ok(None)
        }
    }

    fn mount(&mut self, device: &Path, mount_path: &Path, label: &str) -> Result<(), LdmError> {
        let found = self.read_label(device)?;
        if found != label {
            return Err(LdmError::sys(
                Errno::EINVAL,
                format!("label mismatch on {:?} ('{}' != '{}')", device, found, label),
            ));
        }
        if mount_path != device {
            symlink(device, mount_path)?;
        }
        Ok(())
    }

    fn umount(&mut self, device: &Path, mount_path: &Path) -> Result<(), LdmError> {
        if mount_path != device && mount_path.is_symlink() {
            std::fs::remove_file(mount_path)?;
        }
        Ok(())
    }

    fn format(&mut self, device: &Path, label: &str) -> Result<FsSpace, LdmError> {
        std::fs::create_dir_all(device)?;
        std::fs::write(device.join(FS_LABEL_FILE), label)?;
        space_of(device)
    }

    fn df(&mut self, root: &Path) -> Result<FsSpace, LdmError> {
        space_of(root)
    }
}

/// Flush adapter for directory media
pub struct PosixIo;

impl IoAdapter for PosixIo {
    fn flush(&mut self, root: &Path) -> Result<bool, LdmError> {
        File::open(root)?.sync_all()?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdir(name: &str) -> PathBuf {
        let mut dir: PathBuf = String::from("./target/testout").into();
        dir.push(module_path!());
        dir.push(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_posix_format_and_mount_cycle() {
        let root = testdir("format_mount");
        let device = root.join("d0");

        let mut fs = PosixFs;
        assert!(fs.mounted(&device).unwrap().is_none());

        let space = fs.format(&device, "d0").unwrap();
        assert!(space.avail > 0);
        assert!(!space.read_only);

        assert_eq!(fs.mounted(&device).unwrap(), Some(device.clone()));

        let err = fs.mount(&device, &device, "other").unwrap_err();
        assert!(err.is_errno(Errno::EINVAL));
        fs.mount(&device, &device, "d0").unwrap();
    }

    #[test]
    fn test_posix_device_lookup() {
        let root = testdir("dev_lookup");
        std::fs::create_dir_all(root.join("d1")).unwrap();

        let mut dev = PosixDeviceAdapter::new(&root);
        let path = dev.lookup("d1").unwrap();
        let spec = dev.query(&path).unwrap();
        assert_eq!(spec.serial.as_deref(), Some("d1"));

        assert!(dev.lookup("missing").unwrap_err().is_errno(Errno::ENOENT));
    }
}
