// Note: This is only for test and debug

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;

use crate::{DeviceAdapter, DeviceSpec, LdmError};

#[derive(Clone)]
struct VirtualDevice {
    path: PathBuf,
    model: Option<String>,
}

/// In-memory serial to device-node mapping
///
/// Clones share the same underlying list, so a test can keep one
/// handle for inspection while the scheduler owns another.
#[derive(Clone, Default)]
pub struct VirtualDeviceList {
    state: Arc<Mutex<HashMap<String, VirtualDevice>>>,
}

impl VirtualDeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, serial: &str, path: &Path, model: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.insert(
            serial.to_string(),
            VirtualDevice {
                path: path.to_owned(),
                model: model.map(String::from),
            },
        );
    }
}

impl DeviceAdapter for VirtualDeviceList {
    fn lookup(&mut self, serial: &str) -> Result<PathBuf, LdmError> {
        let state = self.state.lock().unwrap();
        match state.get(serial) {
            Some(device) => Ok(device.path.clone()),
            None => Err(LdmError::sys(
                Errno::ENOENT,
                format!("no device with serial '{}'", serial),
            )),
        }
    }

    fn query(&mut self, path: &Path) -> Result<DeviceSpec, LdmError> {
        let state = self.state.lock().unwrap();
        for (serial, device) in state.iter() {
            if device.path == path {
                return Ok(DeviceSpec {
                    model: device.model.clone(),
                    serial: Some(serial.clone()),
                });
            }
        }
        Err(LdmError::sys(
            Errno::ENOENT,
            format!("no device at {:?}", path),
        ))
    }
}
