//! Host device cache
//!
//! In-memory mirror of the host's usable drives. Populated once from
//! a filtered DSS query, then refreshed in place on every scheduler
//! entry: entries are never added or removed by a refresh, and a
//! refresh failure demotes only the affected device.

use log::warn;
use serde_json::json;

use ostore_api_types::{AdmStatus, DeviceInfo, DeviceState, Family};
use ostore_ldm::{DeviceAdapter, FsAdapter, LibraryAdapter};

use crate::dss::{filter, Dss};

use super::device::DeviceDescr;
use super::SchedError;

pub(crate) struct DeviceCache {
    pub devices: Vec<DeviceDescr>,
    populated: bool,
}

impl DeviceCache {
    pub fn new() -> Self {
        DeviceCache {
            devices: Vec::new(),
            populated: false,
        }
    }

    /// Bring the cache in sync with the DSS, the library and the OS.
    pub fn load(
        &mut self,
        dss: &dyn Dss,
        dev_adapter: &mut dyn DeviceAdapter,
        lib: &mut dyn LibraryAdapter,
        fs: &mut dyn FsAdapter,
        host: &str,
        family: Family,
        owner: &str,
    ) -> Result<(), SchedError> {
        if !self.populated {
            let rows = dss.device_get(&filter::and(vec![
                filter::eq("host", json!(host)),
                filter::eq("family", json!(family)),
                filter::eq("adm_status", json!(AdmStatus::Unlocked)),
            ]))?;

            if rows.is_empty() {
                warn!("no usable '{}' device on host '{}'", family, host);
            }

            for mut row in rows {
                row.lock = row.lock.localize(owner);
                self.devices.push(DeviceDescr::new(row));
            }
            self.populated = true;
        }

        for dev in self.devices.iter_mut() {
            if let Err(err) = refresh_one(dev, dss, dev_adapter, lib, fs, owner) {
                warn!("marking drive '{}' failed - {}", dev.serial(), err);
                dev.state = DeviceState::Failed;
            }
        }

        Ok(())
    }

    /// Append one drive and bring it in sync.
    pub fn add(
        &mut self,
        info: DeviceInfo,
        dss: &dyn Dss,
        dev_adapter: &mut dyn DeviceAdapter,
        lib: &mut dyn LibraryAdapter,
        fs: &mut dyn FsAdapter,
        owner: &str,
    ) -> Result<(), SchedError> {
        let mut dev = DeviceDescr::new(info);
        dev.info.lock = std::mem::take(&mut dev.info.lock).localize(owner);

        let result = refresh_one(&mut dev, dss, dev_adapter, lib, fs, owner);
        if result.is_err() {
            dev.state = DeviceState::Failed;
        }
        self.devices.push(dev);
        result
    }

    /// Index of the device currently containing the given medium.
    pub fn find_by_medium(&self, label: &str) -> Option<usize> {
        self.devices
            .iter()
            .position(|dev| dev.medium_id.as_deref() == Some(label))
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.populated = false;
    }
}

fn refresh_one(
    dev: &mut DeviceDescr,
    dss: &dyn Dss,
    dev_adapter: &mut dyn DeviceAdapter,
    lib: &mut dyn LibraryAdapter,
    fs: &mut dyn FsAdapter,
    owner: &str,
) -> Result<(), SchedError> {
    let path = dev_adapter.lookup(&dev.info.serial)?;
    let spec = dev_adapter.query(&path)?;

    // DSS and OS must agree on what this device is; values absent on
    // either side are accepted
    if let (Some(registered), Some(found)) = (&dev.info.model, &spec.model) {
        if registered != found {
            return Err(SchedError::Invalid(format!(
                "model mismatch on '{}' ('{}' != '{}')",
                dev.info.serial, registered, found
            )));
        }
    }
    if let Some(found) = &spec.serial {
        if found != &dev.info.serial {
            return Err(SchedError::Invalid(format!(
                "serial mismatch on '{}' (OS reports '{}')",
                dev.info.serial, found
            )));
        }
    }

    dev.path = path;
    dev.sys_model = spec.model;
    dev.sys_serial = spec.serial;

    let element = lib.drive_lookup(&dev.info.serial)?;
    dev.lib_addr = Some(element.addr);

    if !element.full {
        dev.medium = None;
        dev.medium_id = None;
        dev.mount_path = None;
        dev.state = DeviceState::Empty;
        return Ok(());
    }

    let label = match element.medium_id {
        Some(label) => label,
        None => {
            return Err(SchedError::Invalid(format!(
                "library reports drive '{}' full without a label",
                dev.info.serial
            )))
        }
    };

    let rows = dss.media_get(&filter::and(vec![
        filter::eq("family", json!(dev.info.family)),
        filter::eq("id", json!(label)),
    ]))?;
    let mut medium = match rows.into_iter().next() {
        Some(medium) => medium,
        None => return Err(SchedError::NoSuchMedium(label)),
    };
    medium.lock = medium.lock.localize(owner);

    match fs.mounted(&dev.path)? {
        Some(root) => {
            dev.mount_path = Some(root);
            dev.state = DeviceState::Mounted;
        }
        None => {
            dev.mount_path = None;
            dev.state = DeviceState::Loaded;
        }
    }

    dev.medium_id = Some(label);
    dev.medium = Some(medium);
    Ok(())
}
