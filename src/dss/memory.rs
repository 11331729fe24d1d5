// Note: This is only for test and debug

use std::sync::Mutex;

use anyhow::{bail, format_err, Error};
use serde_json::Value;

use ostore_api_types::{DeviceInfo, Family, LockState, MediumId, MediumInfo};

use super::{Dss, DssError, ObjectInfo};

#[derive(Default)]
struct Tables {
    devices: Vec<DeviceInfo>,
    media: Vec<MediumInfo>,
    objects: Vec<ObjectInfo>,
}

/// In-memory DSS
///
/// Implements the same query and lock semantics as the real store,
/// including atomic owner-string compare-and-swap on the lock
/// columns. Filters are evaluated against the serde view of each
/// row.
#[derive(Default)]
pub struct MemoryDss {
    tables: Mutex<Tables>,
}

fn resolve<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = row;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn unpack(value: &Value) -> Result<(&str, &Value), Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| format_err!("expected an object, got {}", value))?;
    if obj.len() != 1 {
        bail!("expected exactly one key, got {}", value);
    }
    let (key, value) = obj.iter().next().unwrap();
    Ok((key, value))
}

fn matches(filter: &Value, row: &Value) -> Result<bool, Error> {
    let (key, value) = unpack(filter)?;
    match key {
        "$AND" => {
            let clauses = value
                .as_array()
                .ok_or_else(|| format_err!("$AND expects an array"))?;
            for clause in clauses {
                if !matches(clause, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "$NE" => {
            let (path, value) = unpack(value)?;
            Ok(resolve(row, path) != Some(value))
        }
        "$GTE" => {
            let (path, value) = unpack(value)?;
            let bound = value
                .as_u64()
                .ok_or_else(|| format_err!("$GTE expects a number"))?;
            match resolve(row, path).and_then(Value::as_u64) {
                Some(found) => Ok(found >= bound),
                None => Ok(false),
            }
        }
        "$CONTAINS" => {
            let (path, value) = unpack(value)?;
            match resolve(row, path).and_then(Value::as_array) {
                Some(items) => Ok(items.contains(value)),
                None => Ok(false),
            }
        }
        path => Ok(resolve(row, path) == Some(value)),
    }
}

fn filter_rows<T: Clone + serde::Serialize>(
    rows: &[T],
    filter: &Value,
) -> Result<Vec<T>, DssError> {
    let mut result = Vec::new();
    for row in rows {
        let view = serde_json::to_value(row).map_err(Error::from)?;
        if matches(filter, &view)? {
            result.push(row.clone());
        }
    }
    Ok(result)
}

fn lock_row(lock: &mut LockState, owner: &str) -> Result<(), DssError> {
    match lock {
        LockState::Unlocked => {
            *lock = LockState::Owner(owner.to_string());
            Ok(())
        }
        LockState::Owner(holder) => Err(DssError::Locked(holder.clone())),
        // never stored, see LockState
        LockState::External => Err(DssError::Locked(String::from("?"))),
    }
}

fn unlock_row(lock: &mut LockState, owner: &str) -> Result<(), DssError> {
    match lock {
        LockState::Owner(holder) if holder == owner => {
            *lock = LockState::Unlocked;
            Ok(())
        }
        LockState::Owner(holder) => Err(DssError::Locked(holder.clone())),
        LockState::Unlocked | LockState::External => Err(DssError::NotLocked),
    }
}

impl MemoryDss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, device: DeviceInfo) {
        self.tables.lock().unwrap().devices.push(device);
    }

    pub fn add_medium(&self, medium: MediumInfo) {
        self.tables.lock().unwrap().media.push(medium);
    }

    pub fn add_object(&self, object: ObjectInfo) {
        self.tables.lock().unwrap().objects.push(object);
    }

    /// Current state of a medium row, for test inspection.
    pub fn medium(&self, id: &MediumId) -> Option<MediumInfo> {
        let tables = self.tables.lock().unwrap();
        tables.media.iter().find(|medium| &medium.id == id).cloned()
    }

    /// Current state of a device row, for test inspection.
    pub fn device(&self, serial: &str) -> Option<DeviceInfo> {
        let tables = self.tables.lock().unwrap();
        tables
            .devices
            .iter()
            .find(|device| device.serial == serial)
            .cloned()
    }
}

impl Dss for MemoryDss {
    fn device_get(&self, filter: &Value) -> Result<Vec<DeviceInfo>, DssError> {
        let tables = self.tables.lock().unwrap();
        filter_rows(&tables.devices, filter)
    }

    fn media_get(&self, filter: &Value) -> Result<Vec<MediumInfo>, DssError> {
        let tables = self.tables.lock().unwrap();
        filter_rows(&tables.media, filter)
    }

    fn object_get(&self, filter: &Value) -> Result<Vec<ObjectInfo>, DssError> {
        let tables = self.tables.lock().unwrap();
        filter_rows(&tables.objects, filter)
    }

    fn media_update(&self, medium: &MediumInfo) -> Result<(), DssError> {
        let mut tables = self.tables.lock().unwrap();
        for row in tables.media.iter_mut() {
            if row.id == medium.id {
                // the lock column moves only through lock/unlock
                let lock = std::mem::take(&mut row.lock);
                *row = medium.clone();
                row.lock = lock;
                return Ok(());
            }
        }
        Err(DssError::NoSuchRow)
    }

    fn device_lock(&self, family: Family, serial: &str, owner: &str) -> Result<(), DssError> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .devices
            .iter_mut()
            .find(|device| device.family == family && device.serial == serial)
            .ok_or(DssError::NoSuchRow)?;
        lock_row(&mut row.lock, owner)
    }

    fn device_unlock(&self, family: Family, serial: &str, owner: &str) -> Result<(), DssError> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .devices
            .iter_mut()
            .find(|device| device.family == family && device.serial == serial)
            .ok_or(DssError::NoSuchRow)?;
        unlock_row(&mut row.lock, owner)
    }

    fn media_lock(&self, id: &MediumId, owner: &str) -> Result<(), DssError> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .media
            .iter_mut()
            .find(|medium| &medium.id == id)
            .ok_or(DssError::NoSuchRow)?;
        lock_row(&mut row.lock, owner)
    }

    fn media_unlock(&self, id: &MediumId, owner: &str) -> Result<(), DssError> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .media
            .iter_mut()
            .find(|medium| &medium.id == id)
            .ok_or(DssError::NoSuchRow)?;
        unlock_row(&mut row.lock, owner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ostore_api_types::{AddrType, AdmStatus, FsDescr, FsStatus, FsType, MediaStats};

    use crate::dss::filter;

    use super::*;

    fn medium(id: &str, free: u64, tags: &[&str]) -> MediumInfo {
        MediumInfo {
            id: MediumId::new(Family::Tape, id),
            model: Some(String::from("LTO5")),
            adm_status: AdmStatus::Unlocked,
            addr_type: AddrType::Hash1,
            fs: FsDescr {
                typ: FsType::Ltfs,
                label: String::from(id),
                status: FsStatus::Empty,
            },
            stats: MediaStats {
                phys_spc_free: free,
                ..Default::default()
            },
            tags: tags.iter().map(|tag| String::from(*tag)).collect(),
            lock: LockState::Unlocked,
        }
    }

    #[test]
    fn test_media_filter() -> Result<(), Error> {
        let dss = MemoryDss::new();
        dss.add_medium(medium("T0", 1000, &[]));
        dss.add_medium(medium("T1", 50, &["fast"]));

        let found = dss.media_get(&filter::and(vec![
            filter::eq("family", json!("tape")),
            filter::gte("stats.phys_spc_free", 100),
        ]))?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.id, "T0");

        let found = dss.media_get(&filter::contains("tags", json!("fast")))?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.id, "T1");

        let found = dss.media_get(&filter::ne("fs.status", json!("blank")))?;
        assert_eq!(found.len(), 2);

        Ok(())
    }

    #[test]
    fn test_lock_semantics() -> Result<(), Error> {
        let dss = MemoryDss::new();
        dss.add_medium(medium("T0", 1000, &[]));
        let id = MediumId::new(Family::Tape, "T0");

        dss.media_lock(&id, "host1:1:0:0")?;

        match dss.media_lock(&id, "host2:1:0:0") {
            Err(DssError::Locked(holder)) => assert_eq!(holder, "host1:1:0:0"),
            other => panic!("unexpected result {:?}", other.err()),
        }

        // wrong owner cannot unlock
        assert!(dss.media_unlock(&id, "host2:1:0:0").is_err());
        dss.media_unlock(&id, "host1:1:0:0")?;
        assert!(matches!(
            dss.media_unlock(&id, "host1:1:0:0"),
            Err(DssError::NotLocked)
        ));

        Ok(())
    }

    #[test]
    fn test_media_update_preserves_lock() -> Result<(), Error> {
        let dss = MemoryDss::new();
        dss.add_medium(medium("T0", 1000, &[]));
        let id = MediumId::new(Family::Tape, "T0");

        dss.media_lock(&id, "host1:1:0:0")?;

        let mut update = medium("T0", 400, &[]);
        update.fs.status = FsStatus::Used;
        // in-memory marker must never reach the store
        update.lock = LockState::External;
        dss.media_update(&update)?;

        let row = dss.medium(&id).unwrap();
        assert_eq!(row.fs.status, FsStatus::Used);
        assert_eq!(row.lock, LockState::Owner(String::from("host1:1:0:0")));

        Ok(())
    }
}
