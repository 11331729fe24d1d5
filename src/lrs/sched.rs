//! Orchestration of the scheduler entry points
//!
//! Every client request refreshes the device cache first, then walks
//! from the cheapest resource to the most expensive one: a mounted
//! medium that fits, a loaded one, and only then a fresh selection
//! with load and mount, evicting a resident medium if the host has
//! no empty drive. Locks taken in a failing call are released before
//! the error is returned.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use nix::errno::Errno;
use serde_json::json;

use ostore_api_types::{
    AddrType, AdmStatus, DeviceInfo, DeviceState, FsStatus, FsType, LockState, MediumId,
    MediumInfo,
};
use ostore_ldm::{DeviceAdapter, FsAdapter, IoAdapter, LibraryAdapter};

use crate::config::LrsConfig;
use crate::dss::{filter, Dss, DssError};

use super::cache::DeviceCache;
use super::device::{self, DeviceDescr};
use super::lock_owner::{build_lock_owner, owner_hostname};
use super::media_select::select_medium;
use super::picker::{self, PickPolicy, PickRequest};
use super::{free, SchedError};

/// The adapter set driving one storage family
pub struct LdmAdapters {
    pub device: Box<dyn DeviceAdapter>,
    pub library: Box<dyn LibraryAdapter>,
    pub fs: Box<dyn FsAdapter>,
    pub io: Box<dyn IoAdapter>,
}

/// Reservation handle binding a client operation to a (device,
/// medium, mount root) triple
///
/// Filled by `write_prepare`/`read_prepare` and valid until
/// `resource_release`. At most one intent references a device at any
/// time; the device lock guarantees it.
#[derive(Debug, Default)]
pub struct Intent {
    /// Medium holding the data. Set by `write_prepare`; must be set
    /// by the caller before `read_prepare`.
    pub medium_id: Option<MediumId>,
    /// Extent size: requested bytes for write, expected bytes for read
    pub size: u64,
    root_path: Option<PathBuf>,
    fs_type: Option<FsType>,
    addr_type: Option<AddrType>,
    device: Option<usize>,
}

impl Intent {
    /// Intent for a write of `size` bytes.
    pub fn new(size: u64) -> Self {
        Intent {
            size,
            ..Default::default()
        }
    }

    /// Intent for reading back data from a known medium.
    pub fn for_medium(id: MediumId) -> Self {
        Intent {
            medium_id: Some(id),
            ..Default::default()
        }
    }

    /// Mount root to write into or read from.
    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    pub fn fs_type(&self) -> Option<FsType> {
        self.fs_type
    }

    pub fn addr_type(&self) -> Option<AddrType> {
        self.addr_type
    }

    /// Does this intent currently hold resources?
    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }
}

pub(crate) enum MediaOp {
    Read,
    Format,
}

/// One scheduler instance per host
pub struct LocalResourceScheduler {
    config: LrsConfig,
    dss: Arc<dyn Dss>,
    adapters: LdmAdapters,
    lock_owner: String,
    cache: DeviceCache,
}

impl LocalResourceScheduler {
    pub fn new(config: LrsConfig, dss: Arc<dyn Dss>, adapters: LdmAdapters) -> Self {
        let lock_owner = build_lock_owner();
        info!("scheduler instance '{}' starting", lock_owner);

        LocalResourceScheduler {
            config,
            dss,
            adapters,
            lock_owner,
            cache: DeviceCache::new(),
        }
    }

    /// Owner string this instance stamps on DSS locks.
    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }

    /// Current view of the host's drives.
    pub fn devices(&self) -> &[DeviceDescr] {
        &self.cache.devices
    }

    /// Release everything this instance still holds and drop the
    /// device cache.
    pub fn fini(&mut self) {
        for i in 0..self.cache.devices.len() {
            if let Err(err) = self.release_device(i) {
                warn!("release during shutdown failed - {}", err);
            }
        }
        self.cache.clear();
    }

    /// Bring the device cache in sync with the DSS, the library and
    /// the OS. The prepare operations do this implicitly.
    pub fn refresh(&mut self) -> Result<(), SchedError> {
        self.load_dev_state()
    }

    fn load_dev_state(&mut self) -> Result<(), SchedError> {
        self.cache.load(
            self.dss.as_ref(),
            self.adapters.device.as_mut(),
            self.adapters.library.as_mut(),
            self.adapters.fs.as_mut(),
            crate::tools::nodename(),
            self.config.default_family,
            &self.lock_owner,
        )
    }

    /// Register a drive added at runtime.
    pub fn device_add(&mut self, info: DeviceInfo) -> Result<(), SchedError> {
        self.cache.add(
            info,
            self.dss.as_ref(),
            self.adapters.device.as_mut(),
            self.adapters.library.as_mut(),
            self.adapters.fs.as_mut(),
            &self.lock_owner,
        )
    }

    /// Allocate and mount a medium for a write of `intent.size`
    /// bytes carrying all of `tags`, and reserve a drive for it.
    pub fn write_prepare(&mut self, intent: &mut Intent, tags: &[String]) -> Result<(), SchedError> {
        self.do_write_prepare(intent, tags)
            .map_err(SchedError::retryable)
    }

    fn do_write_prepare(&mut self, intent: &mut Intent, tags: &[String]) -> Result<(), SchedError> {
        let size = intent.size;

        loop {
            self.load_dev_state()?;
            let policy = PickPolicy::from(self.config.policy);

            // fast path: a mounted medium that fits
            let mut chosen = picker::pick_device(
                &mut self.cache,
                self.dss.as_ref(),
                &self.config,
                &self.lock_owner,
                &PickRequest {
                    state: DeviceState::Mounted,
                    required_size: size,
                    tags,
                    medium: None,
                    policy,
                },
            )?;

            // second best: a loaded medium that fits
            if chosen.is_none() {
                if let Some(i) = picker::pick_device(
                    &mut self.cache,
                    self.dss.as_ref(),
                    &self.config,
                    &self.lock_owner,
                    &PickRequest {
                        state: DeviceState::Loaded,
                        required_size: size,
                        tags,
                        medium: None,
                        policy,
                    },
                )? {
                    self.mount_reserved(i)?;
                    chosen = Some(i);
                }
            }

            // slow path: select a new medium, find it a drive
            let i = match chosen {
                Some(i) => i,
                None => {
                    let medium = select_medium(
                        self.dss.as_ref(),
                        &self.lock_owner,
                        self.config.default_family,
                        size,
                        tags,
                    )?;
                    let i = self.attach_medium(medium)?;
                    if self.cache.devices[i].state != DeviceState::Mounted {
                        self.mount_reserved(i)?;
                    }
                    i
                }
            };

            // a read-only mount means the medium is in fact full:
            // record that and start over without it
            let root = match self.cache.devices[i].mount_path.clone() {
                Some(root) => root,
                None => {
                    let err = SchedError::Invalid(format!(
                        "drive '{}' has no mount path",
                        self.cache.devices[i].serial()
                    ));
                    let _ = self.release_device(i);
                    return Err(err);
                }
            };
            let space = match self.adapters.fs.df(&root) {
                Ok(space) => space,
                Err(err) => {
                    let _ = self.release_device(i);
                    return Err(err.into());
                }
            };
            if space.read_only {
                warn!("mount {:?} is read-only, marking its medium full", root);
                let marked = self.mark_medium_full(i);
                self.release_device(i)?;
                marked?;
                continue;
            }

            let dev = &self.cache.devices[i];
            let medium = match &dev.medium {
                Some(medium) => medium,
                None => {
                    let err = SchedError::Invalid(format!(
                        "drive '{}' lost its medium",
                        dev.serial()
                    ));
                    let _ = self.release_device(i);
                    return Err(err);
                }
            };

            intent.medium_id = Some(medium.id.clone());
            intent.fs_type = Some(medium.fs.typ);
            intent.addr_type = Some(medium.addr_type);
            intent.root_path = Some(root);
            intent.device = Some(i);
            return Ok(());
        }
    }

    /// Make the medium named by the intent available for reading.
    pub fn read_prepare(&mut self, intent: &mut Intent) -> Result<(), SchedError> {
        self.do_read_prepare(intent).map_err(SchedError::retryable)
    }

    fn do_read_prepare(&mut self, intent: &mut Intent) -> Result<(), SchedError> {
        let id = match intent.medium_id.clone() {
            Some(id) => id,
            None => {
                return Err(SchedError::Invalid(String::from(
                    "intent names no medium to read",
                )))
            }
        };

        self.load_dev_state()?;

        let i = self.media_prepare(&id, MediaOp::Read)?;

        let dev = &self.cache.devices[i];
        let medium = match &dev.medium {
            Some(medium) => medium,
            None => {
                let err = SchedError::Invalid(format!(
                    "drive '{}' lost its medium",
                    dev.serial()
                ));
                let _ = self.release_device(i);
                return Err(err);
            }
        };

        intent.root_path = dev.mount_path.clone();
        intent.fs_type = Some(medium.fs.typ);
        intent.addr_type = Some(medium.addr_type);
        intent.device = Some(i);
        Ok(())
    }

    /// Format a blank medium, set its label to its id and its
    /// filesystem status to empty; optionally clear the
    /// administrative lock.
    pub fn format_medium(
        &mut self,
        id: &MediumId,
        fs_type: FsType,
        unlock: bool,
    ) -> Result<(), SchedError> {
        self.do_format(id, fs_type, unlock)
            .map_err(SchedError::retryable)
    }

    fn do_format(&mut self, id: &MediumId, fs_type: FsType, unlock: bool) -> Result<(), SchedError> {
        self.load_dev_state()?;

        let i = self.media_prepare(id, MediaOp::Format)?;

        // locks drop whatever happens to the format itself
        let result = self.format_loaded(i, fs_type, unlock);
        let release = self.release_device(i);
        result.and(release)
    }

    fn format_loaded(&mut self, i: usize, fs_type: FsType, unlock: bool) -> Result<(), SchedError> {
        let dev = &mut self.cache.devices[i];
        let medium = match dev.medium.as_mut() {
            Some(medium) => medium,
            None => {
                return Err(SchedError::Invalid(format!(
                    "drive '{}' lost its medium",
                    dev.info.serial
                )))
            }
        };

        let space = self.adapters.fs.format(&dev.path, &medium.id.id)?;

        info!(
            "formatted medium '{}' ({} bytes available)",
            medium.id, space.avail
        );

        medium.fs.typ = fs_type;
        medium.fs.label = medium.id.id.clone();
        medium.fs.status = FsStatus::Empty;
        medium.stats.phys_spc_used = space.used;
        medium.stats.phys_spc_free = space.avail;
        medium.stats.nb_obj = 0;
        medium.stats.logc_spc_used = 0;
        if unlock {
            medium.adm_status = AdmStatus::Unlocked;
        }

        self.dss.media_update(medium)?;
        Ok(())
    }

    /// Persist the outcome of the I/O performed under an intent:
    /// refresh the medium statistics and counters, and retire the
    /// medium when the I/O hit a global medium error.
    pub fn io_complete(
        &mut self,
        intent: &mut Intent,
        fragments: u32,
        io_err: Option<Errno>,
    ) -> Result<(), SchedError> {
        let i = match intent.device {
            Some(i) => i,
            None => {
                return Err(SchedError::Invalid(String::from(
                    "intent holds no resources",
                )))
            }
        };
        let root = match intent.root_path.clone() {
            Some(root) => root,
            None => {
                return Err(SchedError::Invalid(String::from(
                    "intent has no mount root",
                )))
            }
        };

        let flush_error = self.adapters.io.flush(&root)?;
        let global_error = flush_error || io_err.map_or(false, is_medium_global_error);

        let space = self.adapters.fs.df(&root)?;

        let dev = &mut self.cache.devices[i];
        let medium = match dev.medium.as_mut() {
            Some(medium) => medium,
            None => {
                return Err(SchedError::Invalid(format!(
                    "drive '{}' lost its medium",
                    dev.info.serial
                )))
            }
        };

        if global_error {
            warn!("medium '{}' hit a global error, marking it full", medium.id);
            medium.fs.status = FsStatus::Full;
        }

        medium.stats.phys_spc_used = space.used;
        medium.stats.phys_spc_free = space.avail;
        medium.stats.nb_obj += fragments as u64;
        medium.stats.logc_spc_used += intent.size;
        if medium.fs.status == FsStatus::Empty {
            medium.fs.status = FsStatus::Used;
        }

        self.dss.media_update(medium)?;
        Ok(())
    }

    /// Drop the locks held by an intent. Releasing an intent that
    /// holds nothing is a no-op.
    pub fn resource_release(&mut self, intent: &mut Intent) -> Result<(), SchedError> {
        let i = match intent.device.take() {
            Some(i) => i,
            None => return Ok(()),
        };
        intent.root_path = None;
        self.release_device(i)
    }

    /// Lock the medium named by `id` and make it ready for `op`:
    /// present in a reserved local drive, mounted when reading.
    ///
    /// On success the caller owns both the device and the medium
    /// lock, and must release them (`resource_release`, or directly
    /// as the format path does). On error everything acquired here
    /// has already been released.
    fn media_prepare(&mut self, id: &MediumId, op: MediaOp) -> Result<usize, SchedError> {
        let rows = self.dss.media_get(&filter::and(vec![
            filter::eq("family", json!(id.family)),
            filter::eq("id", json!(id.id)),
        ]))?;
        let mut medium = match rows.into_iter().next() {
            Some(medium) => medium,
            None => return Err(SchedError::NoSuchMedium(id.to_string())),
        };
        medium.lock = std::mem::take(&mut medium.lock).localize(&self.lock_owner);

        match (&op, medium.fs.status) {
            (MediaOp::Read, FsStatus::Blank) => {
                return Err(SchedError::Invalid(format!(
                    "medium '{}' is not formatted",
                    id
                )))
            }
            (MediaOp::Format, status) if status != FsStatus::Blank => {
                return Err(SchedError::Invalid(format!(
                    "medium '{}' is already formatted",
                    id
                )))
            }
            _ => { /* OK */ }
        }

        match &medium.lock {
            LockState::Unlocked => match self.dss.media_lock(&medium.id, &self.lock_owner) {
                Ok(()) => medium.lock = LockState::Owner(self.lock_owner.clone()),
                Err(DssError::Locked(holder)) => {
                    return Err(SchedError::Retry(format!(
                        "medium '{}' is locked by '{}'",
                        id, holder
                    )))
                }
                Err(err) => return Err(err.into()),
            },
            _ => {
                return Err(SchedError::Retry(format!(
                    "medium '{}' is already reserved",
                    id
                )))
            }
        }

        let i = self.attach_medium(medium)?;

        if matches!(op, MediaOp::Read) && self.cache.devices[i].state != DeviceState::Mounted {
            self.mount_reserved(i)?;
        }

        Ok(i)
    }

    /// Place a freshly locked medium into a reserved drive: reuse
    /// the drive already holding it, or take an empty drive, or free
    /// one. On error the medium lock (and any drive reservation made
    /// here) has been released.
    fn attach_medium(&mut self, medium: MediumInfo) -> Result<usize, SchedError> {
        let id = medium.id.clone();

        if let Some(i) = self.cache.find_by_medium(&id.id) {
            if self.cache.devices[i].state == DeviceState::Failed {
                self.release_medium_lock(&id);
                return Err(SchedError::Retry(format!(
                    "drive holding medium '{}' is failed",
                    id
                )));
            }
            let reserved = match picker::reserve_device_only(
                &mut self.cache.devices[i],
                self.dss.as_ref(),
                &self.lock_owner,
            ) {
                Ok(reserved) => reserved,
                Err(err) => {
                    self.release_medium_lock(&id);
                    return Err(err);
                }
            };
            if !reserved {
                self.release_medium_lock(&id);
                return Err(SchedError::Retry(format!(
                    "drive holding medium '{}' is locked",
                    id
                )));
            }
            // install our locked copy
            self.cache.devices[i].medium = Some(medium);
            return Ok(i);
        }

        let picked = match picker::pick_device(
            &mut self.cache,
            self.dss.as_ref(),
            &self.config,
            &self.lock_owner,
            &PickRequest {
                state: DeviceState::Empty,
                required_size: 0,
                tags: &[],
                medium: Some(&medium),
                policy: PickPolicy::Any,
            },
        ) {
            Ok(picked) => picked,
            Err(err) => {
                self.release_medium_lock(&id);
                return Err(err);
            }
        };

        let i = match picked {
            Some(i) => i,
            None => match free::free_one_device(
                &mut self.cache,
                self.dss.as_ref(),
                &self.config,
                &self.lock_owner,
                self.adapters.library.as_mut(),
                self.adapters.fs.as_mut(),
                &medium,
            ) {
                Ok(i) => i,
                Err(err) => {
                    self.release_medium_lock(&id);
                    return Err(err);
                }
            },
        };

        if let Err(err) = device::load(
            &mut self.cache.devices[i],
            self.adapters.library.as_mut(),
            medium,
        ) {
            picker::release_reservation(&mut self.cache.devices[i], self.dss.as_ref(), &self.lock_owner);
            self.release_medium_lock(&id);
            return Err(err);
        }

        Ok(i)
    }

    /// Mount the medium in a reserved drive, dropping the
    /// reservation when the mount fails.
    fn mount_reserved(&mut self, i: usize) -> Result<(), SchedError> {
        if let Err(err) = device::mount(
            &mut self.cache.devices[i],
            self.adapters.fs.as_mut(),
            &self.config.mount_prefix,
        ) {
            if let Err(release_err) = self.release_device(i) {
                warn!("release after failed mount failed too - {}", release_err);
            }
            return Err(err);
        }
        Ok(())
    }

    fn mark_medium_full(&mut self, i: usize) -> Result<(), SchedError> {
        let dev = &mut self.cache.devices[i];
        let medium = match dev.medium.as_mut() {
            Some(medium) => medium,
            None => {
                return Err(SchedError::Invalid(format!(
                    "drive '{}' lost its medium",
                    dev.info.serial
                )))
            }
        };
        medium.fs.status = FsStatus::Full;
        self.dss.media_update(medium)?;
        Ok(())
    }

    /// Release the device lock, then the medium lock, of one cached
    /// drive.
    fn release_device(&mut self, i: usize) -> Result<(), SchedError> {
        // an index from before fini() points at nothing anymore
        let dev = match self.cache.devices.get_mut(i) {
            Some(dev) => dev,
            None => return Ok(()),
        };
        let mut result = Ok(());

        if dev.locked_local {
            if let Err(err) =
                self.dss
                    .device_unlock(dev.info.family, &dev.info.serial, &self.lock_owner)
            {
                warn!("unable to release lock on drive '{}' - {}", dev.info.serial, err);
                result = Err(err.into());
            }
            dev.locked_local = false;
        }

        if let Some(medium) = dev.medium.as_mut() {
            if medium.lock.owned_by(&self.lock_owner) {
                if let Err(err) = self.dss.media_unlock(&medium.id, &self.lock_owner) {
                    warn!("unable to release lock on '{}' - {}", medium.id, err);
                    if result.is_ok() {
                        result = Err(err.into());
                    }
                }
                medium.lock = LockState::Unlocked;
            }
        }

        result
    }

    fn release_medium_lock(&self, id: &MediumId) {
        if let Err(err) = self.dss.media_unlock(id, &self.lock_owner) {
            warn!("unable to release lock on '{}' - {}", id, err);
        }
    }
}

#[cfg(test)]
impl LocalResourceScheduler {
    pub(crate) fn parts_for_test(&mut self) -> (&mut DeviceCache, &dyn Dss) {
        (&mut self.cache, self.dss.as_ref())
    }
}

impl Drop for LocalResourceScheduler {
    fn drop(&mut self) {
        self.fini();
    }
}

fn is_medium_global_error(errno: Errno) -> bool {
    matches!(errno, Errno::ENOSPC | Errno::EDQUOT | Errno::EIO)
}

/// Report which host currently works on an object.
///
/// Finds the medium holding the object and returns the host segment
/// of its lock owner, or None when nobody holds the medium.
pub fn locate(
    dss: &dyn Dss,
    oid: Option<&str>,
    uuid: Option<&str>,
    version: Option<u32>,
) -> Result<Option<String>, SchedError> {
    if oid.is_none() && uuid.is_none() {
        return Err(SchedError::Invalid(String::from(
            "locate needs an oid or an uuid",
        )));
    }

    let mut clauses = Vec::new();
    if let Some(oid) = oid {
        clauses.push(filter::eq("oid", json!(oid)));
    }
    if let Some(uuid) = uuid {
        clauses.push(filter::eq("uuid", json!(uuid)));
    }
    if let Some(version) = version {
        clauses.push(filter::eq("version", json!(version)));
    }

    let rows = dss.object_get(&filter::and(clauses))?;
    if rows.is_empty() {
        return Err(SchedError::NoSuchObject(
            oid.or(uuid).unwrap_or("?").to_string(),
        ));
    }

    let uuids: HashSet<&str> = rows.iter().map(|row| row.uuid.as_str()).collect();
    if uuids.len() > 1 {
        return Err(SchedError::Invalid(format!(
            "request matches {} different objects",
            uuids.len()
        )));
    }

    // several versions may remain; the latest one wins
    let target = match rows.iter().max_by_key(|row| row.version) {
        Some(target) => target,
        None => return Err(SchedError::NoSuchObject(String::from("?"))),
    };

    let media = dss.media_get(&filter::and(vec![
        filter::eq("family", json!(target.medium.family)),
        filter::eq("id", json!(target.medium.id)),
    ]))?;
    let medium = match media.into_iter().next() {
        Some(medium) => medium,
        None => return Err(SchedError::NoSuchMedium(target.medium.to_string())),
    };

    Ok(medium
        .lock
        .owner()
        .and_then(owner_hostname)
        .map(String::from))
}
