//! Device selection
//!
//! Scans the device cache for a drive matching a request, ranks the
//! candidates with a pluggable policy, and reserves the winner by
//! taking its locks in order: resident medium first, then device. A
//! reservation lost to a concurrent owner puts the device on a
//! per-call deny list and restarts the scan, so one call never spins
//! on the same contended drive.

use log::{debug, warn};

use ostore_api_types::{DeviceState, FsStatus, LockState, MediumInfo, PutPolicy};

use crate::config::LrsConfig;
use crate::dss::{Dss, DssError};

use super::cache::DeviceCache;
use super::compat::medium_compatible;
use super::device::DeviceDescr;
use super::SchedError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PickPolicy {
    /// First device whose medium has enough free space
    FirstFit,
    /// Fitting device with the least free space; exact fit stops the scan
    BestFit,
    /// First acceptable device
    Any,
    /// Loaded or mounted device with the least free space, to empty it
    DriveToFree,
}

impl From<PutPolicy> for PickPolicy {
    fn from(policy: PutPolicy) -> Self {
        match policy {
            PutPolicy::BestFit => PickPolicy::BestFit,
            PutPolicy::FirstFit => PickPolicy::FirstFit,
        }
    }
}

pub(crate) struct PickRequest<'a> {
    /// Required operational state, `Unspec` matches any
    pub state: DeviceState,
    pub required_size: u64,
    pub tags: &'a [String],
    /// Medium the device must be able to read/write
    pub medium: Option<&'a MediumInfo>,
    pub policy: PickPolicy,
}

fn device_matches(config: &LrsConfig, dev: &DeviceDescr, req: &PickRequest) -> bool {
    if dev.state == DeviceState::Failed || dev.state == DeviceState::Unspec {
        return false;
    }
    if dev.locked_local || dev.info.lock.is_external() {
        return false;
    }
    if let Some(medium) = &dev.medium {
        if medium.lock.is_external() {
            return false;
        }
    }

    if req.state != DeviceState::Unspec && dev.state != req.state {
        return false;
    }

    if req.policy == PickPolicy::DriveToFree && dev.medium.is_none() {
        return false;
    }

    if req.required_size > 0 {
        if let Some(medium) = &dev.medium {
            if medium.fs.status == FsStatus::Full {
                return false;
            }
            if !medium.has_tags(req.tags) {
                return false;
            }
        }
    }

    if let Some(medium) = req.medium {
        if !medium_compatible(config, medium, dev) {
            return false;
        }
    }

    true
}

// (take candidate, stop scanning)
fn rank(
    policy: PickPolicy,
    required_size: u64,
    dev: &DeviceDescr,
    best: Option<&DeviceDescr>,
) -> (bool, bool) {
    match policy {
        PickPolicy::Any => (true, true),
        PickPolicy::FirstFit => {
            if dev.medium_free() >= required_size {
                (true, true)
            } else {
                (false, false)
            }
        }
        PickPolicy::BestFit => {
            let free = dev.medium_free();
            if free < required_size {
                (false, false)
            } else if free == required_size {
                (true, true)
            } else {
                match best {
                    Some(best) => (free < best.medium_free(), false),
                    None => (true, false),
                }
            }
        }
        PickPolicy::DriveToFree => match best {
            Some(best) => (dev.medium_free() < best.medium_free(), false),
            None => (true, false),
        },
    }
}

/// Find and reserve one device, or `None` when nothing matches.
pub(crate) fn pick_device(
    cache: &mut DeviceCache,
    dss: &dyn Dss,
    config: &LrsConfig,
    owner: &str,
    req: &PickRequest,
) -> Result<Option<usize>, SchedError> {
    let mut denied = vec![false; cache.devices.len()];

    loop {
        let mut best: Option<usize> = None;

        for (i, dev) in cache.devices.iter().enumerate() {
            if denied[i] {
                continue;
            }
            if !device_matches(config, dev, req) {
                continue;
            }
            let (take, stop) = rank(
                req.policy,
                req.required_size,
                dev,
                best.map(|b| &cache.devices[b]),
            );
            if take {
                best = Some(i);
                if stop {
                    break;
                }
            }
        }

        let chosen = match best {
            Some(i) => i,
            None => return Ok(None),
        };

        if try_reserve(&mut cache.devices[chosen], dss, owner)? {
            return Ok(Some(chosen));
        }

        denied[chosen] = true;
    }
}

/// Take the locks for one device: resident medium first, then the
/// device row. Returns false (with everything taken here released)
/// when a lock is lost to a concurrent owner.
fn try_reserve(dev: &mut DeviceDescr, dss: &dyn Dss, owner: &str) -> Result<bool, SchedError> {
    let mut medium_locked_here = false;

    if let Some(medium) = dev.medium.as_mut() {
        match &medium.lock {
            LockState::Owner(holder) if holder == owner => { /* already ours */ }
            LockState::Unlocked => match dss.media_lock(&medium.id, owner) {
                Ok(()) => {
                    medium.lock = LockState::Owner(owner.to_string());
                    medium_locked_here = true;
                }
                Err(DssError::Locked(holder)) => {
                    debug!("medium '{}' lost to '{}'", medium.id, holder);
                    medium.lock = LockState::External;
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            },
            _ => return Ok(false),
        }
    }

    match dss.device_lock(dev.info.family, &dev.info.serial, owner) {
        Ok(()) => {
            dev.locked_local = true;
            Ok(true)
        }
        Err(DssError::Locked(holder)) => {
            debug!("drive '{}' lost to '{}'", dev.serial(), holder);
            if medium_locked_here {
                undo_medium_lock(dev, dss, owner);
            }
            Ok(false)
        }
        Err(err) => {
            if medium_locked_here {
                undo_medium_lock(dev, dss, owner);
            }
            Err(err.into())
        }
    }
}

/// Reserve the device row only; used when the caller already holds
/// the medium lock from selection.
pub(crate) fn reserve_device_only(
    dev: &mut DeviceDescr,
    dss: &dyn Dss,
    owner: &str,
) -> Result<bool, SchedError> {
    match dss.device_lock(dev.info.family, &dev.info.serial, owner) {
        Ok(()) => {
            dev.locked_local = true;
            Ok(true)
        }
        Err(DssError::Locked(holder)) => {
            debug!("drive '{}' lost to '{}'", dev.serial(), holder);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn undo_medium_lock(dev: &mut DeviceDescr, dss: &dyn Dss, owner: &str) {
    if let Some(medium) = dev.medium.as_mut() {
        if let Err(err) = dss.media_unlock(&medium.id, owner) {
            warn!("unable to release lock on '{}' - {}", medium.id, err);
        }
        medium.lock = LockState::Unlocked;
    }
}

/// Drop the locks of a reserved device, best effort.
pub(crate) fn release_reservation(dev: &mut DeviceDescr, dss: &dyn Dss, owner: &str) {
    if dev.locked_local {
        if let Err(err) = dss.device_unlock(dev.info.family, &dev.info.serial, owner) {
            warn!("unable to release lock on drive '{}' - {}", dev.serial(), err);
        }
        dev.locked_local = false;
    }
    if let Some(medium) = dev.medium.as_mut() {
        if medium.lock.owned_by(owner) {
            if let Err(err) = dss.media_unlock(&medium.id, owner) {
                warn!("unable to release lock on '{}' - {}", medium.id, err);
            }
            medium.lock = LockState::Unlocked;
        }
    }
}
