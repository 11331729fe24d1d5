//! Drive freeing
//!
//! Makes room for a newly selected medium by sacrificing the
//! loaded-or-mounted drive with the least free space on its medium:
//! unmount, unload, hand the empty locked drive to the caller. A
//! drive failing a transition is demoted and the next candidate is
//! tried.

use log::warn;

use ostore_api_types::{DeviceState, MediumInfo};
use ostore_ldm::{FsAdapter, LibraryAdapter};

use crate::config::LrsConfig;
use crate::dss::Dss;

use super::cache::DeviceCache;
use super::compat::medium_compatible;
use super::picker::{self, PickPolicy, PickRequest};
use super::{device, SchedError};

/// Free one drive able to take `medium`.
///
/// Returns the index of an empty device whose lock is held. Fails
/// with `Retry` when compatible drives exist but none can be freed
/// right now, and with `NoDevice` when no compatible drive exists at
/// all.
pub(crate) fn free_one_device(
    cache: &mut DeviceCache,
    dss: &dyn Dss,
    config: &LrsConfig,
    owner: &str,
    lib: &mut dyn LibraryAdapter,
    fs: &mut dyn FsAdapter,
    medium: &MediumInfo,
) -> Result<usize, SchedError> {
    loop {
        let req = PickRequest {
            state: DeviceState::Unspec,
            required_size: 0,
            tags: &[],
            medium: Some(medium),
            policy: PickPolicy::DriveToFree,
        };

        let chosen = match picker::pick_device(cache, dss, config, owner, &req)? {
            Some(i) => i,
            None => {
                let compatible_exists = cache
                    .devices
                    .iter()
                    .any(|dev| dev.state != DeviceState::Failed
                        && medium_compatible(config, medium, dev));
                if compatible_exists {
                    return Err(SchedError::Retry(format!(
                        "no drive for medium '{}' can be freed now",
                        medium.id
                    )));
                }
                return Err(SchedError::NoDevice(format!(
                    "no drive compatible with medium '{}'",
                    medium.id
                )));
            }
        };

        let dev = &mut cache.devices[chosen];

        if dev.state == DeviceState::Mounted {
            if let Err(err) = device::umount(dev, fs) {
                warn!("unable to free drive '{}' - {}", dev.serial(), err);
                picker::release_reservation(dev, dss, owner);
                continue;
            }
        }

        if dev.state == DeviceState::Loaded {
            if let Err(err) = device::unload(dev, lib, dss, owner) {
                warn!("unable to free drive '{}' - {}", dev.serial(), err);
                picker::release_reservation(dev, dss, owner);
                continue;
            }
        }

        return Ok(chosen);
    }
}
