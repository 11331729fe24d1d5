//! Drive/medium compatibility
//!
//! Tape cartridges only fit a subset of the host's drives. The
//! configuration names, per medium model, the drive classes able to
//! read and write it, and per drive class the concrete model
//! strings.

use log::warn;

use ostore_api_types::{Family, MediumInfo};

use crate::config::LrsConfig;

use super::device::DeviceDescr;

/// Can `device` read and write `medium`?
///
/// Media without a model (directories, unlabeled test media) fit any
/// drive of their family.
pub fn medium_compatible(config: &LrsConfig, medium: &MediumInfo, device: &DeviceDescr) -> bool {
    if medium.id.family != device.info.family {
        return false;
    }

    let model = match (medium.id.family, &medium.model) {
        (Family::Tape, Some(model)) => model,
        _ => return true,
    };

    let drive_model = match device.drive_model() {
        Some(drive_model) => drive_model,
        None => return false,
    };

    let tape_type = match config.tape_type.get(model) {
        Some(tape_type) => tape_type,
        None => {
            warn!("no tape_type section for medium model '{}'", model);
            return false;
        }
    };

    for class in &tape_type.drive_rw {
        match config.drive_type.get(class) {
            Some(drive_type) => {
                if drive_type.models.iter().any(|m| m == drive_model) {
                    return true;
                }
            }
            None => warn!("no drive_type section '{}'", class),
        }
    }

    false
}
