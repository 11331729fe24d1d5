// Note: This is only for test and debug

use std::sync::{Arc, Mutex};

use nix::errno::Errno;

use crate::{DriveElementInfo, ElementType, LdmError, LibAddr, LibraryAdapter};

struct DriveSlot {
    serial: String,
    medium: Option<String>,
}

#[derive(Default)]
struct LibraryState {
    drives: Vec<DriveSlot>,
    slots: Vec<Option<String>>,
}

/// In-memory robotic library
///
/// Mimics the behavior the scheduler depends on: element addressing,
/// full/empty drive status, and the usual refusal to move a cartridge
/// directly between two drives.
#[derive(Clone, Default)]
pub struct VirtualLibrary {
    state: Arc<Mutex<LibraryState>>,
}

impl VirtualLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_drive(&self, serial: &str) {
        let mut state = self.state.lock().unwrap();
        state.drives.push(DriveSlot {
            serial: serial.to_string(),
            medium: None,
        });
    }

    /// Add an empty storage slot.
    pub fn add_slot(&self) {
        self.state.lock().unwrap().slots.push(None);
    }

    /// Put a medium into the first free storage slot.
    pub fn add_slot_medium(&self, label: &str) {
        let mut state = self.state.lock().unwrap();
        for slot in state.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(label.to_string());
                return;
            }
        }
        state.slots.push(Some(label.to_string()));
    }

    /// Put a medium directly into the drive with the given serial.
    pub fn load_drive(&self, serial: &str, label: &str) {
        let mut state = self.state.lock().unwrap();
        for drive in state.drives.iter_mut() {
            if drive.serial == serial {
                drive.medium = Some(label.to_string());
                return;
            }
        }
        panic!("no virtual drive with serial '{}'", serial);
    }

    /// Label inside the drive with the given serial, for test inspection.
    pub fn drive_medium(&self, serial: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .drives
            .iter()
            .find(|drive| drive.serial == serial)
            .and_then(|drive| drive.medium.clone())
    }

    fn take_medium(state: &mut LibraryState, addr: LibAddr) -> Result<String, LdmError> {
        let slot = match addr.typ {
            ElementType::Drive => state
                .drives
                .get_mut(addr.index as usize)
                .map(|drive| &mut drive.medium),
            ElementType::Slot => state.slots.get_mut(addr.index as usize),
            _ => None,
        };
        match slot {
            Some(content) => match content.take() {
                Some(label) => Ok(label),
                None => Err(LdmError::sys(
                    Errno::EINVAL,
                    format!("source element {} is empty", addr),
                )),
            },
            None => Err(LdmError::sys(
                Errno::EINVAL,
                format!("no element at {}", addr),
            )),
        }
    }

    fn put_medium(state: &mut LibraryState, addr: LibAddr, label: String) -> Result<(), LdmError> {
        let slot = match addr.typ {
            ElementType::Drive => state
                .drives
                .get_mut(addr.index as usize)
                .map(|drive| &mut drive.medium),
            ElementType::Slot => state.slots.get_mut(addr.index as usize),
            _ => None,
        };
        match slot {
            Some(content) if content.is_none() => {
                *content = Some(label);
                Ok(())
            }
            Some(_) => Err(LdmError::sys(
                Errno::EINVAL,
                format!("target element {} is not empty", addr),
            )),
            None => Err(LdmError::sys(
                Errno::EINVAL,
                format!("no element at {}", addr),
            )),
        }
    }
}

impl LibraryAdapter for VirtualLibrary {
    fn drive_lookup(&mut self, serial: &str) -> Result<DriveElementInfo, LdmError> {
        let state = self.state.lock().unwrap();
        for (i, drive) in state.drives.iter().enumerate() {
            if drive.serial == serial {
                return Ok(DriveElementInfo {
                    addr: LibAddr::new(ElementType::Drive, i as u64),
                    full: drive.medium.is_some(),
                    medium_id: drive.medium.clone(),
                });
            }
        }
        Err(LdmError::sys(
            Errno::ENOENT,
            format!("no drive with serial '{}'", serial),
        ))
    }

    fn media_lookup(&mut self, label: &str) -> Result<LibAddr, LdmError> {
        let state = self.state.lock().unwrap();
        for (i, drive) in state.drives.iter().enumerate() {
            if drive.medium.as_deref() == Some(label) {
                return Ok(LibAddr::new(ElementType::Drive, i as u64));
            }
        }
        for (i, slot) in state.slots.iter().enumerate() {
            if slot.as_deref() == Some(label) {
                return Ok(LibAddr::new(ElementType::Slot, i as u64));
            }
        }
        Err(LdmError::sys(
            Errno::ENOENT,
            format!("medium '{}' is not in the library", label),
        ))
    }

    fn media_move(&mut self, src: LibAddr, dst: LibAddr) -> Result<(), LdmError> {
        if src.is_drive() && dst.is_drive() {
            return Err(LdmError::sys(
                Errno::EINVAL,
                format!("cannot move directly from {} to {}", src, dst),
            ));
        }

        let mut state = self.state.lock().unwrap();
        let label = Self::take_medium(&mut state, src)?;
        if let Err(err) = Self::put_medium(&mut state, dst, label.clone()) {
            // put the medium back so the library stays consistent
            let _ = Self::put_medium(&mut state, src, label);
            return Err(err);
        }
        Ok(())
    }

    fn free_slot(&mut self) -> Result<LibAddr, LdmError> {
        let state = self.state.lock().unwrap();
        for (i, slot) in state.slots.iter().enumerate() {
            if slot.is_none() {
                return Ok(LibAddr::new(ElementType::Slot, i as u64));
            }
        }
        Err(LdmError::sys(Errno::ENOSPC, "no free storage slot"))
    }
}
