// Scheduler test support
//
// Builds a small virtual world (DSS, library, filesystem, device
// list) shared by the scenario tests.

use std::path::PathBuf;
use std::sync::Arc;

use ostore_api_types::{
    AddrType, AdmStatus, DeviceInfo, Family, FsDescr, FsStatus, FsType, LockState, MediaStats,
    MediumInfo,
};
use ostore_ldm::{FsAdapter, VirtualDeviceList, VirtualFs, VirtualIo, VirtualLibrary};

use crate::config::{DriveTypeConfig, LrsConfig, TapeTypeConfig};
use crate::dss::MemoryDss;
use crate::tools;

use super::{LdmAdapters, LocalResourceScheduler};



mod picker;


mod format_medium;

mod intent_lifecycle;


const DRIVE_MODEL: &str = "ULTRIUM-HH5";
const TAPE_MODEL: &str = "LTO5";
const MOUNT_PREFIX: &str = "/mnt/ostore-";

pub(crate) struct TestWorld {
    pub dss: Arc<MemoryDss>,
    pub lib: VirtualLibrary,
    pub fs: VirtualFs,
    pub io: VirtualIo,
    pub devices: VirtualDeviceList,
    pub config: LrsConfig,
}

impl TestWorld {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut config = LrsConfig {
            mount_prefix: String::from(MOUNT_PREFIX),
            ..LrsConfig::default()
        };
        config.drive_type.insert(
            String::from("LTO5_drive"),
            DriveTypeConfig {
                models: vec![String::from(DRIVE_MODEL)],
            },
        );
        config.tape_type.insert(
            String::from(TAPE_MODEL),
            TapeTypeConfig {
                drive_rw: vec![String::from("LTO5_drive")],
            },
        );

        TestWorld {
            dss: Arc::new(MemoryDss::new()),
            lib: VirtualLibrary::new(),
            fs: VirtualFs::new(),
            io: VirtualIo::new(),
            devices: VirtualDeviceList::new(),
            config,
        }
    }

    pub fn scheduler(&self) -> LocalResourceScheduler {
        LocalResourceScheduler::new(
            self.config.clone(),
            self.dss.clone(),
            LdmAdapters {
                device: Box::new(self.devices.clone()),
                library: Box::new(self.lib.clone()),
                fs: Box::new(self.fs.clone()),
                io: Box::new(self.io.clone()),
            },
        )
    }

    pub fn drive_path(serial: &str) -> PathBuf {
        PathBuf::from(format!("/dev/ost/{}", serial))
    }

    pub fn mount_root(serial: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", MOUNT_PREFIX, serial))
    }

    /// One empty drive known to the DSS, the library and the OS.
    /// Every drive brings a spare storage slot, as real autochangers
    /// do.
    pub fn add_drive(&self, serial: &str) {
        self.devices
            .add(serial, &Self::drive_path(serial), Some(DRIVE_MODEL));
        self.lib.add_drive(serial);
        self.lib.add_slot();
        self.dss.add_device(DeviceInfo {
            family: Family::Tape,
            serial: serial.to_string(),
            model: Some(String::from(DRIVE_MODEL)),
            host: tools::nodename().to_string(),
            adm_status: AdmStatus::Unlocked,
            lock: LockState::Unlocked,
        });
    }

    pub fn tape_row(label: &str, free: u64, tags: &[&str]) -> MediumInfo {
        MediumInfo {
            id: ostore_api_types::MediumId::new(Family::Tape, label),
            model: Some(String::from(TAPE_MODEL)),
            adm_status: AdmStatus::Unlocked,
            addr_type: AddrType::Hash1,
            fs: FsDescr {
                typ: FsType::Ltfs,
                label: String::from(label),
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

    /// A formatted tape sitting in a storage slot.
    pub fn add_tape(&self, label: &str, free: u64, tags: &[&str]) {
        self.dss.add_medium(Self::tape_row(label, free, tags));
        self.lib.add_slot_medium(label);
        self.fs.add_filesystem(label, 0, free);
    }

    /// A formatted tape already sitting inside a drive, optionally
    /// with its filesystem mounted.
    pub fn add_tape_in_drive(&self, label: &str, free: u64, serial: &str, mounted: bool) {
        self.dss.add_medium(Self::tape_row(label, free, &[]));
        self.lib.load_drive(serial, label);
        self.fs.add_filesystem(label, 0, free);
        if mounted {
            let mut fs = self.fs.clone();
            fs.mount(
                &Self::drive_path(serial),
                &Self::mount_root(serial),
                label,
            )
            .unwrap();
        }
    }

    /// An unformatted, administratively locked tape in a storage
    /// slot; `capacity` is what formatting it will yield.
    pub fn add_blank_tape(&self, label: &str, capacity: u64) {
        let mut row = Self::tape_row(label, 0, &[]);
        row.fs.status = FsStatus::Blank;
        row.adm_status = AdmStatus::Locked;
        self.dss.add_medium(row);
        self.lib.add_slot_medium(label);
        self.fs.set_capacity(label, capacity);
    }
}
