// Scheduler tests - formatting blank media
//
// # cargo test --release lrs::test::format_medium

use anyhow::Error;
use nix::errno::Errno;

use ostore_api_types::{AdmStatus, Family, FsStatus, FsType, LockState, MediumId};

use crate::dss::Dss;
use crate::lrs::Intent;

use super::TestWorld;

const GIG: u64 = 1024 * 1024 * 1024;

#[test]
fn test_format_then_put() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_blank_tape("T0", 100 * GIG);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    sched.format_medium(&id, FsType::Ltfs, true)?;

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.fs.status, FsStatus::Empty);
    assert_eq!(row.fs.label, "T0");
    assert_eq!(row.adm_status, AdmStatus::Unlocked);
    assert_eq!(row.stats.phys_spc_free, 100 * GIG);
    assert_eq!(row.stats.nb_obj, 0);
    // format releases everything it acquired
    assert_eq!(row.lock, LockState::Unlocked);
    assert_eq!(world.dss.device("d0").unwrap().lock, LockState::Unlocked);

    // the freshly formatted medium is usable for a write right away
    let mut intent = Intent::new(GIG);
    sched.write_prepare(&mut intent, &[])?;
    assert_eq!(intent.medium_id, Some(id));

    sched.resource_release(&mut intent)?;
    Ok(())
}

#[test]
fn test_format_keeps_admin_lock() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_blank_tape("T0", 100 * GIG);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    sched.format_medium(&id, FsType::Ltfs, false)?;

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.fs.status, FsStatus::Empty);
    assert_eq!(row.adm_status, AdmStatus::Locked);

    Ok(())
}

#[test]
fn test_format_rejects_formatted_media() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    match sched.format_medium(&id, FsType::Ltfs, false) {
        Err(err) => assert_eq!(err.errno(), Errno::EINVAL),
        Ok(()) => panic!("formatting a non-blank medium should fail"),
    }

    Ok(())
}

#[test]
fn test_format_unknown_medium() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");

    let mut sched = world.scheduler();
    let id = MediumId::new(Family::Tape, "NOPE");
    match sched.format_medium(&id, FsType::Ltfs, false) {
        Err(err) => assert_eq!(err.errno(), Errno::ENXIO),
        Ok(()) => panic!("formatting an unknown medium should fail"),
    }

    Ok(())
}

#[test]
fn test_format_externally_locked_medium() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_blank_tape("T0", 100 * GIG);
    let id = MediumId::new(Family::Tape, "T0");

    world.dss.media_lock(&id, "other:9:0:0")?;

    let mut sched = world.scheduler();
    match sched.format_medium(&id, FsType::Ltfs, false) {
        Err(err) => assert_eq!(err.errno(), Errno::EAGAIN),
        Ok(()) => panic!("formatting a locked medium should fail"),
    }

    Ok(())
}
