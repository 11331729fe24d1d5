// Scheduler tests - read_prepare, io_complete, resource_release
//
// # cargo test --release lrs::test::intent_lifecycle

use anyhow::Error;
use nix::errno::Errno;

use ostore_api_types::{Family, FsStatus, FsType, LockState, MediumId};

use crate::lrs::Intent;

use super::TestWorld;

const GIG: u64 = 1024 * 1024 * 1024;

#[test]
fn test_read_prepare() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    let mut intent = Intent::for_medium(id.clone());
    sched.read_prepare(&mut intent)?;

    assert_eq!(intent.root_path(), Some(TestWorld::mount_root("d0").as_path()));
    assert_eq!(intent.fs_type(), Some(FsType::Ltfs));
    assert!(intent.is_active());

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.lock, LockState::Owner(sched.lock_owner().to_string()));

    sched.resource_release(&mut intent)?;
    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.lock, LockState::Unlocked);

    Ok(())
}

#[test]
fn test_read_prepare_blank_medium() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_blank_tape("T0", 100 * GIG);

    let mut sched = world.scheduler();
    let mut intent = Intent::for_medium(MediumId::new(Family::Tape, "T0"));
    match sched.read_prepare(&mut intent) {
        Err(err) => assert_eq!(err.errno(), Errno::EINVAL),
        Ok(()) => panic!("reading a blank medium should fail"),
    }

    Ok(())
}

#[test]
fn test_io_complete_updates_statistics() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    let mut intent = Intent::new(2 * GIG);
    sched.write_prepare(&mut intent, &[])?;

    // pretend the transfer layer wrote the extent
    world.fs.consume("T0", 2 * GIG);
    sched.io_complete(&mut intent, 3, None)?;

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.stats.nb_obj, 3);
    assert_eq!(row.stats.logc_spc_used, 2 * GIG);
    assert_eq!(row.stats.phys_spc_used, 2 * GIG);
    assert_eq!(row.stats.phys_spc_free, 98 * GIG);
    assert_eq!(row.fs.status, FsStatus::Used);

    sched.resource_release(&mut intent)?;
    Ok(())
}

#[test]
fn test_io_complete_global_error_marks_full() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    let mut intent = Intent::new(GIG);
    sched.write_prepare(&mut intent, &[])?;

    sched.io_complete(&mut intent, 1, Some(Errno::ENOSPC))?;

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.fs.status, FsStatus::Full);

    sched.resource_release(&mut intent)?;
    Ok(())
}

#[test]
fn test_io_complete_flush_error_marks_full() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    let mut intent = Intent::new(GIG);
    sched.write_prepare(&mut intent, &[])?;

    world
        .io
        .inject_medium_error(&TestWorld::mount_root("d0"));
    sched.io_complete(&mut intent, 1, None)?;

    let row = world.dss.medium(&id).unwrap();
    assert_eq!(row.fs.status, FsStatus::Full);

    sched.resource_release(&mut intent)?;
    Ok(())
}

#[test]
fn test_resource_release_is_idempotent() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);

    let mut sched = world.scheduler();
    let mut intent = Intent::new(GIG);
    sched.write_prepare(&mut intent, &[])?;

    sched.resource_release(&mut intent)?;
    assert!(!intent.is_active());
    // releasing again is a no-op
    sched.resource_release(&mut intent)?;

    assert_eq!(world.dss.device("d0").unwrap().lock, LockState::Unlocked);

    Ok(())
}

#[test]
fn test_fini_releases_leftover_locks() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape("T0", 100 * GIG, &[]);
    let id = MediumId::new(Family::Tape, "T0");

    let mut sched = world.scheduler();
    let mut intent = Intent::new(GIG);
    sched.write_prepare(&mut intent, &[])?;

    // the client vanished without releasing; shutdown cleans up
    sched.fini();

    assert_eq!(world.dss.medium(&id).unwrap().lock, LockState::Unlocked);
    assert_eq!(world.dss.device("d0").unwrap().lock, LockState::Unlocked);

    Ok(())
}
