// Scheduler tests - device picking policies
//
// # cargo test --release lrs::test::picker

use anyhow::Error;

use ostore_api_types::{DeviceState, Family, LockState, MediumId};

use crate::dss::Dss;
use crate::lrs::picker::{pick_device, PickPolicy, PickRequest};

use super::TestWorld;

const GIG: u64 = 1024 * 1024 * 1024;

// run one scheduler refresh so the cache mirrors the virtual world,
// then hand the cache to the picker directly
fn pick(
    world: &TestWorld,
    state: DeviceState,
    required_size: u64,
    policy: PickPolicy,
) -> Result<Option<String>, Error> {
    let mut sched = world.scheduler();
    sched.refresh()?;

    let owner = sched.lock_owner().to_string();
    let (cache, dss) = sched.parts_for_test();
    let picked = pick_device(
        cache,
        dss,
        &world.config,
        &owner,
        &PickRequest {
            state,
            required_size,
            tags: &[],
            medium: None,
            policy,
        },
    )?;

    Ok(picked.map(|i| cache.devices[i].serial().to_string()))
}

#[test]
fn test_best_fit_picks_tightest_mounted_medium() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_drive("d1");
    world.add_drive("d2");
    world.add_tape_in_drive("T0", 100 * GIG, "d0", true);
    world.add_tape_in_drive("T1", 20 * GIG, "d1", true);
    world.add_tape_in_drive("T2", 60 * GIG, "d2", true);

    let picked = pick(&world, DeviceState::Mounted, 10 * GIG, PickPolicy::BestFit)?;
    assert_eq!(picked.as_deref(), Some("d1"));

    Ok(())
}

#[test]
fn test_best_fit_exact_match_stops() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_drive("d1");
    world.add_tape_in_drive("T0", 50 * GIG, "d0", true);
    world.add_tape_in_drive("T1", 55 * GIG, "d1", true);

    let picked = pick(&world, DeviceState::Mounted, 50 * GIG, PickPolicy::BestFit)?;
    assert_eq!(picked.as_deref(), Some("d0"));

    Ok(())
}

#[test]
fn test_first_fit_takes_the_first_fitting_device() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_drive("d1");
    world.add_tape_in_drive("T0", 100 * GIG, "d0", true);
    world.add_tape_in_drive("T1", 20 * GIG, "d1", true);

    let picked = pick(&world, DeviceState::Mounted, 10 * GIG, PickPolicy::FirstFit)?;
    assert_eq!(picked.as_deref(), Some("d0"));

    Ok(())
}

#[test]
fn test_drive_to_free_prefers_least_free_space() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_drive("d1");
    world.add_drive("d2");
    // d0 stays empty, d1 and d2 hold media
    world.add_tape_in_drive("T1", 80 * GIG, "d1", false);
    world.add_tape_in_drive("T2", 10 * GIG, "d2", true);

    let picked = pick(&world, DeviceState::Unspec, 0, PickPolicy::DriveToFree)?;
    assert_eq!(picked.as_deref(), Some("d2"));

    Ok(())
}

#[test]
fn test_contended_device_is_skipped() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_drive("d1");
    world.add_tape_in_drive("T0", 20 * GIG, "d0", true);
    world.add_tape_in_drive("T1", 50 * GIG, "d1", true);

    // another instance holds the tightest-fit drive
    world
        .dss
        .device_lock(Family::Tape, "d0", "other:9:0:0")
        .unwrap();

    let picked = pick(&world, DeviceState::Mounted, 10 * GIG, PickPolicy::BestFit)?;
    assert_eq!(picked.as_deref(), Some("d1"));

    // losing the device lock released the medium lock taken first
    let row = world.dss.medium(&MediumId::new(Family::Tape, "T0")).unwrap();
    assert_eq!(row.lock, LockState::Unlocked);

    Ok(())
}

#[test]
fn test_externally_locked_medium_makes_device_unavailable() -> Result<(), Error> {
    let world = TestWorld::new();
    world.add_drive("d0");
    world.add_tape_in_drive("T0", 50 * GIG, "d0", true);

    world
        .dss
        .media_lock(&MediumId::new(Family::Tape, "T0"), "other:9:0:0")
        .unwrap();

    let picked = pick(&world, DeviceState::Mounted, 10 * GIG, PickPolicy::BestFit)?;
    assert_eq!(picked, None);

    Ok(())
}
