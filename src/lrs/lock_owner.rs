//! Scheduler lock owner identity
//!
//! Every DSS lock taken by a scheduler instance carries the same
//! owner string, `HOST:TID:TIME:COUNTER`. Host name plus thread id
//! plus wallclock second plus a process-local monotone counter make
//! collisions across concurrent instances effectively impossible.

use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use regex::Regex;

use crate::tools;

static LOCK_COUNTER: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref OWNER_REGEX: Regex = Regex::new(r"^([^:]+):[0-9]+:[0-9]+:[0-9]+$").unwrap();
}

// segment widths keep the owner string under 256 bytes no matter how
// long the host name is
const OWNER_HOST_MAX: usize = 212;

/// Build a fresh owner string for this scheduler instance.
pub fn build_lock_owner() -> String {
    let tid = nix::unistd::gettid().as_raw();
    let counter = LOCK_COUNTER.fetch_add(1, Ordering::Relaxed);

    format!(
        "{:.max$}:{}:{}:{}",
        tools::nodename(),
        tid,
        tools::epoch_i64(),
        counter,
        max = OWNER_HOST_MAX,
    )
}

/// Host segment of an owner string.
///
/// Returns None for owner strings not produced by a scheduler
/// instance.
pub fn owner_hostname(owner: &str) -> Option<&str> {
    OWNER_REGEX
        .captures(owner)
        .and_then(|caps| caps.get(1))
        .map(|host| host.as_str())
}
