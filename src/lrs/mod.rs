//! Local Resource Scheduler
//!
//! One scheduler instance runs per host and owns the host's device
//! cache. All cross-host coordination goes through DSS row locks,
//! acquired medium first, then device, and released in reverse
//! order. Contention is handled by retrying: callers receiving a
//! retryable error are expected to re-issue the whole request.
//!
//! A multi-threaded embedder must serialize calls into a scheduler
//! instance; the entry points take `&mut self` to make that explicit.

mod error;
pub use error::SchedError;

mod lock_owner;
pub use lock_owner::{build_lock_owner, owner_hostname};

mod compat;
pub use compat::medium_compatible;

mod device;
pub use device::DeviceDescr;

mod cache;

mod media_select;

mod picker;

mod free;

mod sched;
pub use sched::{locate, Intent, LdmAdapters, LocalResourceScheduler};

#[cfg(test)]
mod test;
