//! Local Resource Scheduler
//!
//! Arbitrates access to one host's physical media resources (tape
//! drives, library-resident cartridges, on-disk directories) and
//! serves store operations by selecting, loading, mounting and
//! locking a (drive, medium) pair. Coordination with other hosts
//! happens exclusively through the DSS lock registry.

pub mod config;
pub mod dss;
pub mod lrs;
pub mod tools;
