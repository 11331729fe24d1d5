//! Medium selection
//!
//! Picks the unlocked medium wasting the least free space for a
//! given size and tag set, and acquires its DSS lock. Lock races are
//! resolved in place: a medium lost to another owner is marked
//! external in the local candidate list and the remaining candidates
//! are re-ranked.

use log::{debug, info};
use serde_json::json;

use ostore_api_types::{AdmStatus, Family, FsStatus, LockState, MediumInfo};

use crate::dss::{filter, Dss, DssError};

use super::SchedError;

/// Select and lock a medium with at least `required_size` bytes free
/// and all of `tags`.
///
/// The returned record is a deep copy with the lock held by `owner`;
/// the caller must release the lock if any later step fails.
pub(crate) fn select_medium(
    dss: &dyn Dss,
    owner: &str,
    family: Family,
    required_size: u64,
    tags: &[String],
) -> Result<MediumInfo, SchedError> {
    let mut clauses = vec![
        filter::eq("family", json!(family)),
        filter::eq("adm_status", json!(AdmStatus::Unlocked)),
        filter::gte("stats.phys_spc_free", required_size),
        filter::ne("fs.status", json!(FsStatus::Blank)),
        filter::ne("fs.status", json!(FsStatus::Full)),
    ];
    for tag in tags {
        clauses.push(filter::contains("tags", json!(tag)));
    }

    let mut candidates = dss.media_get(&filter::and(clauses))?;
    for candidate in candidates.iter_mut() {
        candidate.lock = std::mem::take(&mut candidate.lock).localize(owner);
    }

    loop {
        let mut best: Option<usize> = None;
        let mut busy_seen = false;

        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.stats.phys_spc_free < required_size {
                continue;
            }
            if !candidate.lock.is_unlocked() {
                // locked rows stay in the list: their existence
                // decides between EAGAIN and ENOSPC below
                busy_seen = true;
                continue;
            }
            best = match best {
                Some(b)
                    if candidates[b].stats.phys_spc_free
                        <= candidate.stats.phys_spc_free =>
                {
                    Some(b)
                }
                _ => Some(i),
            };
        }

        let chosen = match best {
            Some(i) => i,
            None if busy_seen => {
                return Err(SchedError::Retry(format!(
                    "all media with {} bytes free are locked",
                    required_size
                )))
            }
            None => return Err(SchedError::NoSpace(required_size)),
        };

        match dss.media_lock(&candidates[chosen].id, owner) {
            Ok(()) => {
                let mut medium = candidates[chosen].clone();
                medium.lock = LockState::Owner(owner.to_string());
                info!(
                    "selected medium '{}' ({} bytes free)",
                    medium.id, medium.stats.phys_spc_free
                );
                return Ok(medium);
            }
            Err(DssError::Locked(holder)) => {
                debug!(
                    "lost medium '{}' to '{}', re-ranking",
                    candidates[chosen].id, holder
                );
                candidates[chosen].lock = LockState::External;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
