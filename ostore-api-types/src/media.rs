use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AdmStatus, Family, LockState};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Filesystem type written on a medium
pub enum FsType {
    /// Plain POSIX directory tree
    Posix,
    /// Linear Tape File System
    Ltfs,
}
serde_plain::derive_display_from_serialize!(FsType);
serde_plain::derive_fromstr_from_deserialize!(FsType);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Filesystem status of a medium
pub enum FsStatus {
    /// Medium is not formatted
    Blank,
    /// Medium is formatted but contains no object
    Empty,
    /// Medium contains objects and has remaining space
    Used,
    /// Medium contains no more usable space
    Full,
}
serde_plain::derive_display_from_serialize!(FsStatus);
serde_plain::derive_fromstr_from_deserialize!(FsStatus);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// How extents are addressed inside a medium
pub enum AddrType {
    /// Extents are addressed by path
    Path,
    /// Extents are addressed by a hashed path
    Hash1,
    /// Addressing is opaque to the store
    Opaque,
}
serde_plain::derive_display_from_serialize!(AddrType);
serde_plain::derive_fromstr_from_deserialize!(AddrType);

/// Unique medium identifier (family + label)
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MediumId {
    pub family: Family,
    /// Medium label (tape barcode or directory name)
    pub id: String,
}

impl MediumId {
    pub fn new(family: Family, id: &str) -> Self {
        MediumId {
            family,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for MediumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.id)
    }
}

/// Filesystem descriptor of a medium
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FsDescr {
    #[serde(rename = "type")]
    pub typ: FsType,
    /// Filesystem label, equal to the medium id once formatted
    pub label: String,
    pub status: FsStatus,
}

/// Medium space and object statistics
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediaStats {
    /// Number of objects written
    pub nb_obj: u64,
    /// Logical space used (sum of object sizes)
    pub logc_spc_used: u64,
    /// Physical space used
    pub phys_spc_used: u64,
    /// Physical space free
    pub phys_spc_free: u64,
}

/// Medium DSS row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediumInfo {
    #[serde(flatten)]
    pub id: MediumId,
    /// Medium model (e.g. 'LTO5'), unset for non-tape families
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub adm_status: AdmStatus,
    pub addr_type: AddrType,
    pub fs: FsDescr,
    pub stats: MediaStats,
    /// Opaque selection labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub lock: LockState,
}

impl MediumInfo {
    /// True iff this medium carries every tag in `required`.
    ///
    /// An empty requirement always matches.
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_medium() -> MediumInfo {
        MediumInfo {
            id: MediumId::new(Family::Tape, "T0"),
            model: Some(String::from("LTO5")),
            adm_status: AdmStatus::Unlocked,
            addr_type: AddrType::Hash1,
            fs: FsDescr {
                typ: FsType::Ltfs,
                label: String::from("T0"),
                status: FsStatus::Empty,
            },
            stats: MediaStats::default(),
            tags: vec![String::from("fast"), String::from("offsite")],
            lock: LockState::Unlocked,
        }
    }

    #[test]
    fn test_has_tags() {
        let medium = test_medium();
        assert!(medium.has_tags(&[]));
        assert!(medium.has_tags(&[String::from("fast")]));
        assert!(medium.has_tags(&[String::from("offsite"), String::from("fast")]));
        assert!(!medium.has_tags(&[String::from("fast"), String::from("slow")]));
    }

    #[test]
    fn test_medium_serde() {
        let medium = test_medium();
        let value = serde_json::to_value(&medium).unwrap();
        assert_eq!(value["family"], "tape");
        assert_eq!(value["id"], "T0");
        assert_eq!(value["fs"]["type"], "ltfs");
        assert_eq!(value["lock"], "");

        let back: MediumInfo = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, medium.id);
        assert_eq!(back.fs, medium.fs);
        assert_eq!(back.lock, LockState::Unlocked);
    }
}
