use nix::errno::Errno;

use crate::dss::DssError;

/// Scheduler error
///
/// The variants carry the failure taxonomy the store dispatches on;
/// [SchedError::errno] gives the POSIX code reported at the client
/// boundary. `Retry` and `Busy` both mean "lost this round": they
/// never imply hardware failure and never demote a device.
#[derive(thiserror::Error, Debug)]
pub enum SchedError {
    /// Transient lock contention, retry the whole request
    #[error("resource contention - {0}")]
    Retry(String),
    /// The library refused a motion that may succeed later
    #[error("library motion rejected - {0}")]
    Busy(String),
    /// No medium with enough free space
    #[error("no medium with {0} bytes free")]
    NoSpace(u64),
    /// No usable drive on this host
    #[error("no usable device - {0}")]
    NoDevice(String),
    /// The DSS knows no such medium
    #[error("no such medium '{0}'")]
    NoSuchMedium(String),
    /// The DSS knows no such object
    #[error("no such object '{0}'")]
    NoSuchObject(String),
    /// Invalid or inconsistent request
    #[error("invalid request - {0}")]
    Invalid(String),
    /// Fatal adapter or DSS failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchedError {
    pub fn errno(&self) -> Errno {
        match self {
            SchedError::Retry(_) => Errno::EAGAIN,
            SchedError::Busy(_) => Errno::EBUSY,
            SchedError::NoSpace(_) => Errno::ENOSPC,
            SchedError::NoDevice(_) => Errno::ENODEV,
            SchedError::NoSuchMedium(_) => Errno::ENXIO,
            SchedError::NoSuchObject(_) => Errno::ENOENT,
            SchedError::Invalid(_) => Errno::EINVAL,
            SchedError::Other(_) => Errno::EIO,
        }
    }

    /// Collapse `Busy` into `Retry` for the client boundary, where a
    /// rejected library motion is just another reason to try again.
    pub fn retryable(self) -> Self {
        match self {
            SchedError::Busy(msg) => SchedError::Retry(msg),
            other => other,
        }
    }
}

impl From<DssError> for SchedError {
    fn from(err: DssError) -> Self {
        match err {
            DssError::Locked(holder) => {
                SchedError::Retry(format!("row is locked by '{}'", holder))
            }
            DssError::NotLocked => SchedError::Invalid(String::from("row is not locked")),
            DssError::NoSuchRow => SchedError::Invalid(String::from("no such row")),
            DssError::Other(err) => SchedError::Other(err),
        }
    }
}

impl From<ostore_ldm::LdmError> for SchedError {
    fn from(err: ostore_ldm::LdmError) -> Self {
        SchedError::Other(anyhow::Error::new(err))
    }
}
