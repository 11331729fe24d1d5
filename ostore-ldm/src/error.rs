use std::fmt::Display;

use nix::errno::Errno;

/// Adapter error
///
/// Primitive operations either fail with a definite OS error number
/// (which callers dispatch on, e.g. EINVAL from an impossible library
/// move) or with an opaque error that only travels upwards.
#[derive(thiserror::Error, Debug)]
pub enum LdmError {
    #[error("{1}")]
    Sys(Errno, String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LdmError {
    pub fn sys<M: Display>(errno: Errno, msg: M) -> Self {
        LdmError::Sys(errno, msg.to_string())
    }

    /// The OS error number, if there is a definite one.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            LdmError::Sys(errno, _) => Some(*errno),
            LdmError::Other(_) => None,
        }
    }

    pub fn is_errno(&self, errno: Errno) -> bool {
        self.errno() == Some(errno)
    }
}

impl From<std::io::Error> for LdmError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => LdmError::Sys(Errno::from_i32(code), err.to_string()),
            None => LdmError::Other(err.into()),
        }
    }
}

impl From<Errno> for LdmError {
    fn from(errno: Errno) -> Self {
        LdmError::Sys(errno, errno.desc().to_string())
    }
}
