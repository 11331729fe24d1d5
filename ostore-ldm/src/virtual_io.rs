// Note: This is only for test and debug

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::{IoAdapter, LdmError};

/// Flush adapter with medium error injection
#[derive(Clone, Default)]
pub struct VirtualIo {
    // mount roots whose next flush reports a global medium error
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl VirtualIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next flush of `root` report a medium error.
    pub fn inject_medium_error(&self, root: &Path) {
        self.failing.lock().unwrap().insert(root.to_owned());
    }
}

impl IoAdapter for VirtualIo {
    fn flush(&mut self, root: &Path) -> Result<bool, LdmError> {
        Ok(self.failing.lock().unwrap().remove(root))
    }
}
