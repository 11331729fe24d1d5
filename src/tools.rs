//! Small host helpers

use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;

lazy_static! {
    static ref NODENAME: String = query_nodename();
}

fn query_nodename() -> String {
    match nix::sys::utsname::uname() {
        Ok(uts) => {
            let name = uts.nodename().to_string_lossy();
            // keep the short name only
            match name.split('.').next() {
                Some(short) if !short.is_empty() => short.to_string(),
                _ => String::from("localhost"),
            }
        }
        Err(_) => String::from("localhost"),
    }
}

/// Short host name, computed once per process.
pub fn nodename() -> &'static str {
    &NODENAME
}

/// Seconds since the epoch.
pub fn epoch_i64() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(_) => 0,
    }
}
