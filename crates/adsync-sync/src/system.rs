//! Adapters backed by the operating system

use adsync_core::ports::{IClock, IProcessProbe};
use chrono::{DateTime, Utc};

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Process liveness via `kill(pid, 0)`
///
/// On non-Unix targets every pid is reported alive, so stale locks there
/// must be cleared with `force-unlock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProbe;

impl IProcessProbe for SystemProcessProbe {
    #[cfg(unix)]
    fn exists(&self, pid: u32) -> bool {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs permission and existence checks only
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to another user
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    fn exists(&self, _pid: u32) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_exists() {
        assert!(SystemProcessProbe.exists(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_does_not_exist() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!SystemProcessProbe.exists(pid));
    }

    #[cfg(unix)]
    #[test]
    fn test_pid_zero_is_not_a_process() {
        assert!(!SystemProcessProbe.exists(0));
    }
}
