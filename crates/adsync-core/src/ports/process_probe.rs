//! Process liveness port
//!
//! Stale-lock detection needs to know whether the process recorded in a
//! lock file still exists. The check is platform specific, so the engine
//! only sees this trait.

/// Answers whether a process id refers to a live process
pub trait IProcessProbe: Send + Sync {
    /// `true` if a process with `pid` exists (even if owned by another user)
    fn exists(&self, pid: u32) -> bool;
}
