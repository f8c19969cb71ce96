// crates/daemon/src/lib.rs
//! The background daemon lifecycle (C5): PID file, host-side manager,
//! the child run loop, and orphan reaping.

pub mod child;
pub mod manager;
pub mod pid;
pub mod reaper;

pub use child::ChildRunLoop;
pub use manager::DaemonManager;
pub use pid::{is_alive, PidFile};
pub use reaper::reap_orphan;
