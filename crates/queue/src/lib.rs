// crates/queue/src/lib.rs
//! The pending-message queue and its processor (C3/C4).

mod conflict;
mod processor;

pub use conflict::similarity;
pub use processor::{ProcessingMode, QueueProcessor};
