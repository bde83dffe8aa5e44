//! The four pipeline tasks and the scheduler that drives them.

pub mod ack;
pub mod cleanup;
pub mod forward;
pub mod reverse;
pub mod scheduler;

pub use ack::{AckOutcome, AckSweep};
pub use cleanup::{CleanupOutcome, CleanupSweep};
pub use forward::{ForwardOutcome, ForwardSync};
pub use reverse::{ReverseOutcome, ReverseSync};
pub use scheduler::{KickReceivers, Kicks, Scheduler};
