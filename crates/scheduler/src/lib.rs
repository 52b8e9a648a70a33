//! Deterministic scheduling of lifecycle emails.
//!
//! [`Scheduler::schedule`] is a pure function of one contact, the loaded
//! rule set, and a horizon; [`BatchProcessor`] fans it out over whole
//! populations without changing its semantics.

pub mod batch;
pub mod dates;
pub mod engine;

pub use batch::BatchProcessor;
pub use engine::{Horizon, Scheduler};
