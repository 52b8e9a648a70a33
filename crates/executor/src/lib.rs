//! The send executor: turns pending tracking rows into provider
//! dispatches, chunk by chunk, with bounded concurrency and per-send
//! policy gates.

pub mod config;
pub mod executor;
pub mod policy;

pub use config::ExecutorConfig;
pub use executor::{ChunkReport, ExecutorError, SendExecutor};
pub use policy::SendPolicy;
