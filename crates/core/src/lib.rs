//! Core types shared across the Cadence lifecycle-mailer workspace.
//!
//! Everything here is plain data: contact projections, schedule events, the
//! tracking-row model, batch id helpers, and quote-link hashing. No I/O
//! lives in this crate apart from the optional telemetry bootstrap.

pub mod batch;
pub mod contact;
pub mod event;
pub mod links;
pub mod telemetry;
pub mod tracking;
pub mod types;

pub use batch::{is_batch_id, new_batch_id, new_single_batch_id};
pub use contact::Contact;
pub use event::{EmailEvent, EmailType, ScheduleResult};
pub use links::{quote_hash, quote_link};
pub use tracking::{BatchScope, SendMode, SendStatus, TrackingRow};
pub use types::{BatchId, ContactId, OrgId};
