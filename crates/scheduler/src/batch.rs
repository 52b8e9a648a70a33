//! Cooperative fan-out of the scheduling engine over contact populations.
//!
//! The parallel path is semantically identical to the sequential one: the
//! engine is pure, so there is no shared mutable state between per-contact
//! computations and results always come back in input order.

use chrono::NaiveDate;
use tracing::{info, warn};

use cadence_core::{Contact, ScheduleResult};

use crate::engine::{Horizon, Scheduler};

/// Populations at or below this size are processed sequentially; the task
/// overhead is not worth it.
const SEQUENTIAL_THRESHOLD: usize = 100;

/// Default fan-out bound for the parallel path.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Runs the scheduling engine across whole contact populations.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    scheduler: Scheduler,
    batch_size: usize,
}

impl BatchProcessor {
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Bound the number of contacts scheduled concurrently per chunk.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Schedule every contact over `[start, end]` (`end` defaults to two
    /// years past `start`). Results correspond to the input order; each
    /// contact's population index is its input position.
    pub async fn process_contacts(
        &self,
        contacts: &[Contact],
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Vec<ScheduleResult> {
        let base = match end {
            Some(end) => Horizon::new(start).with_end(end),
            None => Horizon::new(start),
        };
        let total = contacts.len();

        let results = if total <= SEQUENTIAL_THRESHOLD {
            self.process_sequential(contacts, base)
        } else {
            self.process_parallel(contacts, base).await
        };

        info!(
            contacts = total,
            scheduled = results.iter().map(|r| r.scheduled.len()).sum::<usize>(),
            skipped = results.iter().map(|r| r.skipped.len()).sum::<usize>(),
            "population scheduled"
        );
        results
    }

    fn process_sequential(&self, contacts: &[Contact], base: Horizon) -> Vec<ScheduleResult> {
        let total = contacts.len();
        contacts
            .iter()
            .enumerate()
            .map(|(index, contact)| {
                let horizon = base.with_population(total, index);
                self.scheduler.schedule(contact, &horizon)
            })
            .collect()
    }

    async fn process_parallel(&self, contacts: &[Contact], base: Horizon) -> Vec<ScheduleResult> {
        let total = contacts.len();
        let mut results = Vec::with_capacity(total);

        for (chunk_index, chunk) in contacts.chunks(self.batch_size).enumerate() {
            let offset = chunk_index * self.batch_size;
            let handles: Vec<_> = chunk
                .iter()
                .enumerate()
                .map(|(i, contact)| {
                    let scheduler = self.scheduler.clone();
                    let contact = contact.clone();
                    let horizon = base.with_population(total, offset + i);
                    tokio::spawn(async move { scheduler.schedule(&contact, &horizon) })
                })
                .collect();

            for (i, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(result) => results.push(result),
                    Err(join_error) => {
                        // A panicking task must not sink the population; the
                        // affected contact gets a processing-error result.
                        let contact = &chunk[i];
                        warn!(contact = %contact.id, %join_error, "scheduling task failed");
                        results.push(ScheduleResult::all_skipped(
                            contact.id.clone(),
                            format!("processing error: {join_error}"),
                        ));
                    }
                }
            }
        }

        results
    }
}
