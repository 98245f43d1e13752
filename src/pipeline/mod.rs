//! Pipeline orchestration: sequential stages over a shared run context.
//!
//! A [`Pipeline`] owns an ordered list of stages, the immutable
//! [`ScrapeContext`](crate::context::ScrapeContext), and a [`PipelineBus`]
//! for cross-stage signaling outside the strict linear chain. Stage *n*'s
//! output becomes stage *n+1*'s input; a stage never starts before the
//! previous stage's worker pool has fully drained. Concurrency exists only
//! inside a stage's execution.

pub mod queue;

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::context::ScrapeContext;
use crate::job::{JobError, ScrapeJob};
use queue::{Inspection, MessageQueue, QueueError};

/// A payload travelling through a named queue, with provenance and an
/// optional hop budget.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineMessage {
    /// Name of the stage that enqueued the message.
    pub from_stage: String,
    /// The message payload.
    pub payload: Value,
    /// Remaining stage-to-stage transits before forced removal. `None`
    /// means the message never expires.
    pub max_hops: Option<u32>,
}

impl PipelineMessage {
    /// Creates a message with no hop limit.
    #[must_use]
    pub fn new(from_stage: impl Into<String>, payload: Value) -> Self {
        Self {
            from_stage: from_stage.into(),
            payload,
            max_hops: None,
        }
    }

    /// Sets the hop budget. A budget of 0 is removed by the first sweep.
    #[must_use]
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = Some(max_hops);
        self
    }
}

/// Cross-stage side channel: named message queues plus a flat keyed state
/// store scoped to one pipeline instance.
///
/// State keys are namespaced flat strings (`"discover.pages_seen"`), never
/// nested paths; the linear input/output chain remains the primary way to
/// move data between stages.
#[derive(Debug, Default)]
pub struct PipelineBus {
    state: HashMap<String, Value>,
    queues: HashMap<String, MessageQueue<PipelineMessage>>,
}

impl PipelineBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Reads the value stored under `key`.
    #[must_use]
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Applies `update` to the value under `key` (or `Value::Null` when
    /// absent) and stores the result.
    pub fn update_state(&mut self, key: &str, update: impl FnOnce(Value) -> Value) {
        let current = self.state.remove(key).unwrap_or(Value::Null);
        self.state.insert(key.to_string(), update(current));
    }

    /// Creates a named queue, replacing any existing queue of that name.
    pub fn add_queue(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.queues.insert(name.clone(), MessageQueue::new(name));
    }

    /// Borrows a queue by name.
    pub fn queue_mut(&mut self, name: &str) -> Option<&mut MessageQueue<PipelineMessage>> {
        self.queues.get_mut(name)
    }

    /// Appends a message to `queue_name`, creating the queue on first use.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue is mid-iteration.
    pub fn push_message(
        &mut self,
        queue_name: &str,
        message: PipelineMessage,
    ) -> Result<(), QueueError> {
        self.queues
            .entry(queue_name.to_string())
            .or_insert_with(|| MessageQueue::new(queue_name))
            .enqueue(message)
    }

    /// Pops the front message of `queue_name`; `None` on empty or unknown
    /// queue.
    pub fn pop_message(&mut self, queue_name: &str) -> Option<PipelineMessage> {
        self.queues.get_mut(queue_name)?.dequeue()
    }

    /// Borrows the front message of `queue_name` without removing it.
    #[must_use]
    pub fn peek_message(&self, queue_name: &str) -> Option<&PipelineMessage> {
        self.queues.get(queue_name)?.peek()
    }

    /// Decrements every hop-limited message's budget and deletes the ones
    /// whose budget is exhausted. Runs after each stage transit so a message
    /// cannot circulate forever.
    pub(crate) fn sweep_expired(&mut self) {
        for queue in self.queues.values_mut() {
            // A live drain cursor cannot exist here: the bus is only handed
            // to one stage at a time.
            let _ = queue.inspect(|_, message| match message.max_hops {
                None => Inspection::Keep,
                Some(hops) => match hops.checked_sub(1) {
                    Some(remaining) => {
                        let mut updated = message.clone();
                        updated.max_hops = Some(remaining);
                        Inspection::Replace(updated)
                    }
                    None => {
                        debug!(
                            from_stage = %message.from_stage,
                            "dropping message with exhausted hop budget"
                        );
                        Inspection::Delete
                    }
                },
            });
        }
    }
}

/// Sequences stages, threading each stage's output into the next stage's
/// input.
pub struct Pipeline {
    jobs: Vec<Box<dyn ScrapeJob>>,
    ctx: ScrapeContext,
    bus: PipelineBus,
}

impl Pipeline {
    /// Creates a pipeline over `jobs` sharing `ctx`.
    #[must_use]
    pub fn new(jobs: Vec<Box<dyn ScrapeJob>>, ctx: ScrapeContext) -> Self {
        Self {
            jobs,
            ctx,
            bus: PipelineBus::new(),
        }
    }

    /// The shared run context.
    #[must_use]
    pub fn context(&self) -> &ScrapeContext {
        &self.ctx
    }

    /// The cross-stage bus, for pre-seeding queues or state before a run.
    pub fn bus_mut(&mut self) -> &mut PipelineBus {
        &mut self.bus
    }

    /// Runs every stage in order and returns the final stage's output.
    ///
    /// Item-level failures are absorbed inside each stage; the error path
    /// here is reserved for fatal conditions (invalid output directory,
    /// stats persistence failure in `on_exit`).
    ///
    /// # Errors
    ///
    /// Returns the first [`JobError`] raised by a stage's `execute` or
    /// `on_exit`.
    pub async fn run(&mut self, items: Vec<String>) -> Result<Vec<String>, JobError> {
        let mut items = items;
        let total = self.jobs.len();
        for (position, job) in self.jobs.iter_mut().enumerate() {
            info!(
                stage = job.name(),
                position = position + 1,
                total,
                input_items = items.len(),
                "starting stage"
            );
            items = job.execute(items, &self.ctx, &mut self.bus).await?;
            job.on_exit(&self.ctx)?;
            self.bus.sweep_expired();
        }
        Ok(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_round_trip_flat_keys() {
        let mut bus = PipelineBus::new();
        bus.set_state("discover.pages_seen", json!(3));
        assert_eq!(bus.get_state("discover.pages_seen"), Some(&json!(3)));
        assert_eq!(bus.get_state("other"), None);
    }

    #[test]
    fn test_update_state_sees_null_when_absent() {
        let mut bus = PipelineBus::new();
        bus.update_state("count", |v| json!(v.as_u64().unwrap_or(0) + 1));
        bus.update_state("count", |v| json!(v.as_u64().unwrap_or(0) + 1));
        assert_eq!(bus.get_state("count"), Some(&json!(2)));
    }

    #[test]
    fn test_push_message_auto_creates_queue() {
        let mut bus = PipelineBus::new();
        bus.push_message("retries", PipelineMessage::new("download", json!("http://a")))
            .unwrap();

        let message = bus.pop_message("retries").unwrap();
        assert_eq!(message.from_stage, "download");
        assert_eq!(message.payload, json!("http://a"));
        assert_eq!(bus.pop_message("retries"), None);
    }

    #[test]
    fn test_peek_message_leaves_queue_intact() {
        let mut bus = PipelineBus::new();
        bus.push_message("q", PipelineMessage::new("a", json!(1)))
            .unwrap();
        assert!(bus.peek_message("q").is_some());
        assert!(bus.pop_message("q").is_some());
    }

    #[test]
    fn test_sweep_decrements_and_expires_hops() {
        let mut bus = PipelineBus::new();
        bus.push_message("q", PipelineMessage::new("a", json!(1)).with_max_hops(1))
            .unwrap();
        bus.push_message("q", PipelineMessage::new("a", json!(2)))
            .unwrap();

        bus.sweep_expired();
        assert_eq!(bus.queue_mut("q").unwrap().len(), 2);
        assert_eq!(bus.peek_message("q").unwrap().max_hops, Some(0));

        bus.sweep_expired();
        // The hop-limited message is gone, the unlimited one survives.
        assert_eq!(bus.queue_mut("q").unwrap().len(), 1);
        assert_eq!(bus.peek_message("q").unwrap().max_hops, None);
    }

    #[test]
    fn test_zero_hop_message_removed_by_first_sweep() {
        let mut bus = PipelineBus::new();
        bus.push_message("q", PipelineMessage::new("a", json!(1)).with_max_hops(0))
            .unwrap();
        bus.sweep_expired();
        assert!(bus.pop_message("q").is_none());
    }
}
