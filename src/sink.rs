//! Structured logging of engine notifications
//!
//! `EventSink` is a passive `SchedulerListener`: it turns every
//! `SchedulerEvent` into a `tracing` event (errors at `error`, scheduler
//! lifecycle at `info`, job and trigger changes at `debug`) inside the span it
//! was constructed with, and keeps the most recent records in memory.

use crate::engine::{SchedulerEvent, SchedulerListener};
use crate::key::Key;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{Level, Span};

/// Default number of records kept by an `EventSink`
pub const DEFAULT_SINK_CAPACITY: usize = 1_000;

/// One observed notification
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub event: SchedulerEvent,
    pub level: Level,
    pub recorded_at: DateTime<Utc>,
}

/// Listener that logs engine notifications
pub struct EventSink {
    span: Span,
    capacity: usize,
    records: Mutex<VecDeque<SinkRecord>>,
}

impl EventSink {
    /// Create a sink keeping at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            span: Span::none(),
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_SINK_CAPACITY))),
        }
    }

    /// Emit every log record inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Level an event is logged at
    pub fn level_for(event: &SchedulerEvent) -> Level {
        match event {
            SchedulerEvent::SchedulerError { .. } => Level::ERROR,
            e if e.is_lifecycle() => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Recorded notifications, oldest first
    pub fn records(&self) -> Vec<SinkRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SinkRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, record: &SinkRecord) {
        let _entered = self.span.enter();
        let (job, trigger) = subjects(&record.event);
        let job = job.map(Key::to_string).unwrap_or_default();
        let trigger = trigger.map(Key::to_string).unwrap_or_default();
        let at = record.recorded_at.to_rfc3339();
        let name = record.event.name();

        match (&record.event, record.level) {
            (SchedulerEvent::SchedulerError { message }, _) => {
                tracing::error!(event = name, error = %message, at = %at, "Scheduler error")
            }
            (SchedulerEvent::TriggersPaused { matcher }
            | SchedulerEvent::TriggersResumed { matcher }
            | SchedulerEvent::JobsPaused { matcher }
            | SchedulerEvent::JobsResumed { matcher }, _) => {
                tracing::debug!(event = name, matcher = ?matcher, at = %at, "Scheduler event")
            }
            (_, Level::INFO) => tracing::info!(event = name, at = %at, "Scheduler event"),
            _ => tracing::debug!(
                event = name,
                job = %job,
                trigger = %trigger,
                at = %at,
                "Scheduler event"
            ),
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_CAPACITY)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// Job and trigger keys an event is about
fn subjects(event: &SchedulerEvent) -> (Option<&Key>, Option<&Key>) {
    match event {
        SchedulerEvent::JobScheduled {
            trigger_key,
            job_key,
        } => (Some(job_key), Some(trigger_key)),
        SchedulerEvent::JobFired {
            job_key,
            trigger_key,
        } => (Some(job_key), trigger_key.as_ref()),
        SchedulerEvent::JobUnscheduled { trigger_key }
        | SchedulerEvent::TriggerFinalized { trigger_key }
        | SchedulerEvent::TriggerPaused { trigger_key }
        | SchedulerEvent::TriggerResumed { trigger_key } => (None, Some(trigger_key)),
        SchedulerEvent::JobAdded { job_key }
        | SchedulerEvent::JobDeleted { job_key }
        | SchedulerEvent::JobPaused { job_key }
        | SchedulerEvent::JobResumed { job_key } => (Some(job_key), None),
        _ => (None, None),
    }
}

impl SchedulerListener for EventSink {
    fn on_event(&self, event: &SchedulerEvent) {
        let record = SinkRecord {
            event: event.clone(),
            level: Self::level_for(event),
            recorded_at: Utc::now(),
        };
        self.log(&record);

        if self.capacity == 0 {
            return;
        }
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}
