//! Scheduler engine boundary
//!
//! The engine is the only source of truth for jobs, triggers and calendars.
//! The facade talks to it through `SchedulerEngine` using the engine-native
//! types defined here; `MemoryEngine` is the in-process implementation.

use crate::error::Result;
use crate::key::{GroupMatcher, Key};
use crate::types::{JobData, TriggerState};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub mod calendar;
pub mod memory;

pub use calendar::Calendar;

/// Upper bound on candidate fire times examined when searching past
/// calendar exclusions
const MAX_FIRE_TIME_PROBES: usize = 100_000;

/// Misfire handling understood by interval schedules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IntervalMisfire {
    #[default]
    Smart,
    IgnoreMisfires,
    FireNow,
    RescheduleNextWithExistingCount,
    RescheduleNextWithRemainingCount,
    RescheduleNowWithExistingCount,
    RescheduleNowWithRemainingCount,
}

/// Misfire handling understood by cron schedules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CronMisfire {
    #[default]
    Smart,
    IgnoreMisfires,
    FireOnceNow,
    DoNothing,
}

/// Engine-native schedule
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSchedule {
    /// Fire at `start`, then every `repeat_interval_ms`, `repeat_count` more times
    /// (`-1` repeats until the end time)
    Interval {
        repeat_interval_ms: i64,
        repeat_count: i32,
        misfire: IntervalMisfire,
    },
    /// Fire on every match of a parsed cron expression
    Cron {
        schedule: cron::Schedule,
        misfire: CronMisfire,
    },
}

impl EngineSchedule {
    /// Cron source text, for cron schedules
    pub fn expression(&self) -> Option<&str> {
        match self {
            EngineSchedule::Cron { schedule, .. } => Some(schedule.source()),
            EngineSchedule::Interval { .. } => None,
        }
    }
}

/// Engine-native job
#[derive(Debug, Clone, PartialEq)]
pub struct EngineJob {
    pub key: Key,
    pub description: Option<String>,
    pub handler_type: String,
    pub data: JobData,
    pub durable: bool,
    pub requests_recovery: bool,
}

/// Engine-native trigger
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTrigger {
    pub key: Key,
    pub job_key: Key,
    pub description: Option<String>,
    pub schedule: EngineSchedule,
    pub calendar_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub data: JobData,
}

impl EngineTrigger {
    /// First moment this trigger fires, honouring its window and calendar
    ///
    /// `None` means the trigger can never fire.
    pub fn first_fire_time(&self, calendar: Option<&Calendar>) -> Option<DateTime<Utc>> {
        let just_before = self.start_time.checked_sub_signed(Duration::milliseconds(1))?;
        self.fire_time_after(just_before, calendar)
    }

    /// Next fire time strictly after `after`
    pub fn fire_time_after(
        &self,
        after: DateTime<Utc>,
        calendar: Option<&Calendar>,
    ) -> Option<DateTime<Utc>> {
        if calendar.is_some_and(Calendar::excludes_everything) {
            return None;
        }
        let included = |t: &DateTime<Utc>| calendar.map_or(true, |c| c.is_time_included(*t));
        let in_window = |t: &DateTime<Utc>| self.end_time.map_or(true, |end| *t <= end);

        match &self.schedule {
            EngineSchedule::Interval {
                repeat_interval_ms,
                repeat_count,
                ..
            } => {
                let first = if after < self.start_time {
                    0
                } else if *repeat_interval_ms <= 0 {
                    return None;
                } else {
                    (after - self.start_time).num_milliseconds() / repeat_interval_ms + 1
                };
                (first..)
                    .take(MAX_FIRE_TIME_PROBES)
                    .take_while(|n| *repeat_count < 0 || *n <= i64::from(*repeat_count))
                    .map_while(|n| {
                        let offset = n.checked_mul(*repeat_interval_ms)?;
                        self.start_time
                            .checked_add_signed(Duration::milliseconds(offset))
                    })
                    .take_while(in_window)
                    .find(included)
            }
            EngineSchedule::Cron { schedule, .. } => {
                let from = after.max(
                    self.start_time
                        .checked_sub_signed(Duration::milliseconds(1))
                        .unwrap_or(self.start_time),
                );
                schedule
                    .after(&from)
                    .take(MAX_FIRE_TIME_PROBES)
                    .take_while(in_window)
                    .find(included)
            }
        }
    }
}

/// Notification emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    JobScheduled { trigger_key: Key, job_key: Key },
    JobUnscheduled { trigger_key: Key },
    /// The trigger will never fire again
    TriggerFinalized { trigger_key: Key },
    TriggerPaused { trigger_key: Key },
    TriggersPaused { matcher: GroupMatcher },
    TriggerResumed { trigger_key: Key },
    TriggersResumed { matcher: GroupMatcher },
    JobAdded { job_key: Key },
    JobDeleted { job_key: Key },
    JobPaused { job_key: Key },
    JobsPaused { matcher: GroupMatcher },
    JobResumed { job_key: Key },
    JobsResumed { matcher: GroupMatcher },
    /// A job was handed to its handler
    JobFired { job_key: Key, trigger_key: Option<Key> },
    SchedulerError { message: String },
    SchedulerStarting,
    SchedulerStarted,
    SchedulerInStandby,
    SchedulerShuttingDown,
    SchedulerShutdown,
    SchedulingDataCleared,
}

impl SchedulerEvent {
    /// Short event name, used as the `event` log field
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::JobScheduled { .. } => "job_scheduled",
            SchedulerEvent::JobUnscheduled { .. } => "job_unscheduled",
            SchedulerEvent::TriggerFinalized { .. } => "trigger_finalized",
            SchedulerEvent::TriggerPaused { .. } => "trigger_paused",
            SchedulerEvent::TriggersPaused { .. } => "triggers_paused",
            SchedulerEvent::TriggerResumed { .. } => "trigger_resumed",
            SchedulerEvent::TriggersResumed { .. } => "triggers_resumed",
            SchedulerEvent::JobAdded { .. } => "job_added",
            SchedulerEvent::JobDeleted { .. } => "job_deleted",
            SchedulerEvent::JobPaused { .. } => "job_paused",
            SchedulerEvent::JobsPaused { .. } => "jobs_paused",
            SchedulerEvent::JobResumed { .. } => "job_resumed",
            SchedulerEvent::JobsResumed { .. } => "jobs_resumed",
            SchedulerEvent::JobFired { .. } => "job_fired",
            SchedulerEvent::SchedulerError { .. } => "scheduler_error",
            SchedulerEvent::SchedulerStarting => "scheduler_starting",
            SchedulerEvent::SchedulerStarted => "scheduler_started",
            SchedulerEvent::SchedulerInStandby => "scheduler_in_standby",
            SchedulerEvent::SchedulerShuttingDown => "scheduler_shutting_down",
            SchedulerEvent::SchedulerShutdown => "scheduler_shutdown",
            SchedulerEvent::SchedulingDataCleared => "scheduling_data_cleared",
        }
    }

    /// Whether the event concerns the scheduler itself rather than a job or trigger
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            SchedulerEvent::SchedulerStarting
                | SchedulerEvent::SchedulerStarted
                | SchedulerEvent::SchedulerInStandby
                | SchedulerEvent::SchedulerShuttingDown
                | SchedulerEvent::SchedulerShutdown
                | SchedulerEvent::SchedulingDataCleared
        )
    }
}

/// Receives engine notifications
///
/// Called synchronously on the engine's notification path; implementations
/// must not block and must not panic.
pub trait SchedulerListener: Send + Sync {
    fn on_event(&self, event: &SchedulerEvent);
}

/// A job handed to its handler by an immediate firing
#[derive(Debug, Clone, PartialEq)]
pub struct FiredJob {
    pub job_key: Key,
    /// Firing data, as passed to `trigger_job`
    pub data: Option<JobData>,
    pub fired_at: DateTime<Utc>,
}

/// Result of a handler execution
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_key: Key,
    pub handler_type: String,
    pub fired_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Handler error message, if it failed
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Scheduling runtime that stores jobs and triggers and fires them
///
/// Every method that changes state is expected to fail with
/// `ScheduleError::Engine` on engine-side rule violations (duplicate keys on
/// non-replacing registration, dangling job references, and so on).
#[async_trait]
pub trait SchedulerEngine: Send + Sync {
    /// Store a job without triggers
    async fn add_job(&self, job: EngineJob, replace: bool) -> Result<()>;

    /// Store a job together with its triggers in one step
    async fn schedule_job_with_triggers(
        &self,
        job: EngineJob,
        triggers: Vec<EngineTrigger>,
        replace: bool,
    ) -> Result<()>;

    /// Schedule a trigger for an already stored job, returning its first fire time
    async fn schedule_trigger(&self, trigger: EngineTrigger) -> Result<DateTime<Utc>>;

    /// Replace the trigger at `key` with `trigger`
    ///
    /// Returns the new trigger's first fire time, or `None` if no trigger
    /// exists at `key`.
    async fn reschedule_job(
        &self,
        key: &Key,
        trigger: EngineTrigger,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Remove a trigger; returns whether it existed
    async fn unschedule_job(&self, key: &Key) -> Result<bool>;

    /// Remove several triggers; returns whether all of them existed
    async fn unschedule_jobs(&self, keys: &[Key]) -> Result<bool>;

    /// Remove a job and its triggers; returns whether it existed
    async fn delete_job(&self, key: &Key) -> Result<bool>;

    /// Remove several jobs; returns whether all of them existed
    async fn delete_jobs(&self, keys: &[Key]) -> Result<bool>;

    async fn get_job(&self, key: &Key) -> Result<Option<EngineJob>>;

    /// Keys of stored jobs whose group matches
    async fn get_job_keys(&self, matcher: &GroupMatcher) -> Result<Vec<Key>>;

    async fn pause_job(&self, key: &Key) -> Result<()>;

    async fn pause_jobs(&self, matcher: &GroupMatcher) -> Result<()>;

    async fn resume_job(&self, key: &Key) -> Result<()>;

    async fn resume_jobs(&self, matcher: &GroupMatcher) -> Result<()>;

    async fn pause_trigger(&self, key: &Key) -> Result<()>;

    async fn pause_triggers(&self, matcher: &GroupMatcher) -> Result<()>;

    async fn resume_trigger(&self, key: &Key) -> Result<()>;

    async fn resume_triggers(&self, matcher: &GroupMatcher) -> Result<()>;

    async fn pause_all(&self) -> Result<()>;

    async fn resume_all(&self) -> Result<()>;

    /// Fire a stored job now, with optional firing data
    async fn trigger_job(&self, key: &Key, data: Option<JobData>) -> Result<()>;

    async fn get_trigger(&self, key: &Key) -> Result<Option<EngineTrigger>>;

    /// Triggers that fire the given job
    async fn get_triggers_of_job(&self, job_key: &Key) -> Result<Vec<EngineTrigger>>;

    /// Keys of stored triggers whose group matches
    async fn get_trigger_keys(&self, matcher: &GroupMatcher) -> Result<Vec<Key>>;

    /// `TriggerState::None` for unknown triggers
    async fn get_trigger_state(&self, key: &Key) -> Result<TriggerState>;

    async fn check_job_exists(&self, key: &Key) -> Result<bool>;

    async fn check_trigger_exists(&self, key: &Key) -> Result<bool>;

    /// Store a calendar, optionally re-evaluating the triggers that reference it
    async fn add_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()>;

    /// Remove a calendar; returns whether it existed
    async fn delete_calendar(&self, name: &str) -> Result<bool>;

    async fn get_calendar(&self, name: &str) -> Result<Option<Calendar>>;

    async fn get_calendar_names(&self) -> Result<Vec<String>>;

    /// Register a listener for engine notifications
    fn add_listener(&self, listener: Arc<dyn SchedulerListener>);

    /// Identifier of this engine instance
    fn instance_id(&self) -> &str;

    /// Engine name (e.g., "memory")
    fn name(&self) -> &str;
}
