//! Fluent builders for `JobSpec` and `TriggerSpec`
//!
//! Builder methods take the builder by value and hand it back, so a spec is
//! described in one expression and `build()` consumes the builder:
//!
//! ```rust
//! use a3s_schedule::{JobSpecBuilder, TriggerSpecBuilder, MisfirePolicy};
//!
//! let trigger = TriggerSpecBuilder::cron("0 0 12 * * ?")
//!     .with_identity("noon", "reports")
//!     .with_misfire_policy(MisfirePolicy::FireOnceNow)
//!     .build();
//!
//! let job = JobSpecBuilder::for_handler("report")
//!     .with_identity("daily-report", "reports")
//!     .using_data("format", "pdf")
//!     .with_trigger(trigger)
//!     .build();
//!
//! assert_eq!(job.triggers.len(), 1);
//! ```

use crate::key::Key;
use crate::types::{
    JobData, JobSpec, MisfirePolicy, TriggerSpec, TriggerType, REPEAT_INDEFINITELY,
};
use chrono::{DateTime, Utc};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Merge a replacement data bag with the entries accumulated so far
///
/// Accumulated entries are copied into `replacement`, winning on collision.
fn merge_data(accumulated: JobData, mut replacement: JobData) -> JobData {
    for (key, value) in accumulated {
        replacement.insert(key, value);
    }
    replacement
}

fn into_data(data: JobData) -> Option<JobData> {
    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Builder for [`JobSpec`]
#[derive(Debug, Default)]
pub struct JobSpecBuilder {
    key: Option<Key>,
    description: Option<String>,
    handler_type: Option<String>,
    data: JobData,
    durable: Option<bool>,
    recoverable: bool,
    triggers: Vec<TriggerSpec>,
}

impl JobSpecBuilder {
    /// Start an empty job description
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job description executed by the given handler type
    pub fn for_handler(handler_type: impl Into<String>) -> Self {
        Self::new().with_handler(handler_type)
    }

    /// Build the spec, generating a unique ungrouped key if none was set
    pub fn build(self) -> JobSpec {
        JobSpec {
            key: self.key.unwrap_or_else(Key::unique),
            description: self.description,
            handler_type: self.handler_type.unwrap_or_default(),
            data: into_data(self.data),
            durable: self.durable.unwrap_or(true),
            recoverable: self.recoverable,
            triggers: self.triggers,
        }
    }

    /// Set the job identity
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the job identity from a name and group
    pub fn with_identity(self, name: impl Into<String>, group: impl Into<String>) -> Self {
        self.with_key(Key::new(name, group))
    }

    /// Set the job identity from a name, without a group
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_key(Key::named(name))
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the handler type that executes the job
    pub fn with_handler(mut self, handler_type: impl Into<String>) -> Self {
        self.handler_type = Some(handler_type.into());
        self
    }

    /// Keep (or drop) the job when no trigger references it
    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Ask the engine to re-fire the job after a crash mid-execution
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Add a trigger, replacing an earlier one with the same key
    pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
        match self.triggers.iter_mut().find(|t| t.key == trigger.key) {
            Some(existing) => *existing = trigger,
            None => self.triggers.push(trigger),
        }
        self
    }

    /// Replace the trigger set
    ///
    /// Triggers added earlier through `with_trigger` are kept unless the new
    /// set already holds a trigger with the same key.
    pub fn set_triggers(self, triggers: Vec<TriggerSpec>) -> Self {
        let accumulated = self.triggers;
        let mut builder = Self {
            triggers: Vec::new(),
            ..self
        };
        for trigger in triggers {
            builder = builder.with_trigger(trigger);
        }
        for trigger in accumulated {
            if !builder.triggers.iter().any(|t| t.key == trigger.key) {
                builder.triggers.push(trigger);
            }
        }
        builder
    }

    /// Add a single data entry
    pub fn using_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Replace the data bag, keeping entries added earlier through `using_data`
    pub fn set_data(mut self, data: JobData) -> Self {
        self.data = merge_data(std::mem::take(&mut self.data), data);
        self
    }
}

impl JobSpec {
    /// Start a [`JobSpecBuilder`]
    pub fn builder() -> JobSpecBuilder {
        JobSpecBuilder::new()
    }
}

/// Builder for [`TriggerSpec`]
#[derive(Debug, Default)]
pub struct TriggerSpecBuilder {
    trigger_type: TriggerType,
    key: Option<Key>,
    job_key: Option<Key>,
    original_key: Option<Key>,
    description: Option<String>,
    data: JobData,
    calendar_name: Option<String>,
    start_at: Option<DateTime<Utc>>,
    start_now: bool,
    end_at: Option<DateTime<Utc>>,
    repeat_count: i32,
    repeat_interval_ms: i64,
    cron_expression: Option<String>,
    misfire_policy: MisfirePolicy,
}

impl TriggerSpecBuilder {
    /// Start an interval trigger description
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cron trigger description
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::new().with_cron_expression(expression)
    }

    /// Build the spec, generating a unique ungrouped key if none was set
    pub fn build(self) -> TriggerSpec {
        TriggerSpec {
            trigger_type: self.trigger_type,
            key: self.key.unwrap_or_else(Key::unique),
            job_key: self.job_key,
            original_key: self.original_key,
            description: self.description,
            data: into_data(self.data),
            calendar_name: self.calendar_name,
            start_at: self.start_at,
            start_now: self.start_now,
            end_at: self.end_at,
            repeat_count: self.repeat_count,
            repeat_interval_ms: self.repeat_interval_ms,
            cron_expression: self.cron_expression,
            misfire_policy: self.misfire_policy,
        }
    }

    /// Set the trigger type
    pub fn of_type(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = trigger_type;
        self
    }

    /// Set the trigger identity
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the trigger identity from a name and group
    pub fn with_identity(self, name: impl Into<String>, group: impl Into<String>) -> Self {
        self.with_key(Key::new(name, group))
    }

    /// Set the trigger identity from a name, without a group
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_key(Key::named(name))
    }

    /// Set the job this trigger fires
    pub fn for_job(mut self, job_key: Key) -> Self {
        self.job_key = Some(job_key);
        self
    }

    /// Identify the registered trigger an update replaces
    pub fn with_original_identity(mut self, original_key: Key) -> Self {
        self.original_key = Some(original_key);
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Exclude fire times through a calendar registered with the engine
    pub fn with_calendar_name(mut self, calendar_name: impl Into<String>) -> Self {
        self.calendar_name = Some(calendar_name.into());
        self
    }

    /// Number of repeats after the first fire
    pub fn with_repeat_count(mut self, repeat_count: i32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    /// Repeat until the end time, or forever
    pub fn repeat_forever(mut self) -> Self {
        self.repeat_count = REPEAT_INDEFINITELY;
        self
    }

    /// Interval between fires in milliseconds
    pub fn with_interval_in_millis(mut self, millis: i64) -> Self {
        self.repeat_interval_ms = millis;
        self
    }

    /// Interval between fires in seconds; saturates at `i64::MAX` milliseconds
    pub fn with_interval_in_seconds(self, seconds: i64) -> Self {
        self.with_interval_in_millis(seconds.saturating_mul(MILLIS_PER_SECOND))
    }

    /// Interval between fires in minutes
    pub fn with_interval_in_minutes(self, minutes: i64) -> Self {
        self.with_interval_in_millis(minutes.saturating_mul(MILLIS_PER_MINUTE))
    }

    /// Interval between fires in hours
    pub fn with_interval_in_hours(self, hours: i64) -> Self {
        self.with_interval_in_millis(hours.saturating_mul(MILLIS_PER_HOUR))
    }

    /// Fire on a cron expression; switches the trigger type to cron
    pub fn with_cron_expression(mut self, expression: impl Into<String>) -> Self {
        self.cron_expression = Some(expression.into());
        self.trigger_type = TriggerType::Cron;
        self
    }

    /// Set the misfire policy
    pub fn with_misfire_policy(mut self, policy: MisfirePolicy) -> Self {
        self.misfire_policy = policy;
        self
    }

    /// Earliest fire time
    pub fn start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Start at registration time
    pub fn start_now(mut self, start_now: bool) -> Self {
        self.start_now = start_now;
        self
    }

    /// Latest fire time
    pub fn end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    /// Add a single data entry
    pub fn using_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Replace the data bag, keeping entries added earlier through `using_data`
    pub fn set_data(mut self, data: JobData) -> Self {
        self.data = merge_data(std::mem::take(&mut self.data), data);
        self
    }
}

impl TriggerSpec {
    /// Start a [`TriggerSpecBuilder`]
    pub fn builder() -> TriggerSpecBuilder {
        TriggerSpecBuilder::new()
    }
}
