//! Declarative job and trigger descriptions
//!
//! `JobSpec` and `TriggerSpec` describe *what* should run and *when*. They are
//! plain values: built once (usually by the builders), consumed by the
//! `SchedulerFacade`, and discarded. All types use camelCase JSON so schedules
//! can be declared in configuration files.

use crate::key::Key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Associated data passed to a job when it fires
pub type JobData = serde_json::Map<String, serde_json::Value>;

/// Repeat count meaning "repeat until the end time, forever if none"
pub const REPEAT_INDEFINITELY: i32 = -1;

/// How a trigger computes its fire times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerType {
    /// Fixed interval with an optional repeat count
    #[default]
    Interval,
    /// Calendar expression (seconds-resolution cron)
    Cron,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::Interval => write!(f, "interval"),
            TriggerType::Cron => write!(f, "cron"),
        }
    }
}

/// What the engine does when a fire time was missed
///
/// Policies are scoped by trigger type; see [`MisfirePolicy::applies_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MisfirePolicy {
    /// Let the engine pick based on the trigger's configuration
    #[default]
    SmartPolicy,
    /// Fire every missed occurrence as soon as possible, then resume the schedule
    IgnoreMisfires,
    /// Interval: fire immediately (one-shot triggers)
    FireNow,
    /// Interval: wait for the next scheduled time, keep the original repeat count
    RescheduleNextWithExistingCount,
    /// Interval: wait for the next scheduled time, drop the missed repeats
    RescheduleNextWithRemainingCount,
    /// Interval: restart now, keep the original repeat count
    RescheduleNowWithExistingCount,
    /// Interval: restart now, drop the missed repeats
    RescheduleNowWithRemainingCount,
    /// Cron: fire once now, then follow the expression
    FireOnceNow,
    /// Cron: skip missed fires and wait for the next match
    DoNothing,
}

impl MisfirePolicy {
    /// Whether this policy is meaningful for the given trigger type
    pub fn applies_to(&self, trigger_type: TriggerType) -> bool {
        match self {
            MisfirePolicy::SmartPolicy | MisfirePolicy::IgnoreMisfires => true,
            MisfirePolicy::FireNow
            | MisfirePolicy::RescheduleNextWithExistingCount
            | MisfirePolicy::RescheduleNextWithRemainingCount
            | MisfirePolicy::RescheduleNowWithExistingCount
            | MisfirePolicy::RescheduleNowWithRemainingCount => {
                trigger_type == TriggerType::Interval
            }
            MisfirePolicy::FireOnceNow | MisfirePolicy::DoNothing => {
                trigger_type == TriggerType::Cron
            }
        }
    }

    /// Decode a numeric misfire instruction
    ///
    /// Codes overlap between trigger types (1 is fire-now for interval
    /// triggers and fire-once-now for cron triggers), so the type is needed
    /// to decode them. Returns `None` for unknown codes.
    pub fn from_instruction(trigger_type: TriggerType, code: i32) -> Option<Self> {
        match (trigger_type, code) {
            (_, 0) => Some(MisfirePolicy::SmartPolicy),
            (_, -1) => Some(MisfirePolicy::IgnoreMisfires),
            (TriggerType::Interval, 1) => Some(MisfirePolicy::FireNow),
            (TriggerType::Interval, 2) => Some(MisfirePolicy::RescheduleNowWithExistingCount),
            (TriggerType::Interval, 3) => Some(MisfirePolicy::RescheduleNowWithRemainingCount),
            (TriggerType::Interval, 4) => Some(MisfirePolicy::RescheduleNextWithRemainingCount),
            (TriggerType::Interval, 5) => Some(MisfirePolicy::RescheduleNextWithExistingCount),
            (TriggerType::Cron, 1) => Some(MisfirePolicy::FireOnceNow),
            (TriggerType::Cron, 2) => Some(MisfirePolicy::DoNothing),
            _ => None,
        }
    }
}

/// Current state of a trigger inside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerState {
    /// Scheduled and eligible to fire
    Normal,
    /// Paused directly or through its job/group
    Paused,
    /// No further fire times
    Complete,
    /// The engine failed to fire it
    Error,
    /// Its job is executing and disallows concurrent runs
    Blocked,
    /// No such trigger
    None,
}

impl std::fmt::Display for TriggerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerState::Normal => "normal",
            TriggerState::Paused => "paused",
            TriggerState::Complete => "complete",
            TriggerState::Error => "error",
            TriggerState::Blocked => "blocked",
            TriggerState::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// Declarative description of when a job fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    /// Interval or cron
    #[serde(default, rename = "type")]
    pub trigger_type: TriggerType,

    /// Trigger identity
    pub key: Key,

    /// Job this trigger fires; filled from the owning job when registered with one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_key: Option<Key>,

    /// Identity of the trigger being replaced (updates only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_key: Option<Key>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Data handed to the job on each firing of this trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JobData>,

    /// Exclusion calendar registered with the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_name: Option<String>,

    /// First moment the trigger may fire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,

    /// Start at registration time (overrides `start_at`)
    #[serde(default)]
    pub start_now: bool,

    /// Last moment the trigger may fire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,

    /// Interval triggers: number of repeats after the first fire, or `REPEAT_INDEFINITELY`
    #[serde(default)]
    pub repeat_count: i32,

    /// Interval triggers: milliseconds between fires
    #[serde(default)]
    pub repeat_interval_ms: i64,

    /// Cron triggers: the expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,

    /// Misfire handling
    #[serde(default)]
    pub misfire_policy: MisfirePolicy,
}

impl TriggerSpec {
    /// A bare interval trigger with the given identity and default schedule
    pub fn new(key: Key) -> Self {
        Self {
            trigger_type: TriggerType::Interval,
            key,
            job_key: None,
            original_key: None,
            description: None,
            data: None,
            calendar_name: None,
            start_at: None,
            start_now: false,
            end_at: None,
            repeat_count: 0,
            repeat_interval_ms: 0,
            cron_expression: None,
            misfire_policy: MisfirePolicy::SmartPolicy,
        }
    }

    /// Associated data, if any entries are present
    pub fn non_empty_data(&self) -> Option<&JobData> {
        self.data.as_ref().filter(|d| !d.is_empty())
    }
}

impl AsRef<Key> for TriggerSpec {
    fn as_ref(&self) -> &Key {
        &self.key
    }
}

fn default_durable() -> bool {
    true
}

/// Declarative description of a unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Job identity
    pub key: Key,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Identifier of the registered handler that executes this job
    pub handler_type: String,

    /// Data handed to the handler on every firing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JobData>,

    /// Keep the job stored when no trigger references it
    #[serde(default = "default_durable")]
    pub durable: bool,

    /// Re-fire the job if the engine dies while it is executing
    #[serde(default)]
    pub recoverable: bool,

    /// Triggers registered together with the job (unique by key)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<TriggerSpec>,
}

impl JobSpec {
    /// A durable job with no data and no triggers
    pub fn new(key: Key, handler_type: impl Into<String>) -> Self {
        Self {
            key,
            description: None,
            handler_type: handler_type.into(),
            data: None,
            durable: true,
            recoverable: false,
            triggers: Vec::new(),
        }
    }

    /// Add a trigger, replacing any trigger with the same key
    pub fn add_trigger(&mut self, trigger: TriggerSpec) {
        match self.triggers.iter_mut().find(|t| t.key == trigger.key) {
            Some(existing) => *existing = trigger,
            None => self.triggers.push(trigger),
        }
    }

    /// Find a trigger by key
    pub fn trigger(&self, key: &Key) -> Option<&TriggerSpec> {
        self.triggers.iter().find(|t| &t.key == key)
    }
}

impl AsRef<Key> for JobSpec {
    fn as_ref(&self) -> &Key {
        &self.key
    }
}
