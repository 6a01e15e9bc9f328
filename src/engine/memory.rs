//! In-memory scheduler engine
//!
//! Stores jobs, triggers, calendars and trigger states in process memory.
//! Suitable for tests, development and single-process deployments where
//! schedules are declared at startup. There is no persistence and no
//! wall-clock firing loop: jobs run when fired through `trigger_job`.
//!
//! Immediate firings are executed by the job's handler (resolved from the
//! engine's `HandlerRegistry`) on spawned tokio tasks, at most
//! `core_pool_size` at a time. Each execution is reported as a `JobOutcome`
//! on a broadcast channel.

use super::{
    Calendar, EngineJob, EngineTrigger, FiredJob, JobOutcome, SchedulerEngine, SchedulerEvent,
    SchedulerListener,
};
use crate::config::SchedulerConfig;
use crate::error::{Result, ScheduleError};
use crate::handler::{HandlerRegistry, JobContext};
use crate::key::{GroupMatcher, Key};
use crate::types::{JobData, TriggerState};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock, Semaphore};

/// Number of immediate firings kept for inspection
const MAX_FIRED_HISTORY: usize = 1_000;

/// Number of firings queued while the engine is not started
const MAX_PENDING_FIRINGS: usize = 1_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EngineStatus {
    #[default]
    Standby,
    Started,
    Shutdown,
}

#[derive(Debug, Clone)]
struct TriggerEntry {
    trigger: EngineTrigger,
    state: TriggerState,
    next_fire_time: Option<DateTime<Utc>>,
}

/// A firing requested while the engine was not started
struct PendingFiring {
    job: EngineJob,
    data: Option<JobData>,
    fired_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    jobs: HashMap<Key, EngineJob>,
    triggers: HashMap<Key, TriggerEntry>,
    calendars: HashMap<String, Calendar>,
    paused_trigger_groups: HashSet<Option<String>>,
    paused_job_groups: HashSet<Option<String>>,
    fired: Vec<FiredJob>,
    pending: Vec<PendingFiring>,
    status: EngineStatus,
}

impl Store {
    fn ensure_open(&self) -> Result<()> {
        if self.status == EngineStatus::Shutdown {
            return Err(ScheduleError::Engine(
                "The scheduler has been shutdown".to_string(),
            ));
        }
        Ok(())
    }

    fn check_job(&self, job: &EngineJob, replace: bool) -> Result<()> {
        job.key.validate("job key")?;
        if !replace && self.jobs.contains_key(&job.key) {
            return Err(ScheduleError::Engine(format!(
                "Unable to store job {}: a job with this key already exists",
                job.key
            )));
        }
        Ok(())
    }

    /// Check a trigger against the store, returning its first fire time
    ///
    /// `co_registered` names a job stored in the same call.
    fn check_trigger(
        &self,
        trigger: &EngineTrigger,
        replace: bool,
        co_registered: Option<&Key>,
    ) -> Result<DateTime<Utc>> {
        trigger.key.validate("trigger key")?;
        if !self.jobs.contains_key(&trigger.job_key) && co_registered != Some(&trigger.job_key) {
            return Err(ScheduleError::Engine(format!(
                "The job ({}) referenced by the trigger does not exist",
                trigger.job_key
            )));
        }

        let calendar = match &trigger.calendar_name {
            Some(name) => Some(self.calendars.get(name).ok_or_else(|| {
                ScheduleError::Engine(format!("Calendar not found: {}", name))
            })?),
            None => None,
        };

        if let Some(existing) = self.triggers.get(&trigger.key) {
            if !replace {
                return Err(ScheduleError::Engine(format!(
                    "Unable to store trigger {}: a trigger with this key already exists",
                    trigger.key
                )));
            }
            if existing.trigger.job_key != trigger.job_key {
                return Err(ScheduleError::Engine(format!(
                    "New trigger {} is not related to the same job as the old trigger",
                    trigger.key
                )));
            }
        }

        trigger.first_fire_time(calendar).ok_or_else(|| {
            ScheduleError::Engine(format!(
                "Based on configured schedule, the given trigger '{}' will never fire",
                trigger.key
            ))
        })
    }

    fn insert_trigger(&mut self, trigger: EngineTrigger, next_fire_time: DateTime<Utc>) {
        let state = if self.paused_trigger_groups.contains(&trigger.key.group)
            || self.paused_job_groups.contains(&trigger.job_key.group)
        {
            TriggerState::Paused
        } else {
            TriggerState::Normal
        };
        self.triggers.insert(
            trigger.key.clone(),
            TriggerEntry {
                trigger,
                state,
                next_fire_time: Some(next_fire_time),
            },
        );
    }

    /// Remove a trigger, dropping its job if that leaves a non-durable job orphaned
    fn remove_trigger(&mut self, key: &Key) -> Option<Vec<SchedulerEvent>> {
        let entry = self.triggers.remove(key)?;
        let mut events = vec![SchedulerEvent::JobUnscheduled {
            trigger_key: key.clone(),
        }];

        let job_key = &entry.trigger.job_key;
        let orphaned = self
            .jobs
            .get(job_key)
            .is_some_and(|job| !job.durable)
            && !self.triggers.values().any(|t| &t.trigger.job_key == job_key);
        if orphaned {
            self.jobs.remove(job_key);
            events.push(SchedulerEvent::JobDeleted {
                job_key: job_key.clone(),
            });
        }
        Some(events)
    }

    fn remove_job(&mut self, key: &Key) -> Option<Vec<SchedulerEvent>> {
        if !self.jobs.contains_key(key) {
            return None;
        }
        let trigger_keys: Vec<Key> = self
            .triggers
            .values()
            .filter(|t| &t.trigger.job_key == key)
            .map(|t| t.trigger.key.clone())
            .collect();

        let mut events = Vec::with_capacity(trigger_keys.len() + 1);
        for trigger_key in trigger_keys {
            self.triggers.remove(&trigger_key);
            events.push(SchedulerEvent::JobUnscheduled { trigger_key });
        }
        self.jobs.remove(key);
        events.push(SchedulerEvent::JobDeleted {
            job_key: key.clone(),
        });
        Some(events)
    }

    fn set_state_where(
        &mut self,
        from: &[TriggerState],
        to: TriggerState,
        mut select: impl FnMut(&EngineTrigger) -> bool,
    ) {
        for entry in self.triggers.values_mut() {
            if from.contains(&entry.state) && select(&entry.trigger) {
                entry.state = to;
            }
        }
    }

    fn pause_where(&mut self, select: impl FnMut(&EngineTrigger) -> bool) {
        self.set_state_where(
            &[TriggerState::Normal, TriggerState::Blocked],
            TriggerState::Paused,
            select,
        );
    }

    fn resume_where(&mut self, select: impl FnMut(&EngineTrigger) -> bool) {
        self.set_state_where(&[TriggerState::Paused], TriggerState::Normal, select);
    }

    /// Groups to remember as paused for a matcher
    ///
    /// An exact matcher is remembered even if no key uses the group yet;
    /// other matchers expand to the matching groups currently in use.
    fn matched_groups<'a>(
        matcher: &GroupMatcher,
        in_use: impl Iterator<Item = &'a Option<String>>,
    ) -> Vec<Option<String>> {
        match matcher {
            GroupMatcher::Equals(group) => vec![group.clone()],
            _ => in_use
                .filter(|g| matcher.matches_group(g.as_deref()))
                .cloned()
                .collect(),
        }
    }

    fn record_fired(&mut self, fired: FiredJob) {
        if self.fired.len() >= MAX_FIRED_HISTORY {
            self.fired.remove(0);
        }
        self.fired.push(fired);
    }
}

/// In-memory `SchedulerEngine`
pub struct MemoryEngine {
    instance_id: String,
    config: SchedulerConfig,
    store: RwLock<Store>,
    listeners: std::sync::RwLock<Vec<Arc<dyn SchedulerListener>>>,
    registry: Option<Arc<HandlerRegistry>>,
    workers: Arc<Semaphore>,
    outcome_tx: broadcast::Sender<JobOutcome>,
}

impl MemoryEngine {
    /// Create an engine in standby
    pub fn new(config: SchedulerConfig) -> Self {
        let instance_id = format!(
            "{}-{}",
            config.scheduler.scheduler_name,
            uuid::Uuid::new_v4()
        );
        let workers = Arc::new(Semaphore::new(config.thread_pool.core_pool_size.max(1)));
        let (outcome_tx, _) = broadcast::channel(config.thread_pool.outcome_capacity.max(1));
        Self {
            instance_id,
            config,
            store: RwLock::new(Store::default()),
            listeners: std::sync::RwLock::new(Vec::new()),
            registry: None,
            workers,
            outcome_tx,
        }
    }

    /// Execute fired jobs through the handlers of `registry`
    ///
    /// Jobs stored afterwards must name a registered handler type.
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build an engine from configuration and start it if `auto_startup` is set
    ///
    /// A non-zero `startup_delay_secs` starts the engine on a background task
    /// after the delay.
    pub async fn launch(
        config: SchedulerConfig,
        registry: Option<Arc<HandlerRegistry>>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let auto_startup = config.scheduler.auto_startup;
        let delay = config.scheduler.startup_delay_secs;

        let mut engine = Self::new(config);
        if let Some(registry) = registry {
            engine = engine.with_registry(registry);
        }
        let engine = Arc::new(engine);

        if auto_startup {
            if delay == 0 {
                engine.start().await?;
            } else {
                let delayed = Arc::clone(&engine);
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                    if let Err(e) = delayed.start().await {
                        tracing::error!(error = %e, "Delayed scheduler start failed");
                    }
                });
            }
        }

        Ok(engine)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Subscribe to job execution outcomes
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<JobOutcome> {
        self.outcome_tx.subscribe()
    }

    /// Start executing fired jobs, including firings requested during standby
    ///
    /// A queued firing that cannot be dispatched does not stop the others;
    /// it is reported as a failed `JobOutcome`.
    pub async fn start(&self) -> Result<()> {
        self.store.read().await.ensure_open()?;
        self.notify(vec![SchedulerEvent::SchedulerStarting]);
        let pending = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.status = EngineStatus::Started;
            std::mem::take(&mut store.pending)
        };
        tracing::info!(instance = %self.instance_id, "Scheduler started");
        self.notify(vec![SchedulerEvent::SchedulerStarted]);

        for firing in pending {
            let job_key = firing.job.key.clone();
            let handler_type = firing.job.handler_type.clone();
            let fired_at = firing.fired_at;
            if let Err(e) = self.dispatch(firing) {
                tracing::warn!(
                    job = %job_key,
                    error = %e,
                    "Queued firing could not be dispatched"
                );
                let _ = self.outcome_tx.send(JobOutcome {
                    job_key,
                    handler_type,
                    fired_at,
                    finished_at: Utc::now(),
                    error: Some(e.to_string()),
                });
            }
        }
        Ok(())
    }

    /// Stop executing fired jobs; firings are queued until the next `start`
    pub async fn standby(&self) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.status = EngineStatus::Standby;
        }
        tracing::info!(instance = %self.instance_id, "Scheduler in standby");
        self.notify(vec![SchedulerEvent::SchedulerInStandby]);
        Ok(())
    }

    /// Shut the engine down; every later mutation fails
    pub async fn shutdown(&self) -> Result<()> {
        if self.is_shutdown().await {
            return Ok(());
        }
        self.notify(vec![SchedulerEvent::SchedulerShuttingDown]);
        {
            let mut store = self.store.write().await;
            store.status = EngineStatus::Shutdown;
            store.pending.clear();
        }
        self.workers.close();
        tracing::info!(instance = %self.instance_id, "Scheduler shut down");
        self.notify(vec![SchedulerEvent::SchedulerShutdown]);
        Ok(())
    }

    /// Remove every job, trigger and calendar
    pub async fn clear(&self) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.jobs.clear();
            store.triggers.clear();
            store.calendars.clear();
            store.paused_trigger_groups.clear();
            store.paused_job_groups.clear();
            store.pending.clear();
        }
        tracing::info!(instance = %self.instance_id, "Scheduling data cleared");
        self.notify(vec![SchedulerEvent::SchedulingDataCleared]);
        Ok(())
    }

    pub async fn is_started(&self) -> bool {
        self.store.read().await.status == EngineStatus::Started
    }

    pub async fn is_in_standby(&self) -> bool {
        self.store.read().await.status == EngineStatus::Standby
    }

    pub async fn is_shutdown(&self) -> bool {
        self.store.read().await.status == EngineStatus::Shutdown
    }

    /// Recent immediate firings, oldest first
    pub async fn fired_jobs(&self) -> Vec<FiredJob> {
        self.store.read().await.fired.clone()
    }

    /// Next scheduled fire time of a trigger
    pub async fn next_fire_time(&self, key: &Key) -> Option<DateTime<Utc>> {
        self.store
            .read()
            .await
            .triggers
            .get(key)
            .and_then(|e| e.next_fire_time)
    }

    fn resolve_handler(&self, job: &EngineJob) -> Result<()> {
        if let Some(registry) = &self.registry {
            registry.resolve(&job.handler_type)?;
        }
        Ok(())
    }

    /// Run a firing on the worker pool
    fn dispatch(&self, firing: PendingFiring) -> Result<()> {
        let Some(registry) = &self.registry else {
            tracing::debug!(job = %firing.job.key, "No handler registry, firing recorded only");
            return Ok(());
        };
        let handler = registry.resolve(&firing.job.handler_type)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ScheduleError::Engine(format!("No runtime available to execute job: {}", e))
        })?;

        let workers = Arc::clone(&self.workers);
        let outcome_tx = self.outcome_tx.clone();
        runtime.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                tracing::debug!(job = %firing.job.key, "Worker pool closed, firing dropped");
                return;
            };
            let ctx = JobContext::for_job(&firing.job, None, firing.data.as_ref(), firing.fired_at);
            let error = match AssertUnwindSafe(handler.execute(&ctx)).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("handler panicked".to_string()),
            };
            match &error {
                Some(reason) => tracing::warn!(
                    job = %firing.job.key,
                    handler_type = %firing.job.handler_type,
                    error = %reason,
                    "Job execution failed"
                ),
                None => tracing::debug!(job = %firing.job.key, "Job executed"),
            }
            // No receivers is fine; outcomes are best-effort broadcast
            let _ = outcome_tx.send(JobOutcome {
                job_key: firing.job.key.clone(),
                handler_type: firing.job.handler_type.clone(),
                fired_at: firing.fired_at,
                finished_at: Utc::now(),
                error,
            });
        });
        Ok(())
    }

    /// Deliver events to every listener, isolating listener panics
    fn notify(&self, events: Vec<SchedulerEvent>) {
        if events.is_empty() {
            return;
        }
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for event in &events {
            for listener in &listeners {
                let delivered =
                    std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
                if delivered.is_err() {
                    tracing::error!(event = event.name(), "Scheduler listener panicked");
                }
            }
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("instance_id", &self.instance_id)
            .field("has_registry", &self.registry.is_some())
            .finish()
    }
}

#[async_trait]
impl SchedulerEngine for MemoryEngine {
    async fn add_job(&self, job: EngineJob, replace: bool) -> Result<()> {
        if !job.durable {
            return Err(ScheduleError::Engine(format!(
                "Job {} added with no trigger must be durable",
                job.key
            )));
        }
        self.resolve_handler(&job)?;
        let job_key = job.key.clone();
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.check_job(&job, replace)?;
            store.jobs.insert(job.key.clone(), job);
        }
        tracing::debug!(job = %job_key, "Job stored");
        self.notify(vec![SchedulerEvent::JobAdded { job_key }]);
        Ok(())
    }

    async fn schedule_job_with_triggers(
        &self,
        job: EngineJob,
        triggers: Vec<EngineTrigger>,
        replace: bool,
    ) -> Result<()> {
        if triggers.is_empty() && !job.durable {
            return Err(ScheduleError::Engine(format!(
                "Job {} added with no trigger must be durable",
                job.key
            )));
        }
        self.resolve_handler(&job)?;

        let mut events = vec![SchedulerEvent::JobAdded {
            job_key: job.key.clone(),
        }];
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.check_job(&job, replace)?;

            let mut first_fires = Vec::with_capacity(triggers.len());
            for trigger in &triggers {
                if trigger.job_key != job.key {
                    return Err(ScheduleError::Engine(format!(
                        "Trigger {} does not reference job {}",
                        trigger.key, job.key
                    )));
                }
                first_fires.push(store.check_trigger(trigger, replace, Some(&job.key))?);
            }

            store.jobs.insert(job.key.clone(), job);
            for (trigger, first_fire) in triggers.into_iter().zip(first_fires) {
                events.push(SchedulerEvent::JobScheduled {
                    trigger_key: trigger.key.clone(),
                    job_key: trigger.job_key.clone(),
                });
                store.insert_trigger(trigger, first_fire);
            }
        }
        self.notify(events);
        Ok(())
    }

    async fn schedule_trigger(&self, trigger: EngineTrigger) -> Result<DateTime<Utc>> {
        let event = SchedulerEvent::JobScheduled {
            trigger_key: trigger.key.clone(),
            job_key: trigger.job_key.clone(),
        };
        let first_fire = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let first_fire = store.check_trigger(&trigger, false, None)?;
            store.insert_trigger(trigger, first_fire);
            first_fire
        };
        self.notify(vec![event]);
        Ok(first_fire)
    }

    async fn reschedule_job(
        &self,
        key: &Key,
        trigger: EngineTrigger,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut events = Vec::new();
        let first_fire = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let Some(old) = store.triggers.get(key) else {
                return Ok(None);
            };
            if old.trigger.job_key != trigger.job_key {
                return Err(ScheduleError::Engine(format!(
                    "New trigger {} is not related to the same job as the old trigger {}",
                    trigger.key, key
                )));
            }
            let renamed = &trigger.key != key;
            let first_fire = store.check_trigger(&trigger, !renamed, None)?;

            store.triggers.remove(key);
            events.push(SchedulerEvent::JobUnscheduled {
                trigger_key: key.clone(),
            });
            events.push(SchedulerEvent::JobScheduled {
                trigger_key: trigger.key.clone(),
                job_key: trigger.job_key.clone(),
            });
            store.insert_trigger(trigger, first_fire);
            first_fire
        };
        self.notify(events);
        Ok(Some(first_fire))
    }

    async fn unschedule_job(&self, key: &Key) -> Result<bool> {
        let events = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.remove_trigger(key)
        };
        let found = events.is_some();
        self.notify(events.unwrap_or_default());
        Ok(found)
    }

    async fn unschedule_jobs(&self, keys: &[Key]) -> Result<bool> {
        let mut all_found = true;
        let mut events = Vec::new();
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            for key in keys {
                match store.remove_trigger(key) {
                    Some(removed) => events.extend(removed),
                    None => all_found = false,
                }
            }
        }
        self.notify(events);
        Ok(all_found)
    }

    async fn delete_job(&self, key: &Key) -> Result<bool> {
        let events = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.remove_job(key)
        };
        let found = events.is_some();
        self.notify(events.unwrap_or_default());
        Ok(found)
    }

    async fn delete_jobs(&self, keys: &[Key]) -> Result<bool> {
        let mut all_found = true;
        let mut events = Vec::new();
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            for key in keys {
                match store.remove_job(key) {
                    Some(removed) => events.extend(removed),
                    None => all_found = false,
                }
            }
        }
        self.notify(events);
        Ok(all_found)
    }

    async fn get_job(&self, key: &Key) -> Result<Option<EngineJob>> {
        Ok(self.store.read().await.jobs.get(key).cloned())
    }

    async fn get_job_keys(&self, matcher: &GroupMatcher) -> Result<Vec<Key>> {
        let store = self.store.read().await;
        let mut keys: Vec<Key> = store
            .jobs
            .keys()
            .filter(|k| matcher.matches(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn pause_job(&self, key: &Key) -> Result<()> {
        let found = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let found = store.jobs.contains_key(key);
            store.pause_where(|t| &t.job_key == key);
            found
        };
        if found {
            self.notify(vec![SchedulerEvent::JobPaused {
                job_key: key.clone(),
            }]);
        }
        Ok(())
    }

    async fn pause_jobs(&self, matcher: &GroupMatcher) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let groups = Store::matched_groups(matcher, store.jobs.keys().map(|k| &k.group));
            store.paused_job_groups.extend(groups);
            store.pause_where(|t| matcher.matches(&t.job_key));
        }
        self.notify(vec![SchedulerEvent::JobsPaused {
            matcher: matcher.clone(),
        }]);
        Ok(())
    }

    async fn resume_job(&self, key: &Key) -> Result<()> {
        let found = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let found = store.jobs.contains_key(key);
            store.resume_where(|t| &t.job_key == key);
            found
        };
        if found {
            self.notify(vec![SchedulerEvent::JobResumed {
                job_key: key.clone(),
            }]);
        }
        Ok(())
    }

    async fn resume_jobs(&self, matcher: &GroupMatcher) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store
                .paused_job_groups
                .retain(|g| !matcher.matches_group(g.as_deref()));
            store.resume_where(|t| matcher.matches(&t.job_key));
        }
        self.notify(vec![SchedulerEvent::JobsResumed {
            matcher: matcher.clone(),
        }]);
        Ok(())
    }

    async fn pause_trigger(&self, key: &Key) -> Result<()> {
        let found = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let found = store.triggers.contains_key(key);
            store.pause_where(|t| &t.key == key);
            found
        };
        if found {
            self.notify(vec![SchedulerEvent::TriggerPaused {
                trigger_key: key.clone(),
            }]);
        }
        Ok(())
    }

    async fn pause_triggers(&self, matcher: &GroupMatcher) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let groups =
                Store::matched_groups(matcher, store.triggers.keys().map(|k| &k.group));
            store.paused_trigger_groups.extend(groups);
            store.pause_where(|t| matcher.matches(&t.key));
        }
        self.notify(vec![SchedulerEvent::TriggersPaused {
            matcher: matcher.clone(),
        }]);
        Ok(())
    }

    async fn resume_trigger(&self, key: &Key) -> Result<()> {
        let found = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let found = store.triggers.contains_key(key);
            store.resume_where(|t| &t.key == key);
            found
        };
        if found {
            self.notify(vec![SchedulerEvent::TriggerResumed {
                trigger_key: key.clone(),
            }]);
        }
        Ok(())
    }

    async fn resume_triggers(&self, matcher: &GroupMatcher) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store
                .paused_trigger_groups
                .retain(|g| !matcher.matches_group(g.as_deref()));
            store.resume_where(|t| matcher.matches(&t.key));
        }
        self.notify(vec![SchedulerEvent::TriggersResumed {
            matcher: matcher.clone(),
        }]);
        Ok(())
    }

    async fn pause_all(&self) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let groups: Vec<Option<String>> =
                store.triggers.keys().map(|k| k.group.clone()).collect();
            store.paused_trigger_groups.extend(groups);
            store.pause_where(|_| true);
        }
        tracing::info!(instance = %self.instance_id, "All triggers paused");
        self.notify(vec![SchedulerEvent::TriggersPaused {
            matcher: GroupMatcher::Any,
        }]);
        Ok(())
    }

    async fn resume_all(&self) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            store.paused_trigger_groups.clear();
            store.paused_job_groups.clear();
            store.resume_where(|_| true);
        }
        tracing::info!(instance = %self.instance_id, "All triggers resumed");
        self.notify(vec![SchedulerEvent::TriggersResumed {
            matcher: GroupMatcher::Any,
        }]);
        Ok(())
    }

    async fn trigger_job(&self, key: &Key, data: Option<JobData>) -> Result<()> {
        let fired_at = Utc::now();
        let runnable = {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            let job = store.jobs.get(key).cloned().ok_or_else(|| {
                ScheduleError::Engine(format!(
                    "The job ({}) referenced by the trigger does not exist",
                    key
                ))
            })?;
            let queued = store.pending.len();
            if store.status != EngineStatus::Started && queued >= MAX_PENDING_FIRINGS {
                return Err(ScheduleError::Engine(format!(
                    "Unable to fire job {}: {} firings are already queued until start",
                    key, MAX_PENDING_FIRINGS
                )));
            }
            store.record_fired(FiredJob {
                job_key: key.clone(),
                data: data.clone(),
                fired_at,
            });
            let firing = PendingFiring {
                job,
                data,
                fired_at,
            };
            if store.status == EngineStatus::Started {
                Some(firing)
            } else {
                store.pending.push(firing);
                None
            }
        };

        tracing::debug!(job = %key, "Job fired");
        self.notify(vec![SchedulerEvent::JobFired {
            job_key: key.clone(),
            trigger_key: None,
        }]);
        match runnable {
            Some(firing) => self.dispatch(firing),
            None => Ok(()),
        }
    }

    async fn get_trigger(&self, key: &Key) -> Result<Option<EngineTrigger>> {
        Ok(self
            .store
            .read()
            .await
            .triggers
            .get(key)
            .map(|e| e.trigger.clone()))
    }

    async fn get_triggers_of_job(&self, job_key: &Key) -> Result<Vec<EngineTrigger>> {
        let store = self.store.read().await;
        let mut triggers: Vec<EngineTrigger> = store
            .triggers
            .values()
            .filter(|e| &e.trigger.job_key == job_key)
            .map(|e| e.trigger.clone())
            .collect();
        triggers.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(triggers)
    }

    async fn get_trigger_keys(&self, matcher: &GroupMatcher) -> Result<Vec<Key>> {
        let store = self.store.read().await;
        let mut keys: Vec<Key> = store
            .triggers
            .keys()
            .filter(|k| matcher.matches(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_trigger_state(&self, key: &Key) -> Result<TriggerState> {
        Ok(self
            .store
            .read()
            .await
            .triggers
            .get(key)
            .map_or(TriggerState::None, |e| e.state))
    }

    async fn check_job_exists(&self, key: &Key) -> Result<bool> {
        Ok(self.store.read().await.jobs.contains_key(key))
    }

    async fn check_trigger_exists(&self, key: &Key) -> Result<bool> {
        Ok(self.store.read().await.triggers.contains_key(key))
    }

    async fn add_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ScheduleError::Validation(
                "Calendar name must not be empty".to_string(),
            ));
        }
        let mut events = Vec::new();
        {
            let mut store = self.store.write().await;
            store.ensure_open()?;
            if !replace && store.calendars.contains_key(name) {
                return Err(ScheduleError::Engine(format!(
                    "Calendar '{}' already exists",
                    name
                )));
            }

            if update_triggers {
                let now = Utc::now();
                for entry in store.triggers.values_mut() {
                    if entry.trigger.calendar_name.as_deref() != Some(name) {
                        continue;
                    }
                    let from = now.max(entry.trigger.start_time);
                    entry.next_fire_time = from
                        .checked_sub_signed(Duration::milliseconds(1))
                        .and_then(|after| entry.trigger.fire_time_after(after, Some(&calendar)));
                    if entry.next_fire_time.is_none() {
                        entry.state = TriggerState::Complete;
                        events.push(SchedulerEvent::TriggerFinalized {
                            trigger_key: entry.trigger.key.clone(),
                        });
                    }
                }
            }
            store.calendars.insert(name.to_string(), calendar);
        }
        tracing::debug!(calendar = name, "Calendar stored");
        self.notify(events);
        Ok(())
    }

    async fn delete_calendar(&self, name: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        store.ensure_open()?;
        if store
            .triggers
            .values()
            .any(|e| e.trigger.calendar_name.as_deref() == Some(name))
        {
            return Err(ScheduleError::Engine(format!(
                "Calendar '{}' cannot be removed while a trigger references it",
                name
            )));
        }
        Ok(store.calendars.remove(name).is_some())
    }

    async fn get_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        Ok(self.store.read().await.calendars.get(name).cloned())
    }

    async fn get_calendar_names(&self) -> Result<Vec<String>> {
        let store = self.store.read().await;
        let mut names: Vec<String> = store.calendars.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn add_listener(&self, listener: Arc<dyn SchedulerListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn name(&self) -> &str {
        "memory"
    }
}
