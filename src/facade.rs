//! Scheduler facade
//!
//! `SchedulerFacade` is the entry point for callers: it validates job and
//! trigger specs, translates them into engine-native objects and registers
//! them with the engine. Every precondition (key presence, job/trigger
//! relationship, calendar existence) is checked before the engine is touched,
//! so a rejected call never leaves partial state behind.
//!
//! Batch forms run their items one after another and stop at the first
//! error; items before the failing one stay registered.

use crate::config::SchedulerConfig;
use crate::engine::{Calendar, EngineJob, EngineTrigger, SchedulerEngine};
use crate::error::{Result, ScheduleError};
use crate::key::{GroupMatcher, Key};
use crate::translate;
use crate::types::{JobData, JobSpec, TriggerSpec, TriggerState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Span;

/// High-level scheduling API over a `SchedulerEngine`
///
/// Holds no schedule state of its own: the engine is the only source of
/// truth. Methods taking `impl AsRef<Key>` accept a `Key`, a `JobSpec` or a
/// `TriggerSpec` interchangeably.
pub struct SchedulerFacade {
    engine: Arc<dyn SchedulerEngine>,
    span: Span,
}

impl SchedulerFacade {
    /// Create a facade over an engine
    pub fn new(engine: Arc<dyn SchedulerEngine>) -> Self {
        Self {
            engine,
            span: Span::none(),
        }
    }

    /// Emit every log record inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The underlying engine
    pub fn engine(&self) -> &Arc<dyn SchedulerEngine> {
        &self.engine
    }

    pub fn scheduler_instance_id(&self) -> &str {
        self.engine.instance_id()
    }

    // ─── Jobs ───

    /// Register a job and its triggers; fails if the job or a trigger already exists
    pub async fn add_job(&self, spec: &JobSpec) -> Result<()> {
        self.store_job(spec, false).await
    }

    pub async fn add_jobs(&self, specs: &[JobSpec]) -> Result<()> {
        for spec in specs {
            self.add_job(spec).await?;
        }
        Ok(())
    }

    /// Register a job and its triggers, overwriting existing ones with the same keys
    pub async fn save_job(&self, spec: &JobSpec) -> Result<()> {
        self.store_job(spec, true).await
    }

    pub async fn save_jobs(&self, specs: &[JobSpec]) -> Result<()> {
        for spec in specs {
            self.save_job(spec).await?;
        }
        Ok(())
    }

    /// Same as `save_job`
    pub async fn update_job(&self, spec: &JobSpec) -> Result<()> {
        self.save_job(spec).await
    }

    pub async fn update_jobs(&self, specs: &[JobSpec]) -> Result<()> {
        self.save_jobs(specs).await
    }

    /// Register jobs declared at startup, returning how many were written
    ///
    /// With `overwrite_existing_jobs` set every job is upserted. Otherwise a
    /// job that already exists is kept as it is, together with its triggers.
    pub async fn register_declared_jobs(
        &self,
        specs: &[JobSpec],
        config: &SchedulerConfig,
    ) -> Result<usize> {
        let overwrite = config.scheduler.overwrite_existing_jobs;
        let mut written = 0;
        for spec in specs {
            spec.key.validate("job key")?;
            if !overwrite && self.engine.check_job_exists(&spec.key).await? {
                self.span.in_scope(|| {
                    tracing::debug!(job = %spec.key, "Declared job already exists, keeping it")
                });
                continue;
            }
            self.store_job(spec, overwrite).await?;
            written += 1;
        }
        Ok(written)
    }

    pub async fn pause_job(&self, key: impl AsRef<Key>) -> Result<()> {
        let key = key.as_ref();
        key.validate("job key")?;
        self.engine.pause_job(key).await?;
        self.span.in_scope(|| tracing::info!(job = %key, "Job paused"));
        Ok(())
    }

    pub async fn pause_jobs<K: AsRef<Key>>(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.pause_job(key).await?;
        }
        Ok(())
    }

    /// Pause every job whose group matches, including jobs added to an
    /// exactly matched group later
    pub async fn pause_job_group(&self, matcher: &GroupMatcher) -> Result<()> {
        self.engine.pause_jobs(matcher).await?;
        self.span
            .in_scope(|| tracing::info!(matcher = ?matcher, "Job group paused"));
        Ok(())
    }

    pub async fn resume_job(&self, key: impl AsRef<Key>) -> Result<()> {
        let key = key.as_ref();
        key.validate("job key")?;
        self.engine.resume_job(key).await?;
        self.span.in_scope(|| tracing::info!(job = %key, "Job resumed"));
        Ok(())
    }

    pub async fn resume_jobs<K: AsRef<Key>>(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.resume_job(key).await?;
        }
        Ok(())
    }

    pub async fn resume_job_group(&self, matcher: &GroupMatcher) -> Result<()> {
        self.engine.resume_jobs(matcher).await?;
        self.span
            .in_scope(|| tracing::info!(matcher = ?matcher, "Job group resumed"));
        Ok(())
    }

    /// Fire the job of a trigger spec now
    ///
    /// Firing data is the spec's data if it has any, otherwise the data of
    /// the trigger registered under the spec's key, otherwise none.
    pub async fn trigger_job(&self, spec: &TriggerSpec) -> Result<()> {
        spec.key.validate("trigger key")?;
        let job_key = spec.job_key.as_ref().ok_or_else(|| {
            ScheduleError::Validation(format!("Trigger {} has no job key", spec.key))
        })?;
        job_key.validate("job key")?;

        let data = match spec.non_empty_data() {
            Some(data) => Some(data.clone()),
            None => self
                .engine
                .get_trigger(&spec.key)
                .await?
                .map(|t| t.data)
                .filter(|d| !d.is_empty()),
        };

        self.engine.trigger_job(job_key, data).await?;
        self.span.in_scope(|| {
            tracing::info!(job = %job_key, trigger = %spec.key, "Job triggered")
        });
        Ok(())
    }

    pub async fn trigger_jobs(&self, specs: &[TriggerSpec]) -> Result<()> {
        for spec in specs {
            self.trigger_job(spec).await?;
        }
        Ok(())
    }

    /// Fire a job now by key
    pub async fn trigger_job_key(&self, key: impl AsRef<Key>, data: Option<JobData>) -> Result<()> {
        let key = key.as_ref();
        key.validate("job key")?;
        self.engine.trigger_job(key, data).await?;
        self.span.in_scope(|| tracing::info!(job = %key, "Job triggered"));
        Ok(())
    }

    /// Delete a job and its triggers; returns whether the job existed
    pub async fn delete_job(&self, key: impl AsRef<Key>) -> Result<bool> {
        let key = key.as_ref();
        key.validate("job key")?;
        let found = self.engine.delete_job(key).await?;
        self.span
            .in_scope(|| tracing::info!(job = %key, found, "Job deleted"));
        Ok(found)
    }

    /// Delete several jobs in one engine call; returns whether all of them existed
    pub async fn delete_jobs<K: AsRef<Key>>(&self, keys: &[K]) -> Result<bool> {
        let keys = collect_keys(keys, "job key")?;
        let all_found = self.engine.delete_jobs(&keys).await?;
        self.span.in_scope(|| {
            tracing::info!(count = keys.len(), all_found, "Jobs deleted")
        });
        Ok(all_found)
    }

    pub async fn get_job(&self, key: impl AsRef<Key>) -> Result<Option<EngineJob>> {
        self.engine.get_job(key.as_ref()).await
    }

    pub async fn check_job_exists(&self, key: impl AsRef<Key>) -> Result<bool> {
        self.engine.check_job_exists(key.as_ref()).await
    }

    // ─── Triggers ───

    /// Schedule a trigger for an existing job, returning its first fire time
    pub async fn add_trigger(&self, spec: &TriggerSpec) -> Result<DateTime<Utc>> {
        let trigger = self.prepare_trigger(spec, None).await?;
        let job_key = trigger.job_key.clone();
        let first_fire = self.engine.schedule_trigger(trigger).await?;
        self.span.in_scope(|| {
            tracing::info!(
                trigger = %spec.key,
                job = %job_key,
                first_fire = %first_fire.to_rfc3339(),
                "Trigger added"
            )
        });
        Ok(first_fire)
    }

    pub async fn add_triggers(&self, specs: &[TriggerSpec]) -> Result<()> {
        for spec in specs {
            self.add_trigger(spec).await?;
        }
        Ok(())
    }

    /// Replace the trigger named by the spec's `original_key`
    ///
    /// The replacement may carry a different key, which renames the trigger,
    /// but it must fire the same job. Returns the new first fire time.
    pub async fn update_trigger(&self, spec: &TriggerSpec) -> Result<Option<DateTime<Utc>>> {
        spec.key.validate("trigger key")?;
        let job_key = spec.job_key.as_ref().ok_or_else(|| {
            ScheduleError::Validation(format!("Trigger {} has no job key", spec.key))
        })?;
        job_key.validate("job key")?;
        let original_key = spec.original_key.as_ref().ok_or_else(|| {
            ScheduleError::Validation(format!("Trigger {} has no original key", spec.key))
        })?;
        original_key.validate("original trigger key")?;

        let existing = self
            .engine
            .get_trigger(original_key)
            .await?
            .ok_or_else(|| {
                ScheduleError::NotFound(format!("Trigger {} does not exist", original_key))
            })?;
        if &existing.job_key != job_key {
            return Err(ScheduleError::InvariantViolation(format!(
                "Trigger {} belongs to job {} and cannot be moved to job {}",
                original_key, existing.job_key, job_key
            )));
        }

        let trigger = self.prepare_trigger(spec, None).await?;
        let next = self.engine.reschedule_job(original_key, trigger).await?;
        self.span.in_scope(|| {
            tracing::info!(
                trigger = %spec.key,
                original = %original_key,
                job = %job_key,
                "Trigger updated"
            )
        });
        Ok(next)
    }

    pub async fn update_triggers(&self, specs: &[TriggerSpec]) -> Result<()> {
        for spec in specs {
            self.update_trigger(spec).await?;
        }
        Ok(())
    }

    pub async fn pause_trigger(&self, key: impl AsRef<Key>) -> Result<()> {
        let key = key.as_ref();
        key.validate("trigger key")?;
        self.engine.pause_trigger(key).await?;
        self.span
            .in_scope(|| tracing::info!(trigger = %key, "Trigger paused"));
        Ok(())
    }

    pub async fn pause_triggers<K: AsRef<Key>>(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.pause_trigger(key).await?;
        }
        Ok(())
    }

    /// Pause every trigger whose group matches, including triggers added to
    /// an exactly matched group later
    pub async fn pause_trigger_group(&self, matcher: &GroupMatcher) -> Result<()> {
        self.engine.pause_triggers(matcher).await?;
        self.span
            .in_scope(|| tracing::info!(matcher = ?matcher, "Trigger group paused"));
        Ok(())
    }

    pub async fn resume_trigger(&self, key: impl AsRef<Key>) -> Result<()> {
        let key = key.as_ref();
        key.validate("trigger key")?;
        self.engine.resume_trigger(key).await?;
        self.span
            .in_scope(|| tracing::info!(trigger = %key, "Trigger resumed"));
        Ok(())
    }

    pub async fn resume_triggers<K: AsRef<Key>>(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.resume_trigger(key).await?;
        }
        Ok(())
    }

    pub async fn resume_trigger_group(&self, matcher: &GroupMatcher) -> Result<()> {
        self.engine.resume_triggers(matcher).await?;
        self.span
            .in_scope(|| tracing::info!(matcher = ?matcher, "Trigger group resumed"));
        Ok(())
    }

    /// Unschedule a trigger; returns whether it existed
    pub async fn delete_trigger(&self, key: impl AsRef<Key>) -> Result<bool> {
        let key = key.as_ref();
        key.validate("trigger key")?;
        let found = self.engine.unschedule_job(key).await?;
        self.span
            .in_scope(|| tracing::info!(trigger = %key, found, "Trigger deleted"));
        Ok(found)
    }

    /// Unschedule several triggers in one engine call; returns whether all of them existed
    pub async fn delete_triggers<K: AsRef<Key>>(&self, keys: &[K]) -> Result<bool> {
        let keys = collect_keys(keys, "trigger key")?;
        let all_found = self.engine.unschedule_jobs(&keys).await?;
        self.span.in_scope(|| {
            tracing::info!(count = keys.len(), all_found, "Triggers deleted")
        });
        Ok(all_found)
    }

    pub async fn get_trigger(&self, key: impl AsRef<Key>) -> Result<Option<EngineTrigger>> {
        self.engine.get_trigger(key.as_ref()).await
    }

    pub async fn get_trigger_by_name(
        &self,
        name: &str,
        group: Option<&str>,
    ) -> Result<Option<EngineTrigger>> {
        self.get_trigger(Key::with_group(name, group.map(str::to_string)))
            .await
    }

    /// Triggers registered for a job, ordered by key
    pub async fn get_triggers_of_job(&self, job_key: impl AsRef<Key>) -> Result<Vec<EngineTrigger>> {
        self.engine.get_triggers_of_job(job_key.as_ref()).await
    }

    /// `TriggerState::None` if the trigger does not exist
    pub async fn get_trigger_state(&self, key: impl AsRef<Key>) -> Result<TriggerState> {
        let key = key.as_ref();
        key.validate("trigger key")?;
        self.engine.get_trigger_state(key).await
    }

    pub async fn get_trigger_state_by_name(
        &self,
        name: &str,
        group: Option<&str>,
    ) -> Result<TriggerState> {
        self.get_trigger_state(Key::with_group(name, group.map(str::to_string)))
            .await
    }

    pub async fn check_trigger_exists(&self, key: impl AsRef<Key>) -> Result<bool> {
        self.engine.check_trigger_exists(key.as_ref()).await
    }

    // ─── Scheduler ───

    pub async fn pause_all(&self) -> Result<()> {
        self.engine.pause_all().await?;
        self.span.in_scope(|| tracing::info!("All triggers paused"));
        Ok(())
    }

    pub async fn resume_all(&self) -> Result<()> {
        self.engine.resume_all().await?;
        self.span.in_scope(|| tracing::info!("All triggers resumed"));
        Ok(())
    }

    // ─── Calendars ───

    pub async fn add_calendar(
        &self,
        name: &str,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> Result<()> {
        self.engine
            .add_calendar(name, calendar, replace, update_triggers)
            .await?;
        self.span
            .in_scope(|| tracing::info!(calendar = name, replace, "Calendar added"));
        Ok(())
    }

    pub async fn delete_calendar(&self, name: &str) -> Result<bool> {
        let found = self.engine.delete_calendar(name).await?;
        self.span
            .in_scope(|| tracing::info!(calendar = name, found, "Calendar deleted"));
        Ok(found)
    }

    pub async fn get_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        self.engine.get_calendar(name).await
    }

    pub async fn get_calendar_names(&self) -> Result<Vec<String>> {
        self.engine.get_calendar_names().await
    }

    // ─── Internals ───

    async fn store_job(&self, spec: &JobSpec, replace: bool) -> Result<()> {
        spec.key.validate("job key")?;
        if spec.handler_type.trim().is_empty() {
            return Err(ScheduleError::Validation(format!(
                "Job {} has no handler type",
                spec.key
            )));
        }

        let job = translate::build_job(spec);
        let mut triggers = Vec::with_capacity(spec.triggers.len());
        for trigger_spec in &spec.triggers {
            triggers.push(self.prepare_trigger(trigger_spec, Some(&spec.key)).await?);
        }

        let trigger_count = triggers.len();
        if triggers.is_empty() {
            self.engine.add_job(job, replace).await?;
        } else {
            self.engine
                .schedule_job_with_triggers(job, triggers, replace)
                .await?;
        }

        self.span.in_scope(|| {
            tracing::info!(
                job = %spec.key,
                handler_type = %spec.handler_type,
                triggers = trigger_count,
                replace,
                "Job registered"
            )
        });
        Ok(())
    }

    /// Validate and translate a trigger spec
    ///
    /// `owner` is the job the trigger is registered with, if any: a trigger
    /// without a job key is bound to it, a trigger naming another job is
    /// rejected.
    async fn prepare_trigger(
        &self,
        spec: &TriggerSpec,
        owner: Option<&Key>,
    ) -> Result<EngineTrigger> {
        spec.key.validate("trigger key")?;

        let bound;
        let spec = match (&spec.job_key, owner) {
            (Some(job_key), Some(owner)) if job_key != owner => {
                return Err(ScheduleError::InvariantViolation(format!(
                    "Trigger {} names job {} but is registered with job {}",
                    spec.key, job_key, owner
                )));
            }
            (None, Some(owner)) => {
                bound = TriggerSpec {
                    job_key: Some(owner.clone()),
                    ..spec.clone()
                };
                &bound
            }
            (None, None) => {
                return Err(ScheduleError::Validation(format!(
                    "Trigger {} has no job key",
                    spec.key
                )));
            }
            (Some(_), _) => spec,
        };

        if let Some(calendar) = &spec.calendar_name {
            if self.engine.get_calendar(calendar).await?.is_none() {
                return Err(ScheduleError::MissingCalendar(calendar.clone()));
            }
        }

        translate::build_trigger(spec)
    }
}

impl std::fmt::Debug for SchedulerFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerFacade")
            .field("engine", &self.engine.name())
            .field("instance_id", &self.engine.instance_id())
            .finish()
    }
}

fn collect_keys<K: AsRef<Key>>(keys: &[K], what: &str) -> Result<Vec<Key>> {
    keys.iter()
        .map(|k| {
            let key = k.as_ref();
            key.validate(what)?;
            Ok(key.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{JobSpecBuilder, TriggerSpecBuilder};
    use crate::engine::memory::MemoryEngine;
    use crate::types::MisfirePolicy;

    fn facade() -> (SchedulerFacade, Arc<MemoryEngine>) {
        let engine = Arc::new(MemoryEngine::default());
        let facade = SchedulerFacade::new(engine.clone()).with_span(tracing::info_span!("test"));
        (facade, engine)
    }

    fn cron_job(name: &str) -> JobSpec {
        JobSpecBuilder::for_handler("noop")
            .with_identity(name, "g")
            .with_trigger(
                TriggerSpecBuilder::cron("0 0 12 * * ?")
                    .with_identity(format!("{}-noon", name), "g")
                    .with_misfire_policy(MisfirePolicy::FireOnceNow)
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn test_add_job_binds_triggers_to_job() {
        let (facade, _) = facade();
        facade.add_job(&cron_job("report")).await.unwrap();

        let trigger = facade
            .get_trigger_by_name("report-noon", Some("g"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.job_key, Key::new("report", "g"));
        assert_eq!(
            facade
                .get_trigger_state_by_name("report-noon", Some("g"))
                .await
                .unwrap(),
            TriggerState::Normal
        );
    }

    #[tokio::test]
    async fn test_add_job_without_triggers() {
        let (facade, _) = facade();
        let spec = JobSpecBuilder::for_handler("noop").with_name("solo").build();
        facade.add_job(&spec).await.unwrap();
        assert!(facade.check_job_exists(&spec).await.unwrap());
        assert!(facade.add_job(&spec).await.is_err());
        facade.save_job(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_job_validation() {
        let (facade, engine) = facade();
        let no_handler = JobSpecBuilder::new().with_name("j").build();
        assert!(matches!(
            facade.add_job(&no_handler).await,
            Err(ScheduleError::Validation(_))
        ));

        let unnamed = JobSpec::new(Key::named(""), "noop");
        assert!(matches!(
            facade.add_job(&unnamed).await,
            Err(ScheduleError::Validation(_))
        ));

        assert!(engine.get_job_keys(&GroupMatcher::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_naming_other_job_rejected() {
        let (facade, engine) = facade();
        let spec = JobSpecBuilder::for_handler("noop")
            .with_identity("a", "g")
            .with_trigger(
                TriggerSpecBuilder::new()
                    .with_identity("t", "g")
                    .for_job(Key::new("b", "g"))
                    .build(),
            )
            .build();

        assert!(matches!(
            facade.add_job(&spec).await,
            Err(ScheduleError::InvariantViolation(_))
        ));
        assert!(!engine.check_job_exists(&Key::new("a", "g")).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_cron_registers_nothing() {
        let (facade, engine) = facade();
        let spec = JobSpecBuilder::for_handler("noop")
            .with_identity("bad", "g")
            .with_trigger(TriggerSpecBuilder::cron("every day at noon").with_name("t").build())
            .build();

        assert!(matches!(
            facade.add_job(&spec).await,
            Err(ScheduleError::InvalidSchedule(_))
        ));
        assert!(!engine.check_job_exists(&Key::new("bad", "g")).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_trigger_requires_job_key() {
        let (facade, _) = facade();
        let spec = TriggerSpecBuilder::new().with_name("loose").build();
        assert!(matches!(
            facade.add_trigger(&spec).await,
            Err(ScheduleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_trigger_to_existing_job() {
        let (facade, _) = facade();
        facade
            .add_job(&JobSpecBuilder::for_handler("noop").with_identity("j", "g").build())
            .await
            .unwrap();

        let spec = TriggerSpecBuilder::new()
            .with_identity("every-10s", "g")
            .for_job(Key::new("j", "g"))
            .with_interval_in_seconds(10)
            .repeat_forever()
            .build();
        let first_fire = facade.add_trigger(&spec).await.unwrap();
        assert!(first_fire <= Utc::now());
        assert_eq!(facade.get_triggers_of_job(Key::new("j", "g")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_trigger_preconditions() {
        let (facade, _) = facade();
        facade.add_job(&cron_job("j")).await.unwrap();

        let no_original = TriggerSpecBuilder::cron("0 0 6 * * ?")
            .with_identity("j-noon", "g")
            .for_job(Key::new("j", "g"))
            .build();
        assert!(matches!(
            facade.update_trigger(&no_original).await,
            Err(ScheduleError::Validation(_))
        ));

        let missing = TriggerSpecBuilder::cron("0 0 6 * * ?")
            .with_identity("x", "g")
            .for_job(Key::new("j", "g"))
            .with_original_identity(Key::new("ghost", "g"))
            .build();
        assert!(matches!(
            facade.update_trigger(&missing).await,
            Err(ScheduleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_trigger_renames() {
        let (facade, _) = facade();
        facade.add_job(&cron_job("j")).await.unwrap();

        let morning = TriggerSpecBuilder::cron("0 0 6 * * ?")
            .with_identity("j-morning", "g")
            .for_job(Key::new("j", "g"))
            .with_original_identity(Key::new("j-noon", "g"))
            .build();
        let next = facade.update_trigger(&morning).await.unwrap();
        assert!(next.is_some());
        assert!(!facade.check_trigger_exists(Key::new("j-noon", "g")).await.unwrap());
        let stored = facade.get_trigger(&morning).await.unwrap().unwrap();
        assert_eq!(stored.schedule.expression(), Some("0 0 6 * * ?"));
    }

    #[tokio::test]
    async fn test_pause_and_resume_by_spec() {
        let (facade, _) = facade();
        let job = cron_job("j");
        facade.add_job(&job).await.unwrap();
        let trigger = &job.triggers[0];

        facade.pause_job(&job).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Paused);
        facade.resume_job(&job).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Normal);

        facade.pause_trigger(trigger).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Paused);
        facade.resume_triggers(&[trigger.key.clone()]).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Normal);

        let group = GroupMatcher::group_equals("g");
        facade.pause_trigger_group(&group).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Paused);
        facade.resume_trigger_group(&group).await.unwrap();
        facade.pause_job_group(&group).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Paused);
        facade.resume_job_group(&group).await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Normal);

        facade.pause_all().await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Paused);
        facade.resume_all().await.unwrap();
        assert_eq!(facade.get_trigger_state(trigger).await.unwrap(), TriggerState::Normal);
    }

    #[tokio::test]
    async fn test_delete_triggers_and_jobs_in_bulk() {
        let (facade, _) = facade();
        let jobs = vec![cron_job("a"), cron_job("b")];
        facade.add_jobs(&jobs).await.unwrap();

        let trigger_keys: Vec<&TriggerSpec> = jobs.iter().map(|j| &j.triggers[0]).collect();
        assert!(facade.delete_triggers(&trigger_keys).await.unwrap());
        assert!(!facade.delete_trigger(trigger_keys[0]).await.unwrap());

        assert!(facade.delete_jobs(&jobs).await.unwrap());
        assert!(!facade.delete_job(&jobs[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_trigger_job_key_records_firing() {
        let (facade, engine) = facade();
        facade.add_job(&cron_job("j")).await.unwrap();
        facade.trigger_job_key(Key::new("j", "g"), None).await.unwrap();
        assert_eq!(engine.fired_jobs().await.len(), 1);
        assert!(facade.trigger_job_key(Key::new("nope", "g"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_calendar_passthrough() {
        let (facade, _) = facade();
        facade
            .add_calendar("holidays", Calendar::new(), false, false)
            .await
            .unwrap();
        assert_eq!(facade.get_calendar_names().await.unwrap(), vec!["holidays"]);
        assert!(facade.get_calendar("holidays").await.unwrap().is_some());
        assert!(facade.delete_calendar("holidays").await.unwrap());
        assert!(facade.get_calendar("holidays").await.unwrap().is_none());
    }

    #[test]
    fn test_instance_id() {
        let engine = Arc::new(MemoryEngine::default());
        let facade = SchedulerFacade::new(engine.clone());
        assert_eq!(facade.scheduler_instance_id(), engine.instance_id());
        assert_eq!(facade.engine().name(), "memory");
    }

    #[tokio::test]
    async fn test_trigger_job_requires_trigger_name() {
        let (facade, engine) = facade();
        facade
            .add_job(&JobSpecBuilder::for_handler("noop").with_identity("j", "g").build())
            .await
            .unwrap();

        let unnamed = TriggerSpecBuilder::new()
            .with_key(Key::named(""))
            .for_job(Key::new("j", "g"))
            .build();
        assert!(matches!(
            facade.trigger_job(&unnamed).await,
            Err(ScheduleError::Validation(_))
        ));
        assert!(engine.fired_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_state_requires_name() {
        let (facade, _) = facade();
        assert!(matches!(
            facade.get_trigger_state(Key::named("")).await,
            Err(ScheduleError::Validation(_))
        ));
        assert!(matches!(
            facade.get_trigger_state_by_name(" ", Some("g")).await,
            Err(ScheduleError::Validation(_))
        ));
        assert_eq!(
            facade.get_trigger_state(Key::new("ghost", "g")).await.unwrap(),
            TriggerState::None
        );
    }

    #[tokio::test]
    async fn test_update_trigger_requires_names() {
        let (facade, _) = facade();
        facade.add_job(&cron_job("j")).await.unwrap();
        let before = facade.get_trigger(Key::new("j-noon", "g")).await.unwrap();

        let unnamed = TriggerSpecBuilder::cron("0 0 6 * * ?")
            .with_key(Key::new("", "g"))
            .for_job(Key::new("j", "g"))
            .with_original_identity(Key::new("j-noon", "g"))
            .build();
        assert!(matches!(
            facade.update_trigger(&unnamed).await,
            Err(ScheduleError::Validation(_))
        ));

        let unnamed_original = TriggerSpecBuilder::cron("0 0 6 * * ?")
            .with_identity("j-noon", "g")
            .for_job(Key::new("j", "g"))
            .with_original_identity(Key::new("", "g"))
            .build();
        assert!(matches!(
            facade.update_trigger(&unnamed_original).await,
            Err(ScheduleError::Validation(_))
        ));

        assert_eq!(facade.get_trigger(Key::new("j-noon", "g")).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_group_operations_take_matchers() {
        let (facade, _) = facade();
        let jobs: Vec<JobSpec> = [("a", "billing-eu"), ("b", "billing-us"), ("c", "reports")]
            .into_iter()
            .map(|(name, group)| {
                JobSpecBuilder::for_handler("noop")
                    .with_identity(name, group)
                    .with_trigger(
                        TriggerSpecBuilder::cron("0 0 12 * * ?")
                            .with_identity(format!("{}-noon", name), group)
                            .build(),
                    )
                    .build()
            })
            .collect();
        facade.add_jobs(&jobs).await.unwrap();
        let noon = |name: &str, group: &str| Key::new(format!("{}-noon", name), group);

        let billing = GroupMatcher::StartsWith("billing".to_string());
        facade.pause_trigger_group(&billing).await.unwrap();
        assert_eq!(
            facade.get_trigger_state(noon("a", "billing-eu")).await.unwrap(),
            TriggerState::Paused
        );
        assert_eq!(
            facade.get_trigger_state(noon("b", "billing-us")).await.unwrap(),
            TriggerState::Paused
        );
        assert_eq!(
            facade.get_trigger_state(noon("c", "reports")).await.unwrap(),
            TriggerState::Normal
        );
        facade.resume_trigger_group(&billing).await.unwrap();
        assert_eq!(
            facade.get_trigger_state(noon("a", "billing-eu")).await.unwrap(),
            TriggerState::Normal
        );

        facade
            .pause_job_group(&GroupMatcher::EndsWith("-us".to_string()))
            .await
            .unwrap();
        assert_eq!(
            facade.get_trigger_state(noon("b", "billing-us")).await.unwrap(),
            TriggerState::Paused
        );
        assert_eq!(
            facade.get_trigger_state(noon("a", "billing-eu")).await.unwrap(),
            TriggerState::Normal
        );
        facade.resume_job_group(&GroupMatcher::Any).await.unwrap();
        assert_eq!(
            facade.get_trigger_state(noon("b", "billing-us")).await.unwrap(),
            TriggerState::Normal
        );
    }

    #[tokio::test]
    async fn test_register_declared_jobs_honours_overwrite_flag() {
        let (facade, _) = facade();
        let original = JobSpecBuilder::for_handler("noop")
            .with_identity("j", "g")
            .with_description("first")
            .build();
        facade.add_job(&original).await.unwrap();

        let declared = vec![
            JobSpecBuilder::for_handler("noop")
                .with_identity("j", "g")
                .with_description("declared")
                .build(),
            JobSpecBuilder::for_handler("noop").with_identity("k", "g").build(),
        ];

        let mut keep = SchedulerConfig::default();
        keep.scheduler.overwrite_existing_jobs = false;
        assert_eq!(facade.register_declared_jobs(&declared, &keep).await.unwrap(), 1);
        let job = facade.get_job(Key::new("j", "g")).await.unwrap().unwrap();
        assert_eq!(job.description.as_deref(), Some("first"));
        assert!(facade.check_job_exists(Key::new("k", "g")).await.unwrap());

        let overwrite = SchedulerConfig::default();
        assert_eq!(
            facade.register_declared_jobs(&declared, &overwrite).await.unwrap(),
            2
        );
        let job = facade.get_job(Key::new("j", "g")).await.unwrap().unwrap();
        assert_eq!(job.description.as_deref(), Some("declared"));
    }
}
