//! Translation of declarative specs into engine-native objects
//!
//! Pure functions: no engine access, no state. Misfire policies are mapped
//! per trigger type; a policy outside the trigger type's scope falls back to
//! the engine's smart policy and is reported with a `warn` record only.

use crate::engine::{CronMisfire, EngineJob, EngineSchedule, EngineTrigger, IntervalMisfire};
use crate::error::{Result, ScheduleError};
use crate::types::{JobSpec, MisfirePolicy, TriggerSpec, TriggerType, REPEAT_INDEFINITELY};
use chrono::{DateTime, Utc};
use std::str::FromStr;

fn interval_misfire(spec: &TriggerSpec) -> IntervalMisfire {
    match spec.misfire_policy {
        MisfirePolicy::SmartPolicy => IntervalMisfire::Smart,
        MisfirePolicy::IgnoreMisfires => IntervalMisfire::IgnoreMisfires,
        MisfirePolicy::FireNow => IntervalMisfire::FireNow,
        MisfirePolicy::RescheduleNextWithExistingCount => {
            IntervalMisfire::RescheduleNextWithExistingCount
        }
        MisfirePolicy::RescheduleNextWithRemainingCount => {
            IntervalMisfire::RescheduleNextWithRemainingCount
        }
        MisfirePolicy::RescheduleNowWithExistingCount => {
            IntervalMisfire::RescheduleNowWithExistingCount
        }
        MisfirePolicy::RescheduleNowWithRemainingCount => {
            IntervalMisfire::RescheduleNowWithRemainingCount
        }
        policy @ (MisfirePolicy::FireOnceNow | MisfirePolicy::DoNothing) => {
            warn_out_of_scope(spec, policy);
            IntervalMisfire::Smart
        }
    }
}

fn cron_misfire(spec: &TriggerSpec) -> CronMisfire {
    match spec.misfire_policy {
        MisfirePolicy::SmartPolicy => CronMisfire::Smart,
        MisfirePolicy::IgnoreMisfires => CronMisfire::IgnoreMisfires,
        MisfirePolicy::FireOnceNow => CronMisfire::FireOnceNow,
        MisfirePolicy::DoNothing => CronMisfire::DoNothing,
        policy => {
            warn_out_of_scope(spec, policy);
            CronMisfire::Smart
        }
    }
}

fn warn_out_of_scope(spec: &TriggerSpec, policy: MisfirePolicy) {
    tracing::warn!(
        trigger = %spec.key,
        trigger_type = %spec.trigger_type,
        policy = ?policy,
        "Misfire policy does not apply to trigger type, using smart policy"
    );
}

/// Build the engine schedule for a trigger spec
///
/// Fails with `Validation` when a cron trigger has no expression and with
/// `InvalidSchedule` when the expression or interval parameters are unusable.
pub fn build_schedule(spec: &TriggerSpec) -> Result<EngineSchedule> {
    match spec.trigger_type {
        TriggerType::Interval => {
            if spec.repeat_count < REPEAT_INDEFINITELY {
                return Err(ScheduleError::InvalidSchedule(format!(
                    "Trigger {}: repeat count must be >= {}, got {}",
                    spec.key, REPEAT_INDEFINITELY, spec.repeat_count
                )));
            }
            if spec.repeat_count != 0 && spec.repeat_interval_ms <= 0 {
                return Err(ScheduleError::InvalidSchedule(format!(
                    "Trigger {}: repeating trigger needs a positive interval, got {}ms",
                    spec.key, spec.repeat_interval_ms
                )));
            }
            Ok(EngineSchedule::Interval {
                repeat_interval_ms: spec.repeat_interval_ms,
                repeat_count: spec.repeat_count,
                misfire: interval_misfire(spec),
            })
        }
        TriggerType::Cron => {
            let expression = spec
                .cron_expression
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    ScheduleError::Validation(format!(
                        "Cron trigger {} requires a cron expression",
                        spec.key
                    ))
                })?;
            let schedule = cron::Schedule::from_str(expression).map_err(|e| {
                ScheduleError::InvalidSchedule(format!(
                    "Trigger {}: invalid cron expression '{}': {}",
                    spec.key, expression, e
                ))
            })?;
            Ok(EngineSchedule::Cron {
                schedule,
                misfire: cron_misfire(spec),
            })
        }
    }
}

/// Build the engine job for a job spec
pub fn build_job(spec: &JobSpec) -> EngineJob {
    EngineJob {
        key: spec.key.clone(),
        description: spec.description.clone(),
        handler_type: spec.handler_type.clone(),
        data: spec.data.clone().unwrap_or_default(),
        durable: spec.durable,
        requests_recovery: spec.recoverable,
    }
}

/// Build the engine trigger for a trigger spec, starting from the current time
pub fn build_trigger(spec: &TriggerSpec) -> Result<EngineTrigger> {
    build_trigger_at(spec, Utc::now())
}

/// Build the engine trigger for a trigger spec with an explicit "now"
///
/// The spec must already carry its job key.
pub fn build_trigger_at(spec: &TriggerSpec, now: DateTime<Utc>) -> Result<EngineTrigger> {
    spec.key.validate("trigger key")?;
    let job_key = spec.job_key.clone().ok_or_else(|| {
        ScheduleError::Validation(format!("Trigger {} has no job key", spec.key))
    })?;
    job_key.validate("job key")?;

    let schedule = build_schedule(spec)?;

    let start_time = if spec.start_now {
        now
    } else {
        spec.start_at.unwrap_or(now)
    };
    if let Some(end) = spec.end_at {
        if end < start_time {
            return Err(ScheduleError::InvalidSchedule(format!(
                "Trigger {}: end time {} is before start time {}",
                spec.key,
                end.to_rfc3339(),
                start_time.to_rfc3339()
            )));
        }
    }

    Ok(EngineTrigger {
        key: spec.key.clone(),
        job_key,
        description: spec.description.clone(),
        schedule,
        calendar_name: spec.calendar_name.clone(),
        start_time,
        end_time: spec.end_at,
        data: spec.data.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{JobSpecBuilder, TriggerSpecBuilder};
    use crate::key::Key;
    use chrono::{Duration, TimeZone};

    fn interval_with(policy: MisfirePolicy) -> TriggerSpec {
        TriggerSpecBuilder::new()
            .with_name("t")
            .for_job(Key::named("j"))
            .with_interval_in_seconds(10)
            .repeat_forever()
            .with_misfire_policy(policy)
            .build()
    }

    fn cron_with(policy: MisfirePolicy) -> TriggerSpec {
        TriggerSpecBuilder::cron("0 0 12 * * ?")
            .with_name("t")
            .for_job(Key::named("j"))
            .with_misfire_policy(policy)
            .build()
    }

    fn interval_misfire_of(schedule: EngineSchedule) -> IntervalMisfire {
        match schedule {
            EngineSchedule::Interval { misfire, .. } => misfire,
            other => panic!("expected interval schedule, got {:?}", other),
        }
    }

    fn cron_misfire_of(schedule: EngineSchedule) -> CronMisfire {
        match schedule {
            EngineSchedule::Cron { misfire, .. } => misfire,
            other => panic!("expected cron schedule, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_misfire_mapping() {
        let table = [
            (MisfirePolicy::SmartPolicy, IntervalMisfire::Smart),
            (MisfirePolicy::FireNow, IntervalMisfire::FireNow),
            (MisfirePolicy::IgnoreMisfires, IntervalMisfire::IgnoreMisfires),
            (
                MisfirePolicy::RescheduleNextWithExistingCount,
                IntervalMisfire::RescheduleNextWithExistingCount,
            ),
            (
                MisfirePolicy::RescheduleNextWithRemainingCount,
                IntervalMisfire::RescheduleNextWithRemainingCount,
            ),
            (
                MisfirePolicy::RescheduleNowWithExistingCount,
                IntervalMisfire::RescheduleNowWithExistingCount,
            ),
            (
                MisfirePolicy::RescheduleNowWithRemainingCount,
                IntervalMisfire::RescheduleNowWithRemainingCount,
            ),
        ];
        for (policy, expected) in table {
            let schedule = build_schedule(&interval_with(policy)).unwrap();
            assert_eq!(interval_misfire_of(schedule), expected, "{:?}", policy);
        }
    }

    #[test]
    fn test_cron_misfire_mapping() {
        let table = [
            (MisfirePolicy::SmartPolicy, CronMisfire::Smart),
            (MisfirePolicy::FireOnceNow, CronMisfire::FireOnceNow),
            (MisfirePolicy::IgnoreMisfires, CronMisfire::IgnoreMisfires),
            (MisfirePolicy::DoNothing, CronMisfire::DoNothing),
        ];
        for (policy, expected) in table {
            let schedule = build_schedule(&cron_with(policy)).unwrap();
            assert_eq!(cron_misfire_of(schedule), expected, "{:?}", policy);
        }
    }

    #[test]
    fn test_out_of_scope_policy_falls_back_to_smart() {
        for policy in [MisfirePolicy::FireOnceNow, MisfirePolicy::DoNothing] {
            let schedule = build_schedule(&interval_with(policy)).unwrap();
            assert_eq!(interval_misfire_of(schedule), IntervalMisfire::Smart);
        }
        for policy in [
            MisfirePolicy::FireNow,
            MisfirePolicy::RescheduleNextWithExistingCount,
            MisfirePolicy::RescheduleNextWithRemainingCount,
            MisfirePolicy::RescheduleNowWithExistingCount,
            MisfirePolicy::RescheduleNowWithRemainingCount,
        ] {
            let schedule = build_schedule(&cron_with(policy)).unwrap();
            assert_eq!(cron_misfire_of(schedule), CronMisfire::Smart);
        }
    }

    #[test]
    fn test_interval_schedule_parameters() {
        let spec = TriggerSpecBuilder::new()
            .with_interval_in_millis(250)
            .with_repeat_count(4)
            .build();
        match build_schedule(&spec).unwrap() {
            EngineSchedule::Interval {
                repeat_interval_ms,
                repeat_count,
                ..
            } => {
                assert_eq!(repeat_interval_ms, 250);
                assert_eq!(repeat_count, 4);
            }
            other => panic!("unexpected schedule {:?}", other),
        }
    }

    #[test]
    fn test_one_shot_interval_needs_no_interval() {
        let spec = TriggerSpecBuilder::new().build();
        assert!(build_schedule(&spec).is_ok());
    }

    #[test]
    fn test_invalid_interval_parameters() {
        let spec = TriggerSpecBuilder::new().with_repeat_count(-2).build();
        assert!(matches!(
            build_schedule(&spec),
            Err(ScheduleError::InvalidSchedule(_))
        ));

        let spec = TriggerSpecBuilder::new().repeat_forever().build();
        assert!(matches!(
            build_schedule(&spec),
            Err(ScheduleError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_cron_requires_expression() {
        let spec = TriggerSpecBuilder::new().of_type(TriggerType::Cron).build();
        assert!(matches!(
            build_schedule(&spec),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_cron_rejects_malformed_expression() {
        let spec = TriggerSpecBuilder::cron("not a cron").build();
        let err = build_schedule(&spec).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSchedule(_)));
        assert!(err.to_string().contains("not a cron"));
    }

    #[test]
    fn test_build_job() {
        let spec = JobSpecBuilder::for_handler("mailer")
            .with_identity("digest", "mail")
            .with_description("weekly digest")
            .recoverable(true)
            .using_data("to", "all")
            .build();

        let job = build_job(&spec);
        assert_eq!(job.key, Key::new("digest", "mail"));
        assert_eq!(job.handler_type, "mailer");
        assert_eq!(job.description.as_deref(), Some("weekly digest"));
        assert!(job.durable);
        assert!(job.requests_recovery);
        assert_eq!(job.data["to"], "all");
    }

    #[test]
    fn test_build_trigger_start_resolution() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let later = now + Duration::hours(2);

        let spec = cron_with(MisfirePolicy::SmartPolicy);
        assert_eq!(build_trigger_at(&spec, now).unwrap().start_time, now);

        let mut spec = cron_with(MisfirePolicy::SmartPolicy);
        spec.start_at = Some(later);
        assert_eq!(build_trigger_at(&spec, now).unwrap().start_time, later);

        spec.start_now = true;
        assert_eq!(build_trigger_at(&spec, now).unwrap().start_time, now);
    }

    #[test]
    fn test_build_trigger_copies_fields() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let spec = TriggerSpecBuilder::cron("0 0 12 * * ?")
            .with_identity("noon", "g")
            .for_job(Key::new("job", "g"))
            .with_calendar_name("holidays")
            .with_description("noon run")
            .end_at(now + Duration::days(7))
            .using_data("x", 1)
            .build();

        let trigger = build_trigger_at(&spec, now).unwrap();
        assert_eq!(trigger.key, Key::new("noon", "g"));
        assert_eq!(trigger.job_key, Key::new("job", "g"));
        assert_eq!(trigger.calendar_name.as_deref(), Some("holidays"));
        assert_eq!(trigger.description.as_deref(), Some("noon run"));
        assert_eq!(trigger.end_time, Some(now + Duration::days(7)));
        assert_eq!(trigger.data["x"], 1);
        assert_eq!(trigger.schedule.expression(), Some("0 0 12 * * ?"));
    }

    #[test]
    fn test_build_trigger_rejects_end_before_start() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let mut spec = cron_with(MisfirePolicy::SmartPolicy);
        spec.end_at = Some(now - Duration::minutes(1));
        assert!(matches!(
            build_trigger_at(&spec, now),
            Err(ScheduleError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_build_trigger_requires_job_key() {
        let spec = TriggerSpecBuilder::cron("0 0 12 * * ?").build();
        assert!(matches!(
            build_trigger(&spec),
            Err(ScheduleError::Validation(_))
        ));
    }
}
