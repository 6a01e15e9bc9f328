//! # a3s-schedule
//!
//! Declarative job and trigger scheduling over pluggable scheduler engines
//! for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-schedule` lets callers describe *what* should run (a job with a
//! handler type and data) and *when* (interval or cron triggers with misfire
//! policies, time windows and exclusion calendars) without talking to the
//! scheduling engine directly. Specs are validated and translated into
//! engine-native objects by the `SchedulerFacade`, which enforces identity
//! and job/trigger relationship rules before anything reaches the engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_schedule::{
//!     JobSpecBuilder, Key, MemoryEngine, MisfirePolicy, SchedulerFacade, TriggerSpecBuilder,
//!     TriggerState,
//! };
//!
//! # async fn example() -> a3s_schedule::Result<()> {
//! let facade = SchedulerFacade::new(Arc::new(MemoryEngine::default()));
//!
//! let job = JobSpecBuilder::for_handler("report")
//!     .with_identity("daily-report", "reports")
//!     .using_data("format", "pdf")
//!     .with_trigger(
//!         TriggerSpecBuilder::cron("0 0 12 * * ?")
//!             .with_identity("noon", "reports")
//!             .with_misfire_policy(MisfirePolicy::FireOnceNow)
//!             .build(),
//!     )
//!     .build();
//!
//! facade.add_job(&job).await?;
//!
//! assert!(facade.check_job_exists(&job).await?);
//! assert_eq!(
//!     facade.get_trigger_state(Key::new("noon", "reports")).await?,
//!     TriggerState::Normal
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Engines
//!
//! - **memory**: In-memory engine for tests and single-process use
//!
//! ## Architecture
//!
//! - **SchedulerEngine** trait: the boundary every engine implements
//! - **SchedulerFacade**: validation, translation and lifecycle operations
//! - **JobSpec / TriggerSpec**: declarative, serde-friendly descriptions
//! - **HandlerRegistry**: maps handler types to statically typed handlers
//! - **EventSink**: structured logging of engine notifications

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod handler;
pub mod key;
pub mod sink;
pub mod translate;
pub mod types;

// Re-export core types
pub use builder::{JobSpecBuilder, TriggerSpecBuilder};
pub use config::{SchedulerConfig, SchedulerSettings, ThreadPoolSettings};
pub use engine::{
    Calendar, CronMisfire, EngineJob, EngineSchedule, EngineTrigger, FiredJob, IntervalMisfire,
    JobOutcome, SchedulerEngine, SchedulerEvent, SchedulerListener,
};
pub use error::{Result, ScheduleError};
pub use facade::SchedulerFacade;
pub use handler::{FnHandler, HandlerRegistry, JobContext, JobHandler};
pub use key::{GroupMatcher, JobKey, Key, TriggerKey, DEFAULT_GROUP};
pub use sink::{EventSink, SinkRecord};
pub use translate::{build_job, build_schedule, build_trigger, build_trigger_at};
pub use types::{
    JobData, JobSpec, MisfirePolicy, TriggerSpec, TriggerState, TriggerType, REPEAT_INDEFINITELY,
};

// Re-export engines for convenience
pub use engine::memory::MemoryEngine;
