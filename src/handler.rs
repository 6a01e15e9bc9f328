//! Job handlers and the handler registry
//!
//! A job names its handler by a string `handler_type`. Handlers are
//! registered up front in a `HandlerRegistry`; an engine holding a registry
//! resolves the handler type when the job is stored, so a job with no
//! matching handler is rejected at registration instead of failing later.

use crate::engine::EngineJob;
use crate::error::{Result, ScheduleError};
use crate::key::Key;
use crate::types::JobData;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Everything a handler gets to see about one execution
#[derive(Debug, Clone, PartialEq)]
pub struct JobContext {
    pub job_key: Key,

    /// Trigger that caused the firing; `None` for immediate firings
    pub trigger_key: Option<Key>,

    pub fired_at: DateTime<Utc>,

    /// Job data overlaid with the firing data
    pub data: JobData,
}

impl JobContext {
    /// Build the context for a firing of `job`
    pub fn for_job(
        job: &EngineJob,
        trigger_key: Option<Key>,
        firing_data: Option<&JobData>,
        fired_at: DateTime<Utc>,
    ) -> Self {
        let mut data = job.data.clone();
        if let Some(extra) = firing_data {
            data.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self {
            job_key: job.key.clone(),
            trigger_key,
            fired_at,
            data,
        }
    }

    /// Typed lookup of a data entry
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(ScheduleError::from)
    }
}

/// Executes jobs of one handler type
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, ctx: &JobContext) -> Result<()>;
}

/// Adapts a closure returning a boxed future into a `JobHandler`
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    async fn execute(&self, ctx: &JobContext) -> Result<()> {
        (self.f)(ctx.clone()).await
    }
}

/// Handler lookup by handler type
///
/// Stores handlers in a `HashMap` protected by `RwLock`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler of the same type
    pub fn register(&self, handler_type: &str, handler: Arc<dyn JobHandler>) -> Result<()> {
        if handler_type.trim().is_empty() {
            return Err(ScheduleError::Validation(
                "Handler type cannot be empty".to_string(),
            ));
        }
        let mut handlers = self.handlers.write().map_err(|e| {
            ScheduleError::Engine(format!("Handler registry lock poisoned: {}", e))
        })?;
        if handlers
            .insert(handler_type.to_string(), handler)
            .is_some()
        {
            tracing::debug!(handler_type, "Replaced job handler");
        }
        Ok(())
    }

    /// Register a closure as the handler for a type
    pub fn register_fn<F>(&self, handler_type: &str, f: F) -> Result<()>
    where
        F: Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.register(handler_type, Arc::new(FnHandler::new(f)))
    }

    pub fn get(&self, handler_type: &str) -> Result<Option<Arc<dyn JobHandler>>> {
        let handlers = self.handlers.read().map_err(|e| {
            ScheduleError::Engine(format!("Handler registry lock poisoned: {}", e))
        })?;
        Ok(handlers.get(handler_type).cloned())
    }

    /// Look up a handler, failing with `Engine` if none is registered
    pub fn resolve(&self, handler_type: &str) -> Result<Arc<dyn JobHandler>> {
        self.get(handler_type)?.ok_or_else(|| {
            ScheduleError::Engine(format!(
                "No handler registered for type '{}'",
                handler_type
            ))
        })
    }

    pub fn contains(&self, handler_type: &str) -> Result<bool> {
        Ok(self.get(handler_type)?.is_some())
    }

    /// Registered handler types, sorted
    pub fn handler_types(&self) -> Result<Vec<String>> {
        let handlers = self.handlers.read().map_err(|e| {
            ScheduleError::Engine(format!("Handler registry lock poisoned: {}", e))
        })?;
        let mut types: Vec<String> = handlers.keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    /// Remove a handler; returns whether it was registered
    pub fn unregister(&self, handler_type: &str) -> Result<bool> {
        let mut handlers = self.handlers.write().map_err(|e| {
            ScheduleError::Engine(format!("Handler registry lock poisoned: {}", e))
        })?;
        Ok(handlers.remove(handler_type).is_some())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_types", &self.handler_types().unwrap_or_default())
            .finish()
    }
}
