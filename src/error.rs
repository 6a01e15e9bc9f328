//! Error types for a3s-schedule

use thiserror::Error;

/// Errors that can occur while describing, translating, or registering schedules
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A required field is missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// An operation would break a structural invariant (e.g. moving a trigger to another job)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A referenced job or trigger does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A trigger references a calendar the engine does not know about
    #[error("Calendar '{0}' has not been added to the scheduler")]
    MissingCalendar(String),

    /// Malformed cron expression or inconsistent interval parameters
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Failure surfaced by the scheduler engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// A job handler failed while executing
    #[error("Handler '{handler_type}' failed: {reason}")]
    Handler {
        handler_type: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse failure
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScheduleError {
    /// Whether this error was raised before the engine was touched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ScheduleError::Validation(_)
                | ScheduleError::InvariantViolation(_)
                | ScheduleError::NotFound(_)
                | ScheduleError::MissingCalendar(_)
                | ScheduleError::InvalidSchedule(_)
        )
    }
}

/// Result type alias for schedule operations
pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScheduleError::MissingCalendar("holidays".to_string());
        assert_eq!(
            err.to_string(),
            "Calendar 'holidays' has not been added to the scheduler"
        );

        let err = ScheduleError::Handler {
            handler_type: "report".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Handler 'report' failed: disk full");
    }

    #[test]
    fn test_precondition_classification() {
        assert!(ScheduleError::Validation("x".into()).is_precondition());
        assert!(ScheduleError::InvariantViolation("x".into()).is_precondition());
        assert!(ScheduleError::MissingCalendar("x".into()).is_precondition());
        assert!(!ScheduleError::Engine("x".into()).is_precondition());
        assert!(!ScheduleError::Config("x".into()).is_precondition());
    }
}
