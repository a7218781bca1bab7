//! Operations exposed to the web layer
//!
//! Each endpoint is a command struct whose fields are its parameters. A command
//! implements [`Operation`] to describe itself and [`Execute`] to run against a
//! [`crate::BoardManager`]. Mutating commands return
//! [`ExecutionResult::Logged`] so the [`OperationProcessor`] can record them in
//! the activity log; reads return [`ExecutionResult::Unlogged`].

use crate::error::{BoardError, Result};
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tracing target for the activity log
pub const ACTIVITY_TARGET: &str = "taskboard::activity";

/// Describes a command
pub trait Operation {
    /// Action performed, e.g. "move"
    fn verb(&self) -> &'static str;

    /// Entity acted upon, e.g. "task"
    fn noun(&self) -> &'static str;

    /// One-line human description
    fn description(&self) -> &'static str;

    /// Canonical op string, e.g. "move task"
    fn op_string(&self) -> String {
        format!("{} {}", self.verb(), self.noun())
    }

    /// User the command acts on behalf of
    fn actor(&self) -> Option<&UserId> {
        None
    }
}

/// Run a command against a context
#[async_trait]
pub trait Execute<C: Send + Sync, E>: Operation + Send + Sync {
    async fn execute(&self, ctx: &C) -> ExecutionResult<Value, E>;
}

/// Result of executing an operation
pub enum ExecutionResult<T, E> {
    /// Succeeded and changed state
    Logged { value: T, log_entry: LogEntry },
    /// Succeeded without side effects
    Unlogged { value: T },
    /// Failed, optionally with a log entry
    Failed {
        error: E,
        log_entry: Option<LogEntry>,
    },
}

impl<T, E> ExecutionResult<T, E> {
    /// Extract the result (Ok or Err)
    pub fn into_result(self) -> std::result::Result<T, E> {
        match self {
            Self::Logged { value, .. } | Self::Unlogged { value } => Ok(value),
            Self::Failed { error, .. } => Err(error),
        }
    }

    /// Get the value and log entry separately
    pub fn split(self) -> (std::result::Result<T, E>, Option<LogEntry>) {
        match self {
            Self::Logged { value, log_entry } => (Ok(value), Some(log_entry)),
            Self::Unlogged { value } => (Ok(value), None),
            Self::Failed { error, log_entry } => (Err(error), log_entry),
        }
    }

    pub fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Logged { .. }
                | Self::Failed {
                    log_entry: Some(_),
                    ..
                }
        )
    }
}

/// One executed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ULID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Canonical op string (e.g. "add task")
    pub op: String,
    /// The command's parameters
    pub input: Value,
    /// The result value, or `{"error": ...}`
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub duration_ms: u64,
}

impl LogEntry {
    pub fn new(
        op: impl Into<String>,
        input: Value,
        output: Value,
        actor: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            op: op.into(),
            input,
            output,
            actor,
            duration_ms,
        }
    }

    /// Whether the logged operation failed
    pub fn is_failure(&self) -> bool {
        self.output.get("error").is_some()
    }
}

/// Wrap the outcome of a mutating command
pub(crate) fn logged<O>(op: &O, started: Instant, result: Result<Value>) -> ExecutionResult<Value, BoardError>
where
    O: Operation + Serialize,
{
    let duration_ms = started.elapsed().as_millis() as u64;
    let input = serde_json::to_value(op).unwrap_or(Value::Null);
    let actor = op.actor().map(|a| a.to_string());

    match result {
        Ok(value) => ExecutionResult::Logged {
            log_entry: LogEntry::new(op.op_string(), input, value.clone(), actor, duration_ms),
            value,
        },
        Err(error) => {
            let output = serde_json::json!({
                "error": error.to_string(),
                "kind": error.kind(),
            });
            ExecutionResult::Failed {
                log_entry: Some(LogEntry::new(op.op_string(), input, output, actor, duration_ms)),
                error,
            }
        }
    }
}

/// Wrap the outcome of a read-only command
pub(crate) fn unlogged(result: Result<Value>) -> ExecutionResult<Value, BoardError> {
    match result {
        Ok(value) => ExecutionResult::Unlogged { value },
        Err(error) => ExecutionResult::Failed {
            error,
            log_entry: None,
        },
    }
}

/// Runs commands and records the activity log
#[derive(Debug)]
pub struct OperationProcessor {
    actor: Option<String>,
    capacity: usize,
    recent: Mutex<VecDeque<LogEntry>>,
}

impl Default for OperationProcessor {
    fn default() -> Self {
        Self {
            actor: None,
            capacity: Self::DEFAULT_CAPACITY,
            recent: Mutex::new(VecDeque::new()),
        }
    }
}

impl OperationProcessor {
    /// Entries kept in memory by default
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute entries without an actor of their own to `actor`
    pub fn with_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::default()
        }
    }

    /// Keep at most `capacity` recent entries
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Execute a command, logging it if it mutated state
    pub async fn process<O, C>(&self, op: &O, ctx: &C) -> Result<Value>
    where
        O: Execute<C, BoardError>,
        C: Send + Sync,
    {
        debug!(op = %op.op_string(), "{}", op.description());
        let (result, log_entry) = op.execute(ctx).await.split();
        if let Some(mut entry) = log_entry {
            if entry.actor.is_none() {
                entry.actor = self.actor.clone();
            }
            self.record(entry);
        }
        result
    }

    fn record(&self, entry: LogEntry) {
        info!(
            target: ACTIVITY_TARGET,
            id = %entry.id,
            op = %entry.op,
            actor = entry.actor.as_deref().unwrap_or("-"),
            duration_ms = entry.duration_ms,
            failed = entry.is_failure(),
            "{}",
            entry.output
        );

        match self.recent.lock() {
            Ok(mut recent) => {
                recent.push_front(entry);
                recent.truncate(self.capacity);
            }
            Err(_) => warn!("activity log lock poisoned, entry dropped"),
        }
    }

    /// Recorded entries, newest first
    pub fn recent(&self) -> Vec<LogEntry> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }
}
