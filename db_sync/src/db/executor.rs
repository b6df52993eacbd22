//! SQL executor
//!
//! Applies generated statements one by one. A failing statement is recorded
//! and execution moves on to the next one; nothing is retried and no
//! transaction wraps the batch.

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::error::Result;

/// Something statements can be executed against
#[async_trait]
pub trait StatementTarget: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;
}

/// Receives one event per executed statement
pub trait ExecutionLog: Send + Sync {
    fn statement_succeeded(&self, sql: &str, duration: Duration);
    fn statement_failed(&self, sql: &str, error: &str, duration: Duration);
}

/// Forwards execution events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ExecutionLog for TracingLog {
    fn statement_succeeded(&self, sql: &str, duration: Duration) {
        tracing::info!(
            sql,
            duration_ms = duration.as_secs_f64() * 1000.0,
            "Statement executed successfully"
        );
    }

    fn statement_failed(&self, sql: &str, error: &str, duration: Duration) {
        tracing::error!(
            sql,
            error,
            duration_ms = duration.as_secs_f64() * 1000.0,
            "Statement execution failed"
        );
    }
}

/// Outcome of one statement
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub statement: String,
    pub succeeded: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Counts over a list of execution results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExecutionSummary {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// The failed subset of a result list, in execution order
pub fn failed_results(results: &[ExecutionResult]) -> Vec<&ExecutionResult> {
    results.iter().filter(|r| !r.succeeded).collect()
}

/// SQL executor for running statements against the target
pub struct Executor<'a> {
    target: &'a dyn StatementTarget,
    log: &'a dyn ExecutionLog,
}

impl<'a> Executor<'a> {
    /// Create a new SQL executor
    pub fn new(target: &'a dyn StatementTarget, log: &'a dyn ExecutionLog) -> Self {
        Self { target, log }
    }

    /// Execute every statement in order, isolating failures
    pub async fn apply(&self, statements: &[String]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(statements.len());

        for statement in statements {
            results.push(self.apply_one(statement).await);
        }

        results
    }

    async fn apply_one(&self, statement: &str) -> ExecutionResult {
        let start = Instant::now();
        let outcome = self.target.execute(statement).await;
        let duration = start.elapsed();

        match outcome {
            Ok(()) => {
                self.log.statement_succeeded(statement, duration);
                ExecutionResult {
                    statement: statement.to_string(),
                    succeeded: true,
                    error: None,
                    duration,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.log.statement_failed(statement, &error, duration);
                ExecutionResult {
                    statement: statement.to_string(),
                    succeeded: false,
                    error: Some(error),
                    duration,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Fails every statement containing the marker
    struct FlakyTarget {
        marker: &'static str,
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatementTarget for FlakyTarget {
        async fn execute(&self, sql: &str) -> Result<()> {
            if sql.contains(self.marker) {
                return Err(Error::StatementExecution("Duplicate column name 'name'".to_string()));
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLog {
        events: Mutex<Vec<String>>,
    }

    impl ExecutionLog for RecordingLog {
        fn statement_succeeded(&self, sql: &str, _duration: Duration) {
            self.events.lock().unwrap().push(format!("ok {}", sql));
        }

        fn statement_failed(&self, sql: &str, error: &str, _duration: Duration) {
            self.events.lock().unwrap().push(format!("failed {}: {}", sql, error));
        }
    }

    #[tokio::test]
    async fn failure_is_recorded_and_execution_continues() {
        let target = FlakyTarget {
            marker: "ADD COLUMN `name`",
            executed: Mutex::new(Vec::new()),
        };
        let log = RecordingLog::default();
        let statements = vec![
            "ALTER TABLE `t` ADD COLUMN `age` int;".to_string(),
            "ALTER TABLE `t` ADD COLUMN `name` varchar(10);".to_string(),
            "INSERT INTO `t` (`id`) VALUES (1);".to_string(),
        ];

        let results = Executor::new(&target, &log).apply(&statements).await;

        let outcomes: Vec<bool> = results.iter().map(|r| r.succeeded).collect();
        assert_eq!(outcomes, vec![true, false, true]);
        assert!(results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("Duplicate column name"));
        assert_eq!(
            ExecutionSummary::from_results(&results),
            ExecutionSummary {
                total: 3,
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(
            *target.executed.lock().unwrap(),
            vec![statements[0].clone(), statements[2].clone()]
        );

        let failed = failed_results(&results);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].statement, statements[1]);

        let events = log.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[1].starts_with("failed ALTER TABLE `t` ADD COLUMN `name`"));
    }

    #[tokio::test]
    async fn empty_batch() {
        let target = FlakyTarget {
            marker: "never",
            executed: Mutex::new(Vec::new()),
        };
        let results = Executor::new(&target, &TracingLog).apply(&[]).await;

        assert!(results.is_empty());
        assert_eq!(
            ExecutionSummary::from_results(&results),
            ExecutionSummary {
                total: 0,
                succeeded: 0,
                failed: 0
            }
        );
    }
}
