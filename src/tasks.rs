//! Background parse tasks.
//!
//! A submitted parse runs on its own tokio task; callers get a task id back
//! immediately and poll for the outcome. Task state lives in memory. Finished
//! tasks are kept for [`DEFAULT_TASK_RETENTION`] and pruned on the next
//! submit after that, so memory is bounded by the tasks finished within one
//! retention window plus those still running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::error::ParserError;
use crate::models::{ParseResult, TaskStatus, TaskStatusResponse};
use crate::pipeline::Orchestrator;
use crate::scrapers::listing::ListingSource;

/// How long a finished task stays queryable.
pub const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
enum TaskState {
    Pending,
    Started,
    Success(ParseResult),
    Failure(String),
}

#[derive(Debug)]
struct TaskRecord {
    state: TaskState,
    /// Set once the task reaches a terminal state.
    finished_at: Option<Instant>,
}

impl TaskRecord {
    fn running(state: TaskState) -> Self {
        Self {
            state,
            finished_at: None,
        }
    }

    fn finished(state: TaskState) -> Self {
        Self {
            state,
            finished_at: Some(Instant::now()),
        }
    }
}

/// Spawns orchestrator runs and tracks their state by id.
#[derive(Debug)]
pub struct TaskRunner<L> {
    orchestrator: Arc<Orchestrator<L>>,
    tasks: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
    retention: Duration,
}

impl<L> Clone for TaskRunner<L> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            tasks: Arc::clone(&self.tasks),
            retention: self.retention,
        }
    }
}

impl<L> TaskRunner<L>
where
    L: ListingSource + Send + Sync + 'static,
{
    pub fn new(orchestrator: Arc<Orchestrator<L>>) -> Self {
        Self::with_retention(orchestrator, DEFAULT_TASK_RETENTION)
    }

    pub fn with_retention(orchestrator: Arc<Orchestrator<L>>, retention: Duration) -> Self {
        Self {
            orchestrator,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Start a parse of `count` posts in the background and return its id.
    ///
    /// Finished tasks older than the retention window are dropped first.
    #[instrument(level = "info", skip(self))]
    pub async fn submit(&self, count: u32) -> Uuid {
        let task_id = Uuid::new_v4();
        {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|_, record| {
                record
                    .finished_at
                    .is_none_or(|at| at.elapsed() < self.retention)
            });
            let pruned = before - tasks.len();
            if pruned > 0 {
                debug!(pruned, "Pruned expired tasks");
            }
            tasks.insert(task_id, TaskRecord::running(TaskState::Pending));
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            tasks
                .write()
                .await
                .insert(task_id, TaskRecord::running(TaskState::Started));
            let state = match orchestrator.run(count as usize).await {
                Ok(batch) => {
                    info!(%task_id, parsed = batch.parsed_count, "Parse task finished");
                    TaskState::Success(batch.into())
                }
                Err(e) => {
                    error!(%task_id, error = %e, "Parse task failed");
                    TaskState::Failure(e.to_string())
                }
            };
            tasks.write().await.insert(task_id, TaskRecord::finished(state));
        });

        info!(%task_id, "Parse task submitted");
        task_id
    }

    /// Look up a task.
    ///
    /// A failed task yields [`ParserError::TaskFailed`] carrying the task's
    /// error detail; an unknown or malformed id yields
    /// [`ParserError::TaskNotFound`].
    pub async fn status(&self, task_id: &str) -> Result<TaskStatusResponse, ParserError> {
        let id = Uuid::parse_str(task_id)
            .map_err(|_| ParserError::TaskNotFound(task_id.to_string()))?;
        let state = self
            .tasks
            .read()
            .await
            .get(&id)
            .map(|record| record.state.clone())
            .ok_or_else(|| ParserError::TaskNotFound(task_id.to_string()))?;

        let (status, result) = match state {
            TaskState::Pending => (TaskStatus::Pending, None),
            TaskState::Started => (TaskStatus::Started, None),
            TaskState::Success(result) => (TaskStatus::Success, Some(result)),
            TaskState::Failure(detail) => return Err(ParserError::TaskFailed(detail)),
        };

        Ok(TaskStatusResponse {
            task_id: id.to_string(),
            status,
            result,
        })
    }
}
