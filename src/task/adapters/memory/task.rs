//! In-memory repository for task lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{PipelineId, StageId, Task, TaskFilter, TaskId, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult, TaskTransaction},
};

/// Thread-safe in-memory task repository.
///
/// Transactions hold the write lock for their whole duration, so they run
/// strictly one after another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl std::fmt::Display) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by_key(Task::id);
    tasks
}

/// Transaction view over committed state plus staged writes.
struct MemoryTransaction<'a> {
    committed: &'a InMemoryTaskState,
    staged: HashMap<TaskId, Task>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(committed: &'a InMemoryTaskState) -> Self {
        Self {
            committed,
            staged: HashMap::new(),
        }
    }

    fn current(&self, id: TaskId) -> Option<&Task> {
        self.staged
            .get(&id)
            .or_else(|| self.committed.tasks.get(&id))
    }

    fn visible(&self) -> impl Iterator<Item = &Task> {
        let committed = self
            .committed
            .tasks
            .values()
            .filter(|task| !self.staged.contains_key(&task.id()));
        committed.chain(self.staged.values())
    }

    fn into_staged(self) -> HashMap<TaskId, Task> {
        self.staged
    }
}

impl TaskTransaction for MemoryTransaction<'_> {
    fn find_by_id(&mut self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        Ok(self.current(id).cloned())
    }

    fn lock_stage(
        &mut self,
        pipeline_id: PipelineId,
        stage_id: StageId,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let filter = TaskFilter::new()
            .with_pipeline(pipeline_id)
            .with_stage(stage_id);
        Ok(sorted(
            self.visible()
                .filter(|task| filter.matches(task))
                .cloned()
                .collect(),
        ))
    }

    fn pipeline_stages(&mut self, pipeline_id: PipelineId) -> TaskRepositoryResult<Vec<StageId>> {
        let mut stages: Vec<StageId> = self
            .visible()
            .filter(|task| task.pipeline_id() == pipeline_id)
            .map(Task::stage_id)
            .collect();
        stages.sort_unstable();
        stages.dedup();
        Ok(stages)
    }

    fn insert(&mut self, task: &Task) -> TaskRepositoryResult<()> {
        if self.current(task.id()).is_some() {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        self.staged.insert(task.id(), task.clone());
        Ok(())
    }

    fn save(&mut self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let stored = self
            .current(task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(TaskRepositoryError::Conflict {
                task_id: task.id(),
                expected,
            });
        }
        self.staged.insert(task.id(), task.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(sorted(
            state
                .tasks
                .values()
                .filter(|task| filter.matches(task))
                .cloned()
                .collect(),
        ))
    }

    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn TaskTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TaskRepositoryError> + Send + 'static,
    {
        let mut state = self.state.write().map_err(|err| E::from(poisoned(err)))?;
        let (result, staged) = {
            let mut transaction = MemoryTransaction::new(&state);
            let result = work(&mut transaction);
            (result, transaction.into_staged())
        };
        if result.is_ok() {
            state.tasks.extend(staged);
        }
        result
    }
}
