use crate::db::models::{DayOfWeek, Subject, Task, WeeklySchedule};
use crate::db::{KeyValueStore, StoreError, SCHEDULE_KEY, TASKS_KEY};
use crate::store::PersistedValue;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TaskTrackError {
    #[error("task text must not be empty")]
    EmptyTask,
    #[error("subject name must not be empty")]
    EmptySubject,
    #[error("task not found: {0}")]
    UnknownTask(String),
    #[error("subject {subject_id} not found on {day:?}")]
    UnknownSubject { day: DayOfWeek, subject_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// To-do list plus the weekly study schedule.
pub struct TaskTrack {
    tasks: PersistedValue<Vec<Task>>,
    schedule: PersistedValue<WeeklySchedule>,
}

impl TaskTrack {
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            tasks: PersistedValue::new(backend.clone(), TASKS_KEY, Vec::new()),
            schedule: PersistedValue::new(backend, SCHEDULE_KEY, WeeklySchedule::default()),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.read()
    }

    /// Case-insensitive match on task text.
    pub fn search_tasks(&self, query: &str) -> Vec<Task> {
        let query = query.to_lowercase();
        self.tasks.with(|all| {
            all.iter()
                .filter(|t| t.text.to_lowercase().contains(&query))
                .cloned()
                .collect()
        })
    }

    pub fn add_task(&self, text: &str) -> Result<Task, TaskTrackError> {
        if text.trim().is_empty() {
            return Err(TaskTrackError::EmptyTask);
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed: false,
        };
        self.tasks.update(|all| all.push(task.clone()))?;
        Ok(task)
    }

    /// Flips completion and returns the new state.
    pub fn toggle_task(&self, id: &str) -> Result<bool, TaskTrackError> {
        self.tasks.try_update(|all| {
            let task = all
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| TaskTrackError::UnknownTask(id.to_string()))?;
            task.completed = !task.completed;
            Ok(task.completed)
        })
    }

    pub fn delete_task(&self, id: &str) -> Result<(), TaskTrackError> {
        self.tasks.try_update(|all| {
            let before = all.len();
            all.retain(|t| t.id != id);
            if all.len() == before {
                return Err(TaskTrackError::UnknownTask(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn schedule(&self) -> WeeklySchedule {
        self.schedule.read()
    }

    pub fn add_subject(&self, day: DayOfWeek, name: &str) -> Result<Subject, TaskTrackError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TaskTrackError::EmptySubject);
        }
        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.schedule
            .update(|week| week.subjects_mut(day).push(subject.clone()))?;
        tracing::debug!(day = day.name(), subject = %subject.name, "subject scheduled");
        Ok(subject)
    }

    pub fn remove_subject(&self, day: DayOfWeek, subject_id: &str) -> Result<(), TaskTrackError> {
        self.schedule.try_update(|week| {
            let subjects = week.subjects_mut(day);
            let before = subjects.len();
            subjects.retain(|s| s.id != subject_id);
            if subjects.len() == before {
                return Err(TaskTrackError::UnknownSubject {
                    day,
                    subject_id: subject_id.to_string(),
                });
            }
            Ok(())
        })
    }
}
