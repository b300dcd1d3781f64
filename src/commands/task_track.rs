use super::AppError;
use crate::db::models::{DayOfWeek, Subject, Task, WeeklySchedule};
use crate::AppState;

pub fn list_tasks(state: &AppState, query: Option<&str>) -> Vec<Task> {
    match query {
        Some(q) => state.task_track.search_tasks(q),
        None => state.task_track.tasks(),
    }
}

pub fn add_task(state: &AppState, text: &str) -> Result<Task, AppError> {
    Ok(state.task_track.add_task(text)?)
}

pub fn toggle_task(state: &AppState, id: &str) -> Result<bool, AppError> {
    Ok(state.task_track.toggle_task(id)?)
}

pub fn delete_task(state: &AppState, id: &str) -> Result<(), AppError> {
    Ok(state.task_track.delete_task(id)?)
}

pub fn get_schedule(state: &AppState) -> WeeklySchedule {
    state.task_track.schedule()
}

pub fn add_subject(state: &AppState, day: DayOfWeek, name: &str) -> Result<Subject, AppError> {
    Ok(state.task_track.add_subject(day, name)?)
}

pub fn remove_subject(state: &AppState, day: DayOfWeek, subject_id: &str) -> Result<(), AppError> {
    Ok(state.task_track.remove_subject(day, subject_id)?)
}
