use jiff::Timestamp;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    events::{Event, EventBus},
    models::{
        store::Store,
        time_entry::{ActiveTimer, TimeEntry, TimerState, whole_minutes},
    },
    services::{LookupError, resolve_task, resolve_time_entry},
    storage::{Storage, StorageError},
};

/// Identifies a task's timer. `at` is the instant the action happened.
pub struct TimerParameters {
    pub task: String,
    pub at: Timestamp,
}

#[derive(Debug, Error)]
pub enum StartTimerError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("A timer is already running for '{0}'")]
    AlreadyActive(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn start_timer(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: TimerParameters,
) -> Result<ActiveTimer, StartTimerError> {
    let task = resolve_task(store, &parameters.task)?;
    let (task_id, task_name) = (task.id, task.name.clone());

    if store.get_timer(task_id).is_some() {
        return Err(StartTimerError::AlreadyActive(task_name));
    }

    let timer = ActiveTimer::new(task_id, parameters.at);
    store.active_timers.push(timer.clone());
    storage.save(store)?;

    events.publish(Event::TimerStarted { task_id });

    Ok(timer)
}

#[derive(Debug, Error)]
pub enum PauseTimerError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("No timer is running for '{0}'")]
    NoActiveTimer(String),

    #[error("The timer for '{0}' is already paused")]
    AlreadyPaused(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn pause_timer(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: TimerParameters,
) -> Result<ActiveTimer, PauseTimerError> {
    let task = resolve_task(store, &parameters.task)?;
    let (task_id, task_name) = (task.id, task.name.clone());

    let timer = store
        .get_timer_mut(task_id)
        .ok_or_else(|| PauseTimerError::NoActiveTimer(task_name.clone()))?;
    if timer.state() == TimerState::Paused {
        return Err(PauseTimerError::AlreadyPaused(task_name));
    }
    timer.pause(parameters.at);
    let timer = timer.clone();

    storage.save(store)?;

    events.publish(Event::TimerPaused { task_id });

    Ok(timer)
}

#[derive(Debug, Error)]
pub enum ResumeTimerError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("No timer is running for '{0}'")]
    NoActiveTimer(String),

    #[error("The timer for '{0}' is not paused")]
    NotPaused(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn resume_timer(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: TimerParameters,
) -> Result<ActiveTimer, ResumeTimerError> {
    let task = resolve_task(store, &parameters.task)?;
    let (task_id, task_name) = (task.id, task.name.clone());

    let timer = store
        .get_timer_mut(task_id)
        .ok_or_else(|| ResumeTimerError::NoActiveTimer(task_name.clone()))?;
    if timer.state() != TimerState::Paused {
        return Err(ResumeTimerError::NotPaused(task_name));
    }
    timer.resume(parameters.at);
    let timer = timer.clone();

    storage.save(store)?;

    events.publish(Event::TimerResumed { task_id });

    Ok(timer)
}

#[derive(Debug, Error)]
pub enum StopTimerError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("No timer is running for '{0}'")]
    NoActiveTimer(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Turns the timer into a time entry. A paused timer ends at its pause instant.
pub fn stop_timer(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: TimerParameters,
) -> Result<TimeEntry, StopTimerError> {
    let task = resolve_task(store, &parameters.task)?;
    let (task_id, task_name) = (task.id, task.name.clone());

    let timer = store
        .get_timer(task_id)
        .cloned()
        .ok_or(StopTimerError::NoActiveTimer(task_name))?;

    let end_time = timer.paused_at.unwrap_or(parameters.at);
    let entry = TimeEntry {
        id: Uuid::new_v4(),
        task_id,
        start_time: timer.started_at,
        end_time,
        duration: timer.elapsed_minutes(parameters.at),
        created_at: parameters.at,
        updated_at: None,
    };

    store.active_timers.retain(|t| t.task_id != task_id);
    store.time_entries.push(entry.clone());
    storage.save(store)?;

    events.publish(Event::TimerStopped(entry.clone()));

    Ok(entry)
}

/// The task of the only active timer, if exactly one exists
pub fn single_active_timer(store: &Store) -> Option<Uuid> {
    match store.active_timers.as_slice() {
        [timer] => Some(timer.task_id),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerStatus {
    pub task_id: Uuid,
    pub task_name: String,
    pub state: TimerState,
    pub elapsed_minutes: i64,
}

/// Active timers oldest first. Timers of deleted tasks show the task id.
pub fn timer_status(store: &Store, now: Timestamp) -> Vec<TimerStatus> {
    let mut timers: Vec<&ActiveTimer> = store.active_timers.iter().collect();
    timers.sort_by_key(|t| t.started_at);
    timers
        .into_iter()
        .map(|timer| TimerStatus {
            task_id: timer.task_id,
            task_name: store
                .get_task(timer.task_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| timer.task_id.to_string()),
            state: timer.state(),
            elapsed_minutes: timer.elapsed_minutes(now),
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum EditTimeEntryError {
    #[error("Time entry {0}")]
    Lookup(#[from] LookupError),

    #[error("Task {0}")]
    Task(LookupError),

    #[error("End time must not be before the start time")]
    EndBeforeStart,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct EditTimeEntryParameters {
    pub entry: String,
    pub task: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub at: Timestamp,
}

/// Duration is recomputed whenever either bound changes
pub fn edit_time_entry(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: EditTimeEntryParameters,
) -> Result<TimeEntry, EditTimeEntryError> {
    let mut entry = resolve_time_entry(store, &parameters.entry)?.clone();

    if let Some(task) = parameters.task {
        entry.task_id = resolve_task(store, &task).map_err(EditTimeEntryError::Task)?.id;
    }
    if parameters.start_time.is_some() || parameters.end_time.is_some() {
        entry.start_time = parameters.start_time.unwrap_or(entry.start_time);
        entry.end_time = parameters.end_time.unwrap_or(entry.end_time);
        if entry.end_time < entry.start_time {
            return Err(EditTimeEntryError::EndBeforeStart);
        }
        entry.duration = whole_minutes(entry.end_time.duration_since(entry.start_time));
    }
    entry.updated_at = Some(parameters.at);

    if let Some(stored) = store.time_entries.iter_mut().find(|e| e.id == entry.id) {
        *stored = entry.clone();
    }
    storage.save(store)?;

    events.publish(Event::TimeEntryUpdated(entry.clone()));

    Ok(entry)
}

#[derive(Debug, Error)]
pub enum DeleteTimeEntryError {
    #[error("Time entry {0}")]
    Lookup(#[from] LookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn delete_time_entry(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    entry: &str,
) -> Result<TimeEntry, DeleteTimeEntryError> {
    let entry = resolve_time_entry(store, entry)?.clone();

    store.time_entries.retain(|e| e.id != entry.id);
    storage.save(store)?;

    events.publish(Event::TimeEntryDeleted { id: entry.id });

    Ok(entry)
}
