use jiff::{Timestamp, civil::Date};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    events::{Event, EventBus},
    models::{
        add_days,
        store::Store,
        task::{Priority, Task, TaskStatus},
    },
    services::{LookupError, SortOrder, projects::compare_dates, resolve_project, resolve_task},
    storage::{Storage, StorageError},
    validation::ValidationErrors,
};

#[derive(Debug, Error)]
pub enum AddTaskError {
    #[error("Project {0}")]
    Project(LookupError),

    #[error("Dependency {0}")]
    Dependency(LookupError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddTaskParameters {
    pub project: String,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: String,
    pub estimated_hours: f64,
    /// References to tasks that must finish first
    pub depends_on: Vec<String>,
}

fn resolve_dependencies(store: &Store, references: &[String]) -> Result<Vec<Uuid>, LookupError> {
    let mut ids = Vec::with_capacity(references.len());
    for reference in references {
        let id = resolve_task(store, reference)?.id;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub fn add_task(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: AddTaskParameters,
) -> Result<Task, AddTaskError> {
    let project_id = resolve_project(store, &parameters.project)
        .map_err(AddTaskError::Project)?
        .id;
    let dependencies =
        resolve_dependencies(store, &parameters.depends_on).map_err(AddTaskError::Dependency)?;

    let now = Timestamp::now();
    let task = Task {
        id: Uuid::new_v4(),
        project_id,
        name: parameters.name.trim().to_string(),
        description: parameters.description.trim().to_string(),
        priority: parameters.priority,
        due_date: parameters.due_date.trim().to_string(),
        estimated_hours: parameters.estimated_hours,
        actual_hours: 0.0,
        status: TaskStatus::Pending,
        dependencies,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    task.validate()?;

    store.tasks.push(task.clone());
    storage.save(store)?;

    events.publish(Event::TaskCreated(task.clone()));

    Ok(task)
}

#[derive(Debug, Error)]
pub enum UpdateTaskError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("Project {0}")]
    Project(LookupError),

    #[error("Dependency {0}")]
    Dependency(LookupError),

    #[error("A task cannot depend on itself")]
    SelfDependency,

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Default)]
pub struct UpdateTaskParameters {
    pub task: String,
    pub project: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub status: Option<TaskStatus>,
    pub depends_on: Option<Vec<String>>,
}

pub fn update_task(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: UpdateTaskParameters,
) -> Result<Task, UpdateTaskError> {
    let mut updated = resolve_task(store, &parameters.task)?.clone();
    let now = Timestamp::now();

    if let Some(project) = parameters.project {
        updated.project_id = resolve_project(store, &project)
            .map_err(UpdateTaskError::Project)?
            .id;
    }
    if let Some(references) = parameters.depends_on {
        let dependencies =
            resolve_dependencies(store, &references).map_err(UpdateTaskError::Dependency)?;
        if dependencies.contains(&updated.id) {
            return Err(UpdateTaskError::SelfDependency);
        }
        updated.dependencies = dependencies;
    }
    if let Some(name) = parameters.name {
        updated.name = name.trim().to_string();
    }
    if let Some(description) = parameters.description {
        updated.description = description.trim().to_string();
    }
    if let Some(priority) = parameters.priority {
        updated.priority = priority;
    }
    if let Some(due_date) = parameters.due_date {
        updated.due_date = due_date.trim().to_string();
    }
    if let Some(hours) = parameters.estimated_hours {
        updated.estimated_hours = hours;
    }
    if let Some(hours) = parameters.actual_hours {
        updated.actual_hours = hours;
    }
    if let Some(status) = parameters.status {
        // Completion time tracks the status, so reopening clears it
        match (updated.is_completed(), status == TaskStatus::Completed) {
            (false, true) => updated.completed_at = Some(now),
            (true, false) => updated.completed_at = None,
            _ => {}
        }
        updated.status = status;
    }
    updated.updated_at = now;

    updated.validate()?;

    if let Some(task) = store.get_task_mut(updated.id) {
        *task = updated.clone();
    }
    storage.save(store)?;

    events.publish(Event::TaskUpdated(updated.clone()));

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum CompleteTaskError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("Task '{0}' is already completed")]
    AlreadyCompleted(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CompleteTaskParameters {
    pub task: String,
    /// Overrides the recorded hours when given
    pub actual_hours: Option<f64>,
}

pub fn complete_task(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: CompleteTaskParameters,
) -> Result<Task, CompleteTaskError> {
    let mut task = resolve_task(store, &parameters.task)?.clone();

    if task.is_completed() {
        return Err(CompleteTaskError::AlreadyCompleted(task.name));
    }

    task.complete(parameters.actual_hours, Timestamp::now());
    task.validate()?;

    if let Some(stored) = store.get_task_mut(task.id) {
        *stored = task.clone();
    }
    storage.save(store)?;

    events.publish(Event::TaskCompleted(task.clone()));

    Ok(task)
}

#[derive(Debug, Error)]
pub enum DeleteTaskError {
    #[error("Task {0}")]
    Lookup(#[from] LookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteTaskParameters {
    pub task: String,
}

/// Removes the task and any timer running on it. Logged time entries stay.
pub fn delete_task(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: DeleteTaskParameters,
) -> Result<Task, DeleteTaskError> {
    let task = resolve_task(store, &parameters.task)?.clone();

    store.tasks.retain(|t| t.id != task.id);
    store.active_timers.retain(|timer| timer.task_id != task.id);
    for other in store.tasks.iter_mut() {
        other.dependencies.retain(|id| *id != task.id);
    }

    storage.save(store)?;

    events.publish(Event::TaskDeleted { id: task.id });

    Ok(task)
}

#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// Due no later than this many days from today
    pub due_within_days: Option<i64>,
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task, today: Date) -> bool {
        if self.project_id.is_some_and(|id| task.project_id != id) {
            return false;
        }
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if let Some(days) = self.due_within_days {
            let within = match (task.due(), add_days(today, days)) {
                (Ok(due), Some(limit)) => due <= limit,
                _ => false,
            };
            if !within {
                return false;
            }
        }
        if self.completed.is_some_and(|completed| task.is_completed() != completed) {
            return false;
        }
        true
    }
}

pub fn filter_tasks<'a>(store: &'a Store, filter: &TaskFilter, today: Date) -> Vec<&'a Task> {
    store
        .tasks
        .iter()
        .filter(|t| filter.matches(t, today))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TaskSortKey {
    Name,
    Priority,
    #[default]
    Due,
    Created,
    Estimate,
}

pub fn sort_tasks(tasks: &mut [&Task], key: TaskSortKey, order: SortOrder) {
    tasks.sort_by(|a, b| {
        let ordering = match key {
            TaskSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            TaskSortKey::Priority => a.priority.cmp(&b.priority),
            TaskSortKey::Due => compare_dates(a.due().ok(), b.due().ok()),
            TaskSortKey::Created => a.created_at.cmp(&b.created_at),
            TaskSortKey::Estimate => a.estimated_hours.total_cmp(&b.estimated_hours),
        };
        order.apply(ordering)
    });
}

pub fn search_tasks<'a>(store: &'a Store, query: &str) -> Vec<&'a Task> {
    let needle = query.trim().to_lowercase();
    store
        .tasks
        .iter()
        .filter(|t| {
            t.name.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub by_status: Vec<(TaskStatus, usize)>,
    pub by_priority: Vec<(Priority, usize)>,
    pub overdue: usize,
    pub due_soon: usize,
    pub total_estimated_hours: f64,
    pub total_actual_hours: f64,
}

/// Works on any task selection, e.g. one project's tasks
pub fn task_stats<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: Date) -> TaskStats {
    let tasks: Vec<&Task> = tasks.into_iter().collect();

    TaskStats {
        total: tasks.len(),
        by_status: TaskStatus::ALL
            .iter()
            .map(|status| (*status, tasks.iter().filter(|t| t.status == *status).count()))
            .collect(),
        by_priority: Priority::ALL
            .iter()
            .map(|priority| (*priority, tasks.iter().filter(|t| t.priority == *priority).count()))
            .collect(),
        overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        due_soon: tasks
            .iter()
            .filter(|t| !t.is_overdue(today) && t.is_due_soon(today))
            .count(),
        total_estimated_hours: tasks.iter().map(|t| t.estimated_hours).sum(),
        total_actual_hours: tasks.iter().map(|t| t.actual_hours).sum(),
    }
}

/// Open tasks due between today and `days` from now, inclusive
pub fn due_soon_tasks(store: &Store, today: Date, days: i64) -> Vec<&Task> {
    let Some(limit) = add_days(today, days) else {
        return vec![];
    };
    store
        .tasks
        .iter()
        .filter(|t| !t.is_completed())
        .filter(|t| t.due().is_ok_and(|due| due >= today && due <= limit))
        .collect()
}

pub fn overdue_tasks(store: &Store, today: Date) -> Vec<&Task> {
    store.tasks.iter().filter(|t| t.is_overdue(today)).collect()
}

pub fn high_priority_tasks(store: &Store) -> Vec<&Task> {
    store.tasks.iter().filter(|t| t.is_critical()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::EventKind,
        models::project::Project,
        storage::memory::MemoryStorage,
    };
    use jiff::civil::date;
    use std::{cell::RefCell, rc::Rc};

    fn seeded() -> (Store, MemoryStorage, EventBus) {
        let store = Store {
            projects: vec![
                Project {
                    id: Uuid::new_v4(),
                    name: String::from("Website"),
                    start_date: String::from("2025-01-01"),
                    end_date: String::from("2025-06-30"),
                    ..Project::default()
                },
                Project {
                    id: Uuid::new_v4(),
                    name: String::from("Mobile app"),
                    start_date: String::from("2025-01-01"),
                    end_date: String::from("2025-06-30"),
                    ..Project::default()
                },
            ],
            ..Store::default()
        };
        (store, MemoryStorage::new(), EventBus::new())
    }

    fn add(store: &mut Store, storage: &MemoryStorage, events: &mut EventBus, project: &str, name: &str, priority: Priority, due: &str) -> Task {
        add_task(
            store,
            storage,
            events,
            AddTaskParameters {
                project: project.to_string(),
                name: name.to_string(),
                description: String::new(),
                priority,
                due_date: due.to_string(),
                estimated_hours: 4.0,
                depends_on: vec![],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_add_task_requires_existing_project() {
        let (mut store, storage, mut events) = seeded();

        let result = add_task(
            &mut store,
            &storage,
            &mut events,
            AddTaskParameters {
                project: String::from("payroll"),
                name: String::from("Draft"),
                description: String::new(),
                priority: Priority::Low,
                due_date: String::from("2025-02-01"),
                estimated_hours: 1.0,
                depends_on: vec![],
            },
        );

        assert!(matches!(result, Err(AddTaskError::Project(LookupError::NotFound(_)))));
        assert!(store.tasks.is_empty());
    }

    #[test]
    fn test_add_task_resolves_dependencies() {
        let (mut store, storage, mut events) = seeded();
        let design = add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");

        let build = add_task(
            &mut store,
            &storage,
            &mut events,
            AddTaskParameters {
                project: String::from("website"),
                name: String::from("Build"),
                description: String::new(),
                priority: Priority::Medium,
                due_date: String::from("2025-03-01"),
                estimated_hours: 10.0,
                depends_on: vec![String::from("design"), design.id.to_string()],
            },
        )
        .unwrap();

        assert_eq!(build.dependencies, vec![design.id]);
    }

    #[test]
    fn test_update_task_rejects_self_dependency() {
        let (mut store, storage, mut events) = seeded();
        add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");

        let result = update_task(
            &mut store,
            &storage,
            &mut events,
            UpdateTaskParameters {
                task: String::from("design"),
                depends_on: Some(vec![String::from("design")]),
                ..UpdateTaskParameters::default()
            },
        );

        assert!(matches!(result, Err(UpdateTaskError::SelfDependency)));
    }

    #[test]
    fn test_update_status_tracks_completion_time() {
        let (mut store, storage, mut events) = seeded();
        add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");

        let done = update_task(
            &mut store,
            &storage,
            &mut events,
            UpdateTaskParameters {
                task: String::from("design"),
                status: Some(TaskStatus::Completed),
                ..UpdateTaskParameters::default()
            },
        )
        .unwrap();
        assert!(done.completed_at.is_some());

        let reopened = update_task(
            &mut store,
            &storage,
            &mut events,
            UpdateTaskParameters {
                task: String::from("design"),
                status: Some(TaskStatus::InProgress),
                ..UpdateTaskParameters::default()
            },
        )
        .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn test_complete_task_publishes_and_rejects_twice() {
        let (mut store, storage, mut events) = seeded();
        add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");
        let completed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&completed);
        events.subscribe(EventKind::TaskCompleted, move |event| {
            if let Event::TaskCompleted(task) = event {
                sink.borrow_mut().push(task.actual_hours);
            }
        });

        let parameters = || CompleteTaskParameters {
            task: String::from("design"),
            actual_hours: Some(6.5),
        };
        let task = complete_task(&mut store, &storage, &mut events, parameters()).unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(*completed.borrow(), vec![6.5]);
        assert!(matches!(
            complete_task(&mut store, &storage, &mut events, parameters()),
            Err(CompleteTaskError::AlreadyCompleted(_))
        ));
    }

    #[test]
    fn test_delete_task_drops_references() {
        let (mut store, storage, mut events) = seeded();
        let design = add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");
        let mut build = add(&mut store, &storage, &mut events, "website", "Build", Priority::Low, "2025-03-01");
        build.dependencies = vec![design.id];
        *store.get_task_mut(build.id).unwrap() = build.clone();

        delete_task(
            &mut store,
            &storage,
            &mut events,
            DeleteTaskParameters {
                task: String::from("design"),
            },
        )
        .unwrap();

        assert_eq!(store.tasks.len(), 1);
        assert!(store.tasks[0].dependencies.is_empty());
    }

    #[test]
    fn test_filter_sort_and_queries() {
        let (mut store, storage, mut events) = seeded();
        let mobile_id = store.projects[1].id;
        add(&mut store, &storage, &mut events, "website", "Design", Priority::High, "2025-02-01");
        add(&mut store, &storage, &mut events, "website", "Copywriting", Priority::Low, "2025-02-20");
        add(&mut store, &storage, &mut events, "mobile", "API", Priority::High, "2025-02-10");
        let today = date(2025, 2, 5);

        let mobile_only = TaskFilter {
            project_id: Some(mobile_id),
            ..TaskFilter::default()
        };
        assert_eq!(filter_tasks(&store, &mobile_only, today).len(), 1);

        let high = TaskFilter {
            priority: Some(Priority::High),
            due_within_days: Some(7),
            ..TaskFilter::default()
        };
        assert_eq!(filter_tasks(&store, &high, today).len(), 2);

        let mut tasks: Vec<&Task> = store.tasks.iter().collect();
        sort_tasks(&mut tasks, TaskSortKey::Due, SortOrder::Asc);
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Design", "API", "Copywriting"]);

        sort_tasks(&mut tasks, TaskSortKey::Priority, SortOrder::Desc);
        assert_eq!(tasks[2].name, "Copywriting");

        assert_eq!(overdue_tasks(&store, today).len(), 1);
        assert_eq!(due_soon_tasks(&store, today, 7).len(), 1);
        assert_eq!(high_priority_tasks(&store).len(), 2);
        assert_eq!(search_tasks(&store, "copy").len(), 1);
    }

    #[test]
    fn test_task_stats() {
        let today = date(2025, 2, 5);
        let tasks = vec![
            Task {
                priority: Priority::High,
                due_date: String::from("2025-02-01"),
                estimated_hours: 3.0,
                actual_hours: 1.0,
                ..Task::default()
            },
            Task {
                due_date: String::from("2025-02-06"),
                estimated_hours: 2.0,
                ..Task::default()
            },
            Task {
                status: TaskStatus::Completed,
                due_date: String::from("2025-01-01"),
                actual_hours: 5.0,
                ..Task::default()
            },
        ];

        let stats = task_stats(&tasks, today);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_soon, 1);
        assert_eq!(stats.by_status[2], (TaskStatus::Completed, 1));
        assert_eq!(stats.by_priority[0], (Priority::High, 1));
        assert_eq!(stats.total_estimated_hours, 5.0);
        assert_eq!(stats.total_actual_hours, 6.0);
    }
}
