use std::cmp::Ordering;

use jiff::{Timestamp, civil::Date};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    events::{Event, EventBus},
    models::{
        add_days,
        project::{Project, ProjectStatus, percentage},
        store::Store,
    },
    services::{LookupError, SortOrder, resolve_project},
    storage::{Storage, StorageError},
    validation::ValidationErrors,
};

#[derive(Debug, Error)]
pub enum CreateProjectError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateProjectParameters {
    pub name: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: f64,
    pub status: ProjectStatus,
}

pub fn create_project(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: CreateProjectParameters,
) -> Result<Project, CreateProjectError> {
    let now = Timestamp::now();
    let project = Project {
        id: Uuid::new_v4(),
        name: parameters.name.trim().to_string(),
        description: parameters.description.trim().to_string(),
        start_date: parameters.start_date.trim().to_string(),
        end_date: parameters.end_date.trim().to_string(),
        budget: parameters.budget,
        status: parameters.status,
        created_at: now,
        updated_at: now,
    };

    project.validate()?;

    store.projects.push(project.clone());
    storage.save(store)?;

    events.publish(Event::ProjectCreated(project.clone()));

    Ok(project)
}

#[derive(Debug, Error)]
pub enum UpdateProjectError {
    #[error("Project {0}")]
    Lookup(#[from] LookupError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Default)]
pub struct UpdateProjectParameters {
    pub project: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<f64>,
    pub status: Option<ProjectStatus>,
}

pub fn update_project(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: UpdateProjectParameters,
) -> Result<Project, UpdateProjectError> {
    let mut updated = resolve_project(store, &parameters.project)?.clone();

    if let Some(name) = parameters.name {
        updated.name = name.trim().to_string();
    }
    if let Some(description) = parameters.description {
        updated.description = description.trim().to_string();
    }
    if let Some(start_date) = parameters.start_date {
        updated.start_date = start_date.trim().to_string();
    }
    if let Some(end_date) = parameters.end_date {
        updated.end_date = end_date.trim().to_string();
    }
    if let Some(budget) = parameters.budget {
        updated.budget = budget;
    }
    if let Some(status) = parameters.status {
        updated.status = status;
    }
    updated.updated_at = Timestamp::now();

    // Validate the merged record so a partial update can't break start < end
    updated.validate()?;

    if let Some(project) = store.get_project_mut(updated.id) {
        *project = updated.clone();
    }
    storage.save(store)?;

    events.publish(Event::ProjectUpdated(updated.clone()));

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteProjectError {
    #[error("Project {0}")]
    Lookup(#[from] LookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteProjectParameters {
    pub project: String,
}

pub struct DeleteProjectResult {
    pub project: Project,
    pub cascaded_tasks_count: usize,
}

pub fn delete_project(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: DeleteProjectParameters,
) -> Result<DeleteProjectResult, DeleteProjectError> {
    let project = resolve_project(store, &parameters.project)?.clone();

    // Cascade: tasks of the project go with it, along with their timers
    let task_ids: Vec<Uuid> = store.get_tasks_for_project(project.id).map(|t| t.id).collect();
    store.tasks.retain(|t| t.project_id != project.id);
    store.active_timers.retain(|timer| !task_ids.contains(&timer.task_id));
    store.projects.retain(|p| p.id != project.id);

    storage.save(store)?;

    events.publish(Event::ProjectDeleted {
        id: project.id,
        cascaded_tasks: task_ids.len(),
    });

    Ok(DeleteProjectResult {
        project,
        cascaded_tasks_count: task_ids.len(),
    })
}

/// Criteria for `filter_projects`. Unset fields match everything.
#[derive(Debug, Default, Clone)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    /// End date no later than this many days from today
    pub deadline_within_days: Option<i64>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project, today: Date) -> bool {
        if self.status.is_some_and(|status| project.status != status) {
            return false;
        }
        if let Some(days) = self.deadline_within_days {
            let within = match (project.end(), add_days(today, days)) {
                (Ok(end), Some(limit)) => end <= limit,
                _ => false,
            };
            if !within {
                return false;
            }
        }
        if self.budget_min.is_some_and(|min| project.budget < min) {
            return false;
        }
        if self.budget_max.is_some_and(|max| project.budget > max) {
            return false;
        }
        true
    }
}

pub fn filter_projects<'a>(store: &'a Store, filter: &ProjectFilter, today: Date) -> Vec<&'a Project> {
    store
        .projects
        .iter()
        .filter(|p| filter.matches(p, today))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProjectSortKey {
    Name,
    Start,
    End,
    Budget,
    Status,
    #[default]
    Created,
}

/// Stable sort. Malformed dates sort after well-formed ones in ascending order.
pub fn sort_projects(projects: &mut [&Project], key: ProjectSortKey, order: SortOrder) {
    projects.sort_by(|a, b| {
        let ordering = match key {
            ProjectSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            ProjectSortKey::Start => compare_dates(a.start().ok(), b.start().ok()),
            ProjectSortKey::End => compare_dates(a.end().ok(), b.end().ok()),
            ProjectSortKey::Budget => a.budget.total_cmp(&b.budget),
            ProjectSortKey::Status => a.status.label().cmp(b.status.label()),
            ProjectSortKey::Created => a.created_at.cmp(&b.created_at),
        };
        order.apply(ordering)
    });
}

pub(crate) fn compare_dates(a: Option<Date>, b: Option<Date>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive match on name or description
pub fn search_projects<'a>(store: &'a Store, query: &str) -> Vec<&'a Project> {
    let needle = query.trim().to_lowercase();
    store
        .projects
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectStats {
    pub total: usize,
    pub by_status: Vec<(ProjectStatus, usize)>,
    pub overdue: usize,
    pub due_soon: usize,
    pub total_budget: f64,
    pub average_progress: u8,
}

/// `due_soon_days` is the look-ahead for the due-soon count. Completed
/// projects count towards neither overdue nor due soon.
pub fn project_stats(store: &Store, today: Date, due_soon_days: i64) -> ProjectStats {
    let by_status = ProjectStatus::ALL
        .iter()
        .map(|status| {
            let count = store.projects.iter().filter(|p| p.status == *status).count();
            (*status, count)
        })
        .collect();

    let mut overdue = 0;
    let mut due_soon = 0;
    let mut progress_sum = 0usize;

    for project in &store.projects {
        if !project.is_completed() {
            match project.remaining_days(today) {
                Ok(days) if days < 0 => overdue += 1,
                Ok(days) if days <= due_soon_days => due_soon += 1,
                _ => {}
            }
        }
        progress_sum += usize::from(project.calculate_progress(store.get_tasks_for_project(project.id)));
    }

    let average_progress = if store.projects.is_empty() {
        0
    } else {
        (progress_sum as f64 / store.projects.len() as f64).round() as u8
    };

    ProjectStats {
        total: store.projects.len(),
        by_status,
        overdue,
        due_soon,
        total_budget: store.projects.iter().map(|p| p.budget).sum(),
        average_progress,
    }
}

/// Share of completed tasks in a project, for display next to a project row
pub fn project_progress(store: &Store, project_id: Uuid) -> u8 {
    let (total, completed) = store
        .get_tasks_for_project(project_id)
        .fold((0, 0), |(t, c), task| (t + 1, c + usize::from(task.is_completed())));
    percentage(completed, total)
}
