use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    analytics::{Analytics, DataSource, logged_minutes, risk::round2},
    models::{task::Task, time_entry::TimeEntry},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProductivity {
    pub project_id: Uuid,
    pub project_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// 0.0-1.0
    pub completion_rate: f64,
    /// Mean whole days from creation to completion of finished tasks
    pub average_task_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTimeEfficiency {
    pub project_id: Uuid,
    pub project_name: String,
    pub completed_tasks: usize,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    /// Estimate as a percentage of logged time, 0 without logged time
    pub efficiency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPerformance {
    pub task_id: Uuid,
    pub task_name: String,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub efficiency: u32,
    pub is_on_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivitySummary {
    pub completed_tasks: usize,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub efficiency: u32,
    pub average_hours_per_task: f64,
}

fn logged_hours(entries: &[TimeEntry], task_id: Uuid) -> f64 {
    logged_minutes(entries, task_id) as f64 / 60.0
}

fn ratio_percent(estimated: f64, actual: f64) -> u32 {
    if estimated > 0.0 && actual > 0.0 {
        (estimated / actual * 100.0).round() as u32
    } else {
        0
    }
}

pub fn average_task_duration<'t>(tasks: impl IntoIterator<Item = &'t Task>) -> i64 {
    let (count, seconds) = tasks
        .into_iter()
        .filter(|t| t.is_completed())
        .filter_map(|t| t.completed_at.map(|done| done.duration_since(t.created_at)))
        .fold((0i64, 0i64), |(count, total), span| {
            (count + 1, total + span.as_secs())
        });

    if count == 0 {
        return 0;
    }
    (seconds as f64 / (count * 86_400) as f64).round() as i64
}

/// Mean estimate/actual ratio over completed tasks that have both an estimate
/// and logged time
pub fn mean_estimate_ratio(tasks: &[Task], entries: &[TimeEntry]) -> Option<f64> {
    let ratios: Vec<f64> = tasks
        .iter()
        .filter(|t| t.is_completed() && t.estimated_hours > 0.0)
        .filter_map(|t| {
            let actual = logged_hours(entries, t.id);
            (actual > 0.0).then(|| t.estimated_hours / actual)
        })
        .collect();

    if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }
}

impl<D: DataSource> Analytics<'_, D> {
    /// Projects by completion rate, highest first
    pub fn team_productivity(&self) -> Vec<ProjectProductivity> {
        let mut rows: Vec<ProjectProductivity> = self
            .source
            .projects()
            .iter()
            .map(|project| {
                let tasks: Vec<&Task> = self.source.project_tasks(project.id).collect();
                let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();
                let completion_rate = if tasks.is_empty() {
                    0.0
                } else {
                    completed_tasks as f64 / tasks.len() as f64
                };

                ProjectProductivity {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    total_tasks: tasks.len(),
                    completed_tasks,
                    completion_rate,
                    average_task_duration: average_task_duration(tasks.iter().copied()),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.completion_rate
                .partial_cmp(&a.completion_rate)
                .unwrap_or(Ordering::Equal)
        });
        rows
    }

    /// Logged time against estimates for completed tasks, per project
    pub fn project_time_efficiency(&self) -> Vec<ProjectTimeEfficiency> {
        let entries = self.source.time_entries();
        self.source
            .projects()
            .iter()
            .map(|project| {
                let (mut completed, mut estimated, mut actual) = (0, 0.0, 0.0);
                for task in self.source.project_tasks(project.id).filter(|t| t.is_completed()) {
                    completed += 1;
                    estimated += task.estimated_hours;
                    actual += logged_hours(entries, task.id);
                }

                ProjectTimeEfficiency {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    completed_tasks: completed,
                    estimated_hours: estimated,
                    actual_hours: round2(actual),
                    efficiency: ratio_percent(estimated, actual),
                }
            })
            .collect()
    }

    /// Estimated tasks with their logged time
    pub fn task_performance(&self) -> Vec<TaskPerformance> {
        let entries = self.source.time_entries();
        self.source
            .tasks()
            .iter()
            .filter(|t| t.estimated_hours > 0.0)
            .map(|task| {
                let actual = logged_hours(entries, task.id);
                TaskPerformance {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    estimated_hours: task.estimated_hours,
                    actual_hours: round2(actual),
                    efficiency: ratio_percent(task.estimated_hours, actual),
                    is_on_time: actual <= task.estimated_hours,
                }
            })
            .collect()
    }

    pub fn productivity_summary(&self) -> ProductivitySummary {
        let entries = self.source.time_entries();
        let (mut completed, mut estimated, mut actual) = (0usize, 0.0, 0.0);
        for task in self.source.tasks().iter().filter(|t| t.is_completed()) {
            completed += 1;
            estimated += task.estimated_hours;
            actual += logged_hours(entries, task.id);
        }

        ProductivitySummary {
            completed_tasks: completed,
            estimated_hours: estimated,
            actual_hours: round2(actual),
            efficiency: ratio_percent(estimated, actual),
            average_hours_per_task: if completed > 0 {
                round2(actual / completed as f64)
            } else {
                0.0
            },
        }
    }
}
