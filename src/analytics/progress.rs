use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    analytics::{Analytics, AnalyticsError, DataSource, RiskLevel},
    models::{
        add_days, days_between,
        project::{ProjectStatus, percentage},
        task::{Priority, Task},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPrediction {
    pub project_id: Uuid,
    /// Completed share of tasks, 0-100
    pub current_progress: u8,
    pub remaining_days: i64,
    /// Percentage points gained per project day
    pub daily_progress: u32,
    /// Days still needed at the current pace. `None` when nothing has been
    /// completed yet and the pace is zero.
    pub predicted_days: Option<i64>,
    pub predicted_completion_date: Option<Date>,
    pub is_on_track: bool,
    pub risk_level: RiskLevel,
}

impl ProgressPrediction {
    /// Placeholder shown for projects whose prediction can't be computed
    pub fn degraded(project_id: Uuid) -> Self {
        Self {
            project_id,
            current_progress: 0,
            remaining_days: 0,
            daily_progress: 0,
            predicted_days: None,
            predicted_completion_date: None,
            is_on_track: false,
            risk_level: RiskLevel::High,
        }
    }
}

/// Tiered by how much of the needed time is left
pub fn progress_risk_level(remaining_days: i64, predicted_days: Option<i64>, completion_rate: f64) -> RiskLevel {
    let Some(predicted) = predicted_days else {
        return RiskLevel::High;
    };
    let (remaining, predicted) = (remaining_days as f64, predicted as f64);

    if remaining < predicted * 0.5 {
        RiskLevel::High
    } else if remaining < predicted * 0.8 {
        RiskLevel::Medium
    } else if completion_rate < 0.3 && remaining < predicted {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub project_name: String,
    pub status: ProjectStatus,
    pub progress: u8,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusProgress {
    pub status: ProjectStatus,
    pub count: usize,
    pub average_progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityProgress {
    pub priority: Priority,
    pub total: usize,
    pub completed: usize,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub overall: u8,
    pub by_project: Vec<ProjectProgress>,
    pub by_status: Vec<StatusProgress>,
    pub by_priority: Vec<PriorityProgress>,
    pub milestones: Vec<Milestone>,
}

/// A 25/50/75/100 % mark a project has reached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub project_id: Uuid,
    pub project_name: String,
    pub milestone: u8,
    pub progress: u8,
}

const MILESTONES: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDay {
    pub date: Date,
    pub completed_tasks: usize,
    pub new_tasks: usize,
    pub net_progress: i64,
}

fn completion_counts<'t>(tasks: impl IntoIterator<Item = &'t Task>) -> (usize, usize) {
    tasks.into_iter().fold((0, 0), |(total, completed), task| {
        (total + 1, completed + usize::from(task.is_completed()))
    })
}

impl<D: DataSource> Analytics<'_, D> {
    pub fn predict_progress(&self, project_id: Uuid) -> Result<ProgressPrediction, AnalyticsError> {
        let project = self.project(project_id)?;
        let start = project.start()?;
        let end = project.end()?;

        let total_days = days_between(start, end);
        if total_days <= 0 {
            return Err(AnalyticsError::EmptySchedule(project.name.clone()));
        }

        let (total, completed) = completion_counts(self.source.project_tasks(project_id));
        let completion_rate = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        let remaining_days = days_between(self.today, end);
        let daily_rate = completion_rate / total_days as f64;

        // (1 - rate) / (rate / total_days), rearranged to keep the division exact
        let predicted_days = if daily_rate > 0.0 {
            Some(((1.0 - completion_rate) * total_days as f64 / completion_rate).ceil() as i64)
        } else {
            None
        };
        let predicted_completion_date = predicted_days.and_then(|days| add_days(self.today, days));

        Ok(ProgressPrediction {
            project_id,
            current_progress: (completion_rate * 100.0).round() as u8,
            remaining_days,
            daily_progress: (daily_rate * 100.0).round() as u32,
            predicted_days,
            predicted_completion_date,
            is_on_track: predicted_days.is_some_and(|days| remaining_days >= days),
            risk_level: progress_risk_level(remaining_days, predicted_days, completion_rate),
        })
    }

    /// Falls back to [`ProgressPrediction::degraded`] and logs why
    pub fn predict_progress_or_degraded(&self, project_id: Uuid) -> ProgressPrediction {
        self.predict_progress(project_id).unwrap_or_else(|e| {
            tracing::warn!(project = %project_id, error = %e, "progress prediction degraded");
            ProgressPrediction::degraded(project_id)
        })
    }

    pub fn project_progress(&self, project_id: Uuid) -> u8 {
        let (total, completed) = completion_counts(self.source.project_tasks(project_id));
        percentage(completed, total)
    }

    pub fn progress_overview(&self) -> ProgressOverview {
        let by_project: Vec<ProjectProgress> = self
            .source
            .projects()
            .iter()
            .map(|project| {
                let (total, completed) = completion_counts(self.source.project_tasks(project.id));
                ProjectProgress {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    status: project.status,
                    progress: percentage(completed, total),
                    total_tasks: total,
                    completed_tasks: completed,
                    start_date: project.start_date.clone(),
                    end_date: project.end_date.clone(),
                }
            })
            .collect();

        let overall = mean_progress(by_project.iter().map(|p| p.progress));

        let by_status = ProjectStatus::ALL
            .iter()
            .map(|status| {
                let rows: Vec<u8> = by_project
                    .iter()
                    .filter(|p| p.status == *status)
                    .map(|p| p.progress)
                    .collect();
                StatusProgress {
                    status: *status,
                    count: rows.len(),
                    average_progress: mean_progress(rows.iter().copied()),
                }
            })
            .collect();

        let by_priority = Priority::ALL
            .iter()
            .map(|priority| {
                let (total, completed) = completion_counts(
                    self.source.tasks().iter().filter(|t| t.priority == *priority),
                );
                PriorityProgress {
                    priority: *priority,
                    total,
                    completed,
                    progress: percentage(completed, total),
                }
            })
            .collect();

        let milestones = by_project
            .iter()
            .filter(|p| p.total_tasks > 0)
            .flat_map(|p| {
                MILESTONES
                    .iter()
                    .filter(move |mark| p.progress >= **mark)
                    .map(move |mark| Milestone {
                        project_id: p.project_id,
                        project_name: p.project_name.clone(),
                        milestone: *mark,
                        progress: p.progress,
                    })
            })
            .collect();

        ProgressOverview {
            overall,
            by_project,
            by_status,
            by_priority,
            milestones,
        }
    }

    /// Tasks created and completed per day over the `days` days ending today
    pub fn progress_timeline(&self, days: u32, tz: &TimeZone) -> Vec<TimelineDay> {
        let local_date = |ts: Timestamp| ts.to_zoned(tz.clone()).date();

        (0..i64::from(days))
            .rev()
            .filter_map(|back| add_days(self.today, -back))
            .map(|date| {
                let completed_tasks = self
                    .source
                    .tasks()
                    .iter()
                    .filter(|t| t.is_completed() && t.completed_at.map(local_date) == Some(date))
                    .count();
                let new_tasks = self
                    .source
                    .tasks()
                    .iter()
                    .filter(|t| local_date(t.created_at) == date)
                    .count();
                TimelineDay {
                    date,
                    completed_tasks,
                    new_tasks,
                    net_progress: completed_tasks as i64 - new_tasks as i64,
                }
            })
            .collect()
    }
}

fn mean_progress(values: impl Iterator<Item = u8>) -> u8 {
    let (count, sum) = values.fold((0usize, 0usize), |(n, s), v| (n + 1, s + usize::from(v)));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u8
}
