use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    analytics::{Analytics, AnalyticsError, DataSource, RiskLevel, logged_minutes},
    models::{task::Task, task::TaskStatus, time_entry::TimeEntry},
};

/// Points awarded per risk factor, summed into a 0-85 score
pub fn risk_score(critical_tasks: usize, overdue_tasks: usize, remaining_days: i64) -> u32 {
    let mut score = 0;

    if critical_tasks > 3 {
        score += 30;
    } else if critical_tasks > 1 {
        score += 20;
    }

    if overdue_tasks > 0 {
        score += 25;
    }

    if remaining_days <= 7 {
        score += 30;
    } else if remaining_days <= 14 {
        score += 20;
    }

    score
}

pub fn risk_level_from_score(score: u32) -> RiskLevel {
    match score {
        60.. => RiskLevel::High,
        30.. => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub project_id: Uuid,
    pub critical_tasks: usize,
    pub overdue_tasks: usize,
    pub remaining_days: i64,
    pub score: u32,
    pub level: RiskLevel,
}

impl RiskAssessment {
    /// Stand-in for a project whose schedule can't be read
    pub fn maximal(project_id: Uuid) -> Self {
        Self {
            project_id,
            critical_tasks: 0,
            overdue_tasks: 0,
            remaining_days: 0,
            score: risk_score(usize::MAX, usize::MAX, 0),
            level: RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyKind {
    /// Listed the critical task as a prerequisite
    Explicit,
    /// Open and due after the critical task
    DueLater,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    pub task_id: Uuid,
    pub task_name: String,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub task_name: String,
    pub dependents: Vec<Dependent>,
}

/// Tasks that can't finish before each critical task does
pub fn find_task_dependencies<'t>(
    critical: impl IntoIterator<Item = &'t Task>,
    all: &[&'t Task],
) -> Vec<TaskDependency> {
    critical
        .into_iter()
        .map(|critical| {
            let critical_due = critical.due().ok();
            let dependents = all
                .iter()
                .filter(|t| t.id != critical.id && !t.is_completed())
                .filter_map(|t| {
                    let kind = if t.dependencies.contains(&critical.id) {
                        DependencyKind::Explicit
                    } else {
                        match (critical_due, t.due().ok()) {
                            (Some(critical_due), Some(due)) if due > critical_due => {
                                DependencyKind::DueLater
                            }
                            _ => return None,
                        }
                    };
                    Some(Dependent {
                        task_id: t.id,
                        task_name: t.name.clone(),
                        kind,
                    })
                })
                .collect();

            TaskDependency {
                task_id: critical.id,
                task_name: critical.name.clone(),
                dependents,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDependencies {
    pub project_id: Uuid,
    pub project_name: String,
    pub risk: RiskAssessment,
    pub dependencies: Vec<TaskDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub task_id: Uuid,
    pub task_name: String,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub delay_hours: f64,
}

/// In-progress tasks that have used more than one and a half times their estimate
pub fn find_bottlenecks(tasks: &[Task], entries: &[TimeEntry]) -> Vec<Bottleneck> {
    let mut bottlenecks: Vec<Bottleneck> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress && t.estimated_hours > 0.0)
        .filter_map(|t| {
            let actual = logged_minutes(entries, t.id) as f64 / 60.0;
            (actual > t.estimated_hours * 1.5).then(|| Bottleneck {
                task_id: t.id,
                task_name: t.name.clone(),
                estimated_hours: t.estimated_hours,
                actual_hours: round2(actual),
                delay_hours: round2(actual - t.estimated_hours),
            })
        })
        .collect();

    bottlenecks.sort_by(|a, b| {
        b.delay_hours
            .partial_cmp(&a.delay_hours)
            .unwrap_or(Ordering::Equal)
    });
    bottlenecks
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl<D: DataSource> Analytics<'_, D> {
    pub fn assess_risk(&self, project_id: Uuid) -> Result<RiskAssessment, AnalyticsError> {
        let project = self.project(project_id)?;
        let remaining_days = project.remaining_days(self.today)?;

        let (mut critical_tasks, mut overdue_tasks) = (0, 0);
        for task in self.source.project_tasks(project_id) {
            critical_tasks += usize::from(task.is_critical());
            overdue_tasks += usize::from(task.is_overdue(self.today));
        }

        let score = risk_score(critical_tasks, overdue_tasks, remaining_days);
        Ok(RiskAssessment {
            project_id,
            critical_tasks,
            overdue_tasks,
            remaining_days,
            score,
            level: risk_level_from_score(score),
        })
    }

    pub fn assess_risk_or_maximal(&self, project_id: Uuid) -> RiskAssessment {
        self.assess_risk(project_id).unwrap_or_else(|e| {
            tracing::warn!(project = %project_id, error = %e, "risk assessment degraded");
            RiskAssessment::maximal(project_id)
        })
    }

    /// Projects with open high-priority work, riskiest first
    pub fn project_dependencies(&self) -> Vec<ProjectDependencies> {
        let mut rows: Vec<ProjectDependencies> = self
            .source
            .projects()
            .iter()
            .filter_map(|project| {
                let tasks: Vec<&Task> = self.source.project_tasks(project.id).collect();
                let critical: Vec<&Task> = tasks.iter().copied().filter(|t| t.is_critical()).collect();
                if critical.is_empty() {
                    return None;
                }

                Some(ProjectDependencies {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    risk: self.assess_risk_or_maximal(project.id),
                    dependencies: find_task_dependencies(critical, &tasks),
                })
            })
            .collect();

        rows.sort_by(|a, b| b.risk.score.cmp(&a.risk.score));
        rows
    }

    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        find_bottlenecks(self.source.tasks(), self.source.time_entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analytics::fixtures::*,
        models::{store::Store, task::Priority},
    };
    use jiff::Timestamp;

    #[test]
    fn test_score_for_crowded_late_project() {
        let mut store = Store::default();
        // ends five days after today
        let id = project(&mut store, "Launch", "2025-01-01", "2025-03-06", 0.0);
        for _ in 0..4 {
            task(&mut store, id, Priority::High, TaskStatus::Pending, "2025-03-05");
        }
        task(&mut store, id, Priority::Low, TaskStatus::InProgress, "2025-02-20");

        let risk = Analytics::new(&store, today()).assess_risk(id).unwrap();

        assert_eq!(risk.critical_tasks, 4);
        assert_eq!(risk.overdue_tasks, 1);
        assert_eq!(risk.remaining_days, 5);
        assert_eq!(risk.score, 85);
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn test_score_thresholds() {
        assert_eq!(risk_score(0, 0, 30), 0);
        assert_eq!(risk_score(1, 0, 30), 0);
        assert_eq!(risk_score(2, 0, 30), 20);
        assert_eq!(risk_score(3, 0, 30), 20);
        assert_eq!(risk_score(4, 0, 30), 30);
        assert_eq!(risk_score(0, 1, 30), 25);
        assert_eq!(risk_score(0, 0, 14), 20);
        assert_eq!(risk_score(0, 0, 7), 30);
        assert_eq!(risk_score(0, 0, -3), 30);

        assert_eq!(risk_level_from_score(29), RiskLevel::Low);
        assert_eq!(risk_level_from_score(30), RiskLevel::Medium);
        assert_eq!(risk_level_from_score(59), RiskLevel::Medium);
        assert_eq!(risk_level_from_score(60), RiskLevel::High);
    }

    #[test]
    fn test_score_is_monotonic() {
        for critical in 0..6 {
            for overdue in 0..3 {
                for remaining in [-5, 0, 7, 8, 14, 15, 60] {
                    let base = risk_score(critical, overdue, remaining);
                    assert!(risk_score(critical + 1, overdue, remaining) >= base);
                    assert!(risk_score(critical, overdue + 1, remaining) >= base);
                    assert!(risk_score(critical, overdue, remaining - 1) >= base);
                }
            }
        }
    }

    #[test]
    fn test_malformed_end_date_falls_back_to_maximal() {
        let mut store = Store::default();
        let id = project(&mut store, "Broken", "2025-01-01", "soon", 0.0);
        let analytics = Analytics::new(&store, today());

        assert!(matches!(
            analytics.assess_risk(id),
            Err(AnalyticsError::MalformedDate(_))
        ));
        let fallback = analytics.assess_risk_or_maximal(id);
        assert_eq!(fallback.level, RiskLevel::High);
        assert_eq!(fallback.score, 85);
    }

    #[test]
    fn test_dependents_are_later_or_explicit() {
        let mut store = Store::default();
        let id = project(&mut store, "Launch", "2025-01-01", "2025-06-30", 0.0);
        let critical = task(&mut store, id, Priority::High, TaskStatus::Pending, "2025-03-10");
        let later = task(&mut store, id, Priority::Low, TaskStatus::Pending, "2025-03-20");
        task(&mut store, id, Priority::Low, TaskStatus::Pending, "2025-03-05");
        task(&mut store, id, Priority::Low, TaskStatus::Completed, "2025-04-01");
        let explicit = task(&mut store, id, Priority::Low, TaskStatus::Pending, "2025-03-01");
        if let Some(t) = store.get_task_mut(explicit) {
            t.dependencies.push(critical);
        }

        let rows = Analytics::new(&store, today()).project_dependencies();

        assert_eq!(rows.len(), 1);
        let deps = &rows[0].dependencies;
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].task_id, critical);
        let found: Vec<(Uuid, DependencyKind)> =
            deps[0].dependents.iter().map(|d| (d.task_id, d.kind)).collect();
        assert_eq!(
            found,
            vec![(later, DependencyKind::DueLater), (explicit, DependencyKind::Explicit)]
        );
    }

    #[test]
    fn test_projects_ordered_by_risk() {
        let mut store = Store::default();
        let calm = project(&mut store, "Calm", "2025-01-01", "2025-12-31", 0.0);
        task(&mut store, calm, Priority::High, TaskStatus::Pending, "2025-06-01");
        let busy = project(&mut store, "Busy", "2025-01-01", "2025-03-05", 0.0);
        task(&mut store, busy, Priority::High, TaskStatus::Pending, "2025-02-01");
        let quiet = project(&mut store, "Quiet", "2025-01-01", "2025-03-05", 0.0);
        task(&mut store, quiet, Priority::Low, TaskStatus::Pending, "2025-02-01");

        let rows = Analytics::new(&store, today()).project_dependencies();

        let names: Vec<&str> = rows.iter().map(|r| r.project_name.as_str()).collect();
        assert_eq!(names, vec!["Busy", "Calm"]);
    }

    #[test]
    fn test_bottlenecks_sorted_by_delay() {
        let mut store = Store::default();
        let id = project(&mut store, "Launch", "2025-01-01", "2025-06-30", 0.0);
        let small = task(&mut store, id, Priority::Low, TaskStatus::InProgress, "2025-04-01");
        let large = task(&mut store, id, Priority::Low, TaskStatus::InProgress, "2025-04-01");
        let fine = task(&mut store, id, Priority::Low, TaskStatus::InProgress, "2025-04-01");
        let done = task(&mut store, id, Priority::Low, TaskStatus::Completed, "2025-04-01");
        for t in store.tasks.iter_mut() {
            t.estimated_hours = 2.0;
        }

        let now = Timestamp::UNIX_EPOCH;
        for (task_id, minutes) in [(small, 200), (large, 400), (fine, 150), (done, 600)] {
            store.time_entries.push(TimeEntry {
                id: Uuid::new_v4(),
                task_id,
                start_time: now,
                end_time: now,
                duration: minutes,
                created_at: now,
                updated_at: None,
            });
        }

        let found = Analytics::new(&store, today()).bottlenecks();

        let ids: Vec<Uuid> = found.iter().map(|b| b.task_id).collect();
        assert_eq!(ids, vec![large, small]);
        assert_eq!(found[0].actual_hours, 6.67);
        assert_eq!(found[0].delay_hours, 4.67);
    }
}
