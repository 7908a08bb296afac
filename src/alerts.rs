use jiff::civil::Date;
use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{
    Analytics, DataSource,
    budget::{BudgetAlert, BudgetAlertLevel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

fn deadline_level(days_left: i64, warn_within: i64) -> Option<AlertLevel> {
    if days_left <= 0 {
        Some(AlertLevel::Error)
    } else if days_left <= warn_within {
        Some(AlertLevel::Warning)
    } else {
        None
    }
}

fn deadline_message(kind: &str, name: &str, days_left: i64) -> String {
    if days_left <= 0 {
        format!("{kind} '{name}' is past its deadline")
    } else {
        format!("{kind} '{name}' is due in {days_left} day(s)")
    }
}

/// Deadline and budget warnings for everything still open, as of `today`.
/// Records with unreadable dates are skipped.
pub fn check_all<D: DataSource>(source: &D, today: Date) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for project in source.projects().iter().filter(|p| !p.is_completed()) {
        let Ok(days_left) = project.remaining_days(today) else {
            continue;
        };
        if let Some(level) = deadline_level(days_left, 3) {
            alerts.push(Alert {
                level,
                message: deadline_message("Project", &project.name, days_left),
                project_id: Some(project.id),
                task_id: None,
            });
        }
    }

    for task in source.tasks().iter().filter(|t| !t.is_completed()) {
        let Ok(days_left) = task.remaining_days(today) else {
            continue;
        };
        if let Some(level) = deadline_level(days_left, 1) {
            alerts.push(Alert {
                level,
                message: deadline_message("Task", &task.name, days_left),
                project_id: Some(task.project_id),
                task_id: Some(task.id),
            });
        }
    }

    let analytics = Analytics::new(source, today);
    alerts.extend(analytics.budget_alerts().into_iter().map(|alert: BudgetAlert| Alert {
        level: match alert.level {
            BudgetAlertLevel::Critical => AlertLevel::Error,
            BudgetAlertLevel::Warning => AlertLevel::Warning,
        },
        message: format!("Project '{}': {}", alert.project_name, alert.message()),
        project_id: Some(alert.project_id),
        task_id: None,
    }));

    alerts
}
