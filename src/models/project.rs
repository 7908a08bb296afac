use clap::ValueEnum;
use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{InvalidDate, days_between, parse_date, task::Task},
    validation::{ValidationErrors, Validator},
};

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// UUID of the project
    pub id: Uuid,
    /// Name of the project
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// First day of the project (YYYY-MM-DD)
    pub start_date: String,
    /// Deadline of the project (YYYY-MM-DD)
    pub end_date: String,
    /// Declared budget, currency-less
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [
        ProjectStatus::Planned,
        ProjectStatus::InProgress,
        ProjectStatus::Completed,
        ProjectStatus::OnHold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProjectStatus::Planned => "Planned",
            ProjectStatus::InProgress => "In progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On hold",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ProjectStatus::Planned => "warning",
            ProjectStatus::InProgress => "info",
            ProjectStatus::Completed => "success",
            ProjectStatus::OnHold => "error",
        }
    }
}

impl Project {
    pub fn start(&self) -> Result<Date, InvalidDate> {
        parse_date("startDate", &self.start_date)
    }

    pub fn end(&self) -> Result<Date, InvalidDate> {
        parse_date("endDate", &self.end_date)
    }

    /// Calendar days left until the end date (negative once past)
    pub fn remaining_days(&self, today: Date) -> Result<i64, InvalidDate> {
        Ok(days_between(today, self.end()?))
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProjectStatus::Completed
    }

    pub fn is_overdue(&self, today: Date) -> bool {
        match self.end() {
            Ok(end) => end < today && !self.is_completed(),
            Err(_) => false,
        }
    }

    /// Ends within the next three days and is still open
    pub fn is_due_soon(&self, today: Date) -> bool {
        match self.remaining_days(today) {
            Ok(days) => (0..=3).contains(&days) && !self.is_completed(),
            Err(_) => false,
        }
    }

    /// Percentage of completed tasks, 0 when there are none
    pub fn calculate_progress<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> u8 {
        let (total, completed) = tasks.into_iter().fold((0usize, 0usize), |(t, c), task| {
            (t + 1, c + usize::from(task.is_completed()))
        });
        percentage(completed, total)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();

        if v.required("name", "Project name", &self.name) {
            v.max_length("name", "Project name", &self.name, 100);
        }
        v.max_length("description", "Description", &self.description, 500);

        let start = v.date("startDate", "Start date", &self.start_date);
        let end = v.date("endDate", "End date", &self.end_date);
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                v.add("startDate", "Start date must be before the end date");
            }
        }

        v.min_value("budget", "Budget", self.budget, 0.0);

        v.finish()
    }
}

pub(crate) fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskStatus;
    use jiff::civil::date;

    fn project(start: &str, end: &str) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: String::from("Website relaunch"),
            start_date: start.to_string(),
            end_date: end.to_string(),
            budget: 1000.0,
            ..Project::default()
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_project() {
        assert!(project("2025-01-01", "2025-06-30").validate().is_ok());
    }

    #[test]
    fn test_validate_requires_start_before_end() {
        let err = project("2025-06-30", "2025-06-30").validate().unwrap_err();
        assert_eq!(err.to_string(), "Start date must be before the end date");
    }

    #[test]
    fn test_validate_collects_all_violations_in_order() {
        let p = Project {
            name: String::new(),
            budget: -5.0,
            ..project("nope", "2025-06-30")
        };
        let err = p.validate().unwrap_err();
        assert_eq!(
            err.fields().collect::<Vec<_>>(),
            vec!["name", "startDate", "budget"]
        );
    }

    #[test]
    fn test_overdue_and_due_soon() {
        let p = project("2025-01-01", "2025-03-10");
        assert!(!p.is_overdue(date(2025, 3, 10)));
        assert!(p.is_overdue(date(2025, 3, 11)));
        assert!(p.is_due_soon(date(2025, 3, 7)));
        assert!(!p.is_due_soon(date(2025, 3, 6)));

        let done = Project {
            status: ProjectStatus::Completed,
            ..p
        };
        assert!(!done.is_overdue(date(2025, 3, 11)));
        assert!(!done.is_due_soon(date(2025, 3, 8)));
    }

    #[test]
    fn test_malformed_end_date_is_never_overdue() {
        let p = project("2025-01-01", "31/12/2025");
        assert!(!p.is_overdue(date(2030, 1, 1)));
        assert!(p.remaining_days(date(2030, 1, 1)).is_err());
    }

    #[test]
    fn test_calculate_progress() {
        let p = project("2025-01-01", "2025-06-30");
        let tasks = vec![
            Task {
                status: TaskStatus::Completed,
                ..Task::default()
            },
            Task::default(),
            Task::default(),
        ];
        assert_eq!(p.calculate_progress(&tasks), 33);
        assert_eq!(p.calculate_progress(&Vec::<Task>::new()), 0);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&ProjectStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(ProjectStatus::OnHold.color(), "error");
    }
}
