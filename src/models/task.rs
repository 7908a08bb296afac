use clap::ValueEnum;
use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{InvalidDate, days_between, parse_date},
    validation::{ValidationErrors, Validator},
};

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// UUID to identify the task
    pub id: Uuid,
    /// The project this task belongs to. Not enforced on load.
    pub project_id: Uuid,
    /// Title of the task
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    /// Due date (YYYY-MM-DD)
    pub due_date: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub actual_hours: f64,
    #[serde(default)]
    pub status: TaskStatus,
    /// Tasks that must be finished before this one. May reference missing tasks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// When the task was completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Priority::Low => "success",
            Priority::Medium => "warning",
            Priority::High => "error",
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TaskStatus::Pending => "gray",
            TaskStatus::InProgress => "info",
            TaskStatus::Completed => "success",
        }
    }
}

impl Task {
    pub fn due(&self) -> Result<Date, InvalidDate> {
        parse_date("dueDate", &self.due_date)
    }

    pub fn remaining_days(&self, today: Date) -> Result<i64, InvalidDate> {
        Ok(days_between(today, self.due()?))
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// High priority and still open
    pub fn is_critical(&self) -> bool {
        self.priority == Priority::High && !self.is_completed()
    }

    /// The due date is in the past and the task is still open
    pub fn is_overdue(&self, today: Date) -> bool {
        match self.due() {
            Ok(due) => due < today && !self.is_completed(),
            Err(_) => false,
        }
    }

    pub fn is_due_soon(&self, today: Date) -> bool {
        match self.remaining_days(today) {
            Ok(days) => (0..=3).contains(&days) && !self.is_completed(),
            Err(_) => false,
        }
    }

    pub fn hours_difference(&self) -> f64 {
        self.actual_hours - self.estimated_hours
    }

    /// Actual hours as a percentage of the estimate, 0 without an estimate
    pub fn hours_efficiency(&self) -> u32 {
        if self.estimated_hours <= 0.0 {
            return 0;
        }
        ((self.actual_hours / self.estimated_hours) * 100.0).round() as u32
    }

    pub fn due_date_text(&self, today: Date) -> String {
        if self.due_date.trim().is_empty() {
            return String::from("No due date");
        }
        let Ok(days) = self.remaining_days(today) else {
            return self.due_date.clone();
        };

        if self.is_overdue(today) {
            format!("{} days ago (overdue)", days.abs())
        } else {
            match days {
                0 => String::from("Today"),
                1 => String::from("Tomorrow"),
                2..=7 => format!("In {days} days"),
                _ => self.due_date.clone(),
            }
        }
    }

    pub fn complete(&mut self, actual_hours: Option<f64>, now: Timestamp) {
        self.status = TaskStatus::Completed;
        if let Some(hours) = actual_hours {
            self.actual_hours = hours;
        }
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();

        if v.required("name", "Task name", &self.name) {
            v.max_length("name", "Task name", &self.name, 100);
        }
        v.max_length("description", "Description", &self.description, 500);
        if self.project_id.is_nil() {
            v.add("projectId", "Project is required");
        }
        v.date("dueDate", "Due date", &self.due_date);
        v.min_value("estimatedHours", "Estimated hours", self.estimated_hours, 0.0);
        v.min_value("actualHours", "Actual hours", self.actual_hours, 0.0);

        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn task(due: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: String::from("Write copy"),
            due_date: due.to_string(),
            estimated_hours: 10.0,
            ..Task::default()
        }
    }

    #[test]
    fn test_overdue_excludes_the_due_date_itself() {
        let t = task("2025-03-10");
        assert!(!t.is_overdue(date(2025, 3, 10)));
        assert!(t.is_overdue(date(2025, 3, 11)));
    }

    #[test]
    fn test_completed_task_is_neither_overdue_nor_critical() {
        let mut t = Task {
            priority: Priority::High,
            ..task("2025-03-10")
        };
        assert!(t.is_critical());

        t.complete(Some(12.0), Timestamp::UNIX_EPOCH);
        assert!(!t.is_critical());
        assert!(!t.is_overdue(date(2025, 4, 1)));
        assert_eq!(t.actual_hours, 12.0);
        assert_eq!(t.completed_at, Some(Timestamp::UNIX_EPOCH));
    }

    #[test]
    fn test_hours_efficiency() {
        let mut t = task("2025-03-10");
        t.actual_hours = 15.0;
        assert_eq!(t.hours_efficiency(), 150);
        assert_eq!(t.hours_difference(), 5.0);

        t.estimated_hours = 0.0;
        assert_eq!(t.hours_efficiency(), 0);
    }

    #[test]
    fn test_due_date_text() {
        let t = task("2025-03-10");
        assert_eq!(t.due_date_text(date(2025, 3, 10)), "Today");
        assert_eq!(t.due_date_text(date(2025, 3, 9)), "Tomorrow");
        assert_eq!(t.due_date_text(date(2025, 3, 5)), "In 5 days");
        assert_eq!(t.due_date_text(date(2025, 2, 1)), "2025-03-10");
        assert_eq!(t.due_date_text(date(2025, 3, 12)), "2 days ago (overdue)");
    }

    #[test]
    fn test_validate() {
        assert!(task("2025-03-10").validate().is_ok());

        let bad = Task {
            project_id: Uuid::nil(),
            estimated_hours: -1.0,
            ..task("")
        };
        let err = bad.validate().unwrap_err();
        assert_eq!(
            err.fields().collect::<Vec<_>>(),
            vec!["projectId", "dueDate", "estimatedHours"]
        );
    }

    #[test]
    fn test_dependencies_are_optional_in_json() {
        let json = r#"{
            "id": "6f1c1c4e-5d7e-4c52-9a53-0d2c8f1f3a10",
            "projectId": "0b7a4f7e-8a42-4d8e-9a4c-2f6e2f0c9d11",
            "name": "Legacy task",
            "dueDate": "2025-03-10",
            "status": "in-progress",
            "priority": "high",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        }"#;
        let t: Task = serde_json::from_str(json).unwrap();
        assert!(t.dependencies.is_empty());
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.priority, Priority::High);
    }
}
