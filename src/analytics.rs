//! Derived metrics over the store: progress prediction, efficiency, risk,
//! health, budget trends and productivity.
//!
//! Everything here is a pure read. Metrics are recomputed on every call from
//! a [`DataSource`] and nothing is cached.

use jiff::civil::Date;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    InvalidDate, expense::Expense, project::Project, store::Store, task::Task,
    time_entry::TimeEntry,
};

pub mod budget;
pub mod efficiency;
pub mod health;
pub mod productivity;
pub mod progress;
pub mod risk;
pub mod suggestions;

/// Read-only view of the data the analytics engine works on
pub trait DataSource {
    fn projects(&self) -> &[Project];
    fn tasks(&self) -> &[Task];
    fn expenses(&self) -> &[Expense];

    /// Logged time. Sources without time tracking report none.
    fn time_entries(&self) -> &[TimeEntry] {
        &[]
    }

    fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects().iter().find(|p| p.id == id)
    }

    fn project_tasks(&self, project_id: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks().iter().filter(move |t| t.project_id == project_id)
    }

    fn project_expenses(&self, project_id: Uuid) -> impl Iterator<Item = &Expense> {
        self.expenses().iter().filter(move |e| e.project_id == project_id)
    }
}

impl DataSource for Store {
    fn projects(&self) -> &[Project] {
        &self.projects
    }

    fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    fn time_entries(&self) -> &[TimeEntry] {
        &self.time_entries
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("{0}")]
    MalformedDate(#[from] InvalidDate),

    #[error("Project '{0}' does not end after it starts")]
    EmptySchedule(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

/// Computes metrics as of `today`
pub struct Analytics<'a, D: DataSource> {
    source: &'a D,
    today: Date,
}

impl<'a, D: DataSource> Analytics<'a, D> {
    pub fn new(source: &'a D, today: Date) -> Self {
        Self { source, today }
    }

    pub fn source(&self) -> &'a D {
        self.source
    }

    pub fn today(&self) -> Date {
        self.today
    }

    fn project(&self, project_id: Uuid) -> Result<&'a Project, AnalyticsError> {
        self.source
            .project(project_id)
            .ok_or(AnalyticsError::ProjectNotFound(project_id))
    }

    /// Sum of all expenses booked on the project
    pub fn total_expense(&self, project_id: Uuid) -> f64 {
        self.source.project_expenses(project_id).map(|e| e.amount).sum()
    }

    /// Expenses as a percentage of budget, 0 when there is no budget
    pub fn budget_usage(&self, project: &Project) -> f64 {
        if project.budget > 0.0 {
            self.total_expense(project.id) * 100.0 / project.budget
        } else {
            0.0
        }
    }
}

/// Logged minutes per task
pub(crate) fn logged_minutes(entries: &[TimeEntry], task_id: Uuid) -> i64 {
    entries
        .iter()
        .filter(|e| e.task_id == task_id)
        .map(|e| e.duration)
        .sum()
}


#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::*;

    #[test]
    fn test_store_is_a_data_source() {
        let mut store = Store::default();
        let id = project(&mut store, "Website", "2025-01-01", "2025-06-30", 1000.0);
        expense(&mut store, id, "2025-02-01", 250.0);
        expense(&mut store, Uuid::new_v4(), "2025-02-01", 99.0);

        let analytics = Analytics::new(&store, today());

        assert_eq!(analytics.total_expense(id), 250.0);
        assert_eq!(analytics.budget_usage(&store.projects[0]), 25.0);
        assert!(matches!(
            analytics.project(Uuid::new_v4()),
            Err(AnalyticsError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_zero_budget_means_zero_usage() {
        let mut store = Store::default();
        let id = project(&mut store, "Internal", "2025-01-01", "2025-06-30", 0.0);
        expense(&mut store, id, "2025-02-01", 250.0);

        let analytics = Analytics::new(&store, today());

        assert_eq!(analytics.budget_usage(&store.projects[0]), 0.0);
    }
}
