use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    expense::Expense,
    project::Project,
    settings::Settings,
    task::Task,
    time_entry::{ActiveTimer, TimeEntry},
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
    #[serde(default)]
    pub active_timers: Vec<ActiveTimer>,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            projects: vec![],
            tasks: vec![],
            expenses: vec![],
            time_entries: vec![],
            active_timers: vec![],
            settings: Settings::default(),
        }
    }
}

impl Store {
    pub fn get_project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn get_project_mut(&mut self, id: Uuid) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn get_task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn get_expense_mut(&mut self, id: Uuid) -> Option<&mut Expense> {
        self.expenses.iter_mut().find(|e| e.id == id)
    }

    pub fn get_tasks_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.project_id == project_id)
    }

    pub fn get_expenses_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &Expense> {
        self.expenses.iter().filter(move |e| e.project_id == project_id)
    }

    pub fn get_timer(&self, task_id: Uuid) -> Option<&ActiveTimer> {
        self.active_timers.iter().find(|t| t.task_id == task_id)
    }

    pub fn get_timer_mut(&mut self, task_id: Uuid) -> Option<&mut ActiveTimer> {
        self.active_timers.iter_mut().find(|t| t.task_id == task_id)
    }
}
