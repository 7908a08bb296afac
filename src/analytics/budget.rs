use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
};

use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{Analytics, DataSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTrend {
    /// `YYYY-MM`
    pub month: String,
    pub total_expense: f64,
    pub project_count: usize,
    pub expense_count: usize,
    pub average_expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBudget {
    pub project_id: Uuid,
    pub project_name: String,
    pub budget: f64,
    pub expenses: f64,
    pub remaining: f64,
    /// Rounded percentage of the budget spent
    pub usage_rate: u32,
    pub is_over_budget: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetAlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    pub level: BudgetAlertLevel,
    pub project_id: Uuid,
    pub project_name: String,
    pub usage_rate: u32,
}

impl BudgetAlert {
    pub fn message(&self) -> String {
        match self.level {
            BudgetAlertLevel::Critical => format!("Budget exceeded ({}%)", self.usage_rate),
            BudgetAlertLevel::Warning => format!("Budget usage is high ({}%)", self.usage_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    pub name: String,
    pub total: f64,
    pub count: usize,
}

pub const UNCATEGORIZED: &str = "Other";

impl<D: DataSource> Analytics<'_, D> {
    /// Monthly spending, oldest month first
    pub fn budget_trends(&self) -> Vec<BudgetTrend> {
        #[derive(Default)]
        struct Bucket {
            total: f64,
            count: usize,
            projects: HashSet<Uuid>,
        }

        let mut months: BTreeMap<String, Bucket> = BTreeMap::new();
        for expense in self.source.expenses() {
            let bucket = months.entry(expense.month_key()).or_default();
            bucket.total += expense.amount;
            bucket.count += 1;
            bucket.projects.insert(expense.project_id);
        }

        months
            .into_iter()
            .map(|(month, bucket)| BudgetTrend {
                month,
                total_expense: bucket.total,
                project_count: bucket.projects.len(),
                expense_count: bucket.count,
                average_expense: (bucket.total / bucket.count as f64).round(),
            })
            .collect()
    }

    pub fn project_budgets(&self) -> Vec<ProjectBudget> {
        self.source
            .projects()
            .iter()
            .map(|project| {
                let expenses = self.total_expense(project.id);
                ProjectBudget {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    budget: project.budget,
                    expenses,
                    remaining: project.budget - expenses,
                    usage_rate: self.budget_usage(project).round() as u32,
                    is_over_budget: expenses > project.budget,
                }
            })
            .collect()
    }

    /// Projects at or above 80% of their budget
    pub fn budget_alerts(&self) -> Vec<BudgetAlert> {
        self.source
            .projects()
            .iter()
            .filter_map(|project| {
                let usage = self.budget_usage(project);
                let level = if usage >= 100.0 {
                    BudgetAlertLevel::Critical
                } else if usage >= 80.0 {
                    BudgetAlertLevel::Warning
                } else {
                    return None;
                };
                Some(BudgetAlert {
                    level,
                    project_id: project.id,
                    project_name: project.name.clone(),
                    usage_rate: usage.round() as u32,
                })
            })
            .collect()
    }

    /// Spending grouped by item label, largest first
    pub fn expense_categories(&self) -> Vec<ExpenseCategory> {
        let mut categories: Vec<ExpenseCategory> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for expense in self.source.expenses() {
            let name = match expense.item.trim() {
                "" => UNCATEGORIZED,
                item => item,
            };
            let slot = *index.entry(name.to_string()).or_insert_with(|| {
                categories.push(ExpenseCategory {
                    name: name.to_string(),
                    total: 0.0,
                    count: 0,
                });
                categories.len() - 1
            });
            categories[slot].total += expense.amount;
            categories[slot].count += 1;
        }

        categories.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
        categories
    }
}
