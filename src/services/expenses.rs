use std::collections::BTreeMap;

use jiff::{Timestamp, civil::Date};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    events::{Event, EventBus},
    models::{expense::Expense, store::Store},
    services::{LookupError, SortOrder, projects::compare_dates, resolve_expense, resolve_project},
    storage::{Storage, StorageError},
    validation::ValidationErrors,
};

#[derive(Debug, Error)]
pub enum AddExpenseError {
    #[error("Project {0}")]
    Project(#[from] LookupError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddExpenseParameters {
    pub project: String,
    pub date: String,
    pub amount: f64,
    pub item: String,
    pub memo: String,
}

pub fn add_expense(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: AddExpenseParameters,
) -> Result<Expense, AddExpenseError> {
    let project_id = resolve_project(store, &parameters.project)?.id;

    let expense = Expense {
        id: Uuid::new_v4(),
        project_id,
        date: parameters.date.trim().to_string(),
        amount: parameters.amount,
        item: parameters.item.trim().to_string(),
        memo: parameters.memo.trim().to_string(),
        created_at: Timestamp::now(),
    };

    expense.validate()?;

    store.expenses.push(expense.clone());
    storage.save(store)?;

    events.publish(Event::ExpenseCreated(expense.clone()));

    Ok(expense)
}

#[derive(Debug, Error)]
pub enum UpdateExpenseError {
    #[error("Expense {0}")]
    Lookup(#[from] LookupError),

    #[error("Project {0}")]
    Project(LookupError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Default)]
pub struct UpdateExpenseParameters {
    pub expense: String,
    pub project: Option<String>,
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub item: Option<String>,
    pub memo: Option<String>,
}

pub fn update_expense(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: UpdateExpenseParameters,
) -> Result<Expense, UpdateExpenseError> {
    let mut updated = resolve_expense(store, &parameters.expense)?.clone();

    if let Some(project) = parameters.project {
        updated.project_id = resolve_project(store, &project)
            .map_err(UpdateExpenseError::Project)?
            .id;
    }
    if let Some(date) = parameters.date {
        updated.date = date.trim().to_string();
    }
    if let Some(amount) = parameters.amount {
        updated.amount = amount;
    }
    if let Some(item) = parameters.item {
        updated.item = item.trim().to_string();
    }
    if let Some(memo) = parameters.memo {
        updated.memo = memo.trim().to_string();
    }

    updated.validate()?;

    if let Some(expense) = store.get_expense_mut(updated.id) {
        *expense = updated.clone();
    }
    storage.save(store)?;

    events.publish(Event::ExpenseUpdated(updated.clone()));

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteExpenseError {
    #[error("Expense {0}")]
    Lookup(#[from] LookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteExpenseParameters {
    pub expense: String,
}

pub fn delete_expense(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: DeleteExpenseParameters,
) -> Result<Expense, DeleteExpenseError> {
    let expense = resolve_expense(store, &parameters.expense)?.clone();

    store.expenses.retain(|e| e.id != expense.id);
    storage.save(store)?;

    events.publish(Event::ExpenseDeleted { id: expense.id });

    Ok(expense)
}

#[derive(Debug, Default, Clone)]
pub struct ExpenseFilter {
    pub project_id: Option<Uuid>,
    /// Calendar month as (year, month)
    pub month: Option<(i16, i8)>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Case-insensitive fragment of the item label
    pub item: Option<String>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if self.project_id.is_some_and(|id| expense.project_id != id) {
            return false;
        }
        if let Some((year, month)) = self.month {
            if !expense.is_in_month(year, month) {
                return false;
            }
        }
        if self.from.is_some() || self.to.is_some() {
            let Ok(day) = expense.day() else {
                return false;
            };
            if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
                return false;
            }
        }
        if self.min_amount.is_some_and(|min| expense.amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| expense.amount > max) {
            return false;
        }
        if let Some(item) = &self.item {
            if !expense.item.to_lowercase().contains(&item.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

pub fn filter_expenses<'a>(store: &'a Store, filter: &ExpenseFilter) -> Vec<&'a Expense> {
    store.expenses.iter().filter(|e| filter.matches(e)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExpenseSortKey {
    #[default]
    Date,
    Amount,
    Item,
    Created,
}

pub fn sort_expenses(expenses: &mut [&Expense], key: ExpenseSortKey, order: SortOrder) {
    expenses.sort_by(|a, b| {
        let ordering = match key {
            ExpenseSortKey::Date => compare_dates(a.day().ok(), b.day().ok()),
            ExpenseSortKey::Amount => a.amount.total_cmp(&b.amount),
            ExpenseSortKey::Item => a.item.to_lowercase().cmp(&b.item.to_lowercase()),
            ExpenseSortKey::Created => a.created_at.cmp(&b.created_at),
        };
        order.apply(ordering)
    });
}

pub fn search_expenses<'a>(store: &'a Store, query: &str) -> Vec<&'a Expense> {
    let needle = query.trim().to_lowercase();
    store
        .expenses
        .iter()
        .filter(|e| e.item.to_lowercase().contains(&needle) || e.memo.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseStats {
    pub total: f64,
    pub count: usize,
    pub average: f64,
    /// Totals per project, largest first
    pub by_project: Vec<(Uuid, f64)>,
    /// Totals per `YYYY-MM`, oldest first
    pub by_month: Vec<(String, f64)>,
}

pub fn expense_stats<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> ExpenseStats {
    let mut total = 0.0;
    let mut count = 0;
    let mut by_project: Vec<(Uuid, f64)> = Vec::new();
    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();

    for expense in expenses {
        total += expense.amount;
        count += 1;

        match by_project.iter_mut().find(|(id, _)| *id == expense.project_id) {
            Some((_, sum)) => *sum += expense.amount,
            None => by_project.push((expense.project_id, expense.amount)),
        }
        *by_month.entry(expense.month_key()).or_insert(0.0) += expense.amount;
    }

    by_project.sort_by(|a, b| b.1.total_cmp(&a.1));

    ExpenseStats {
        total,
        count,
        average: if count > 0 { total / count as f64 } else { 0.0 },
        by_project,
        by_month: by_month.into_iter().collect(),
    }
}

/// Sum of a project's expenses
pub fn project_expense_total(store: &Store, project_id: Uuid) -> f64 {
    store.get_expenses_for_project(project_id).map(|e| e.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::project::Project, storage::memory::MemoryStorage};
    use jiff::civil::date;

    fn seeded() -> (Store, MemoryStorage, EventBus) {
        let mut store = Store {
            projects: vec![
                Project {
                    id: Uuid::new_v4(),
                    name: String::from("Website"),
                    ..Project::default()
                },
                Project {
                    id: Uuid::new_v4(),
                    name: String::from("Mobile app"),
                    ..Project::default()
                },
            ],
            ..Store::default()
        };
        let storage = MemoryStorage::new();
        let mut events = EventBus::new();
        for (project, date, amount, item) in [
            ("website", "2025-01-15", 300.0, "Hosting"),
            ("website", "2025-02-03", 1200.0, "Design agency"),
            ("mobile", "2025-02-20", 99.0, "Developer account"),
        ] {
            add_expense(
                &mut store,
                &storage,
                &mut events,
                AddExpenseParameters {
                    project: project.to_string(),
                    date: date.to_string(),
                    amount,
                    item: item.to_string(),
                    memo: String::new(),
                },
            )
            .unwrap();
        }
        (store, storage, events)
    }

    #[test]
    fn test_add_expense_rejects_non_positive_amount() {
        let (mut store, storage, mut events) = seeded();

        let result = add_expense(
            &mut store,
            &storage,
            &mut events,
            AddExpenseParameters {
                project: String::from("website"),
                date: String::from("2025-03-01"),
                amount: 0.0,
                item: String::from("Refund"),
                memo: String::new(),
            },
        );

        match result {
            Err(AddExpenseError::Validation(errors)) => {
                assert_eq!(errors.to_string(), "Amount must be greater than 0")
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
        assert_eq!(store.expenses.len(), 3);
    }

    #[test]
    fn test_update_and_delete_expense() {
        let (mut store, storage, mut events) = seeded();

        let updated = update_expense(
            &mut store,
            &storage,
            &mut events,
            UpdateExpenseParameters {
                expense: String::from("hosting"),
                amount: Some(350.0),
                memo: Some(String::from("annual plan")),
                ..UpdateExpenseParameters::default()
            },
        )
        .unwrap();
        assert_eq!(updated.amount, 350.0);

        delete_expense(
            &mut store,
            &storage,
            &mut events,
            DeleteExpenseParameters {
                expense: updated.id.to_string(),
            },
        )
        .unwrap();
        assert_eq!(store.expenses.len(), 2);
        assert_eq!(search_expenses(&store, "annual").len(), 0);
    }

    #[test]
    fn test_filter_by_project_and_month() {
        let (store, _, _) = seeded();
        let website = store.projects[0].id;

        let filter = ExpenseFilter {
            project_id: Some(website),
            month: Some((2025, 2)),
            ..ExpenseFilter::default()
        };
        let found = filter_expenses(&store, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item, "Design agency");

        let range = ExpenseFilter {
            from: Some(date(2025, 2, 1)),
            to: Some(date(2025, 2, 28)),
            min_amount: Some(100.0),
            ..ExpenseFilter::default()
        };
        assert_eq!(filter_expenses(&store, &range).len(), 1);
    }

    #[test]
    fn test_sort_expenses() {
        let (store, _, _) = seeded();
        let mut expenses: Vec<&Expense> = store.expenses.iter().collect();

        sort_expenses(&mut expenses, ExpenseSortKey::Date, SortOrder::Desc);
        assert_eq!(expenses[0].item, "Developer account");

        sort_expenses(&mut expenses, ExpenseSortKey::Amount, SortOrder::Asc);
        assert_eq!(expenses[0].amount, 99.0);
    }

    #[test]
    fn test_expense_stats() {
        let (store, _, _) = seeded();
        let website = store.projects[0].id;

        let stats = expense_stats(&store.expenses);

        assert_eq!(stats.total, 1599.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 533.0);
        assert_eq!(stats.by_project[0], (website, 1500.0));
        assert_eq!(
            stats.by_month,
            vec![(String::from("2025-01"), 300.0), (String::from("2025-02"), 1299.0)]
        );
        assert_eq!(project_expense_total(&store, website), 1500.0);
    }
}
