use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{Analytics, AnalyticsError, DataSource};

/// Three equally weighted 0-100 sub-scores and their rounded mean
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyScore {
    pub project_id: Uuid,
    pub budget_usage: f64,
    pub budget_score: f64,
    pub time_score: f64,
    pub quality_score: f64,
    pub overall: u8,
}

pub fn budget_score(budget_usage_percent: f64) -> f64 {
    (100.0 - budget_usage_percent).max(0.0)
}

/// Estimate over logged hours, capped at 100. Without an estimate or
/// without logged hours there is nothing to overrun, so the score is 100.
pub fn time_score(estimated_hours: f64, actual_hours: f64) -> f64 {
    if estimated_hours <= 0.0 || actual_hours <= 0.0 {
        return 100.0;
    }
    (estimated_hours / actual_hours * 100.0).min(100.0)
}

pub fn quality_score(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

impl<D: DataSource> Analytics<'_, D> {
    pub fn efficiency(&self, project_id: Uuid) -> Result<EfficiencyScore, AnalyticsError> {
        let project = self.project(project_id)?;

        let (mut estimated, mut actual, mut total, mut completed) = (0.0, 0.0, 0, 0);
        for task in self.source.project_tasks(project_id) {
            estimated += task.estimated_hours;
            actual += task.actual_hours;
            total += 1;
            completed += usize::from(task.is_completed());
        }

        let budget_usage = self.budget_usage(project);
        let budget_score = budget_score(budget_usage);
        let time_score = time_score(estimated, actual);
        let quality_score = quality_score(completed, total);
        let overall = ((budget_score + time_score + quality_score) / 3.0).round();

        Ok(EfficiencyScore {
            project_id,
            budget_usage,
            budget_score,
            time_score,
            quality_score,
            overall: overall.clamp(0.0, 100.0) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analytics::fixtures::*,
        models::{
            store::Store,
            task::{Priority, TaskStatus},
        },
    };

    #[test]
    fn test_budget_sub_score_at_85_percent_usage() {
        let mut store = Store::default();
        let id = project(&mut store, "Website", "2025-01-01", "2025-06-30", 100_000.0);
        expense(&mut store, id, "2025-01-10", 50_000.0);
        expense(&mut store, id, "2025-02-10", 35_000.0);

        let score = Analytics::new(&store, today()).efficiency(id).unwrap();

        assert_eq!(score.budget_usage, 85.0);
        assert_eq!(score.budget_score, 15.0);
    }

    #[test]
    fn test_time_score_without_logged_hours() {
        assert_eq!(time_score(10.0, 0.0), 100.0);
        assert_eq!(time_score(10.0, 20.0), 50.0);
        assert_eq!(time_score(10.0, 5.0), 100.0);
    }

    #[test]
    fn test_time_score_without_estimate() {
        assert_eq!(time_score(0.0, 5.0), 100.0);
        assert_eq!(time_score(0.0, 0.0), 100.0);
    }

    #[test]
    fn test_unestimated_project_with_logged_hours() {
        let mut store = Store::default();
        let id = project(&mut store, "Launch", "2025-01-01", "2025-12-31", 0.0);
        let done = task(&mut store, id, Priority::Low, TaskStatus::Completed, "2025-02-01");
        if let Some(t) = store.get_task_mut(done) {
            t.actual_hours = 12.0;
        }

        let score = Analytics::new(&store, today()).efficiency(id).unwrap();

        // budget 100, time 100, quality 100
        assert_eq!(score.time_score, 100.0);
        assert_eq!(score.overall, 100);
    }

    #[test]
    fn test_quality_sub_score() {
        for (completed, total) in [(0, 0), (0, 3), (1, 3), (2, 3), (3, 3), (7, 9)] {
            let expected = if total == 0 {
                0.0
            } else {
                (100.0 * completed as f64 / total as f64).round()
            };
            assert_eq!(quality_score(completed, total).round(), expected);
        }
    }

    #[test]
    fn test_overall_is_mean_of_thirds() {
        let mut store = Store::default();
        let id = project(&mut store, "Website", "2025-01-01", "2025-06-30", 1000.0);
        expense(&mut store, id, "2025-01-10", 400.0);
        let done = task(&mut store, id, Priority::High, TaskStatus::Completed, "2025-02-01");
        task(&mut store, id, Priority::Low, TaskStatus::Pending, "2025-03-01");
        for t in store.tasks.iter_mut() {
            t.estimated_hours = 8.0;
        }
        if let Some(t) = store.tasks.iter_mut().find(|t| t.id == done) {
            t.actual_hours = 20.0;
        }

        let score = Analytics::new(&store, today()).efficiency(id).unwrap();

        // budget 60, time 16/20 = 80, quality 50
        assert_eq!(score.time_score, 80.0);
        assert_eq!(score.quality_score, 50.0);
        assert_eq!(score.overall, 63);
    }

    #[test]
    fn test_unknown_project() {
        let store = Store::default();
        let result = Analytics::new(&store, today()).efficiency(Uuid::new_v4());
        assert!(matches!(result, Err(AnalyticsError::ProjectNotFound(_))));
    }
}
