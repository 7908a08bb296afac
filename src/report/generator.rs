use jiff::{Timestamp, civil::Date, tz::TimeZone};

use crate::{
    analytics::{
        Analytics, DataSource, RiskLevel,
        productivity::mean_estimate_ratio,
        risk::round2,
        suggestions::{Recommendation, RecommendationKind},
    },
    models::project::ProjectStatus,
    report::{Report, ReportKind, ReportTable, SummaryEntry, SummaryValue},
    tracking::{self, format_minutes, local_date},
};

const UNKNOWN_TASK: &str = "Unknown task";

fn entry(label: &'static str, value: impl Into<SummaryValue>) -> SummaryEntry {
    SummaryEntry {
        label,
        value: value.into(),
    }
}

fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

fn yes_no(value: bool) -> String {
    String::from(if value { "Yes" } else { "No" })
}

/// Builds reports over a data source as of `now`
pub struct ReportGenerator<'a, D: DataSource> {
    analytics: Analytics<'a, D>,
    now: Timestamp,
    tz: TimeZone,
}

impl<'a, D: DataSource> ReportGenerator<'a, D> {
    pub fn new(source: &'a D, now: Timestamp, tz: TimeZone) -> Self {
        let today = local_date(now, &tz);
        Self {
            analytics: Analytics::new(source, today),
            now,
            tz,
        }
    }

    fn source(&self) -> &'a D {
        self.analytics.source()
    }

    fn today(&self) -> Date {
        self.analytics.today()
    }

    fn task_name(&self, task_id: uuid::Uuid) -> String {
        self.source()
            .tasks()
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| String::from(UNKNOWN_TASK))
    }

    fn report(
        &self,
        kind: ReportKind,
        summary: Vec<SummaryEntry>,
        tables: Vec<ReportTable>,
        recommendations: Vec<Recommendation>,
    ) -> Report {
        Report {
            kind,
            title: kind.title().to_string(),
            generated_at: self.now,
            summary,
            tables,
            recommendations,
        }
    }

    pub fn generate(&self, kind: ReportKind) -> Report {
        match kind {
            ReportKind::Progress => self.progress_report(),
            ReportKind::Time => self.time_report(),
            ReportKind::Budget => self.budget_report(),
            ReportKind::Productivity => self.productivity_report(),
            ReportKind::Risk => self.risk_report(),
        }
    }

    pub fn progress_report(&self) -> Report {
        let source = self.source();
        let today = self.today();
        let projects = source.projects();
        let tasks = source.tasks();

        let overdue_projects = projects.iter().filter(|p| p.is_overdue(today)).count();
        let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();
        let overall_progress = if tasks.is_empty() {
            0
        } else {
            (completed_tasks as f64 / tasks.len() as f64 * 100.0).round() as i64
        };

        let summary = vec![
            entry("Total projects", projects.len()),
            entry(
                "Active projects",
                projects.iter().filter(|p| p.status == ProjectStatus::InProgress).count(),
            ),
            entry("Completed projects", projects.iter().filter(|p| p.is_completed()).count()),
            entry("Overdue projects", overdue_projects),
            entry("Total tasks", tasks.len()),
            entry("Completed tasks", completed_tasks),
            entry("Overdue tasks", tasks.iter().filter(|t| t.is_overdue(today)).count()),
            entry("Overall progress (%)", overall_progress),
        ];

        let mut table = ReportTable::new(
            "Projects",
            &["Project", "Status", "Progress", "Tasks", "Start", "End", "Days left", "Overdue"],
        );
        let mut slow_projects = 0;
        for project in projects {
            let (total, completed) = source.project_tasks(project.id).fold((0, 0), |(t, c), task| {
                (t + 1, c + usize::from(task.is_completed()))
            });
            let progress = project.calculate_progress(source.project_tasks(project.id));
            let overdue = project.is_overdue(today);
            if progress < 30 && !overdue {
                slow_projects += 1;
            }

            table.push(vec![
                project.name.clone(),
                project.status.label().to_string(),
                format!("{progress}%"),
                format!("{completed}/{total}"),
                project.start_date.clone(),
                project.end_date.clone(),
                project
                    .remaining_days(today)
                    .map(|days| days.max(0).to_string())
                    .unwrap_or_else(|_| String::from("-")),
                yes_no(overdue),
            ]);
        }

        let mut recommendations = Vec::new();
        if overdue_projects > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Urgent,
                "Handle overdue projects",
                format!("{overdue_projects} project(s) are past their end date. Re-evaluate priorities and revise the schedule."),
                &["Re-evaluate project priorities", "Revise the schedule", "Reallocate resources"],
            ));
        }
        if slow_projects > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Handle slow projects",
                format!("{slow_projects} project(s) are below 30% progress. Identify bottlenecks and act on them."),
                &["Identify bottlenecks", "Add resources", "Adjust task priorities"],
            ));
        }

        self.report(ReportKind::Progress, summary, vec![table], recommendations)
    }

    pub fn time_report(&self) -> Report {
        let source = self.source();
        let entries = source.time_entries();
        let tasks = source.tasks();
        let today = self.today();

        let total: i64 = entries.iter().map(|e| e.duration).sum();
        let average_per_task = if tasks.is_empty() {
            0
        } else {
            (total as f64 / tasks.len() as f64).round() as i64
        };
        let today_summary = tracking::daily_summary(entries, today, &self.tz);
        let today_entries: usize = today_summary.tasks.iter().map(|t| t.entries).sum();

        let summary = vec![
            entry("Total time (min)", total),
            entry("Total time (h)", round2(total as f64 / 60.0)),
            entry("Average per task (min)", average_per_task),
            entry("Today (min)", today_summary.total_minutes),
            entry("Today's entries", today_entries),
            entry("Total entries", entries.len()),
        ];

        let mut breakdown = ReportTable::new("Time by task", &["Task", "Time", "Hours"]);
        for row in tracking::time_breakdown(entries) {
            breakdown.push(vec![
                self.task_name(row.task_id),
                format_minutes(row.minutes),
                format!("{:.2}", row.minutes as f64 / 60.0),
            ]);
        }

        let mut performance = ReportTable::new(
            "Estimates",
            &["Task", "Estimated (h)", "Actual (h)", "Efficiency", "On time"],
        );
        for row in self.analytics.task_performance() {
            performance.push(vec![
                row.task_name,
                format!("{:.2}", row.estimated_hours),
                format!("{:.2}", row.actual_hours),
                format!("{}%", row.efficiency),
                yes_no(row.is_on_time),
            ]);
        }

        let mut trend = ReportTable::new("Daily trend", &["Date", "Time", "Hours"]);
        for (date, minutes) in tracking::daily_totals(entries, &self.tz) {
            trend.push(vec![
                date.to_string(),
                format_minutes(minutes),
                format!("{:.2}", minutes as f64 / 60.0),
            ]);
        }

        let mut recommendations = Vec::new();
        if entries.is_empty() {
            recommendations.push(Recommendation::new(
                RecommendationKind::Info,
                "Start tracking time",
                String::from("No time has been logged yet. Record working time to enable productivity analysis."),
                &["Start a timer when you begin a task", "Make time tracking a habit"],
            ));
        }
        if mean_estimate_ratio(tasks, entries).is_some_and(|ratio| ratio < 0.8) {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Improve estimates",
                String::from("Logged time is well above the estimates. Estimation accuracy needs work."),
                &["Review how estimates are made", "Analyse past data", "Add buffer time"],
            ));
        }

        self.report(ReportKind::Time, summary, vec![breakdown, performance, trend], recommendations)
    }

    pub fn budget_report(&self) -> Report {
        let budgets = self.analytics.project_budgets();

        let total_budget: f64 = budgets.iter().map(|b| b.budget).sum();
        let total_expenses: f64 = self.source().expenses().iter().map(|e| e.amount).sum();
        let usage_rate = if total_budget > 0.0 {
            (total_expenses / total_budget * 100.0).round() as i64
        } else {
            0
        };

        let summary = vec![
            entry("Total budget", total_budget),
            entry("Total expenses", total_expenses),
            entry("Remaining budget", total_budget - total_expenses),
            entry("Budget usage (%)", usage_rate),
            entry("Over budget", total_expenses > total_budget),
        ];

        let mut projects = ReportTable::new(
            "Project budgets",
            &["Project", "Budget", "Expenses", "Remaining", "Usage", "Over budget"],
        );
        for row in &budgets {
            projects.push(vec![
                row.project_name.clone(),
                money(row.budget),
                money(row.expenses),
                money(row.remaining),
                format!("{}%", row.usage_rate),
                yes_no(row.is_over_budget),
            ]);
        }

        let mut categories = ReportTable::new("Expense categories", &["Category", "Total", "Count"]);
        for row in self.analytics.expense_categories() {
            categories.push(vec![row.name, money(row.total), row.count.to_string()]);
        }

        let mut alerts = ReportTable::new("Budget alerts", &["Level", "Project", "Message"]);
        for alert in self.analytics.budget_alerts() {
            alerts.push(vec![
                format!("{:?}", alert.level).to_lowercase(),
                alert.project_name.clone(),
                alert.message(),
            ]);
        }

        let mut trends = ReportTable::new(
            "Monthly spending",
            &["Month", "Total", "Expenses", "Projects", "Average"],
        );
        for row in self.analytics.budget_trends() {
            trends.push(vec![
                row.month,
                money(row.total_expense),
                row.expense_count.to_string(),
                row.project_count.to_string(),
                money(row.average_expense),
            ]);
        }

        let over_budget = budgets.iter().filter(|b| b.is_over_budget).count();
        let high_usage = self
            .source()
            .projects()
            .iter()
            .map(|p| self.analytics.budget_usage(p))
            .filter(|usage| (80.0..100.0).contains(usage))
            .count();

        let mut recommendations = Vec::new();
        if over_budget > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Critical,
                "Handle over-budget projects",
                format!("{over_budget} project(s) have exceeded their budget and need immediate attention."),
                &["Review spending", "Consider additional budget", "Reduce scope"],
            ));
        }
        if high_usage > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Monitor budget usage",
                format!("{high_usage} project(s) have used more than 80% of their budget."),
                &["Monitor spending closely", "Review the budget", "Look for cost savings"],
            ));
        }

        self.report(
            ReportKind::Budget,
            summary,
            vec![projects, categories, alerts, trends],
            recommendations,
        )
    }

    pub fn productivity_report(&self) -> Report {
        let source = self.source();
        let productivity = self.analytics.productivity_summary();

        let summary = vec![
            entry("Completed tasks", productivity.completed_tasks),
            entry("Estimated time (h)", productivity.estimated_hours),
            entry("Actual time (h)", productivity.actual_hours),
            entry("Efficiency (%)", productivity.efficiency),
            entry("Average per task (h)", productivity.average_hours_per_task),
        ];

        let mut team = ReportTable::new(
            "Completion by project",
            &["Project", "Tasks", "Completed", "Completion", "Avg. duration (days)"],
        );
        for row in self.analytics.team_productivity() {
            team.push(vec![
                row.project_name,
                row.total_tasks.to_string(),
                row.completed_tasks.to_string(),
                format!("{:.0}%", row.completion_rate * 100.0),
                row.average_task_duration.to_string(),
            ]);
        }

        let mut efficiency = ReportTable::new(
            "Project efficiency",
            &["Project", "Completed", "Estimated (h)", "Actual (h)", "Efficiency"],
        );
        for row in self.analytics.project_time_efficiency() {
            efficiency.push(vec![
                row.project_name,
                row.completed_tasks.to_string(),
                format!("{:.2}", row.estimated_hours),
                format!("{:.2}", row.actual_hours),
                format!("{}%", row.efficiency),
            ]);
        }

        let bottlenecks = self.analytics.bottlenecks();
        let mut bottleneck_table = ReportTable::new(
            "Bottlenecks",
            &["Task", "Estimated (h)", "Actual (h)", "Over by (h)"],
        );
        for row in &bottlenecks {
            bottleneck_table.push(vec![
                row.task_name.clone(),
                format!("{:.2}", row.estimated_hours),
                format!("{:.2}", row.actual_hours),
                format!("{:.2}", row.delay_hours),
            ]);
        }

        let mut recommendations = Vec::new();
        if !bottlenecks.is_empty() {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Resolve bottleneck tasks",
                format!(
                    "{} task(s) are running far over their estimate. Find the cause and act on it.",
                    bottlenecks.len()
                ),
                &["Find the cause", "Add resources", "Split or parallelise the task"],
            ));
        }
        if mean_estimate_ratio(source.tasks(), source.time_entries()).is_some_and(|ratio| ratio < 0.7) {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Improve productivity",
                String::from("Overall productivity is low. Processes and skills need improvement."),
                &["Improve processes", "Train the team", "Improve tools and environment"],
            ));
        }

        self.report(
            ReportKind::Productivity,
            summary,
            vec![team, efficiency, bottleneck_table],
            recommendations,
        )
    }

    pub fn risk_report(&self) -> Report {
        let source = self.source();
        let today = self.today();

        let assessments: Vec<_> = source
            .projects()
            .iter()
            .map(|p| (p, self.analytics.assess_risk_or_maximal(p.id)))
            .collect();
        let count_level = |level: RiskLevel| assessments.iter().filter(|(_, r)| r.level == level).count();
        let (high, medium, low) = (
            count_level(RiskLevel::High),
            count_level(RiskLevel::Medium),
            count_level(RiskLevel::Low),
        );
        let overall = if high > 0 {
            RiskLevel::High
        } else if medium > 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        let overdue_tasks = source.tasks().iter().filter(|t| t.is_overdue(today)).count();

        let summary = vec![
            entry("Total projects", assessments.len()),
            entry("High risk projects", high),
            entry("Medium risk projects", medium),
            entry("Low risk projects", low),
            entry("Overdue tasks", overdue_tasks),
            entry("Critical tasks", source.tasks().iter().filter(|t| t.is_critical()).count()),
            entry("Overall risk", overall.label()),
        ];

        let mut factors = ReportTable::new(
            "Risk factors",
            &["Project", "Critical tasks", "Overdue tasks", "Days left", "Score", "Level"],
        );
        for (project, risk) in &assessments {
            factors.push(vec![
                project.name.clone(),
                risk.critical_tasks.to_string(),
                risk.overdue_tasks.to_string(),
                risk.remaining_days.to_string(),
                risk.score.to_string(),
                risk.level.label().to_string(),
            ]);
        }

        let mut dependencies = ReportTable::new(
            "Critical task dependencies",
            &["Project", "Critical task", "Blocked tasks"],
        );
        for project in self.analytics.project_dependencies() {
            for dependency in project.dependencies {
                let blocked: Vec<String> = dependency.dependents.into_iter().map(|d| d.task_name).collect();
                dependencies.push(vec![
                    project.project_name.clone(),
                    dependency.task_name,
                    if blocked.is_empty() {
                        String::from("-")
                    } else {
                        blocked.join(", ")
                    },
                ]);
            }
        }

        let mut recommendations = Vec::new();
        if high > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Critical,
                "Handle high-risk projects",
                format!("{high} project(s) are at high risk and need immediate attention."),
                &["Analyse the risk factors", "Prioritise countermeasures", "Report to stakeholders"],
            ));
        }
        if overdue_tasks > 0 {
            recommendations.push(Recommendation::new(
                RecommendationKind::Warning,
                "Handle overdue tasks",
                format!("{overdue_tasks} task(s) are past their due date. Their priority needs re-evaluation."),
                &["Re-evaluate priorities", "Revise the schedule", "Reallocate resources"],
            ));
        }

        self.report(ReportKind::Risk, summary, vec![factors, dependencies], recommendations)
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
            time_entry::TimeEntry,
        },
    };
    use uuid::Uuid;

    fn now() -> Timestamp {
        "2025-03-01T10:00:00Z".parse().unwrap()
    }

    fn kinds(report: &Report) -> Vec<RecommendationKind> {
        report.recommendations.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_progress_report() {
        let mut store = Store::default();
        let late = project(&mut store, "Late", "2025-01-01", "2025-02-15", 0.0);
        task(&mut store, late, Priority::Low, TaskStatus::Completed, "2025-02-01");
        let slow = project(&mut store, "Slow", "2025-01-01", "2025-06-30", 0.0);
        task(&mut store, slow, Priority::Low, TaskStatus::Pending, "2025-02-01");

        let report = ReportGenerator::new(&store, now(), TimeZone::UTC).progress_report();

        assert_eq!(report.title, "Project Progress Report");
        assert_eq!(report.summary_value("Overdue projects"), Some(&SummaryValue::Int(1)));
        assert_eq!(report.summary_value("Overdue tasks"), Some(&SummaryValue::Int(1)));
        assert_eq!(report.summary_value("Overall progress (%)"), Some(&SummaryValue::Int(50)));
        assert_eq!(report.tables[0].rows.len(), 2);
        assert_eq!(report.tables[0].rows[0][6], "0");
        assert_eq!(
            kinds(&report),
            vec![RecommendationKind::Urgent, RecommendationKind::Warning]
        );
    }

    #[test]
    fn test_time_report_without_entries() {
        let store = Store::default();

        let report = ReportGenerator::new(&store, now(), TimeZone::UTC).time_report();

        assert_eq!(report.summary_value("Total entries"), Some(&SummaryValue::Int(0)));
        assert_eq!(kinds(&report), vec![RecommendationKind::Info]);
    }

    #[test]
    fn test_time_report_flags_poor_estimates() {
        let mut store = Store::default();
        let id = project(&mut store, "Launch", "2025-01-01", "2025-06-30", 0.0);
        let done = task(&mut store, id, Priority::Low, TaskStatus::Completed, "2025-02-01");
        if let Some(t) = store.get_task_mut(done) {
            t.estimated_hours = 1.0;
        }
        store.time_entries.push(TimeEntry {
            id: Uuid::new_v4(),
            task_id: done,
            start_time: now(),
            end_time: now(),
            duration: 120,
            created_at: now(),
            updated_at: None,
        });

        let report = ReportGenerator::new(&store, now(), TimeZone::UTC).time_report();

        assert_eq!(report.summary_value("Today (min)"), Some(&SummaryValue::Int(120)));
        assert_eq!(report.summary_value("Total time (h)"), Some(&SummaryValue::Number(2.0)));
        assert_eq!(report.table("Time by task").unwrap().rows[0][0], "Task 1");
        assert_eq!(kinds(&report), vec![RecommendationKind::Warning]);
    }

    #[test]
    fn test_budget_report() {
        let mut store = Store::default();
        let over = project(&mut store, "Over", "2025-01-01", "2025-06-30", 100.0);
        let high = project(&mut store, "High", "2025-01-01", "2025-06-30", 100.0);
        expense(&mut store, over, "2025-01-10", 150.0);
        expense(&mut store, high, "2025-02-10", 90.0);

        let report = ReportGenerator::new(&store, now(), TimeZone::UTC).budget_report();

        assert_eq!(report.summary_value("Total expenses"), Some(&SummaryValue::Number(240.0)));
        assert_eq!(report.summary_value("Budget usage (%)"), Some(&SummaryValue::Int(120)));
        assert_eq!(report.summary_value("Over budget"), Some(&SummaryValue::Bool(true)));
        assert_eq!(report.table("Budget alerts").unwrap().rows.len(), 2);
        assert_eq!(report.table("Monthly spending").unwrap().rows.len(), 2);
        assert_eq!(
            kinds(&report),
            vec![RecommendationKind::Critical, RecommendationKind::Warning]
        );
    }

    #[test]
    fn test_risk_report() {
        let mut store = Store::default();
        let risky = project(&mut store, "Risky", "2025-01-01", "2025-03-04", 0.0);
        for _ in 0..4 {
            task(&mut store, risky, Priority::High, TaskStatus::Pending, "2025-02-20");
        }
        project(&mut store, "Calm", "2025-01-01", "2025-12-31", 0.0);

        let report = ReportGenerator::new(&store, now(), TimeZone::UTC).risk_report();

        assert_eq!(report.summary_value("High risk projects"), Some(&SummaryValue::Int(1)));
        assert_eq!(report.summary_value("Low risk projects"), Some(&SummaryValue::Int(1)));
        assert_eq!(report.summary_value("Overall risk"), Some(&SummaryValue::Text(String::from("High"))));
        assert_eq!(report.table("Risk factors").unwrap().rows[0][4], "85");
        assert_eq!(
            kinds(&report),
            vec![RecommendationKind::Critical, RecommendationKind::Warning]
        );
    }

    #[test]
    fn test_generate_dispatches_every_kind() {
        let store = Store::default();
        let generator = ReportGenerator::new(&store, now(), TimeZone::UTC);

        for kind in ReportKind::ALL {
            let report = generator.generate(kind);
            assert_eq!(report.kind, kind);
            assert_eq!(report.generated_at, now());
        }
    }
}
