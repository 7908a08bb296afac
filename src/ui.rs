use colored::*;
use jiff::civil::Date;

use crate::{
    alerts::{Alert, AlertLevel},
    analytics::{
        RiskLevel,
        efficiency::EfficiencyScore,
        health::HealthScore,
        progress::ProgressPrediction,
        risk::RiskAssessment,
        suggestions::{Recommendation, RecommendationKind},
    },
    models::{
        expense::Expense,
        project::{Project, ProjectStatus},
        store::Store,
        task::{Priority, Task, TaskStatus},
        time_entry::TimerState,
    },
    report::Report,
    services::timers::TimerStatus,
    tracking::format_minutes,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// First block of a UUID, enough to reference a record from the CLI
pub fn short_id(id: uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

/// Maps the semantic color names used by the models to terminal colors
fn paint(text: &str, color: &str) -> ColoredString {
    match color {
        "success" => text.green(),
        "warning" => text.yellow(),
        "error" => text.red(),
        "info" => text.blue(),
        "gray" => text.dimmed(),
        _ => text.normal(),
    }
}

pub fn project_status(status: ProjectStatus) -> ColoredString {
    paint(status.label(), status.color())
}

pub fn risk_level(level: RiskLevel) -> ColoredString {
    match level {
        RiskLevel::Low => level.label().green(),
        RiskLevel::Medium => level.label().yellow(),
        RiskLevel::High => level.label().red().bold(),
    }
}

/// Print `left` with `right` dimmed against the right edge of the terminal.
/// `left_len` is the visible width of `left`, without ANSI codes.
fn print_with_context(left: ColoredString, left_len: usize, right: &str) {
    let terminal_width = get_terminal_width();
    let right_len = right.chars().count();

    if right.is_empty() || left_len + right_len + 4 >= terminal_width {
        println!("{}", left);
        return;
    }

    let padding = terminal_width - left_len - right_len - 2;
    println!("{}{}{}", left, " ".repeat(padding), right.dimmed());
}

/// Get the appropriate status glyph for a task
pub fn get_status_glyph(task: &Task, is_overdue: bool) -> ColoredString {
    if task.is_completed() {
        "✓".dimmed()
    } else if is_overdue {
        "●".red()
    } else if task.status == TaskStatus::InProgress {
        paint("◐", task.status.color())
    } else {
        "○".normal()
    }
}

/// Render a single project line with ID, progress, name and right-aligned deadline
pub fn render_project_line(project: &Project, progress: u8, today: Date) {
    let id_str = short_id(project.id);
    let left = format!("  {}  {:>3}%  {}", id_str, progress, project.name);
    let left_len = left.chars().count();

    let styled_left = if project.is_completed() {
        left.dimmed()
    } else if project.is_overdue(today) {
        left.red().bold()
    } else {
        left.bold()
    };

    let right = format!("{}  ·  {}", project.status.label(), project.end_date);
    print_with_context(styled_left, left_len, &right);
}

/// Render a task line with glyph, name, and project / due date context
pub fn render_task_line(task: &Task, store: &Store, today: Date) {
    let is_overdue = task.is_overdue(today);
    let glyph = get_status_glyph(task, is_overdue);
    let id_str = short_id(task.id);

    let marker = priority_marker(task.priority);
    let left = format!(
        "  {}  {}  {}  {}",
        id_str,
        glyph,
        task.name,
        paint(marker, task.priority.color())
    );
    let left_len = format!("  {}  {}  {}  {}", id_str, " ", task.name, marker)
        .chars()
        .count();

    let styled_left = if task.is_completed() {
        left.dimmed()
    } else {
        left.bold()
    };

    let project = store
        .get_project(task.project_id)
        .map(|p| p.name.as_str())
        .unwrap_or("?");
    let right = format!("{}  ·  {}", project, task.due_date_text(today));
    print_with_context(styled_left, left_len, &right);
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!!",
        Priority::Medium => "!!",
        Priority::Low => "!",
    }
}

pub fn render_expense_line(expense: &Expense, store: &Store) {
    let id_str = short_id(expense.id);
    let amount = format_amount(expense.amount, &store.settings.currency);
    let left = format!("  {}  {}  {:>14}  {}", id_str, expense.date, amount, expense.item);
    let left_len = left.chars().count();

    let project = store
        .get_project(expense.project_id)
        .map(|p| p.name.as_str())
        .unwrap_or("?");
    print_with_context(left.normal(), left_len, project);
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize, noun: &str) {
    let noun = if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, noun);
}

/// Render a section header (e.g., "Overdue", "By status")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Label / value pair, labels padded to a common column
pub fn render_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {}", format!("{label}:").dimmed(), value);
}

pub fn render_prediction(prediction: &ProgressPrediction) {
    render_field("Progress", format!("{}%", prediction.current_progress));
    render_field("Remaining days", prediction.remaining_days);
    render_field("Daily progress", format!("{}%", prediction.daily_progress));
    render_field(
        "Predicted days",
        prediction
            .predicted_days
            .map(|d| d.to_string())
            .unwrap_or_else(|| String::from("-")),
    );
    render_field(
        "Predicted completion",
        prediction
            .predicted_completion_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| String::from("-")),
    );
    render_field(
        "On track",
        if prediction.is_on_track { "yes".green() } else { "no".red() },
    );
    render_field("Risk", risk_level(prediction.risk_level));
}

pub fn render_efficiency(efficiency: &EfficiencyScore) {
    render_field("Budget usage", format!("{:.1}%", efficiency.budget_usage));
    render_field("Budget score", format!("{:.1}", efficiency.budget_score));
    render_field("Time score", format!("{:.1}", efficiency.time_score));
    render_field("Quality score", format!("{:.1}", efficiency.quality_score));
    render_field("Efficiency", efficiency.overall.to_string().bold());
}

pub fn render_risk(risk: &RiskAssessment) {
    render_field("Critical tasks", risk.critical_tasks);
    render_field("Overdue tasks", risk.overdue_tasks);
    render_field("Remaining days", risk.remaining_days);
    render_field("Risk score", risk.score);
    render_field("Risk", risk_level(risk.level));
}

pub fn render_health(health: &HealthScore) {
    render_field("Progress score", format!("{:.0}", health.progress_score));
    render_field("Efficiency score", health.efficiency_score);
    let score = health.score.to_string();
    let score = match health.score {
        80.. => score.green().bold(),
        50.. => score.yellow().bold(),
        _ => score.red().bold(),
    };
    render_field("Health", score);
}

fn recommendation_tag(kind: RecommendationKind) -> ColoredString {
    let tag = format!("[{}]", kind.label());
    match kind {
        RecommendationKind::Urgent | RecommendationKind::Critical => tag.red().bold(),
        RecommendationKind::Warning => tag.yellow(),
        RecommendationKind::Info => tag.blue(),
        RecommendationKind::Improvement => tag.green(),
    }
}

pub fn render_recommendations(recommendations: &[Recommendation]) {
    for recommendation in recommendations {
        println!(
            "  {} {}",
            recommendation_tag(recommendation.kind),
            recommendation.title.bold()
        );
        println!("    {}", recommendation.description);
        for action in &recommendation.actions {
            println!("    {} {}", "•".green(), action);
        }
    }
}

/// Render a table with columns sized to their widest cell
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("  {}", "No data".dimmed());
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("  {}", line(headers.iter().map(|h| h.to_string()).collect()).bold());
    println!("  {}", "─".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)).dimmed());
    for row in rows {
        println!("  {}", line(row.clone()));
    }
}

pub fn render_report(report: &Report) {
    println!("\n  {}", report.title.cyan().bold());
    println!("  {}", format!("Generated at {}", report.generated_at).dimmed());

    if !report.summary.is_empty() {
        render_section_header("Summary");
        for entry in &report.summary {
            render_field(entry.label, &entry.value);
        }
    }

    for table in &report.tables {
        render_section_header(table.title);
        render_table(&table.headers, &table.rows);
    }

    if !report.recommendations.is_empty() {
        render_section_header("Recommendations");
        render_recommendations(&report.recommendations);
    }
    println!();
}

pub fn render_timer_status(timers: &[TimerStatus]) {
    if timers.is_empty() {
        println!("No active timers");
        return;
    }

    render_view_header("TIMERS", timers.len(), "timer");
    for timer in timers {
        let state = match timer.state {
            TimerState::Running => "running".green(),
            TimerState::Paused => "paused".yellow(),
            TimerState::Idle => "idle".dimmed(),
        };
        println!(
            "  {}  {:<8}  {:>8}  {}",
            short_id(timer.task_id),
            state,
            format_minutes(timer.elapsed_minutes),
            timer.task_name.bold()
        );
    }
}

pub fn render_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        println!("{} No alerts", "✓".green());
        return;
    }

    render_view_header("ALERTS", alerts.len(), "alert");
    for alert in alerts {
        let glyph = match alert.level {
            AlertLevel::Error => "●".red(),
            AlertLevel::Warning => "●".yellow(),
        };
        println!("  {}  {}", glyph, alert.message);
    }
}
