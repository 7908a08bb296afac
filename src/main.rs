use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use jiff::{Timestamp, civil::Date, tz::TimeZone};
use tracing_subscriber::EnvFilter;

use crate::{
    analytics::{Analytics, risk::DependencyKind},
    backup::{ExportParameters, ImportMode, ImportParameters, export_data, import_data},
    config::Config,
    events::EventBus,
    models::{
        project::ProjectStatus,
        store::Store,
        task::{Priority, TaskStatus},
    },
    report::{ReportKind, generator::ReportGenerator, html::to_html},
    services::{
        SortOrder, resolve_project,
        expenses::{
            AddExpenseParameters, DeleteExpenseParameters, ExpenseFilter, ExpenseSortKey,
            UpdateExpenseParameters, add_expense, delete_expense, expense_stats, filter_expenses,
            search_expenses, sort_expenses, update_expense,
        },
        projects::{
            CreateProjectParameters, DeleteProjectParameters, ProjectFilter, ProjectSortKey,
            UpdateProjectParameters, create_project, delete_project, filter_projects,
            project_progress, project_stats, search_projects, sort_projects, update_project,
        },
        settings::{UpdateSettingsParameters, update_settings},
        tasks::{
            AddTaskParameters, CompleteTaskParameters, DeleteTaskParameters, TaskFilter,
            TaskSortKey, UpdateTaskParameters, add_task, complete_task, delete_task,
            due_soon_tasks, filter_tasks, high_priority_tasks, overdue_tasks, search_tasks,
            sort_tasks, task_stats, update_task,
        },
        timers::{
            EditTimeEntryParameters, TimerParameters, delete_time_entry, edit_time_entry,
            pause_timer, resume_timer, single_active_timer, start_timer, stop_timer, timer_status,
        },
    },
    storage::{Storage, json::JsonFileStorage},
    tracking::{daily_summary, format_minutes, project_total, task_total, weekly_summary},
};

mod alerts;
mod analytics;
mod backup;
mod config;
mod crypto;
mod events;
mod models;
mod report;
mod services;
mod storage;
mod tracking;
mod ui;
mod validation;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    name = "ptrack",
    about = "Track projects, tasks, expenses and time, with progress, budget and risk analytics"
)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "PTRACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Manage expenses
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Track time spent on tasks
    #[command(subcommand)]
    Timer(TimerCommands),

    /// Progress, efficiency, risk and budget analytics
    #[command(subcommand)]
    Analytics(AnalyticsCommands),

    /// Generate a report
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        /// Write a standalone HTML page instead of printing
        #[arg(long)]
        html: bool,
        /// Print the report as JSON
        #[arg(long, conflicts_with = "html")]
        json: bool,
        /// Destination of the HTML page (defaults to <title>-<date>.html)
        #[arg(short, long, requires = "html")]
        output: Option<PathBuf>,
    },

    /// Export all data to a backup file
    Export {
        /// Destination file (defaults to ptrack-backup-<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Encrypt the backup with this password
        #[arg(long, env = "PTRACK_PASSWORD")]
        password: Option<String>,
    },

    /// Import data from a backup file
    Import {
        file: PathBuf,
        /// Password of an encrypted backup
        #[arg(long, env = "PTRACK_PASSWORD")]
        password: Option<String>,
        #[arg(long, value_enum, default_value_t = ImportMode::Overwrite)]
        mode: ImportMode,
    },

    /// Show deadline and budget alerts
    Alerts,

    /// Show or change display settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Rate the strength of a backup password
    PasswordCheck { password: String },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a new project
    New {
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = 0.0)]
        budget: f64,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, value_enum, default_value_t = ProjectStatus::Planned)]
        status: ProjectStatus,
    },
    /// Change fields of a project
    Edit {
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long, value_enum)]
        status: Option<ProjectStatus>,
    },
    /// Delete a project and its tasks
    Delete { project: String },
    /// List projects
    List {
        #[arg(long, value_enum)]
        status: Option<ProjectStatus>,
        /// Only projects ending within this many days
        #[arg(long)]
        deadline_within: Option<i64>,
        #[arg(long)]
        budget_min: Option<f64>,
        #[arg(long)]
        budget_max: Option<f64>,
        #[arg(long, value_enum, default_value_t = ProjectSortKey::Created)]
        sort: ProjectSortKey,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
    },
    /// Search projects by name or description
    Search { query: String },
    /// Show a project with its tasks and spending
    Show { project: String },
    /// Project counts and totals
    Stats,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task to a project
    Add {
        project: String,
        name: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,
        #[arg(short, long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long, default_value_t = 0.0)]
        estimate: f64,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Tasks that must be finished first
        #[arg(long)]
        depends_on: Vec<String>,
    },
    /// Change fields of a task
    Edit {
        task: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        estimate: Option<f64>,
        #[arg(long)]
        actual: Option<f64>,
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        /// Replace the prerequisites (pass none to clear them)
        #[arg(long, num_args = 0..)]
        depends_on: Option<Vec<String>>,
    },
    /// Mark a task as completed
    Done {
        task: String,
        /// Hours actually spent
        #[arg(long)]
        actual: Option<f64>,
    },
    /// Delete a task
    Delete { task: String },
    /// List tasks
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        #[arg(short, long, value_enum)]
        priority: Option<Priority>,
        /// Only tasks due within this many days
        #[arg(long)]
        due_within: Option<i64>,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long, value_enum, default_value_t = TaskSortKey::Due)]
        sort: TaskSortKey,
        #[arg(long, value_enum, default_value_t = SortOrder::Asc)]
        order: SortOrder,
    },
    /// Search tasks by name or description
    Search { query: String },
    /// Task counts and hours
    Stats {
        #[arg(long)]
        project: Option<String>,
    },
    /// Open tasks due soon
    Due {
        /// Look-ahead in days (defaults to the configured value)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Open tasks past their due date
    Overdue,
    /// Open high priority tasks
    Urgent,
}

#[derive(Subcommand)]
enum ExpenseCommands {
    /// Record an expense
    Add {
        project: String,
        amount: f64,
        item: String,
        /// Day of the expense (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Change fields of an expense
    Edit {
        expense: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        item: Option<String>,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Delete an expense
    Delete { expense: String },
    /// List expenses
    List {
        #[arg(long)]
        project: Option<String>,
        /// Calendar month (YYYY-MM)
        #[arg(long, value_parser = parse_month)]
        month: Option<(i16, i8)>,
        #[arg(long)]
        from: Option<Date>,
        #[arg(long)]
        to: Option<Date>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
        #[arg(long)]
        item: Option<String>,
        #[arg(long, value_enum, default_value_t = ExpenseSortKey::Date)]
        sort: ExpenseSortKey,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        order: SortOrder,
    },
    /// Search expenses by item or memo
    Search { query: String },
    /// Spending totals
    Stats {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_parser = parse_month)]
        month: Option<(i16, i8)>,
    },
}

#[derive(Subcommand)]
enum TimerCommands {
    /// Start a timer on a task
    Start { task: String },
    /// Pause a running timer
    Pause { task: Option<String> },
    /// Resume a paused timer
    Resume { task: Option<String> },
    /// Stop a timer and log the time
    Stop { task: Option<String> },
    /// Show active timers
    Status,
    /// Correct a logged time entry
    Edit {
        entry: String,
        #[arg(long)]
        task: Option<String>,
        /// RFC 3339 instant, e.g. 2025-03-01T09:00:00Z
        #[arg(long)]
        start: Option<Timestamp>,
        #[arg(long)]
        end: Option<Timestamp>,
    },
    /// Delete a logged time entry
    Delete { entry: String },
    /// Time logged on a day
    Day {
        /// Defaults to today
        #[arg(long)]
        date: Option<Date>,
    },
    /// Time logged in the week containing a day
    Week {
        #[arg(long)]
        date: Option<Date>,
    },
    /// Total time logged on a task or project
    Total {
        #[arg(long, conflicts_with = "project", required_unless_present = "project")]
        task: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand)]
enum AnalyticsCommands {
    /// Prediction, efficiency, risk and health of one project
    Project { project: String },
    /// Progress across all projects
    Overview,
    /// Tasks completed and created per day
    Timeline {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Budget usage, monthly trends and spending categories
    Budget,
    /// Completion rates and estimate accuracy
    Productivity,
    /// Critical tasks and what waits on them
    Dependencies,
    /// In-progress tasks running well over their estimate
    Bottlenecks,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show the current settings
    Show,
    /// Change settings
    Set {
        #[arg(long)]
        language: Option<String>,
        /// Three-letter currency code
        #[arg(long)]
        currency: Option<String>,
        /// IANA time zone, e.g. Europe/Madrid
        #[arg(long)]
        timezone: Option<String>,
    },
}

fn parse_month(value: &str) -> Result<(i16, i8), String> {
    let date: Date = format!("{}-01", value.trim())
        .parse()
        .map_err(|_| format!("'{value}' is not a month in YYYY-MM format"))?;
    Ok((date.year(), date.month()))
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Everything a command needs, built once in `main`
struct Context {
    config: Config,
    storage: JsonFileStorage,
    store: Store,
    events: EventBus,
    tz: TimeZone,
    now: Timestamp,
    today: Date,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    init_tracing(&config.log);

    let storage_path = config.store_path().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let storage = JsonFileStorage::new(storage_path).with_backups_to_keep(config.backups_to_keep);

    let store = match storage.load() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut events = EventBus::new();
    events.subscribe_all(|event| {
        tracing::debug!(kind = ?event.kind(), "event published");
    });

    let tz = store.settings.time_zone();
    let now = Timestamp::now();
    let today = now.to_zoned(tz.clone()).date();

    let mut ctx = Context {
        config,
        storage,
        store,
        events,
        tz,
        now,
        today,
    };

    if let Err(e) = run(cli.command, &mut ctx) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, ctx: &mut Context) -> CliResult {
    match command {
        Commands::Project(command) => run_project(command, ctx),
        Commands::Task(command) => run_task(command, ctx),
        Commands::Expense(command) => run_expense(command, ctx),
        Commands::Timer(command) => run_timer(command, ctx),
        Commands::Analytics(command) => run_analytics(command, ctx),
        Commands::Report {
            kind,
            html,
            json,
            output,
        } => run_report(ctx, kind, html, json, output),
        Commands::Export { output, password } => {
            let content = export_data(
                &ctx.store,
                &mut ctx.events,
                ExportParameters {
                    password: password.as_deref(),
                    iterations: ctx.config.pbkdf2_iterations,
                    now: ctx.now,
                },
            )?;
            let path =
                output.unwrap_or_else(|| PathBuf::from(format!("ptrack-backup-{}.json", ctx.today)));
            std::fs::write(&path, content)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

            let lock = if password.is_some() { " (encrypted)" } else { "" };
            println!("✓ Data exported to {}{}", path.display(), lock);
            Ok(())
        }
        Commands::Import {
            file,
            password,
            mode,
        } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
            let summary = import_data(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                ImportParameters {
                    content: &content,
                    password: password.as_deref(),
                    mode,
                },
            )?;
            println!("✓ Data imported from {}", file.display());
            println!(
                "  └─ {} project(s), {} task(s), {} expense(s), {} time entries",
                summary.projects, summary.tasks, summary.expenses, summary.time_entries
            );
            Ok(())
        }
        Commands::Alerts => {
            let alerts = alerts::check_all(&ctx.store, ctx.today);
            ui::render_alerts(&alerts);
            Ok(())
        }
        Commands::Settings(command) => run_settings(command, ctx),
        Commands::PasswordCheck { password } => {
            let rating = crypto::password_strength(&password);
            let strength = match rating.strength {
                crypto::Strength::Strong => "strong".green(),
                crypto::Strength::Medium => "medium".yellow(),
                crypto::Strength::Weak => "weak".red(),
            };
            println!("Password strength: {} ({}/5)", strength, rating.score);
            for hint in rating.feedback {
                println!("  {} {}", "•".dimmed(), hint);
            }
            Ok(())
        }
    }
}

fn run_project(command: ProjectCommands, ctx: &mut Context) -> CliResult {
    match command {
        ProjectCommands::New {
            name,
            start,
            end,
            budget,
            description,
            status,
        } => {
            let project = create_project(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                CreateProjectParameters {
                    name,
                    description,
                    start_date: start,
                    end_date: end,
                    budget,
                    status,
                },
            )?;
            println!(
                "✓ Project {} created ({})",
                project.name,
                ui::short_id(project.id)
            );
        }
        ProjectCommands::Edit {
            project,
            name,
            description,
            start,
            end,
            budget,
            status,
        } => {
            let project = update_project(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                UpdateProjectParameters {
                    project,
                    name,
                    description,
                    start_date: start,
                    end_date: end,
                    budget,
                    status,
                },
            )?;
            println!("✓ Project {} updated", project.name);
        }
        ProjectCommands::Delete { project } => {
            let result = delete_project(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                DeleteProjectParameters { project },
            )?;
            println!("✓ Project deleted: {}", result.project.name);
            if result.cascaded_tasks_count > 0 {
                println!("  └─ {} task(s) also deleted", result.cascaded_tasks_count);
            }
        }
        ProjectCommands::List {
            status,
            deadline_within,
            budget_min,
            budget_max,
            sort,
            order,
        } => {
            let filter = ProjectFilter {
                status,
                deadline_within_days: deadline_within,
                budget_min,
                budget_max,
            };
            let mut projects = filter_projects(&ctx.store, &filter, ctx.today);
            sort_projects(&mut projects, sort, order);

            if projects.is_empty() {
                println!("No projects found");
            } else {
                ui::render_view_header("PROJECTS", projects.len(), "project");
                for project in projects {
                    let progress = project_progress(&ctx.store, project.id);
                    ui::render_project_line(project, progress, ctx.today);
                }
            }
        }
        ProjectCommands::Search { query } => {
            let projects = search_projects(&ctx.store, &query);
            if projects.is_empty() {
                println!("No projects match '{}'", query);
            } else {
                ui::render_view_header(&format!("Search: {}", query), projects.len(), "project");
                for project in projects {
                    let progress = project_progress(&ctx.store, project.id);
                    ui::render_project_line(project, progress, ctx.today);
                }
            }
        }
        ProjectCommands::Show { project } => {
            let project = resolve_project(&ctx.store, &project)?;
            let store = &ctx.store;
            let analytics = Analytics::new(store, ctx.today);

            println!("\n  {}", project.name.cyan().bold());
            if !project.description.is_empty() {
                println!("  {}", project.description.dimmed());
            }
            println!();
            ui::render_field("Id", project.id);
            ui::render_field("Status", ui::project_status(project.status));
            ui::render_field("Schedule", format!("{} → {}", project.start_date, project.end_date));
            if let Ok(days) = project.remaining_days(ctx.today) {
                ui::render_field("Days left", days);
            }
            ui::render_field("Progress", format!("{}%", project_progress(store, project.id)));
            ui::render_field(
                "Spent",
                format!(
                    "{} of {}",
                    ui::format_amount(analytics.total_expense(project.id), &store.settings.currency),
                    ui::format_amount(project.budget, &store.settings.currency)
                ),
            );
            ui::render_field(
                "Time logged",
                format_minutes(project_total(&store.time_entries, &store.tasks, project.id)),
            );

            let mut tasks: Vec<_> = store.get_tasks_for_project(project.id).collect();
            sort_tasks(&mut tasks, TaskSortKey::Due, SortOrder::Asc);
            if !tasks.is_empty() {
                ui::render_section_header("Tasks");
                for task in tasks {
                    ui::render_task_line(task, store, ctx.today);
                }
            }

            let mut expenses: Vec<_> = store.get_expenses_for_project(project.id).collect();
            sort_expenses(&mut expenses, ExpenseSortKey::Date, SortOrder::Desc);
            if !expenses.is_empty() {
                ui::render_section_header("Expenses");
                for expense in expenses {
                    ui::render_expense_line(expense, store);
                }
            }
            println!();
        }
        ProjectCommands::Stats => {
            let stats = project_stats(&ctx.store, ctx.today, ctx.config.due_soon_days);
            let currency = &ctx.store.settings.currency;

            println!("{}", "PROJECTS".cyan());
            println!("{}", "─".repeat(30).dimmed());
            ui::render_field("Total", stats.total);
            for (status, count) in stats.by_status {
                ui::render_field(status.label(), count);
            }
            ui::render_field("Overdue", stats.overdue.to_string().red());
            ui::render_field("Due soon", stats.due_soon.to_string().yellow());
            ui::render_field("Total budget", ui::format_amount(stats.total_budget, currency));
            ui::render_field("Average progress", format!("{}%", stats.average_progress));
        }
    }
    Ok(())
}

fn run_task(command: TaskCommands, ctx: &mut Context) -> CliResult {
    match command {
        TaskCommands::Add {
            project,
            name,
            due,
            priority,
            estimate,
            description,
            depends_on,
        } => {
            let task = add_task(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                AddTaskParameters {
                    project,
                    name,
                    description,
                    priority,
                    due_date: due,
                    estimated_hours: estimate,
                    depends_on,
                },
            )?;
            println!("✓ Task {} added ({})", task.name, ui::short_id(task.id));
        }
        TaskCommands::Edit {
            task,
            project,
            name,
            description,
            priority,
            due,
            estimate,
            actual,
            status,
            depends_on,
        } => {
            let task = update_task(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                UpdateTaskParameters {
                    task,
                    project,
                    name,
                    description,
                    priority,
                    due_date: due,
                    estimated_hours: estimate,
                    actual_hours: actual,
                    status,
                    depends_on,
                },
            )?;
            println!("✓ Task {} updated", task.name);
        }
        TaskCommands::Done { task, actual } => {
            let task = complete_task(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                CompleteTaskParameters {
                    task,
                    actual_hours: actual,
                },
            )?;
            println!("✓ Task {} completed", task.name);
        }
        TaskCommands::Delete { task } => {
            let task = delete_task(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                DeleteTaskParameters { task },
            )?;
            println!("✓ Task deleted: {}", task.name);
        }
        TaskCommands::List {
            project,
            status,
            priority,
            due_within,
            completed,
            sort,
            order,
        } => {
            let project_id = project
                .map(|p| resolve_project(&ctx.store, &p).map(|p| p.id))
                .transpose()?;
            let filter = TaskFilter {
                project_id,
                status,
                priority,
                due_within_days: due_within,
                completed,
            };
            let mut tasks = filter_tasks(&ctx.store, &filter, ctx.today);
            sort_tasks(&mut tasks, sort, order);
            render_task_list("TASKS", &tasks, ctx);
        }
        TaskCommands::Search { query } => {
            let tasks = search_tasks(&ctx.store, &query);
            render_task_list(&format!("Search: {}", query), &tasks, ctx);
        }
        TaskCommands::Stats { project } => {
            let stats = match project {
                Some(project) => {
                    let project = resolve_project(&ctx.store, &project)?;
                    task_stats(ctx.store.get_tasks_for_project(project.id), ctx.today)
                }
                None => task_stats(&ctx.store.tasks, ctx.today),
            };

            println!("{}", "TASKS".cyan());
            println!("{}", "─".repeat(30).dimmed());
            ui::render_field("Total", stats.total);
            for (status, count) in stats.by_status {
                ui::render_field(status.label(), count);
            }
            for (priority, count) in stats.by_priority {
                ui::render_field(&format!("{} priority", priority.label()), count);
            }
            ui::render_field("Overdue", stats.overdue.to_string().red());
            ui::render_field("Due soon", stats.due_soon.to_string().yellow());
            ui::render_field("Estimated hours", format!("{:.1}", stats.total_estimated_hours));
            ui::render_field("Actual hours", format!("{:.1}", stats.total_actual_hours));
        }
        TaskCommands::Due { days } => {
            let days = days.unwrap_or(ctx.config.due_soon_days);
            let tasks = due_soon_tasks(&ctx.store, ctx.today, days);
            render_task_list(&format!("Due within {} days", days), &tasks, ctx);
        }
        TaskCommands::Overdue => {
            let tasks = overdue_tasks(&ctx.store, ctx.today);
            render_task_list("Overdue", &tasks, ctx);
        }
        TaskCommands::Urgent => {
            let tasks = high_priority_tasks(&ctx.store);
            render_task_list("High priority", &tasks, ctx);
        }
    }
    Ok(())
}

fn render_task_list(title: &str, tasks: &[&models::task::Task], ctx: &Context) {
    if tasks.is_empty() {
        println!("No tasks found");
        return;
    }
    ui::render_view_header(title, tasks.len(), "task");
    for task in tasks {
        ui::render_task_line(task, &ctx.store, ctx.today);
    }
}

fn run_expense(command: ExpenseCommands, ctx: &mut Context) -> CliResult {
    match command {
        ExpenseCommands::Add {
            project,
            amount,
            item,
            date,
            memo,
        } => {
            let expense = add_expense(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                AddExpenseParameters {
                    project,
                    date: date.unwrap_or_else(|| ctx.today.to_string()),
                    amount,
                    item,
                    memo,
                },
            )?;
            println!(
                "✓ Expense {} recorded: {}",
                expense.item,
                ui::format_amount(expense.amount, &ctx.store.settings.currency)
            );
        }
        ExpenseCommands::Edit {
            expense,
            project,
            date,
            amount,
            item,
            memo,
        } => {
            let expense = update_expense(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                UpdateExpenseParameters {
                    expense,
                    project,
                    date,
                    amount,
                    item,
                    memo,
                },
            )?;
            println!("✓ Expense {} updated", expense.item);
        }
        ExpenseCommands::Delete { expense } => {
            let expense = delete_expense(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                DeleteExpenseParameters { expense },
            )?;
            println!("✓ Expense deleted: {}", expense.item);
        }
        ExpenseCommands::List {
            project,
            month,
            from,
            to,
            min,
            max,
            item,
            sort,
            order,
        } => {
            let project_id = project
                .map(|p| resolve_project(&ctx.store, &p).map(|p| p.id))
                .transpose()?;
            let filter = ExpenseFilter {
                project_id,
                month,
                from,
                to,
                min_amount: min,
                max_amount: max,
                item,
            };
            let mut expenses = filter_expenses(&ctx.store, &filter);
            sort_expenses(&mut expenses, sort, order);

            if expenses.is_empty() {
                println!("No expenses found");
            } else {
                ui::render_view_header("EXPENSES", expenses.len(), "expense");
                for expense in &expenses {
                    ui::render_expense_line(expense, &ctx.store);
                }
                let total: f64 = expenses.iter().map(|e| e.amount).sum();
                println!(
                    "\n  {} {}",
                    "Total:".dimmed(),
                    ui::format_amount(total, &ctx.store.settings.currency).bold()
                );
            }
        }
        ExpenseCommands::Search { query } => {
            let expenses = search_expenses(&ctx.store, &query);
            if expenses.is_empty() {
                println!("No expenses match '{}'", query);
            } else {
                ui::render_view_header(&format!("Search: {}", query), expenses.len(), "expense");
                for expense in expenses {
                    ui::render_expense_line(expense, &ctx.store);
                }
            }
        }
        ExpenseCommands::Stats { project, month } => {
            let project_id = project
                .map(|p| resolve_project(&ctx.store, &p).map(|p| p.id))
                .transpose()?;
            let filter = ExpenseFilter {
                project_id,
                month,
                ..ExpenseFilter::default()
            };
            let stats = expense_stats(filter_expenses(&ctx.store, &filter));
            let currency = &ctx.store.settings.currency;

            println!("{}", "EXPENSES".cyan());
            println!("{}", "─".repeat(30).dimmed());
            ui::render_field("Count", stats.count);
            ui::render_field("Total", ui::format_amount(stats.total, currency));
            ui::render_field("Average", ui::format_amount(stats.average, currency));

            if !stats.by_project.is_empty() {
                ui::render_section_header("By project");
                for (project_id, total) in stats.by_project {
                    let name = ctx
                        .store
                        .get_project(project_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| ui::short_id(project_id));
                    ui::render_field(&name, ui::format_amount(total, currency));
                }
            }
            if !stats.by_month.is_empty() {
                ui::render_section_header("By month");
                for (month, total) in stats.by_month {
                    ui::render_field(&month, ui::format_amount(total, currency));
                }
            }
        }
    }
    Ok(())
}

/// The task a timer command applies to. Without an explicit task the only
/// active timer is used.
fn timer_task(task: Option<String>, store: &Store) -> Result<String, String> {
    match task {
        Some(task) => Ok(task),
        None => single_active_timer(store)
            .map(|id| id.to_string())
            .ok_or_else(|| {
                if store.active_timers.is_empty() {
                    String::from("No active timer")
                } else {
                    String::from("Several timers are active, name the task")
                }
            }),
    }
}

fn run_timer(command: TimerCommands, ctx: &mut Context) -> CliResult {
    let now = ctx.now;
    match command {
        TimerCommands::Start { task } => {
            start_timer(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                TimerParameters { task, at: now },
            )?;
            println!("✓ Timer started");
        }
        TimerCommands::Pause { task } => {
            let task = timer_task(task, &ctx.store)?;
            let timer = pause_timer(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                TimerParameters { task, at: now },
            )?;
            println!(
                "✓ Timer paused at {}",
                format_minutes(timer.elapsed_minutes(now))
            );
        }
        TimerCommands::Resume { task } => {
            let task = timer_task(task, &ctx.store)?;
            resume_timer(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                TimerParameters { task, at: now },
            )?;
            println!("✓ Timer resumed");
        }
        TimerCommands::Stop { task } => {
            let task = timer_task(task, &ctx.store)?;
            let entry = stop_timer(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                TimerParameters { task, at: now },
            )?;
            println!("✓ Timer stopped: {} logged", format_minutes(entry.duration));
            println!("  └─ entry {}", ui::short_id(entry.id));
        }
        TimerCommands::Status => {
            ui::render_timer_status(&timer_status(&ctx.store, now));
        }
        TimerCommands::Edit {
            entry,
            task,
            start,
            end,
        } => {
            let entry = edit_time_entry(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                EditTimeEntryParameters {
                    entry,
                    task,
                    start_time: start,
                    end_time: end,
                    at: now,
                },
            )?;
            println!(
                "✓ Time entry {} updated ({})",
                ui::short_id(entry.id),
                format_minutes(entry.duration)
            );
        }
        TimerCommands::Delete { entry } => {
            let entry = delete_time_entry(&mut ctx.store, &ctx.storage, &mut ctx.events, &entry)?;
            println!("✓ Time entry deleted: {}", ui::short_id(entry.id));
        }
        TimerCommands::Day { date } => {
            let date = date.unwrap_or(ctx.today);
            let summary = daily_summary(&ctx.store.time_entries, date, &ctx.tz);
            println!(
                "\n  {} {}\n",
                date.strftime("%A, %b %d").to_string().cyan().bold(),
                format_minutes(summary.total_minutes).dimmed()
            );
            render_task_times(&summary.tasks, &ctx.store);
        }
        TimerCommands::Week { date } => {
            let date = date.unwrap_or(ctx.today);
            let summary = weekly_summary(&ctx.store.time_entries, date, &ctx.tz);
            println!(
                "\n  {} {}",
                format!("Week of {}", summary.week_start.strftime("%b %d")).cyan().bold(),
                format_minutes(summary.total_minutes).dimmed()
            );
            for day in &summary.days {
                ui::render_section_header(&format!(
                    "{} · {}",
                    day.date.strftime("%A"),
                    format_minutes(day.total_minutes)
                ));
                render_task_times(&day.tasks, &ctx.store);
            }
            if summary.days.is_empty() {
                println!("\n  {}", "No time logged".dimmed());
            }
        }
        TimerCommands::Total { task, project } => {
            let entries = &ctx.store.time_entries;
            let (name, minutes) = match (task, project) {
                (Some(task), _) => {
                    let task = services::resolve_task(&ctx.store, &task)?;
                    (task.name.clone(), task_total(entries, task.id))
                }
                (None, Some(project)) => {
                    let project = resolve_project(&ctx.store, &project)?;
                    (
                        project.name.clone(),
                        project_total(entries, &ctx.store.tasks, project.id),
                    )
                }
                (None, None) => return Err("Name a task or a project".into()),
            };
            println!("{}: {}", name.bold(), format_minutes(minutes));
        }
    }
    Ok(())
}

fn render_task_times(times: &[tracking::TaskTime], store: &Store) {
    if times.is_empty() {
        println!("  {}", "No time logged".dimmed());
        return;
    }
    for time in times {
        let name = store
            .get_task(time.task_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| ui::short_id(time.task_id));
        println!(
            "  {:>8}  {}  {}",
            format_minutes(time.minutes),
            name,
            format!("({} entries)", time.entries).dimmed()
        );
    }
}

fn run_analytics(command: AnalyticsCommands, ctx: &Context) -> CliResult {
    let store = &ctx.store;
    let analytics = Analytics::new(store, ctx.today);
    let currency = &store.settings.currency;

    match command {
        AnalyticsCommands::Project { project } => {
            let project = resolve_project(store, &project)?;
            println!("\n  {}", project.name.cyan().bold());

            ui::render_section_header("Progress");
            ui::render_prediction(&analytics.predict_progress_or_degraded(project.id));

            ui::render_section_header("Efficiency");
            ui::render_efficiency(&analytics.efficiency(project.id)?);

            ui::render_section_header("Risk");
            ui::render_risk(&analytics.assess_risk_or_maximal(project.id));

            ui::render_section_header("Health");
            ui::render_health(&analytics.health_score(project.id)?);

            let suggestions = analytics.improvement_suggestions(project.id)?;
            if !suggestions.is_empty() {
                ui::render_section_header("Suggestions");
                ui::render_recommendations(&suggestions);
            }
            println!();
        }
        AnalyticsCommands::Overview => {
            let overview = analytics.progress_overview();
            println!(
                "\n  {} {}",
                "PROGRESS".cyan().bold(),
                format!("{}% overall", overview.overall).dimmed()
            );

            ui::render_section_header("By project");
            let rows: Vec<Vec<String>> = overview
                .by_project
                .iter()
                .map(|p| {
                    vec![
                        p.project_name.clone(),
                        p.status.label().to_string(),
                        format!("{}%", p.progress),
                        format!("{}/{}", p.completed_tasks, p.total_tasks),
                        p.end_date.clone(),
                    ]
                })
                .collect();
            ui::render_table(&["Project", "Status", "Progress", "Tasks", "Deadline"], &rows);

            ui::render_section_header("By status");
            for status in &overview.by_status {
                ui::render_field(
                    status.status.label(),
                    format!("{} project(s), {}% average", status.count, status.average_progress),
                );
            }

            ui::render_section_header("By priority");
            for priority in &overview.by_priority {
                ui::render_field(
                    priority.priority.label(),
                    format!(
                        "{}/{} done ({}%)",
                        priority.completed, priority.total, priority.progress
                    ),
                );
            }

            if !overview.milestones.is_empty() {
                ui::render_section_header("Milestones");
                for milestone in &overview.milestones {
                    println!(
                        "  {} {} reached {}%",
                        "◆".green(),
                        milestone.project_name,
                        milestone.milestone
                    );
                }
            }
            println!();
        }
        AnalyticsCommands::Timeline { days } => {
            let timeline = analytics.progress_timeline(days, &ctx.tz);
            let rows: Vec<Vec<String>> = timeline
                .iter()
                .map(|day| {
                    vec![
                        day.date.to_string(),
                        day.completed_tasks.to_string(),
                        day.new_tasks.to_string(),
                        format!("{:+}", day.net_progress),
                    ]
                })
                .collect();
            ui::render_view_header("TIMELINE", timeline.len(), "day");
            ui::render_table(&["Date", "Completed", "New", "Net"], &rows);
        }
        AnalyticsCommands::Budget => {
            let budgets = analytics.project_budgets();
            let rows: Vec<Vec<String>> = budgets
                .iter()
                .map(|b| {
                    let over = if b.is_over_budget { " over" } else { "" };
                    vec![
                        b.project_name.clone(),
                        ui::format_amount(b.budget, currency),
                        ui::format_amount(b.expenses, currency),
                        ui::format_amount(b.remaining, currency),
                        format!("{}%{}", b.usage_rate, over),
                    ]
                })
                .collect();
            ui::render_section_header("Budgets");
            ui::render_table(&["Project", "Budget", "Spent", "Remaining", "Usage"], &rows);

            let trends = analytics.budget_trends();
            let rows: Vec<Vec<String>> = trends
                .iter()
                .map(|t| {
                    vec![
                        t.month.clone(),
                        ui::format_amount(t.total_expense, currency),
                        t.project_count.to_string(),
                        t.expense_count.to_string(),
                        ui::format_amount(t.average_expense, currency),
                    ]
                })
                .collect();
            ui::render_section_header("Monthly trend");
            ui::render_table(&["Month", "Total", "Projects", "Expenses", "Average"], &rows);

            let categories = analytics.expense_categories();
            let rows: Vec<Vec<String>> = categories
                .iter()
                .map(|c| {
                    vec![
                        c.name.clone(),
                        ui::format_amount(c.total, currency),
                        c.count.to_string(),
                    ]
                })
                .collect();
            ui::render_section_header("Categories");
            ui::render_table(&["Item", "Total", "Count"], &rows);

            let budget_alerts = analytics.budget_alerts();
            if !budget_alerts.is_empty() {
                ui::render_section_header("Alerts");
                for alert in budget_alerts {
                    println!("  {} {}: {}", "●".red(), alert.project_name, alert.message());
                }
            }
            println!();
        }
        AnalyticsCommands::Productivity => {
            let summary = analytics.productivity_summary();
            ui::render_section_header("Summary");
            ui::render_field("Completed tasks", summary.completed_tasks);
            ui::render_field("Estimated hours", format!("{:.1}", summary.estimated_hours));
            ui::render_field("Actual hours", format!("{:.1}", summary.actual_hours));
            ui::render_field("Efficiency", format!("{}%", summary.efficiency));
            ui::render_field(
                "Hours per task",
                format!("{:.1}", summary.average_hours_per_task),
            );

            let rows: Vec<Vec<String>> = analytics
                .team_productivity()
                .iter()
                .map(|p| {
                    vec![
                        p.project_name.clone(),
                        format!("{}/{}", p.completed_tasks, p.total_tasks),
                        format!("{:.1}%", p.completion_rate),
                        format!("{} day(s)", p.average_task_duration),
                    ]
                })
                .collect();
            ui::render_section_header("Projects");
            ui::render_table(&["Project", "Done", "Completion", "Avg duration"], &rows);

            let rows: Vec<Vec<String>> = analytics
                .project_time_efficiency()
                .iter()
                .map(|p| {
                    vec![
                        p.project_name.clone(),
                        format!("{:.1}", p.estimated_hours),
                        format!("{:.1}", p.actual_hours),
                        format!("{}%", p.efficiency),
                    ]
                })
                .collect();
            ui::render_section_header("Estimate accuracy");
            ui::render_table(&["Project", "Estimated", "Actual", "Efficiency"], &rows);

            let rows: Vec<Vec<String>> = analytics
                .task_performance()
                .iter()
                .map(|t| {
                    vec![
                        t.task_name.clone(),
                        format!("{:.1}", t.estimated_hours),
                        format!("{:.1}", t.actual_hours),
                        format!("{}%", t.efficiency),
                        if t.is_on_time { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            ui::render_section_header("Completed tasks");
            ui::render_table(&["Task", "Estimated", "Actual", "Efficiency", "On time"], &rows);
            println!();
        }
        AnalyticsCommands::Dependencies => {
            let projects = analytics.project_dependencies();
            if projects.is_empty() {
                println!("No projects");
            }
            for project in projects {
                ui::render_section_header(&project.project_name);
                ui::render_field("Risk", ui::risk_level(project.risk.level));
                ui::render_field("Risk score", project.risk.score);
                for dependency in &project.dependencies {
                    println!("  {} {}", "!".red().bold(), dependency.task_name.bold());
                    for dependent in &dependency.dependents {
                        let how = match dependent.kind {
                            DependencyKind::Explicit => "depends on it",
                            DependencyKind::DueLater => "due later",
                        };
                        println!("    └─ {} {}", dependent.task_name, format!("({how})").dimmed());
                    }
                }
            }
        }
        AnalyticsCommands::Bottlenecks => {
            let bottlenecks = analytics.bottlenecks();
            if bottlenecks.is_empty() {
                println!("{} No bottlenecks", "✓".green());
            } else {
                let rows: Vec<Vec<String>> = bottlenecks
                    .iter()
                    .map(|b| {
                        vec![
                            b.task_name.clone(),
                            format!("{:.1}", b.estimated_hours),
                            format!("{:.1}", b.actual_hours),
                            format!("+{:.1}", b.delay_hours),
                        ]
                    })
                    .collect();
                ui::render_view_header("BOTTLENECKS", bottlenecks.len(), "task");
                ui::render_table(&["Task", "Estimated", "Logged", "Over"], &rows);
            }
        }
    }
    Ok(())
}

fn run_report(
    ctx: &Context,
    kind: ReportKind,
    html: bool,
    json: bool,
    output: Option<PathBuf>,
) -> CliResult {
    let generator = ReportGenerator::new(&ctx.store, ctx.now, ctx.tz.clone());
    let report = generator.generate(kind);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if html {
        let path = output.unwrap_or_else(|| {
            PathBuf::from(format!("{}-{}.html", slug::slugify(&report.title), ctx.today))
        });
        std::fs::write(&path, to_html(&report))
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        println!("✓ {} written to {}", report.title, path.display());
    } else {
        ui::render_report(&report);
    }
    Ok(())
}

fn run_settings(command: SettingsCommands, ctx: &mut Context) -> CliResult {
    match command {
        SettingsCommands::Show => {
            let settings = &ctx.store.settings;
            println!("{}", "SETTINGS".cyan());
            println!("{}", "─".repeat(30).dimmed());
            ui::render_field("Language", &settings.language);
            ui::render_field("Currency", &settings.currency);
            ui::render_field("Time zone", &settings.timezone);
            ui::render_field("Data file", ctx.storage.path().display());
            if let Some(path) = Config::default_path() {
                ui::render_field("Config file", path.display());
            }
        }
        SettingsCommands::Set {
            language,
            currency,
            timezone,
        } => {
            let settings = update_settings(
                &mut ctx.store,
                &ctx.storage,
                &mut ctx.events,
                UpdateSettingsParameters {
                    language,
                    currency,
                    timezone,
                },
            )?;
            println!(
                "✓ Settings updated: {}, {}, {}",
                settings.language, settings.currency, settings.timezone
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-03"), Ok((2025, 3)));
        assert_eq!(parse_month(" 2024-12 "), Ok((2024, 12)));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("March").is_err());
    }

    #[test]
    fn test_task_edit_can_clear_dependencies() {
        let cli = Cli::try_parse_from(["ptrack", "task", "edit", "Design", "--depends-on"]).unwrap();
        let Commands::Task(TaskCommands::Edit { depends_on, .. }) = cli.command else {
            panic!("expected task edit");
        };
        assert_eq!(depends_on, Some(Vec::new()));
    }

    #[test]
    fn test_report_output_requires_html() {
        assert!(Cli::try_parse_from(["ptrack", "report", "budget", "-o", "out.html"]).is_err());
        assert!(Cli::try_parse_from(["ptrack", "report", "budget", "--html", "-o", "out.html"]).is_ok());
    }
}
