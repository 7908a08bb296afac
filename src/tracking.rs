//! Aggregations over logged time. Day boundaries are local to the
//! configured time zone.

use std::collections::BTreeMap;

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{add_days, task::Task, time_entry::TimeEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTime {
    pub task_id: Uuid,
    pub minutes: i64,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: Date,
    pub total_minutes: i64,
    pub tasks: Vec<TaskTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    /// The Sunday the week starts on
    pub week_start: Date,
    pub total_minutes: i64,
    /// Days with logged time, in date order
    pub days: Vec<DaySummary>,
}

pub fn local_date(ts: Timestamp, tz: &TimeZone) -> Date {
    ts.to_zoned(tz.clone()).date()
}

/// Sums entries per task in order of first appearance
fn group_by_task<'e>(entries: impl IntoIterator<Item = &'e TimeEntry>) -> Vec<TaskTime> {
    let mut tasks: Vec<TaskTime> = Vec::new();
    for entry in entries {
        match tasks.iter_mut().find(|t| t.task_id == entry.task_id) {
            Some(task) => {
                task.minutes += entry.duration;
                task.entries += 1;
            }
            None => tasks.push(TaskTime {
                task_id: entry.task_id,
                minutes: entry.duration,
                entries: 1,
            }),
        }
    }
    tasks
}

/// Time per task for entries that started on `date`
pub fn daily_summary(entries: &[TimeEntry], date: Date, tz: &TimeZone) -> DaySummary {
    let tasks = group_by_task(
        entries
            .iter()
            .filter(|e| local_date(e.start_time, tz) == date),
    );
    DaySummary {
        date,
        total_minutes: tasks.iter().map(|t| t.minutes).sum(),
        tasks,
    }
}

pub fn week_start(date: Date) -> Date {
    let offset = i64::from(date.weekday().to_sunday_zero_offset());
    add_days(date, -offset).unwrap_or(date)
}

/// Time per day for the Sunday-to-Saturday week containing `date`
pub fn weekly_summary(entries: &[TimeEntry], date: Date, tz: &TimeZone) -> WeekSummary {
    let start = week_start(date);
    let end = add_days(start, 7).unwrap_or(date);

    let mut by_day: BTreeMap<Date, Vec<&TimeEntry>> = BTreeMap::new();
    for entry in entries {
        let day = local_date(entry.start_time, tz);
        if day >= start && day < end {
            by_day.entry(day).or_default().push(entry);
        }
    }

    let days: Vec<DaySummary> = by_day
        .into_iter()
        .map(|(date, entries)| {
            let tasks = group_by_task(entries);
            DaySummary {
                date,
                total_minutes: tasks.iter().map(|t| t.minutes).sum(),
                tasks,
            }
        })
        .collect();

    WeekSummary {
        week_start: start,
        total_minutes: days.iter().map(|d| d.total_minutes).sum(),
        days,
    }
}

pub fn task_total(entries: &[TimeEntry], task_id: Uuid) -> i64 {
    entries
        .iter()
        .filter(|e| e.task_id == task_id)
        .map(|e| e.duration)
        .sum()
}

pub fn project_total(entries: &[TimeEntry], tasks: &[Task], project_id: Uuid) -> i64 {
    let task_ids: Vec<Uuid> = tasks
        .iter()
        .filter(|t| t.project_id == project_id)
        .map(|t| t.id)
        .collect();
    entries
        .iter()
        .filter(|e| task_ids.contains(&e.task_id))
        .map(|e| e.duration)
        .sum()
}

/// Every task with logged time, most time first
pub fn time_breakdown(entries: &[TimeEntry]) -> Vec<TaskTime> {
    let mut tasks = group_by_task(entries);
    tasks.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    tasks
}

/// Logged minutes per local day, oldest first
pub fn daily_totals(entries: &[TimeEntry], tz: &TimeZone) -> Vec<(Date, i64)> {
    let mut days: BTreeMap<Date, i64> = BTreeMap::new();
    for entry in entries {
        *days.entry(local_date(entry.start_time, tz)).or_default() += entry.duration;
    }
    days.into_iter().collect()
}

/// `1h 05m`, or `45m` under an hour
pub fn format_minutes(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.abs();
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{sign}{m}m"),
        (h, m) => format!("{sign}{h}h {m:02}m"),
    }
}
