//! Structured reports built from analytics, renderable to the terminal or
//! to a standalone HTML page.

use std::fmt;

use clap::ValueEnum;
use jiff::Timestamp;
use serde::Serialize;

use crate::analytics::suggestions::Recommendation;

pub mod generator;
pub mod html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    Progress,
    Time,
    Budget,
    Productivity,
    Risk,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Progress,
        ReportKind::Time,
        ReportKind::Budget,
        ReportKind::Productivity,
        ReportKind::Risk,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Progress => "Project Progress Report",
            ReportKind::Time => "Time Analysis Report",
            ReportKind::Budget => "Budget Report",
            ReportKind::Productivity => "Team Productivity Report",
            ReportKind::Risk => "Risk Assessment Report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Int(i64),
    Number(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for SummaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryValue::Int(v) => write!(f, "{v}"),
            SummaryValue::Number(v) => write!(f, "{v:.2}"),
            SummaryValue::Bool(true) => f.write_str("Yes"),
            SummaryValue::Bool(false) => f.write_str("No"),
            SummaryValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<usize> for SummaryValue {
    fn from(value: usize) -> Self {
        SummaryValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for SummaryValue {
    fn from(value: i64) -> Self {
        SummaryValue::Int(value)
    }
}

impl From<u32> for SummaryValue {
    fn from(value: u32) -> Self {
        SummaryValue::Int(i64::from(value))
    }
}

impl From<f64> for SummaryValue {
    fn from(value: f64) -> Self {
        SummaryValue::Number(value)
    }
}

impl From<bool> for SummaryValue {
    fn from(value: bool) -> Self {
        SummaryValue::Bool(value)
    }
}

impl From<&str> for SummaryValue {
    fn from(value: &str) -> Self {
        SummaryValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: &'static str,
    pub value: SummaryValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(title: &'static str, headers: &[&'static str]) -> Self {
        Self {
            title,
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub kind: ReportKind,
    pub title: String,
    pub generated_at: Timestamp,
    pub summary: Vec<SummaryEntry>,
    pub tables: Vec<ReportTable>,
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    pub fn summary_value(&self, label: &str) -> Option<&SummaryValue> {
        self.summary.iter().find(|e| e.label == label).map(|e| &e.value)
    }

    pub fn table(&self, title: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.title == title)
    }
}
