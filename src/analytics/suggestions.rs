use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{Analytics, AnalyticsError, DataSource, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Urgent,
    Critical,
    Warning,
    Info,
    Improvement,
}

impl RecommendationKind {
    pub fn label(self) -> &'static str {
        match self {
            RecommendationKind::Urgent => "urgent",
            RecommendationKind::Critical => "critical",
            RecommendationKind::Warning => "warning",
            RecommendationKind::Info => "info",
            RecommendationKind::Improvement => "improvement",
        }
    }
}

/// Advice attached to reports and project analytics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
}

impl Recommendation {
    pub fn new(kind: RecommendationKind, title: &str, description: String, actions: &[&str]) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description,
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl<D: DataSource> Analytics<'_, D> {
    pub fn improvement_suggestions(&self, project_id: Uuid) -> Result<Vec<Recommendation>, AnalyticsError> {
        let project = self.project(project_id)?;
        let prediction = self.predict_progress_or_degraded(project_id);
        let efficiency = self.efficiency(project_id)?;

        let mut suggestions = Vec::new();

        if prediction.risk_level == RiskLevel::High {
            suggestions.push(Recommendation::new(
                RecommendationKind::Urgent,
                "High risk of delay",
                format!(
                    "At {}% progress the project will not finish by {}.",
                    prediction.current_progress, project.end_date
                ),
                &[
                    "Raise the priority of critical tasks",
                    "Consider adding resources",
                    "Review the project scope",
                ],
            ));
        }

        if prediction.remaining_days < 7 {
            suggestions.push(Recommendation::new(
                RecommendationKind::Warning,
                "Deadline approaching",
                format!("The project ends in {} days.", prediction.remaining_days),
                &[
                    "Go through the final checklist",
                    "Check deliverable quality",
                    "Report progress to stakeholders",
                ],
            ));
        }

        if efficiency.overall < 50 {
            suggestions.push(Recommendation::new(
                RecommendationKind::Improvement,
                "Efficiency needs attention",
                format!("The current efficiency score is {}.", efficiency.overall),
                &[
                    "Improve task estimates",
                    "Cut unnecessary process steps",
                    "Invest in team skills",
                ],
            ));
        }

        Ok(suggestions)
    }
}
