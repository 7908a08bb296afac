use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{
    Analytics, AnalyticsError, DataSource, RiskLevel, efficiency::EfficiencyScore,
    progress::ProgressPrediction,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub project_id: Uuid,
    pub progress_score: f64,
    pub efficiency_score: u8,
    pub score: u8,
}

pub fn progress_score(prediction: &ProgressPrediction) -> f64 {
    if prediction.is_on_track {
        100.0
    } else if prediction.risk_level == RiskLevel::High {
        50.0
    } else {
        75.0
    }
}

/// 40% schedule, 60% efficiency
pub fn combine_health(progress_score: f64, efficiency: &EfficiencyScore) -> u8 {
    let score = (0.4 * progress_score + 0.6 * f64::from(efficiency.overall)).round();
    score.clamp(0.0, 100.0) as u8
}

impl<D: DataSource> Analytics<'_, D> {
    pub fn health_score(&self, project_id: Uuid) -> Result<HealthScore, AnalyticsError> {
        let efficiency = self.efficiency(project_id)?;
        let prediction = self.predict_progress_or_degraded(project_id);
        let progress_score = progress_score(&prediction);

        Ok(HealthScore {
            project_id,
            progress_score,
            efficiency_score: efficiency.overall,
            score: combine_health(progress_score, &efficiency),
        })
    }
}
