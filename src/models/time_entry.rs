use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One finished timer interval. Never mutated except through an explicit edit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Whole minutes, computed when the timer stops
    pub duration: i64,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// Running or paused timer for a task. A task without one is idle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTimer {
    pub task_id: Uuid,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

impl ActiveTimer {
    pub fn new(task_id: Uuid, now: Timestamp) -> Self {
        Self {
            task_id,
            started_at: now,
            paused_at: None,
        }
    }

    pub fn state(&self) -> TimerState {
        if self.paused_at.is_some() {
            TimerState::Paused
        } else {
            TimerState::Running
        }
    }

    /// Elapsed time so far. A paused timer is frozen at its pause instant.
    pub fn elapsed(&self, now: Timestamp) -> SignedDuration {
        let end = self.paused_at.unwrap_or(now);
        end.duration_since(self.started_at)
    }

    pub fn elapsed_minutes(&self, now: Timestamp) -> i64 {
        whole_minutes(self.elapsed(now))
    }

    pub fn pause(&mut self, now: Timestamp) {
        self.paused_at = Some(now);
    }

    /// Moves the start forward by the paused span so elapsed time stays continuous
    pub fn resume(&mut self, now: Timestamp) {
        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = now.duration_since(paused_at);
            self.started_at = self
                .started_at
                .checked_add(paused_for)
                .unwrap_or(self.started_at);
        }
    }
}

/// Rounds to the nearest minute, halves rounding up
pub fn whole_minutes(duration: SignedDuration) -> i64 {
    let millis = duration.as_millis();
    ((millis as f64) / 60_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_second(1_700_000_000 + secs).unwrap()
    }

    #[test]
    fn test_whole_minutes_rounds_to_nearest() {
        assert_eq!(whole_minutes(SignedDuration::from_secs(89)), 1);
        assert_eq!(whole_minutes(SignedDuration::from_secs(90)), 2);
        assert_eq!(whole_minutes(SignedDuration::from_secs(29)), 0);
    }

    #[test]
    fn test_pause_freezes_elapsed_time() {
        let mut timer = ActiveTimer::new(Uuid::new_v4(), at(0));
        timer.pause(at(600));
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.elapsed_minutes(at(3_600)), 10);
    }

    #[test]
    fn test_resume_shifts_start_forward() {
        let mut timer = ActiveTimer::new(Uuid::new_v4(), at(0));
        timer.pause(at(600));
        timer.resume(at(1_500));

        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.started_at, at(900));
        assert_eq!(timer.elapsed_minutes(at(2_100)), 20);
    }
}
