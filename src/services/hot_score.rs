//! Hot score used to rank open tasks.

use chrono::{DateTime, Utc};

use crate::domain::models::{HotScoreConfig, Task};

/// Ranks open tasks.
///
/// Score formula:
/// `priority_weight * priority + reward_weight * dopamine_reward + age_bonus`,
/// where `age_bonus = min(max_age_bonus, age_weight_per_hour * hours_past_grace)`.
/// Every term is non-decreasing in its input, so raising priority or reward
/// never lowers the score and neither does waiting.
#[derive(Debug, Clone)]
pub struct HotScoreCalculator {
    priority_weight: f64,
    reward_weight: f64,
    age_weight_per_hour: f64,
    age_grace_minutes: u64,
    max_age_bonus: f64,
}

impl Default for HotScoreCalculator {
    fn default() -> Self {
        Self::new(&HotScoreConfig::default())
    }
}

impl HotScoreCalculator {
    /// Calculator using the configured weights.
    pub fn new(config: &HotScoreConfig) -> Self {
        Self {
            priority_weight: config.priority_weight,
            reward_weight: config.reward_weight,
            age_weight_per_hour: config.age_weight_per_hour,
            age_grace_minutes: config.age_grace_minutes,
            max_age_bonus: config.max_age_bonus,
        }
    }

    /// Score a task as of `now`.
    pub fn score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        self.score_parts(task.priority, task.dopamine_reward, task.created_at, now)
    }

    /// Score from raw inputs, for tasks not yet persisted.
    pub fn score_parts(&self, priority: i32, dopamine_reward: f64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let base = self.priority_weight * f64::from(priority);
        let reward = self.reward_weight * dopamine_reward;
        base + reward + self.age_bonus(created_at, now)
    }

    fn age_bonus(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_minutes = (now - created_at).num_seconds() as f64 / 60.0;
        let past_grace = (age_minutes - self.age_grace_minutes as f64).max(0.0);
        (self.age_weight_per_hour * past_grace / 60.0).min(self.max_age_bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NewTask;
    use chrono::Duration;
    use proptest::prelude::*;

    fn task_at(priority: i32, reward: f64, created_at: DateTime<Utc>) -> Task {
        Task::open(NewTask::new("T", "D", "C").with_priority(priority).with_reward(reward), created_at)
    }

    #[test]
    fn test_fresh_task_has_no_age_bonus() {
        let calc = HotScoreCalculator::default();
        let now = Utc::now();
        // 1.0 * 5 + 2.0 * 1.5
        assert_eq!(calc.score(&task_at(5, 1.5, now), now), 8.0);
    }

    #[test]
    fn test_age_bonus_starts_after_grace() {
        let calc = HotScoreCalculator::default();
        let now = Utc::now();
        let within_grace = task_at(5, 0.0, now - Duration::minutes(59));
        let two_hours_past = task_at(5, 0.0, now - Duration::minutes(180));

        assert_eq!(calc.score(&within_grace, now), 5.0);
        assert!((calc.score(&two_hours_past, now) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_age_bonus_is_capped() {
        let calc = HotScoreCalculator::default();
        let now = Utc::now();
        let ancient = task_at(1, 0.0, now - Duration::days(30));
        assert_eq!(calc.score(&ancient, now), 11.0);
    }

    #[test]
    fn test_future_creation_time_is_not_penalised() {
        let calc = HotScoreCalculator::default();
        let now = Utc::now();
        assert_eq!(calc.score(&task_at(3, 0.0, now + Duration::minutes(5)), now), 3.0);
    }

    proptest! {
        #[test]
        fn score_is_monotonic_in_priority(p in 1i32..1000, bump in 1i32..1000, reward in 0.0f64..100.0) {
            let calc = HotScoreCalculator::default();
            let now = Utc::now();
            prop_assert!(calc.score_parts(p + bump, reward, now, now) > calc.score_parts(p, reward, now, now));
        }

        #[test]
        fn score_is_monotonic_in_reward(p in 1i32..1000, reward in 0.0f64..100.0, bump in 0.001f64..100.0) {
            let calc = HotScoreCalculator::default();
            let now = Utc::now();
            prop_assert!(calc.score_parts(p, reward + bump, now, now) > calc.score_parts(p, reward, now, now));
        }

        #[test]
        fn score_never_drops_with_age(p in 1i32..100, minutes in 0i64..100_000, later in 0i64..100_000) {
            let calc = HotScoreCalculator::default();
            let created = Utc::now();
            let first = created + Duration::minutes(minutes);
            let second = first + Duration::minutes(later);
            prop_assert!(calc.score_parts(p, 1.0, created, second) >= calc.score_parts(p, 1.0, created, first));
        }
    }
}
