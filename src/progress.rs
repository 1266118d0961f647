use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::{ACHIEVEMENTS, Achievement};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementProgress {
    pub current: Achievement,
    pub next: Achievement,
    /// Progress towards `next`, clamped to 0..=100
    pub percent: f64,
}

/// Locate `count` in the achievement table.
///
/// Below the first threshold both `current` and `next` are the first
/// level. At the top level `next == current` and progress is reported as
/// complete.
pub fn achievement_progress(count: u32) -> AchievementProgress {
    let first = ACHIEVEMENTS[0];

    if count < first.message_count {
        return AchievementProgress {
            current: first,
            next: first,
            percent: f64::from(count) / f64::from(first.message_count) * 100.0,
        };
    }

    let reached = ACHIEVEMENTS
        .iter()
        .rposition(|a| count >= a.message_count)
        .unwrap_or(0);
    let current = ACHIEVEMENTS[reached];
    let next = ACHIEVEMENTS.get(reached + 1).copied().unwrap_or(current);

    let span = next.message_count.saturating_sub(current.message_count);
    let percent = if span == 0 {
        100.0
    } else {
        f64::from(count - current.message_count) / f64::from(span) * 100.0
    };

    AchievementProgress {
        current,
        next,
        percent: percent.clamp(0.0, 100.0),
    }
}

/// Aggregate view over the message-count ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub teachers_chatted: usize,
    pub total_messages: u64,
}

pub fn summarize(counts: &HashMap<String, u32>) -> ProgressSummary {
    ProgressSummary {
        teachers_chatted: counts.values().filter(|&&c| c > 0).count(),
        total_messages: counts.values().map(|&c| u64::from(c)).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_messages_points_at_first_level() {
        let p = achievement_progress(0);
        assert_eq!(p.current.title, "Beginner");
        assert_eq!(p.next.title, "Beginner");
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn below_first_threshold_is_fractional() {
        let p = achievement_progress(3);
        assert_eq!(p.current.level, 1);
        assert!((p.percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn between_levels() {
        // 25 -> Knowledge Seeker, next Scholar at 50
        let p = achievement_progress(30);
        assert_eq!(p.current.title, "Knowledge Seeker");
        assert_eq!(p.next.title, "Scholar");
        assert!((p.percent - 20.0).abs() < 1e-9);

        let exact = achievement_progress(10);
        assert_eq!(exact.current.title, "Curious Mind");
        assert_eq!(exact.percent, 0.0);
    }

    #[test]
    fn top_level_is_complete() {
        let p = achievement_progress(250);
        assert_eq!(p.current.title, "Master");
        assert_eq!(p.next.title, "Master");
        assert_eq!(p.percent, 100.0);
    }

    #[test]
    fn summary_counts_active_personas() {
        let counts = HashMap::from([
            ("math".to_string(), 4),
            ("physics".to_string(), 0),
            ("history".to_string(), 7),
        ]);
        let s = summarize(&counts);
        assert_eq!(s.teachers_chatted, 2);
        assert_eq!(s.total_messages, 11);
    }
}
