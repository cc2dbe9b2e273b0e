//! Daily streak state machine.
//!
//! The transition is a pure function over the previous record and today's
//! calendar date; persistence lives in the indexer storage layer. Calls are
//! re-entrant: a second touch on the same day is a no-op.

use chrono::{Days, NaiveDate};

use crate::constants::streak_milestone_bonus;

/// Persisted daily streak state for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakRecord {
    /// Calendar date of the most recent login.
    pub last_login: NaiveDate,
    /// Current consecutive-day streak.
    pub current_streak: u32,
    /// Longest streak ever reached.
    pub longest_streak: u32,
    /// Total milestone bonus points granted over the record's lifetime.
    pub bonus_points_earned: u64,
}

/// What a touch did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakStatus {
    /// Record created fresh or reset after a gap.
    Created,
    /// Streak extended by one day.
    Updated,
    /// Same-day repeat; nothing changed.
    NoChange,
}

impl StreakStatus {
    /// Wire string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreakStatus::Created => "created",
            StreakStatus::Updated => "updated",
            StreakStatus::NoChange => "no-change",
        }
    }
}

/// Result of applying one login touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakOutcome {
    /// The record after the transition.
    pub record: StreakRecord,
    /// What happened.
    pub status: StreakStatus,
    /// Milestone bonus granted by this exact call (0 unless the streak just
    /// reached 7, 14, or 30).
    pub change_in_points: u64,
}

/// Apply one login touch for `today`.
///
/// Milestone bonuses fire only on the increment transition; the no-change
/// transition can never grant points, which makes same-day retries safe.
pub fn advance(existing: Option<&StreakRecord>, today: NaiveDate) -> StreakOutcome {
    let Some(existing) = existing else {
        return StreakOutcome {
            record: StreakRecord {
                last_login: today,
                current_streak: 1,
                longest_streak: 1,
                bonus_points_earned: 0,
            },
            status: StreakStatus::Created,
            change_in_points: 0,
        };
    };

    if existing.last_login == today {
        return StreakOutcome {
            record: *existing,
            status: StreakStatus::NoChange,
            change_in_points: 0,
        };
    }

    let yesterday = today.checked_sub_days(Days::new(1));
    if yesterday == Some(existing.last_login) {
        let streak = existing.current_streak + 1;
        let bonus = streak_milestone_bonus(streak);
        return StreakOutcome {
            record: StreakRecord {
                last_login: today,
                current_streak: streak,
                longest_streak: existing.longest_streak.max(streak),
                bonus_points_earned: existing.bonus_points_earned + bonus,
            },
            status: StreakStatus::Updated,
            change_in_points: bonus,
        };
    }

    // Gap of two or more days: the streak resets.
    StreakOutcome {
        record: StreakRecord {
            last_login: today,
            current_streak: 1,
            longest_streak: existing.longest_streak.max(1),
            bonus_points_earned: existing.bonus_points_earned,
        },
        status: StreakStatus::Created,
        change_in_points: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_first_login_creates() {
        let outcome = advance(None, day(1));
        assert_eq!(outcome.status, StreakStatus::Created);
        assert_eq!(outcome.record.current_streak, 1);
        assert_eq!(outcome.record.longest_streak, 1);
        assert_eq!(outcome.record.bonus_points_earned, 0);
        assert_eq!(outcome.change_in_points, 0);
    }

    #[test]
    fn test_consecutive_day_increments() {
        let first = advance(None, day(1));
        let second = advance(Some(&first.record), day(2));
        assert_eq!(second.status, StreakStatus::Updated);
        assert_eq!(second.record.current_streak, 2);
        assert_eq!(second.record.longest_streak, 2);
    }

    #[test]
    fn test_same_day_is_no_change() {
        let first = advance(None, day(1));
        let repeat = advance(Some(&first.record), day(1));
        assert_eq!(repeat.status, StreakStatus::NoChange);
        assert_eq!(repeat.record, first.record);
        assert_eq!(repeat.change_in_points, 0);
    }

    #[test]
    fn test_gap_resets_to_one() {
        let mut record = advance(None, day(1)).record;
        record = advance(Some(&record), day(2)).record;
        // Day 3 skipped.
        let outcome = advance(Some(&record), day(4));
        assert_eq!(outcome.status, StreakStatus::Created);
        assert_eq!(outcome.record.current_streak, 1);
        // Longest survives the reset.
        assert_eq!(outcome.record.longest_streak, 2);
    }

    #[test]
    fn test_milestone_fires_once() {
        let mut record = advance(None, day(1)).record;
        for d in 2..=6 {
            let outcome = advance(Some(&record), day(d));
            assert_eq!(outcome.change_in_points, 0);
            record = outcome.record;
        }

        // Day 7 reaches the first milestone.
        let outcome = advance(Some(&record), day(7));
        assert_eq!(outcome.record.current_streak, 7);
        assert_eq!(outcome.change_in_points, 50);
        assert_eq!(outcome.record.bonus_points_earned, 50);

        // Same-day repeat grants nothing.
        let repeat = advance(Some(&outcome.record), day(7));
        assert_eq!(repeat.status, StreakStatus::NoChange);
        assert_eq!(repeat.change_in_points, 0);
        assert_eq!(repeat.record.bonus_points_earned, 50);
    }

    #[test]
    fn test_later_milestones() {
        let mut record = advance(None, day(1)).record;
        let mut granted = Vec::new();
        for d in 2..=30 {
            let outcome = advance(Some(&record), day(d));
            if outcome.change_in_points > 0 {
                granted.push((outcome.record.current_streak, outcome.change_in_points));
            }
            record = outcome.record;
        }
        assert_eq!(granted, vec![(7, 50), (14, 125), (30, 300)]);
        assert_eq!(record.bonus_points_earned, 475);
    }

    #[test]
    fn test_reset_crosses_month_boundary() {
        let last = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let record = StreakRecord {
            last_login: last,
            current_streak: 3,
            longest_streak: 3,
            bonus_points_earned: 0,
        };
        let outcome = advance(
            Some(&record),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        assert_eq!(outcome.status, StreakStatus::Updated);
        assert_eq!(outcome.record.current_streak, 4);
    }
}
