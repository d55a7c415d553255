use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::DayRange;
use crate::ledger::{CompletionLedger, CompletionState};
use crate::schedule::{is_scheduled, Habit};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completed: u32,
    pub total_missed: u32,
    pub completed_outside_schedule: u32,
}

/// First day of the evaluation window.
///
/// Uses `habit.start_date` when present. Otherwise falls back to the earliest
/// date recorded in the ledger, and to `today` for an empty ledger, so the
/// window is never unbounded.
pub fn evaluation_start(habit: &Habit, ledger: &CompletionLedger, today: NaiveDate) -> NaiveDate {
    habit
        .start_date
        .or_else(|| ledger.first_date())
        .unwrap_or(today)
}

impl Habit {
    pub fn window_start(&self, ledger: &CompletionLedger, today: NaiveDate) -> NaiveDate {
        evaluation_start(self, ledger, today)
    }
}

pub fn evaluation_window(habit: &Habit, ledger: &CompletionLedger, today: NaiveDate) -> DayRange {
    DayRange::new(evaluation_start(habit, ledger, today), today)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayOutcome {
    Completed,
    Missed,
    /// Scheduled, unset, and equal to `today`.
    Pending,
    Unscheduled { completed: bool },
}

fn day_outcome(
    habit: &Habit,
    ledger: &CompletionLedger,
    day: NaiveDate,
    today: NaiveDate,
) -> DayOutcome {
    let state = ledger.get(day);
    if !is_scheduled(habit, day) {
        return DayOutcome::Unscheduled {
            completed: state.is_completed(),
        };
    }
    match state {
        CompletionState::Completed => DayOutcome::Completed,
        CompletionState::Missed => DayOutcome::Missed,
        CompletionState::Unset if day < today => DayOutcome::Missed,
        CompletionState::Unset => DayOutcome::Pending,
    }
}

pub fn compute_stats(habit: &Habit, ledger: &CompletionLedger, today: NaiveDate) -> StreakStats {
    let window = evaluation_window(habit, ledger, today);
    let mut stats = StreakStats::default();
    if window.is_empty() {
        return stats;
    }

    let mut run = 0u32;
    for day in window {
        match day_outcome(habit, ledger, day, today) {
            DayOutcome::Completed => {
                stats.total_completed += 1;
                run += 1;
                stats.longest_streak = stats.longest_streak.max(run);
            }
            DayOutcome::Missed => {
                stats.total_missed += 1;
                run = 0;
            }
            DayOutcome::Pending => {}
            DayOutcome::Unscheduled { completed } => {
                if completed {
                    stats.completed_outside_schedule += 1;
                }
            }
        }
    }

    stats.current_streak = current_streak(habit, ledger, window, today);
    stats
}

fn current_streak(
    habit: &Habit,
    ledger: &CompletionLedger,
    window: DayRange,
    today: NaiveDate,
) -> u32 {
    let mut streak = 0;
    for day in window.days().rev() {
        match day_outcome(habit, ledger, day, today) {
            DayOutcome::Completed => streak += 1,
            DayOutcome::Missed => break,
            DayOutcome::Pending | DayOutcome::Unscheduled { .. } => {}
        }
    }
    streak
}
