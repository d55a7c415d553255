//! Dashboard roll-ups of scheduled versus completed habit instances.
//!
//! Step completions from the goals collaborator are folded in by adding
//! numerators and denominators; nothing is weighted.

use std::ops::{Add, AddAssign};

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::DayRange;
use crate::ledger::CompletionLedger;
use crate::schedule::{is_scheduled, Habit};
use crate::streak::evaluation_start;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StatsWindow {
    Day(NaiveDate),
    Week { start: NaiveDate },
    Range(DayRange),
}

impl StatsWindow {
    pub fn week_of(date: NaiveDate, week_start: Weekday) -> Self {
        StatsWindow::Week {
            start: DayRange::week_containing(date, week_start).from,
        }
    }

    pub fn days(&self) -> DayRange {
        match *self {
            StatsWindow::Day(date) => DayRange::single(date),
            StatsWindow::Week { start } => {
                let end = start
                    .checked_add_days(chrono::Days::new(6))
                    .unwrap_or(NaiveDate::MAX);
                DayRange::new(start, end)
            }
            StatsWindow::Range(range) => range,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
    pub progress_percent: u8,
}

impl Progress {
    pub fn new(completed: u32, total: u32) -> Self {
        let progress_percent = if total == 0 {
            0
        } else {
            let rounded = (u64::from(completed) * 100 + u64::from(total) / 2) / u64::from(total);
            rounded.min(100) as u8
        };
        Self {
            completed,
            total,
            progress_percent,
        }
    }

    fn record(&mut self, completed: bool) {
        *self = Progress::new(self.completed + u32::from(completed), self.total + 1);
    }
}

impl Add for Progress {
    type Output = Progress;

    fn add(self, rhs: Progress) -> Progress {
        Progress::new(self.completed + rhs.completed, self.total + rhs.total)
    }
}

impl AddAssign for Progress {
    fn add_assign(&mut self, rhs: Progress) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayProgress {
    pub date: NaiveDate,
    pub habits: Progress,
    pub steps: Progress,
    pub combined: Progress,
}

/// Per-day habit and step progress across `window`.
///
/// A habit contributes on days that are scheduled and fall on or after its
/// evaluation start, resolved against the last day of the window.
pub fn aggregate_by_day(
    habits: &[(Habit, CompletionLedger)],
    steps: &[StepRecord],
    window: StatsWindow,
) -> Vec<DayProgress> {
    let range = window.days();
    let starts: Vec<NaiveDate> = habits
        .iter()
        .map(|(habit, ledger)| evaluation_start(habit, ledger, range.to))
        .collect();

    range
        .days()
        .map(|date| {
            let mut habit_progress = Progress::default();
            for ((habit, ledger), start) in habits.iter().zip(&starts) {
                if date >= *start && is_scheduled(habit, date) {
                    habit_progress.record(ledger.get(date).is_completed());
                }
            }
            let mut step_progress = Progress::default();
            for step in steps.iter().filter(|step| step.date == date) {
                step_progress.record(step.completed);
            }
            DayProgress {
                date,
                habits: habit_progress,
                steps: step_progress,
                combined: habit_progress + step_progress,
            }
        })
        .collect()
}

pub fn aggregate(
    habits: &[(Habit, CompletionLedger)],
    steps: &[StepRecord],
    window: StatsWindow,
) -> Progress {
    aggregate_by_day(habits, steps, window)
        .into_iter()
        .fold(Progress::default(), |acc, day| acc + day.combined)
}
