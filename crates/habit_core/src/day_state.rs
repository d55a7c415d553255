use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::DayRange;
use crate::ledger::{CompletionLedger, CompletionState};
use crate::schedule::{is_scheduled, Habit};
use crate::streak::evaluation_start;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TodayState {
    Planned,
    NotScheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DayState {
    Completed,
    Missed,
    Today(TodayState),
    Planned,
    NotScheduled,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayClassification {
    pub date: NaiveDate,
    pub state: DayState,
    pub is_scheduled: bool,
    pub is_today: bool,
    /// Past or current days on or after the habit start accept toggles.
    pub clickable: bool,
}

impl DayClassification {
    /// Ledger state a click on this day should write, or `None` when the day is not clickable.
    pub fn toggle_target(&self) -> Option<CompletionState> {
        if !self.clickable {
            return None;
        }
        let target = match self.state {
            DayState::Completed if self.is_scheduled => CompletionState::Missed,
            DayState::Completed => CompletionState::Unset,
            _ => CompletionState::Completed,
        };
        Some(target)
    }
}

/// Classify `date` for rendering. Precedence, first match wins:
/// recorded completion, recorded miss, retroactive miss for past days since
/// the start, today, future planned, future not-scheduled, inactive.
pub fn classify(
    habit: &Habit,
    ledger: &CompletionLedger,
    date: NaiveDate,
    today: NaiveDate,
) -> DayClassification {
    let start = evaluation_start(habit, ledger, today);
    let scheduled = is_scheduled(habit, date);
    let is_today = date == today;

    let state = match ledger.get(date) {
        CompletionState::Completed => DayState::Completed,
        CompletionState::Missed => DayState::Missed,
        CompletionState::Unset if date < today && date >= start => DayState::Missed,
        CompletionState::Unset if is_today => DayState::Today(if scheduled {
            TodayState::Planned
        } else {
            TodayState::NotScheduled
        }),
        CompletionState::Unset if date > today && date >= start => {
            if scheduled {
                DayState::Planned
            } else {
                DayState::NotScheduled
            }
        }
        CompletionState::Unset => DayState::Inactive,
    };

    DayClassification {
        date,
        state,
        is_scheduled: scheduled,
        is_today,
        clickable: date <= today && date >= start,
    }
}

pub fn classify_range(
    habit: &Habit,
    ledger: &CompletionLedger,
    range: DayRange,
    today: NaiveDate,
) -> Vec<DayClassification> {
    range
        .days()
        .map(|date| classify(habit, ledger, date, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn gym() -> Habit {
        // 2024-01-01 is a Monday.
        Habit::on_days("gym", [Weekday::Mon, Weekday::Wed]).with_start_date(date(2024, 1, 1))
    }

    #[test]
    fn recorded_states_take_precedence() {
        let habit = gym();
        let today = date(2024, 1, 10);
        let ledger = CompletionLedger::from_flags([
            ("2024-01-03", Some(true)),
            ("2024-01-08", Some(false)),
            ("2024-01-10", Some(true)),
        ]);
        assert_eq!(
            classify(&habit, &ledger, date(2024, 1, 3), today).state,
            DayState::Completed
        );
        assert_eq!(
            classify(&habit, &ledger, date(2024, 1, 8), today).state,
            DayState::Missed
        );
        let current = classify(&habit, &ledger, today, today);
        assert_eq!(current.state, DayState::Completed);
        assert!(current.is_today);
    }

    #[test]
    fn past_unset_days_are_retroactively_missed_even_when_unscheduled() {
        let habit = gym();
        let today = date(2024, 1, 10);
        let tuesday = classify(&habit, &CompletionLedger::new(), date(2024, 1, 2), today);
        assert_eq!(tuesday.state, DayState::Missed);
        assert!(!tuesday.is_scheduled);
        assert!(tuesday.clickable);
        assert_eq!(tuesday.toggle_target(), Some(CompletionState::Completed));
    }

    #[test]
    fn today_carries_its_scheduling_sub_state() {
        let habit = gym();
        let ledger = CompletionLedger::new();
        let wednesday = date(2024, 1, 10);
        let thursday = date(2024, 1, 11);
        assert_eq!(
            classify(&habit, &ledger, wednesday, wednesday).state,
            DayState::Today(TodayState::Planned)
        );
        assert_eq!(
            classify(&habit, &ledger, thursday, thursday).state,
            DayState::Today(TodayState::NotScheduled)
        );
    }

    #[test]
    fn future_days_are_planned_or_not_scheduled_and_not_clickable() {
        let habit = gym();
        let ledger = CompletionLedger::new();
        let today = date(2024, 1, 10);
        let monday = classify(&habit, &ledger, date(2024, 1, 15), today);
        assert_eq!(monday.state, DayState::Planned);
        assert!(!monday.clickable);
        assert_eq!(monday.toggle_target(), None);

        let tuesday = classify(&habit, &ledger, date(2024, 1, 16), today);
        assert_eq!(tuesday.state, DayState::NotScheduled);
        assert!(!tuesday.clickable);
    }

    #[test]
    fn days_before_start_are_inactive() {
        let habit = gym();
        let state = classify(&habit, &CompletionLedger::new(), date(2023, 12, 27), date(2024, 1, 10));
        assert_eq!(state.state, DayState::Inactive);
        assert!(!state.clickable);
        assert_eq!(state.toggle_target(), None);
    }

    #[test]
    fn completed_tuesday_is_not_reported_as_scheduled() {
        let habit = gym();
        let ledger = CompletionLedger::from_flags([("2024-01-02", Some(true))]);
        let tuesday = classify(&habit, &ledger, date(2024, 1, 2), date(2024, 1, 4));
        assert_eq!(tuesday.state, DayState::Completed);
        assert!(!tuesday.is_scheduled);
        assert_eq!(tuesday.toggle_target(), Some(CompletionState::Unset));
    }

    #[test]
    fn completed_scheduled_day_toggles_to_missed() {
        let habit = gym();
        let ledger = CompletionLedger::from_flags([("2024-01-03", Some(true))]);
        let wednesday = classify(&habit, &ledger, date(2024, 1, 3), date(2024, 1, 4));
        assert_eq!(wednesday.toggle_target(), Some(CompletionState::Missed));
    }

    #[test]
    fn classify_range_covers_every_day() {
        let habit = gym();
        let today = date(2024, 1, 3);
        let week = DayRange::week_containing(today, Weekday::Mon);
        let states: Vec<DayState> = classify_range(&habit, &CompletionLedger::new(), week, today)
            .into_iter()
            .map(|day| day.state)
            .collect();
        assert_eq!(
            states,
            vec![
                DayState::Missed,
                DayState::Missed,
                DayState::Today(TodayState::Planned),
                DayState::NotScheduled,
                DayState::NotScheduled,
                DayState::NotScheduled,
                DayState::NotScheduled,
            ]
        );
    }
}
