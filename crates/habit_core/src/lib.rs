pub mod calendar;
pub mod day_state;
pub mod error;
pub mod ledger;
pub mod schedule;
pub mod stats;
pub mod streak;

pub use crate::calendar::DayRange;
pub use crate::day_state::{classify, DayClassification, DayState, TodayState};
pub use crate::error::CoreError;
pub use crate::ledger::{CompletionLedger, CompletionState};
pub use crate::schedule::{is_scheduled, Frequency, Habit, WeekdaySet};
pub use crate::stats::{aggregate, Progress, StatsWindow, StepRecord};
pub use crate::streak::{compute_stats, StreakStats};
