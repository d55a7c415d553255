use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use habit_core::{
    calendar::parse_iso_date, CompletionLedger, CompletionState, Frequency, Habit, WeekdaySet,
};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub selected_days: Option<Vec<String>>,
    #[serde(default)]
    pub always_show: bool,
    #[serde(default, alias = "createdAt", deserialize_with = "creation_date")]
    pub created_on: Option<NaiveDate>,
}

impl HabitRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            frequency: None,
            selected_days: None,
            always_show: false,
            created_on: None,
        }
    }

    pub fn with_frequency(mut self, frequency: &str) -> Self {
        self.frequency = Some(frequency.to_string());
        self
    }

    pub fn with_selected_days<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_days = Some(days.into_iter().map(Into::into).collect());
        self
    }

    pub fn created_on(mut self, date: NaiveDate) -> Self {
        self.created_on = Some(date);
        self
    }

    pub fn to_habit(&self, source: StartDateSource) -> Habit {
        let frequency = self.frequency.as_deref().and_then(|raw| match raw.parse::<Frequency>() {
            Ok(frequency) => Some(frequency),
            Err(err) => {
                tracing::warn!(habit = %self.id, %err, "habit has no usable frequency");
                None
            }
        });
        Habit {
            id: self.id.clone(),
            frequency,
            selected_days: self.selected_days.as_ref().map(WeekdaySet::from_names),
            always_show: self.always_show,
            start_date: source.resolve(self),
        }
    }
}

/// Which creation date bounds the evaluation window of a habit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartDateSource {
    #[default]
    HabitCreation,
    AccountCreation(NaiveDate),
}

impl StartDateSource {
    pub fn resolve(self, record: &HabitRecord) -> Option<NaiveDate> {
        match self {
            StartDateSource::HabitCreation => record.created_on,
            StartDateSource::AccountCreation(date) => Some(date),
        }
    }
}

// Creation timestamps arrive either as plain dates or as full datetimes;
// only the calendar day matters.
fn creation_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    let parsed = parse_iso_date(raw)
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|at| at.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|at| at.date())
        });
    if parsed.is_none() {
        tracing::warn!(value = %raw, "ignoring unparseable habit creation date");
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub habit_id: String,
    pub date: String,
    pub completed: bool,
}

/// Rows with malformed dates are dropped.
pub fn assemble_ledgers<I>(records: I) -> HashMap<String, CompletionLedger>
where
    I: IntoIterator<Item = CompletionRecord>,
{
    let mut ledgers: HashMap<String, CompletionLedger> = HashMap::new();
    for record in records {
        let Some(date) = parse_iso_date(&record.date) else {
            tracing::debug!(habit = %record.habit_id, date = %record.date, "dropping completion with malformed date");
            continue;
        };
        ledgers
            .entry(record.habit_id)
            .or_default()
            .set(date, CompletionState::from_flag(Some(record.completed)));
    }
    ledgers
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitDocument {
    pub habit: HabitRecord,
    #[serde(default)]
    pub completions: CompletionLedger,
}

impl HabitDocument {
    pub fn new(habit: HabitRecord) -> Self {
        Self {
            habit,
            completions: CompletionLedger::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn start_date_source_is_explicit() {
        let record = HabitRecord::new("h1", "Read")
            .with_frequency("daily")
            .created_on(date(2024, 3, 1));
        assert_eq!(
            record.to_habit(StartDateSource::HabitCreation).start_date,
            Some(date(2024, 3, 1))
        );
        assert_eq!(
            record
                .to_habit(StartDateSource::AccountCreation(date(2023, 1, 1)))
                .start_date,
            Some(date(2023, 1, 1))
        );
    }

    #[test]
    fn unknown_frequency_and_missing_days_are_tolerated() {
        let odd = HabitRecord::new("h2", "Odd").with_frequency("fortnightly");
        let habit = odd.to_habit(StartDateSource::HabitCreation);
        assert_eq!(habit.frequency, None);
        assert!(!habit.is_scheduled(date(2024, 1, 1)));

        let custom = HabitRecord::new("h3", "Gym").with_frequency("custom");
        let habit = custom.to_habit(StartDateSource::HabitCreation);
        assert_eq!(habit.selected_days, None);
        assert!(!habit.is_scheduled(date(2024, 1, 1)));
    }

    #[test]
    fn accepts_camel_case_records_from_the_api() {
        let json = r#"{
            "id": "h4",
            "title": "Gym",
            "frequency": "weekly",
            "selectedDays": ["monday", "wednesday"],
            "alwaysShow": false,
            "createdAt": "2024-01-01"
        }"#;
        let record: HabitRecord = serde_json::from_str(json).unwrap();
        let habit = record.to_habit(StartDateSource::HabitCreation);
        assert_eq!(habit.start_date, Some(date(2024, 1, 1)));
        assert!(habit.is_scheduled(date(2024, 1, 1)));
        assert!(!habit.is_scheduled(date(2024, 1, 2)));
    }

    #[test]
    fn creation_timestamps_keep_only_the_day() {
        let parse = |created: &str| {
            let json = format!(r#"{{"id": "h5", "createdAt": "{created}"}}"#);
            serde_json::from_str::<HabitRecord>(&json).unwrap().created_on
        };
        assert_eq!(parse("2024-01-01T10:00:00Z"), Some(date(2024, 1, 1)));
        assert_eq!(parse("2024-01-01T23:30:00-05:00"), Some(date(2024, 1, 1)));
        assert_eq!(parse("2024-01-01T10:00:00.250"), Some(date(2024, 1, 1)));
        assert_eq!(parse("last tuesday"), None);

        let missing: HabitRecord = serde_json::from_str(r#"{"id": "h6"}"#).unwrap();
        assert_eq!(missing.created_on, None);
        let null: HabitRecord =
            serde_json::from_str(r#"{"id": "h7", "createdOn": null}"#).unwrap();
        assert_eq!(null.created_on, None);
    }

    #[test]
    fn assembles_ledgers_per_habit() {
        let rows = vec![
            CompletionRecord {
                habit_id: "a".into(),
                date: "2024-01-01".into(),
                completed: true,
            },
            CompletionRecord {
                habit_id: "a".into(),
                date: "2024-01-02".into(),
                completed: false,
            },
            CompletionRecord {
                habit_id: "b".into(),
                date: "01/02/2024".into(),
                completed: true,
            },
        ];
        let ledgers = assemble_ledgers(rows);
        assert_eq!(ledgers["a"].len(), 2);
        assert_eq!(ledgers["a"].get(date(2024, 1, 2)), CompletionState::Missed);
        assert!(!ledgers.contains_key("b"));
    }
}
