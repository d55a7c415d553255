use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Custom,
    Monthly,
}

impl Frequency {
    /// Weekly and custom cadences are the only ones that consult `selected_days`.
    pub fn uses_selected_days(self) -> bool {
        matches!(self, Frequency::Weekly | Frequency::Custom)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Custom => "custom",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "custom" => Ok(Frequency::Custom),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(CoreError::UnknownFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of weekdays stored as a bitmask indexed Sunday=0 through Saturday=6.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct WeekdaySet(u8);

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn bit(day: Weekday) -> u8 {
    1 << day.num_days_from_sunday()
}

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Build a set from weekday names (`"monday"`, `"Mon"`, any case). Unknown names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            match parse_weekday(name.as_ref()) {
                Ok(day) => {
                    set.insert(day);
                }
                Err(err) => tracing::debug!(%err, "skipping unknown weekday"),
            }
        }
        set
    }

    pub fn insert(&mut self, day: Weekday) -> bool {
        let was_present = self.contains(day);
        self.0 |= bit(day);
        !was_present
    }

    pub fn remove(&mut self, day: Weekday) -> bool {
        let was_present = self.contains(day);
        self.0 &= !bit(day);
        was_present
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & bit(day) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        let mut set = Self::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<String>> for WeekdaySet {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(names)
    }
}

impl From<WeekdaySet> for Vec<String> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().map(|day| weekday_name(day).to_string()).collect()
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

pub fn parse_weekday(name: &str) -> Result<Weekday, CoreError> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| CoreError::UnknownWeekday(name.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_frequency")]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub selected_days: Option<WeekdaySet>,
    #[serde(default)]
    pub always_show: bool,
    /// Lower bound of every evaluation window. When absent, evaluation falls
    /// back to the earliest ledger date, then to `today`.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl Habit {
    pub fn new(id: impl Into<String>, frequency: Option<Frequency>) -> Self {
        Self {
            id: id.into(),
            frequency,
            selected_days: None,
            always_show: false,
            start_date: None,
        }
    }

    pub fn daily(id: impl Into<String>) -> Self {
        Self::new(id, Some(Frequency::Daily))
    }

    pub fn on_days(id: impl Into<String>, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            selected_days: Some(days.into_iter().collect()),
            ..Self::new(id, Some(Frequency::Custom))
        }
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_always_show(mut self, always_show: bool) -> Self {
        self.always_show = always_show;
        self
    }

    pub fn is_scheduled(&self, date: NaiveDate) -> bool {
        is_scheduled(self, date)
    }
}

fn lenient_frequency<'de, D>(deserializer: D) -> Result<Option<Frequency>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| match raw.parse::<Frequency>() {
        Ok(frequency) => Some(frequency),
        Err(err) => {
            tracing::debug!(%err, "treating habit as unscheduled");
            None
        }
    }))
}

pub fn is_scheduled(habit: &Habit, date: NaiveDate) -> bool {
    if habit.always_show {
        return true;
    }
    match habit.frequency {
        Some(Frequency::Daily) => true,
        Some(freq) if freq.uses_selected_days() => habit
            .selected_days
            .map(|days| days.contains(date.weekday()))
            .unwrap_or(false),
        _ => false,
    }
}
