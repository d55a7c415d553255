use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{format_iso_date, parse_iso_date};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CompletionState {
    Completed,
    Missed,
    Unset,
}

impl CompletionState {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => CompletionState::Completed,
            Some(false) => CompletionState::Missed,
            None => CompletionState::Unset,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            CompletionState::Completed => Some(true),
            CompletionState::Missed => Some(false),
            CompletionState::Unset => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == CompletionState::Completed
    }
}

/// Sparse per-habit record of completions keyed by local calendar day.
///
/// An absent key is `Unset`, which is distinct from an explicit `Missed`.
/// The (de)serialized form is the persistence layer's date-keyed object of
/// booleans; `null` values and malformed date keys are dropped on the way in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "BTreeMap<String, Option<bool>>",
    into = "BTreeMap<String, bool>"
)]
pub struct CompletionLedger {
    entries: BTreeMap<NaiveDate, bool>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flags<I, K>(flags: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<bool>)>,
        K: AsRef<str>,
    {
        let mut ledger = Self::new();
        for (key, flag) in flags {
            let key = key.as_ref();
            let Some(date) = parse_iso_date(key) else {
                tracing::debug!(key, "skipping malformed ledger date");
                continue;
            };
            ledger.set(date, CompletionState::from_flag(flag));
        }
        ledger
    }

    pub fn get(&self, date: NaiveDate) -> CompletionState {
        CompletionState::from_flag(self.entries.get(&date).copied())
    }

    /// Overwrite the state of `date`. `Unset` removes the key. Returns whether anything changed.
    pub fn set(&mut self, date: NaiveDate, state: CompletionState) -> bool {
        match state.as_flag() {
            Some(flag) => self.entries.insert(date, flag) != Some(flag),
            None => self.entries.remove(&date).is_some(),
        }
    }

    pub fn dates_where<F>(&self, mut predicate: F) -> Vec<NaiveDate>
    where
        F: FnMut(NaiveDate, CompletionState) -> bool,
    {
        self.iter()
            .filter(|(date, state)| predicate(*date, *state))
            .map(|(date, _)| date)
            .collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, CompletionState)> + '_ {
        self.entries
            .iter()
            .map(|(date, flag)| (*date, CompletionState::from_flag(Some(*flag))))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.entries.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_flags(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .map(|(date, flag)| (format_iso_date(*date), *flag))
            .collect()
    }
}

impl From<BTreeMap<String, Option<bool>>> for CompletionLedger {
    fn from(flags: BTreeMap<String, Option<bool>>) -> Self {
        Self::from_flags(flags)
    }
}

impl From<CompletionLedger> for BTreeMap<String, bool> {
    fn from(ledger: CompletionLedger) -> Self {
        ledger.to_flags()
    }
}

impl FromIterator<(NaiveDate, CompletionState)> for CompletionLedger {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, CompletionState)>>(iter: T) -> Self {
        let mut ledger = Self::new();
        for (date, state) in iter {
            ledger.set(date, state);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unset_is_distinct_from_missed() {
        let mut ledger = CompletionLedger::new();
        ledger.set(date(2024, 1, 1), CompletionState::Missed);
        assert_eq!(ledger.get(date(2024, 1, 1)), CompletionState::Missed);
        assert_eq!(ledger.get(date(2024, 1, 2)), CompletionState::Unset);

        assert!(ledger.set(date(2024, 1, 1), CompletionState::Unset));
        assert!(ledger.is_empty());
        assert!(!ledger.set(date(2024, 1, 1), CompletionState::Unset));
    }

    #[test]
    fn setting_the_same_state_twice_is_idempotent() {
        let mut once = CompletionLedger::new();
        once.set(date(2024, 1, 3), CompletionState::Completed);

        let mut twice = CompletionLedger::new();
        assert!(twice.set(date(2024, 1, 3), CompletionState::Completed));
        assert!(!twice.set(date(2024, 1, 3), CompletionState::Completed));

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn malformed_and_null_keys_are_skipped() {
        let json = r#"{
            "2024-01-01": true,
            "2024-01-02": false,
            "2024-01-03": null,
            "not-a-date": true,
            "2024-13-01": true
        }"#;
        let ledger: CompletionLedger = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(date(2024, 1, 1)), CompletionState::Completed);
        assert_eq!(ledger.get(date(2024, 1, 2)), CompletionState::Missed);
        assert_eq!(ledger.get(date(2024, 1, 3)), CompletionState::Unset);
    }

    #[test]
    fn json_round_trip_preserves_every_entry() {
        let ledger: CompletionLedger = [
            (date(2024, 2, 28), CompletionState::Completed),
            (date(2024, 2, 29), CompletionState::Missed),
            (date(2024, 3, 1), CompletionState::Completed),
        ]
        .into_iter()
        .collect();

        let encoded = serde_json::to_value(&ledger).unwrap();
        assert_eq!(encoded["2024-02-29"], serde_json::json!(false));

        let decoded: CompletionLedger = serde_json::from_value(encoded).unwrap();
        for (day, state) in ledger.iter() {
            assert_eq!(decoded.get(day), state);
        }
        assert_eq!(decoded, ledger);
    }

    #[test]
    fn dates_where_returns_ascending_matches() {
        let ledger = CompletionLedger::from_flags([
            ("2024-01-05", Some(true)),
            ("2024-01-01", Some(true)),
            ("2024-01-03", Some(false)),
        ]);
        let completed = ledger.dates_where(|_, state| state.is_completed());
        assert_eq!(completed, vec![date(2024, 1, 1), date(2024, 1, 5)]);
        assert_eq!(ledger.first_date(), Some(date(2024, 1, 1)));
        assert_eq!(ledger.last_date(), Some(date(2024, 1, 5)));
    }
}
