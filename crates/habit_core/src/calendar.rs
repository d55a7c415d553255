use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` calendar date. Anything else yields `None`.
pub fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    if input.len() != 10 || !input.is_ascii() {
        return None;
    }
    NaiveDate::parse_from_str(input, ISO_DATE_FORMAT).ok()
}

pub fn require_iso_date(input: &str) -> Result<NaiveDate, CoreError> {
    parse_iso_date(input.trim()).ok_or_else(|| CoreError::InvalidDate(input.to_string()))
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Inclusive span of calendar days. Empty when `from > to`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DayRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DayRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    /// Seven days starting at the most recent `week_start` on or before `date`.
    pub fn week_containing(date: NaiveDate, week_start: Weekday) -> Self {
        let offset = (date.weekday().num_days_from_sunday() + 7
            - week_start.num_days_from_sunday())
            % 7;
        let from = date
            .checked_sub_days(Days::new(u64::from(offset)))
            .unwrap_or(NaiveDate::MIN);
        let to = from.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.to - self.from).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn days(&self) -> DayIter {
        if self.is_empty() {
            DayIter {
                front: None,
                back: None,
            }
        } else {
            DayIter {
                front: Some(self.from),
                back: Some(self.to),
            }
        }
    }
}

impl IntoIterator for DayRange {
    type Item = NaiveDate;
    type IntoIter = DayIter;

    fn into_iter(self) -> Self::IntoIter {
        self.days()
    }
}

#[derive(Debug, Clone)]
pub struct DayIter {
    front: Option<NaiveDate>,
    back: Option<NaiveDate>,
}

impl DayIter {
    fn finish(&mut self) {
        self.front = None;
        self.back = None;
    }
}

impl Iterator for DayIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let (front, back) = (self.front?, self.back?);
        if front >= back {
            self.finish();
        } else {
            self.front = front.succ_opt();
        }
        Some(front)
    }
}

impl DoubleEndedIterator for DayIter {
    fn next_back(&mut self) -> Option<NaiveDate> {
        let (front, back) = (self.front?, self.back?);
        if back <= front {
            self.finish();
        } else {
            self.back = back.pred_opt();
        }
        Some(back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_only_strict_iso_dates() {
        assert_eq!(parse_iso_date("2024-01-05"), Some(date(2024, 1, 5)));
        assert_eq!(parse_iso_date("2024-1-5"), None);
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("05/01/2024"), None);
        assert_eq!(parse_iso_date("2024-01-05T00:00"), None);
        assert!(matches!(
            require_iso_date("yesterday"),
            Err(CoreError::InvalidDate(_))
        ));
    }

    #[test]
    fn iterates_across_month_and_dst_boundaries() {
        let range = DayRange::new(date(2024, 3, 30), date(2024, 4, 1));
        let days: Vec<_> = range.days().collect();
        assert_eq!(
            days,
            vec![date(2024, 3, 30), date(2024, 3, 31), date(2024, 4, 1)]
        );
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn iterates_backward_and_meets_in_the_middle() {
        let range = DayRange::new(date(2024, 1, 1), date(2024, 1, 4));
        let reversed: Vec<_> = range.days().rev().collect();
        assert_eq!(reversed.first(), Some(&date(2024, 1, 4)));
        assert_eq!(reversed.len(), 4);

        let mut iter = range.days();
        assert_eq!(iter.next(), Some(date(2024, 1, 1)));
        assert_eq!(iter.next_back(), Some(date(2024, 1, 4)));
        assert_eq!(iter.next(), Some(date(2024, 1, 2)));
        assert_eq!(iter.next_back(), Some(date(2024, 1, 3)));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = DayRange::new(date(2024, 1, 5), date(2024, 1, 1));
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(range.days().count(), 0);
    }

    #[test]
    fn week_containing_respects_week_start() {
        // 2024-01-03 is a Wednesday.
        let monday_week = DayRange::week_containing(date(2024, 1, 3), Weekday::Mon);
        assert_eq!(monday_week.from, date(2024, 1, 1));
        assert_eq!(monday_week.to, date(2024, 1, 7));

        let sunday_week = DayRange::week_containing(date(2024, 1, 3), Weekday::Sun);
        assert_eq!(sunday_week.from, date(2023, 12, 31));
        assert_eq!(sunday_week.len(), 7);

        let on_start = DayRange::week_containing(date(2024, 1, 1), Weekday::Mon);
        assert_eq!(on_start.from, date(2024, 1, 1));
    }
}
