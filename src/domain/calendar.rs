//! Trading calendar: which local dates carry scheduled events.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingCalendar {
    weekdays: BTreeSet<u32>,
    holidays: BTreeSet<NaiveDate>,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::weekdays_only()
    }
}

impl TradingCalendar {
    /// Monday to Friday, no holidays.
    pub fn weekdays_only() -> Self {
        Self::new(
            &[
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            Vec::new(),
        )
    }

    pub fn new(weekdays: &[Weekday], holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            weekdays: weekdays
                .iter()
                .map(|d| d.num_days_from_monday())
                .collect(),
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn has_trading_weekdays(&self) -> bool {
        !self.weekdays.is_empty()
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.weekdays
            .contains(&date.weekday().num_days_from_monday())
            && !self.holidays.contains(&date)
    }

    /// First trading day strictly after `date`.
    ///
    /// Returns `None` only for a calendar without trading weekdays, or when the
    /// holiday list swallows more than a year of candidates.
    pub fn next_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        if !self.has_trading_weekdays() {
            return None;
        }
        date.iter_days()
            .skip(1)
            .take(366)
            .find(|d| self.is_trading_day(*d))
    }

    /// First trading day on or after `date`.
    pub fn trading_day_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        if self.is_trading_day(date) {
            Some(date)
        } else {
            self.next_trading_day(date)
        }
    }
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
