//! Trigger evaluation: maps wall-clock time to due BUY/SELL windows.
//!
//! Everything here is pure. The evaluator never reads the clock or the store;
//! callers pass both ends of the interval, which lets tests replay arbitrary
//! restart gaps.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

use super::calendar::TradingCalendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    BuyWindow,
    SellWindow,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BuyWindow => "BUY_WINDOW",
            EventKind::SellWindow => "SELL_WINDOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BUY_WINDOW" => Some(EventKind::BuyWindow),
            "SELL_WINDOW" => Some(EventKind::SellWindow),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled trigger whose time has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DueEvent {
    pub kind: EventKind,
    /// Local trading day the window belongs to.
    pub trading_day: NaiveDate,
    pub due_at: DateTime<Utc>,
}

/// The buy boundary of one trading day and the sell boundary that closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub buy_due_at: DateTime<Utc>,
    pub sell_due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub buy_time: NaiveTime,
    pub sell_time: NaiveTime,
    pub timezone: Tz,
    pub calendar: TradingCalendar,
}

impl Schedule {
    pub fn new(buy_time: NaiveTime, sell_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            buy_time,
            sell_time,
            timezone,
            calendar: TradingCalendar::weekdays_only(),
        }
    }

    pub fn with_calendar(mut self, calendar: TradingCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Resolves a local wall-clock time to an instant.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
    /// spring-forward gap fire one hour later on the local clock.
    pub fn resolve(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(local + Duration::hours(1)))
                    .earliest()
            })
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }

    fn events_on(&self, day: NaiveDate) -> [DueEvent; 2] {
        [
            DueEvent {
                kind: EventKind::BuyWindow,
                trading_day: day,
                due_at: self.resolve(day, self.buy_time),
            },
            DueEvent {
                kind: EventKind::SellWindow,
                trading_day: day,
                due_at: self.resolve(day, self.sell_time),
            },
        ]
    }

    /// All events due in `(after, upto]`, oldest first.
    pub fn due_events(&self, after: DateTime<Utc>, upto: DateTime<Utc>) -> Vec<DueEvent> {
        if upto <= after {
            return Vec::new();
        }

        // One day of slack on both ends covers zones whose local midnight
        // falls on the other side of the UTC boundary.
        let first = self.local_date(after).pred_opt().unwrap_or(NaiveDate::MIN);
        let last = self.local_date(upto).succ_opt().unwrap_or(NaiveDate::MAX);

        let mut events: Vec<DueEvent> = first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| self.calendar.is_trading_day(*d))
            .flat_map(|d| self.events_on(d))
            .filter(|e| e.due_at > after && e.due_at <= upto)
            .collect();

        events.sort_by_key(|e| (e.due_at, e.kind));
        events
    }

    /// The next `count` events strictly after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DueEvent> {
        let mut out = Vec::with_capacity(count);
        let mut day = self.local_date(from);
        let mut scanned = 0;
        while out.len() < count && scanned < 400 {
            if self.calendar.is_trading_day(day) {
                let mut todays: Vec<DueEvent> = self
                    .events_on(day)
                    .into_iter()
                    .filter(|e| e.due_at > from)
                    .collect();
                todays.sort_by_key(|e| e.due_at);
                out.extend(todays);
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
            scanned += 1;
        }
        out.truncate(count);
        out
    }

    /// Next due instant of the given kind after `from`.
    pub fn next_of(&self, kind: EventKind, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.upcoming(from, 4)
            .into_iter()
            .find(|e| e.kind == kind)
            .map(|e| e.due_at)
    }

    /// Window for a position bought on `buy_day` (local date).
    pub fn window_for(&self, buy_day: NaiveDate) -> Option<ScheduleWindow> {
        let sell_day = self.calendar.next_trading_day(buy_day)?;
        Some(ScheduleWindow {
            buy_due_at: self.resolve(buy_day, self.buy_time),
            sell_due_at: self.resolve(sell_day, self.sell_time),
        })
    }

    /// Window of a position entered at `entry_time`.
    pub fn window_for_entry(&self, entry_time: DateTime<Utc>) -> Option<ScheduleWindow> {
        self.window_for(self.local_date(entry_time))
    }
}
