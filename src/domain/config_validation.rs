//! Configuration validation and assembly.
//!
//! Every field is checked before the scheduler starts; any failure is a
//! configuration error and startup aborts.

use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use std::time::Duration;

use super::calendar::{parse_weekday, TradingCalendar};
use super::engine::{CatchUpPolicy, EngineSettings};
use super::error::TraderError;
use super::retry::RetryPolicy;
use super::schedule::Schedule;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_BUY_TIME: &str = "15:28";
pub const DEFAULT_SELL_TIME: &str = "09:21";
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_WEEKDAYS: &str = "Mon,Tue,Wed,Thu,Fri";

/// Upper bound for every interval key, one week.
pub const MAX_INTERVAL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub schedule: Schedule,
    pub tick_interval: Duration,
    pub engine: EngineSettings,
    pub retry: RetryPolicy,
    pub starting_cash: f64,
}

pub fn build_trader_config(config: &dyn ConfigPort) -> Result<TraderConfig, TraderError> {
    let schedule = build_schedule(config)?;
    let tick_interval = positive_secs(config, "schedule", "tick_interval_secs", 30)?;
    let engine = build_engine_settings(config)?;
    let retry = build_retry_policy(config)?;

    let starting_cash = float_value(config, "paper", "starting_cash", 500_000.0)?;
    if !(starting_cash.is_finite() && starting_cash > 0.0) {
        return Err(invalid("paper", "starting_cash", "starting_cash must be positive"));
    }

    Ok(TraderConfig {
        schedule,
        tick_interval,
        engine,
        retry,
        starting_cash,
    })
}

pub fn build_schedule(config: &dyn ConfigPort) -> Result<Schedule, TraderError> {
    let buy_time = parse_time(config, "buy_time", DEFAULT_BUY_TIME)?;
    let sell_time = parse_time(config, "sell_time", DEFAULT_SELL_TIME)?;
    if buy_time == sell_time {
        return Err(invalid(
            "schedule",
            "sell_time",
            "sell_time must differ from buy_time",
        ));
    }

    let tz_name = config
        .get_string("schedule", "timezone")
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone: Tz = tz_name
        .trim()
        .parse()
        .map_err(|_| invalid("schedule", "timezone", &format!("unknown timezone {tz_name:?}")))?;

    Ok(Schedule::new(buy_time, sell_time, timezone).with_calendar(build_calendar(config)?))
}

pub fn build_calendar(config: &dyn ConfigPort) -> Result<TradingCalendar, TraderError> {
    let names = config
        .get_list("calendar", "weekdays")
        .unwrap_or_else(|| DEFAULT_WEEKDAYS.split(',').map(String::from).collect());
    let weekdays = names
        .iter()
        .map(|name| {
            parse_weekday(name)
                .ok_or_else(|| invalid("calendar", "weekdays", &format!("unknown weekday {name:?}")))
        })
        .collect::<Result<Vec<Weekday>, _>>()?;
    if weekdays.is_empty() {
        return Err(invalid(
            "calendar",
            "weekdays",
            "at least one trading weekday is required",
        ));
    }

    let holidays = config
        .get_list("calendar", "holidays")
        .unwrap_or_default()
        .iter()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                invalid(
                    "calendar",
                    "holidays",
                    &format!("invalid holiday {s:?}, expected YYYY-MM-DD"),
                )
            })
        })
        .collect::<Result<Vec<NaiveDate>, _>>()?;

    Ok(TradingCalendar::new(&weekdays, holidays))
}

pub fn build_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, TraderError> {
    let catch_up = match config.get_string("schedule", "catch_up") {
        None => CatchUpPolicy::LatestValid,
        Some(s) => CatchUpPolicy::parse(&s).ok_or_else(|| {
            invalid("schedule", "catch_up", "catch_up must be 'latest' or 'skip'")
        })?,
    };

    let grace = int_value(config, "schedule", "misfire_grace_secs", 120)?;
    let misfire_grace = (0..=MAX_INTERVAL_SECS)
        .contains(&grace)
        .then(|| chrono::Duration::try_seconds(grace))
        .flatten()
        .ok_or_else(|| {
            invalid(
                "schedule",
                "misfire_grace_secs",
                &format!("misfire_grace_secs must be between 0 and {MAX_INTERVAL_SECS}"),
            )
        })?;

    let quantity = int_value(config, "paper", "quantity", 75)?;
    if quantity <= 0 {
        return Err(invalid("paper", "quantity", "quantity must be positive"));
    }

    Ok(EngineSettings {
        catch_up,
        misfire_grace,
        quantity,
        collaborator_timeout: positive_secs(config, "retry", "collaborator_timeout_secs", 10)?,
    })
}

pub fn build_retry_policy(config: &dyn ConfigPort) -> Result<RetryPolicy, TraderError> {
    let max_attempts = int_value(config, "retry", "max_attempts", 5)?;
    let max_attempts = u32::try_from(max_attempts)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| invalid("retry", "max_attempts", "max_attempts must be at least 1"))?;

    let initial_backoff = positive_secs(config, "retry", "initial_backoff_secs", 30)?;
    let max_backoff = positive_secs(config, "retry", "max_backoff_secs", 600)?;
    if max_backoff < initial_backoff {
        return Err(invalid(
            "retry",
            "max_backoff_secs",
            "max_backoff_secs must not be below initial_backoff_secs",
        ));
    }

    let multiplier = float_value(config, "retry", "multiplier", 2.0)?;
    if !(multiplier.is_finite() && multiplier >= 1.0) {
        return Err(invalid("retry", "multiplier", "multiplier must be at least 1.0"));
    }

    Ok(RetryPolicy {
        max_attempts,
        initial_backoff,
        max_backoff,
        multiplier,
    })
}

fn parse_time(config: &dyn ConfigPort, key: &str, default: &str) -> Result<NaiveTime, TraderError> {
    let raw = config
        .get_string("schedule", key)
        .unwrap_or_else(|| default.to_string());
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| invalid("schedule", key, &format!("invalid {key} format, expected HH:MM[:SS]")))
}

fn positive_secs(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<Duration, TraderError> {
    let value = int_value(config, section, key, default)?;
    if !(1..=MAX_INTERVAL_SECS).contains(&value) {
        return Err(invalid(
            section,
            key,
            &format!("{key} must be between 1 and {MAX_INTERVAL_SECS}"),
        ));
    }
    Ok(Duration::from_secs(value.unsigned_abs()))
}

/// Absent keys take `default`; present ones must parse.
fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, &format!("{key} must be an integer, got {raw:?}"))),
    }
}

fn float_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, &format!("{key} must be a number, got {raw:?}"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
