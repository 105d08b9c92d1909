use crate::error::{Result, SigError};
use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::ops::RangeInclusive;

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Quarter (1..=4) that a calendar month (1..=12) falls in.
pub fn quarter_of_month(month: u32) -> u32 {
    month.saturating_sub(1) / 3 + 1
}

/// Calendar months covered by a quarter: q → `(q-1)*3+1 ..= (q-1)*3+3`.
pub fn quarter_months(quarter: u32) -> RangeInclusive<u32> {
    let first = quarter.saturating_sub(1) * 3 + 1;
    first..=first + 2
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(SigError::InvalidMonth(month));
    }
    Ok(())
}

pub fn validate_quarter(quarter: u32) -> Result<()> {
    if !(1..=4).contains(&quarter) {
        return Err(SigError::InvalidQuarter(quarter));
    }
    Ok(())
}

/// Parses a posting date as delivered by the ledger backends.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and any string whose first ten
/// characters form a `YYYY-MM-DD` date (e.g. `2023-04-12 00:00:00`).
/// Returns `None` instead of failing.
pub fn parse_posting_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }

    trimmed
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Year, month and quarter of an optional posting date.
pub fn period_fields(date: Option<NaiveDate>) -> (Option<i32>, Option<u32>, Option<u32>) {
    match date {
        Some(d) => (Some(d.year()), Some(d.month()), Some(quarter_of_month(d.month()))),
        None => (None, None, None),
    }
}

/// Maps a negative zero (e.g. `-Decimal::ZERO`, `100 - 100`) to plain zero.
pub fn normalize_zero(amount: Decimal) -> Decimal {
    if amount.is_zero() {
        Decimal::ZERO
    } else {
        amount
    }
}

/// Formats an amount with two decimals, rounding half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", normalize_zero(rounded))
}
