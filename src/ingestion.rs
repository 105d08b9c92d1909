use crate::error::{Result, SigError};
use crate::schema::RawLedgerLine;
use crate::utils::{
    first_day_of_month, last_day_of_month, parse_posting_date, quarter_months, validate_month,
    validate_quarter,
};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Period requested from a ledger source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodFilter {
    All,
    Year { year: i32 },
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl PeriodFilter {
    pub fn year(year: i32) -> Self {
        PeriodFilter::Year { year }
    }

    pub fn quarter(year: i32, quarter: u32) -> Result<Self> {
        validate_quarter(quarter)?;
        Ok(PeriodFilter::Quarter { year, quarter })
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        Ok(PeriodFilter::Month { year, month })
    }

    /// Inclusive first and last day covered, `None` for [`PeriodFilter::All`].
    pub fn date_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let (year, first_month, last_month) = match *self {
            PeriodFilter::All => return Ok(None),
            PeriodFilter::Year { year } => (year, 1, 12),
            PeriodFilter::Quarter { year, quarter } => {
                validate_quarter(quarter)?;
                let months = quarter_months(quarter);
                (year, *months.start(), *months.end())
            }
            PeriodFilter::Month { year, month } => {
                validate_month(month)?;
                (year, month, month)
            }
        };

        let start = first_day_of_month(year, first_month)
            .ok_or_else(|| SigError::Source(format!("year {} is out of range", year)))?;
        let end = last_day_of_month(year, last_month)
            .ok_or_else(|| SigError::Source(format!("year {} is out of range", year)))?;
        Ok(Some((start, end)))
    }

    /// Whether a posting date falls in the period. Undated lines only match `All`.
    pub fn contains(&self, date: Option<NaiveDate>) -> Result<bool> {
        match (self.date_range()?, date) {
            (None, _) => Ok(true),
            (Some(_), None) => Ok(false),
            (Some((start, end)), Some(date)) => Ok(start <= date && date <= end),
        }
    }
}

impl fmt::Display for PeriodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodFilter::All => write!(f, "all"),
            PeriodFilter::Year { year } => write!(f, "{}", year),
            PeriodFilter::Quarter { year, quarter } => write!(f, "{}-Q{}", year, quarter),
            PeriodFilter::Month { year, month } => write!(f, "{}-{:02}", year, month),
        }
    }
}

/// Anything able to hand over raw ledger lines for a period, such as a
/// REST view over an accounting database or an ERP's remote API.
pub trait LedgerSource {
    fn fetch_lines(&self, filter: &PeriodFilter) -> Result<Vec<RawLedgerLine>>;
}

/// Parses a JSON array of raw ledger records.
pub fn raw_lines_from_json(json: &str) -> Result<Vec<RawLedgerLine>> {
    let lines: Vec<RawLedgerLine> = serde_json::from_str(json)?;
    Ok(lines)
}

/// A ledger snapshot held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryLedger {
    lines: Vec<RawLedgerLine>,
}

impl InMemoryLedger {
    pub fn new(lines: Vec<RawLedgerLine>) -> Self {
        Self { lines }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(raw_lines_from_json(json)?))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn push(&mut self, line: RawLedgerLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[RawLedgerLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl LedgerSource for InMemoryLedger {
    fn fetch_lines(&self, filter: &PeriodFilter) -> Result<Vec<RawLedgerLine>> {
        let mut fetched = Vec::new();
        for line in &self.lines {
            if filter.contains(parse_posting_date(&line.posting_date))? {
                fetched.push(line.clone());
            }
        }
        debug!(
            "Fetched {} of {} ledger lines for period {}",
            fetched.len(),
            self.lines.len(),
            filter
        );
        Ok(fetched)
    }
}
