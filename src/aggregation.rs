//! Period partitions, time-series views and account drill-down.
//!
//! Every period view re-runs the cascade on that period's own lines; nothing
//! is carried forward from one partition to the next.

use crate::chart_of_accounts::{abbreviation, descriptive_formula};
use crate::engine::{CascadeOptions, IndicatorCascadeCalculator};
use crate::error::{Result, SigError};
use crate::schema::*;
use crate::utils::{quarter_months, validate_quarter};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type IndicatorSet = BTreeMap<IndicatorCode, IndicatorResult>;

const UNMAPPED_SAMPLE_SIZE: usize = 20;

/// A validated quarter number (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quarter(u32);

impl Quarter {
    pub fn new(quarter: u32) -> Result<Self> {
        validate_quarter(quarter)?;
        Ok(Self(quarter))
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn contains_month(&self, month: u32) -> bool {
        quarter_months(self.0).contains(&month)
    }
}

impl TryFrom<u32> for Quarter {
    type Error = SigError;

    fn try_from(value: u32) -> Result<Self> {
        Quarter::new(value)
    }
}

impl From<Quarter> for u32 {
    fn from(quarter: Quarter) -> u32 {
        quarter.0
    }
}

fn calculate<'a, I>(lines: I, options: &CascadeOptions) -> IndicatorSet
where
    I: IntoIterator<Item = &'a LedgerLine>,
{
    IndicatorCascadeCalculator::new(lines, options).compute_all()
}

pub fn by_year(lines: &[LedgerLine]) -> BTreeMap<i32, Vec<&LedgerLine>> {
    let mut years: BTreeMap<i32, Vec<&LedgerLine>> = BTreeMap::new();
    for line in lines {
        if let Some(year) = line.year {
            years.entry(year).or_default().push(line);
        }
    }
    years
}

/// Lines of `year` split by month. All twelve months are present, possibly empty.
pub fn by_month(lines: &[LedgerLine], year: i32) -> BTreeMap<u32, Vec<&LedgerLine>> {
    let mut months: BTreeMap<u32, Vec<&LedgerLine>> = (1..=12).map(|m| (m, Vec::new())).collect();
    for line in lines.iter().filter(|l| l.year == Some(year)) {
        if let Some(bucket) = line.month.and_then(|m| months.get_mut(&m)) {
            bucket.push(line);
        }
    }
    months
}

pub fn by_quarter(lines: &[LedgerLine], year: i32, quarter: Quarter) -> Vec<&LedgerLine> {
    lines
        .iter()
        .filter(|l| l.year == Some(year))
        .filter(|l| l.month.map(|m| quarter.contains_month(m)).unwrap_or(false))
        .collect()
}

/// The same quarter in every year present in the batch.
pub fn by_quarter_all_years(lines: &[LedgerLine], quarter: Quarter) -> BTreeMap<i32, Vec<&LedgerLine>> {
    let mut years: BTreeMap<i32, Vec<&LedgerLine>> = BTreeMap::new();
    for line in lines {
        if let (Some(year), Some(month)) = (line.year, line.month) {
            if quarter.contains_month(month) {
                years.entry(year).or_default().push(line);
            }
        }
    }
    years
}

/// The `count` most recent years of the batch.
pub fn recent_years(lines: &[LedgerLine], count: usize) -> BTreeMap<i32, Vec<&LedgerLine>> {
    let mut years = by_year(lines);
    while years.len() > count {
        years.pop_first();
    }
    years
}

pub fn yearly_indicators(lines: &[LedgerLine], options: &CascadeOptions) -> BTreeMap<i32, IndicatorSet> {
    let yearly: BTreeMap<i32, IndicatorSet> = by_year(lines)
        .into_iter()
        .map(|(year, year_lines)| (year, calculate(year_lines, options)))
        .collect();
    debug!("Computed indicators for {} years", yearly.len());
    yearly
}

/// Per-month indicators of `year`. Months without lines are skipped.
pub fn monthly_indicators(
    lines: &[LedgerLine],
    year: i32,
    options: &CascadeOptions,
) -> BTreeMap<u32, IndicatorSet> {
    by_month(lines, year)
        .into_iter()
        .filter(|(_, month_lines)| !month_lines.is_empty())
        .map(|(month, month_lines)| (month, calculate(month_lines, options)))
        .collect()
}

/// Indicators of one quarter, computed separately for each year.
pub fn quarterly_indicators(
    lines: &[LedgerLine],
    quarter: Quarter,
    options: &CascadeOptions,
) -> BTreeMap<i32, IndicatorSet> {
    by_quarter_all_years(lines, quarter)
        .into_iter()
        .map(|(year, quarter_lines)| (year, calculate(quarter_lines, options)))
        .collect()
}

/// Accounts behind a sub-indicator, grouped by (code, label) in order of first appearance.
pub fn accounts_for_sub_indicator(lines: &[LedgerLine], label: &str) -> Vec<AccountTotal> {
    let mut totals: Vec<AccountTotal> = Vec::new();

    for line in lines.iter().filter(|l| l.matches_sub_indicator(label)) {
        let existing = totals
            .iter_mut()
            .find(|t| t.account_code == line.account_code && t.account_label == line.account_label);
        match existing {
            Some(total) => {
                total.amount += line.amount;
                total.debit += line.debit;
                total.credit += line.credit;
            }
            None => totals.push(AccountTotal {
                account_code: line.account_code.clone(),
                account_label: line.account_label.clone(),
                amount: line.amount,
                debit: line.debit,
                credit: line.credit,
            }),
        }
    }

    totals
}

/// Individual ledger entries behind a sub-indicator, in ledger order.
pub fn entries_for_sub_indicator(lines: &[LedgerLine], label: &str) -> Vec<AccountEntry> {
    lines
        .iter()
        .filter(|l| l.matches_sub_indicator(label))
        .map(|l| AccountEntry {
            account_code: l.account_code.clone(),
            account_label: l.account_label.clone(),
            amount: l.amount,
            debit: l.debit,
            credit: l.credit,
            posting_date: l.posting_date.clone(),
            document: l.document.clone(),
            user: l.user.clone(),
        })
        .collect()
}

#[derive(Default)]
struct SummaryAccumulator {
    amount: Decimal,
    accounts: BTreeSet<String>,
    natures: BTreeSet<Nature>,
}

/// Formula naming the accounts actually seen for a sub-indicator.
pub fn detailed_formula<'a, I>(accounts: I, natures: &[Nature]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let listed = accounts.into_iter().collect::<Vec<_>>().join(", ");
    let has_asset = natures.contains(&Nature::Asset);
    let has_liability = natures.contains(&Nature::Liability);

    let balance = match (has_asset, has_liability) {
        (true, true) => "Solde selon nature",
        (false, true) => "Crédit - Débit",
        _ => "Débit - Crédit",
    };
    format!("Σ ({}) des comptes: {}", balance, listed)
}

fn summarize<'a, I>(lines: I) -> BTreeMap<String, SubIndicatorSummary>
where
    I: IntoIterator<Item = &'a LedgerLine>,
{
    let mut groups: BTreeMap<String, SummaryAccumulator> = BTreeMap::new();
    for line in lines {
        for label in &line.sub_indicators {
            let group = groups.entry(label.clone()).or_default();
            group.amount += line.amount;
            group.accounts.insert(line.account_code.clone());
            group.natures.insert(line.nature());
        }
    }

    groups
        .into_iter()
        .map(|(label, group)| {
            let natures: Vec<Nature> = group.natures.into_iter().collect();
            let summary = SubIndicatorSummary {
                abbreviation: abbreviation(&label),
                formula: descriptive_formula(&label),
                detailed_formula: Some(detailed_formula(
                    group.accounts.iter().map(String::as_str),
                    &natures,
                )),
                amount: group.amount,
                label: label.clone(),
            };
            (label, summary)
        })
        .collect()
}

fn class_matches(line: &LedgerLine, class_filter: Option<&str>) -> bool {
    match class_filter {
        Some(prefix) => line.account_code.starts_with(prefix.trim()),
        None => true,
    }
}

/// Observed sub-indicators of one indicator, optionally restricted to
/// accounts starting with `class_filter`.
pub fn sub_indicator_summaries(
    lines: &[LedgerLine],
    indicator: IndicatorCode,
    class_filter: Option<&str>,
) -> Vec<SubIndicatorSummary> {
    summarize(
        lines
            .iter()
            .filter(|l| l.indicator == Some(indicator))
            .filter(|l| class_matches(l, class_filter)),
    )
    .into_values()
    .collect()
}

/// Sub-indicator label → year → summary.
pub fn sub_indicators_by_year(
    lines: &[LedgerLine],
    class_filter: Option<&str>,
) -> BTreeMap<String, BTreeMap<i32, SubIndicatorSummary>> {
    let mut table: BTreeMap<String, BTreeMap<i32, SubIndicatorSummary>> = BTreeMap::new();

    for (year, year_lines) in by_year(lines) {
        let filtered = year_lines
            .into_iter()
            .filter(|l| l.indicator.is_some())
            .filter(|l| class_matches(l, class_filter));
        for (label, summary) in summarize(filtered) {
            table.entry(label).or_default().insert(year, summary);
        }
    }

    table
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

pub fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: usize) -> Page<T> {
    let total = items.len();
    let page: Vec<T> = match limit {
        Some(limit) => items.into_iter().skip(offset).take(limit).collect(),
        None => items.into_iter().skip(offset).collect(),
    };
    Page {
        items: page,
        total,
        limit,
        offset,
    }
}

/// Classification coverage of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDiagnostics {
    pub line_count: usize,
    pub classified_count: usize,
    pub by_indicator: BTreeMap<IndicatorCode, usize>,
    pub by_sub_indicator: BTreeMap<String, usize>,
    /// Distinct unmapped account codes, sorted, capped to a small sample.
    pub unmapped_codes: Vec<String>,
    pub undated_count: usize,
    /// Years present in the batch, most recent first.
    pub years: Vec<i32>,
}

impl LedgerDiagnostics {
    pub fn from_lines(lines: &[LedgerLine]) -> Self {
        let mut diagnostics = LedgerDiagnostics {
            line_count: lines.len(),
            ..Default::default()
        };
        let mut unmapped = BTreeSet::new();
        let mut years = BTreeSet::new();

        for line in lines {
            match line.indicator {
                Some(indicator) => {
                    diagnostics.classified_count += 1;
                    *diagnostics.by_indicator.entry(indicator).or_default() += 1;
                }
                None => {
                    unmapped.insert(line.account_code.clone());
                }
            }
            for label in &line.sub_indicators {
                *diagnostics.by_sub_indicator.entry(label.clone()).or_default() += 1;
            }
            match line.year {
                Some(year) => {
                    years.insert(year);
                }
                None => diagnostics.undated_count += 1,
            }
        }

        diagnostics.unmapped_codes = unmapped.into_iter().take(UNMAPPED_SAMPLE_SIZE).collect();
        diagnostics.years = years.into_iter().rev().collect();
        diagnostics
    }

    pub fn unclassified_count(&self) -> usize {
        self.line_count - self.classified_count
    }
}
