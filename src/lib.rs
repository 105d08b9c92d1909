//! # SIG Ledger
//!
//! A library for deriving the French *Soldes Intermédiaires de Gestion* (SIG)
//! from general-ledger lines, with an audit formula for every figure.
//!
//! ## Core Concepts
//!
//! - **Chart of accounts**: a prefix table filing each account code under one of the
//!   five indicators and a named sub-indicator. The longest matching prefix wins.
//! - **Enrichment**: raw lines get their class digits, classification, a signed amount
//!   (debit − credit for classes 1–6, credit − debit for classes 7–8) and period fields.
//! - **Cascade**: MC → VA → EBE → RE → R. Each indicator starts from the previous one
//!   and adds or subtracts a fixed set of sub-indicator sums.
//! - **Periods**: yearly, quarterly and monthly views recompute the cascade from each
//!   period's own lines.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sig_ledger::*;
//! use rust_decimal_macros::dec;
//!
//! let raws = vec![
//!     RawLedgerLine::new("707", dec!(0), dec!(1000), "2023-03-01"),
//!     RawLedgerLine::new("607", dec!(400), dec!(0), "2023-03-02"),
//! ];
//!
//! let engine = SigEngine::standard();
//! let results = engine.compute(&engine.enrich(&raws));
//!
//! let mc = &results[&IndicatorCode::CommercialMargin];
//! assert_eq!(mc.formula_numeric, "MC = 1000.00 - 400.00 = 600.00");
//! ```

pub mod aggregation;
pub mod chart_of_accounts;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod formula;
pub mod ingestion;
pub mod report;
pub mod schema;
pub mod utils;

pub use aggregation::{
    accounts_for_sub_indicator, by_month, by_quarter, by_quarter_all_years, by_year,
    entries_for_sub_indicator, monthly_indicators, paginate, quarterly_indicators, recent_years,
    sub_indicator_summaries, sub_indicators_by_year, yearly_indicators, IndicatorSet,
    LedgerDiagnostics, Page, Quarter,
};
pub use chart_of_accounts::{ChartOfAccounts, FormulaTerm, TermRole};
pub use config::SigConfig;
pub use engine::{compute_all, CascadeOptions, IndicatorCascadeCalculator, NO_SUB_INDICATOR};
pub use enrichment::{enrich_batch, ClassificationCache, LedgerLineEnricher};
pub use error::{Result, SigError};
pub use ingestion::{raw_lines_from_json, InMemoryLedger, LedgerSource, PeriodFilter};
pub use report::{reports_from_results, IndicatorReport, PeriodReport, SubIndicatorReport};
pub use schema::*;
pub use utils::format_amount;

use log::{debug, info};

/// A configured SIG engine: one chart of accounts plus cascade options.
#[derive(Debug, Clone, PartialEq)]
pub struct SigEngine {
    chart: ChartOfAccounts,
    options: CascadeOptions,
}

impl SigEngine {
    pub fn new(config: &SigConfig) -> Result<Self> {
        let chart = config.build_chart()?;
        debug!(
            "SIG engine configured with {} chart entries (exclude third party: {})",
            chart.entries().len(),
            config.options.exclude_third_party_accounts
        );
        Ok(Self {
            chart,
            options: config.options,
        })
    }

    /// Built-in French chart with default options.
    pub fn standard() -> Self {
        Self {
            chart: ChartOfAccounts::standard().clone(),
            options: CascadeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CascadeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn options(&self) -> &CascadeOptions {
        &self.options
    }

    pub fn enrich(&self, raws: &[RawLedgerLine]) -> Vec<LedgerLine> {
        enrich_batch(&self.chart, raws)
    }

    pub fn calculator<'a, I>(&self, lines: I) -> IndicatorCascadeCalculator
    where
        I: IntoIterator<Item = &'a LedgerLine>,
    {
        IndicatorCascadeCalculator::new(lines, &self.options)
    }

    pub fn compute(&self, lines: &[LedgerLine]) -> IndicatorSet {
        info!("Computing SIG cascade over {} ledger lines", lines.len());
        let results = compute_all(lines, &self.options);
        debug!("{} of 5 indicators are computable", results.len());
        results
    }

    /// Enriches and computes in one go, returning the outbound report rows.
    pub fn report(&self, raws: &[RawLedgerLine]) -> Vec<IndicatorReport> {
        reports_from_results(&self.compute(&self.enrich(raws)))
    }

    pub fn report_from_source<S>(&self, source: &S, filter: &PeriodFilter) -> Result<Vec<IndicatorReport>>
    where
        S: LedgerSource + ?Sized,
    {
        let raws = source.fetch_lines(filter)?;
        info!("Fetched {} ledger lines for period {}", raws.len(), filter);
        Ok(self.report(&raws))
    }

    pub fn yearly_report(&self, raws: &[RawLedgerLine]) -> PeriodReport {
        let lines = self.enrich(raws);
        PeriodReport::from_yearly(&yearly_indicators(&lines, &self.options))
    }

    pub fn monthly_report(&self, raws: &[RawLedgerLine], year: i32) -> PeriodReport {
        let lines = self.enrich(raws);
        PeriodReport::from_monthly(year, &monthly_indicators(&lines, year, &self.options))
    }

    pub fn quarterly_report(&self, raws: &[RawLedgerLine], quarter: u32) -> Result<PeriodReport> {
        let quarter = Quarter::new(quarter)?;
        let lines = self.enrich(raws);
        Ok(PeriodReport::from_quarterly(
            quarter.number(),
            &quarterly_indicators(&lines, quarter, &self.options),
        ))
    }

    pub fn diagnostics(&self, raws: &[RawLedgerLine]) -> LedgerDiagnostics {
        LedgerDiagnostics::from_lines(&self.enrich(raws))
    }
}

impl Default for SigEngine {
    fn default() -> Self {
        Self::standard()
    }
}

/// Computes the cascade over raw lines with the built-in chart and default options.
pub fn compute_indicators(raws: &[RawLedgerLine]) -> IndicatorSet {
    let engine = SigEngine::standard();
    engine.compute(&engine.enrich(raws))
}
