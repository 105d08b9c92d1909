use crate::chart_of_accounts::ChartOfAccounts;
use crate::schema::{Classification, LedgerLine, Nature, RawLedgerLine};
use crate::utils::{parse_posting_date, period_fields};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

/// Classification results keyed by account code, scoped to one batch.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    entries: HashMap<String, Option<Classification>>,
    hits: usize,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, chart: &ChartOfAccounts, account_code: &str) -> Option<Classification> {
        if let Some(cached) = self.entries.get(account_code) {
            self.hits += 1;
            return cached.clone();
        }

        let classification = chart.classify(account_code);
        self.entries
            .insert(account_code.to_string(), classification.clone());
        classification
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// First `len` characters of an account code, or the whole code if shorter.
pub fn account_prefix(account_code: &str, len: usize) -> String {
    account_code.chars().take(len).collect()
}

/// Turns raw ledger lines into classified, signed, period-tagged lines.
pub struct LedgerLineEnricher<'c> {
    chart: &'c ChartOfAccounts,
    cache: ClassificationCache,
    unclassified: usize,
    undated: usize,
}

impl<'c> LedgerLineEnricher<'c> {
    pub fn new(chart: &'c ChartOfAccounts) -> Self {
        Self {
            chart,
            cache: ClassificationCache::new(),
            unclassified: 0,
            undated: 0,
        }
    }

    pub fn enrich(&mut self, raw: &RawLedgerLine) -> LedgerLine {
        let code = raw.account_code.trim();

        let classification = self.cache.lookup(self.chart, code);
        let (indicator, sub_indicators) = match classification {
            Some(c) => (
                Some(c.indicator),
                c.sub_indicator.into_iter().collect::<BTreeSet<_>>(),
            ),
            None => {
                self.unclassified += 1;
                (None, BTreeSet::new())
            }
        };

        let amount = Nature::of(code).signed_amount(raw.debit, raw.credit);

        let date = parse_posting_date(&raw.posting_date);
        if date.is_none() {
            self.undated += 1;
        }
        let (year, month, quarter) = period_fields(date);

        let account_label = match &raw.account_label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => raw.description.clone(),
        };

        LedgerLine {
            account_code: code.to_string(),
            account_label,
            debit: raw.debit,
            credit: raw.credit,
            posting_date: raw.posting_date.clone(),
            description: raw.description.clone(),
            document: raw.document.clone(),
            user: raw.user.clone(),
            source: raw.source.clone(),
            dimension1: raw.dimension1.clone(),
            dimension2: raw.dimension2.clone(),
            class: account_prefix(code, 1),
            sub_class: account_prefix(code, 2),
            sub_sub_class: account_prefix(code, 3),
            indicator,
            sub_indicators,
            amount,
            date,
            year,
            month,
            quarter,
        }
    }

    pub fn enrich_all(&mut self, raws: &[RawLedgerLine]) -> Vec<LedgerLine> {
        raws.iter().map(|raw| self.enrich(raw)).collect()
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    pub fn unclassified_count(&self) -> usize {
        self.unclassified
    }

    pub fn undated_count(&self) -> usize {
        self.undated
    }
}

/// Enriches one batch with a fresh classification cache.
pub fn enrich_batch(chart: &ChartOfAccounts, raws: &[RawLedgerLine]) -> Vec<LedgerLine> {
    let mut enricher = LedgerLineEnricher::new(chart);
    let lines = enricher.enrich_all(raws);

    debug!(
        "Enriched {} ledger lines ({} distinct account codes, {} cache hits)",
        lines.len(),
        enricher.cache().len(),
        enricher.cache().hits()
    );
    if enricher.unclassified_count() > 0 {
        warn!(
            "{} ledger lines have no chart-of-accounts mapping and are excluded from indicator sums",
            enricher.unclassified_count()
        );
    }
    if enricher.undated_count() > 0 {
        warn!(
            "{} ledger lines have an unparseable posting date and are excluded from period views",
            enricher.undated_count()
        );
    }

    lines
}
