//! Outbound report records, serialized with the French keys expected by the
//! service layer.

use crate::aggregation::IndicatorSet;
use crate::chart_of_accounts::abbreviation;
use crate::schema::{ComponentKind, IndicatorCode, IndicatorResult};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubIndicatorReport {
    pub sous_indicateur: String,

    #[schemars(description = "Short code of the sub-indicator (e.g. 'VDM')")]
    pub initiales: String,

    #[serde(with = "rust_decimal::serde::float")]
    #[schemars(with = "f64", description = "Summed ledger amount of the sub-indicator")]
    pub montant: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorReport {
    pub indicateur: IndicatorCode,

    pub libelle: String,

    #[serde(with = "rust_decimal::serde::float")]
    #[schemars(with = "f64")]
    pub valeur: Decimal,

    #[schemars(description = "Formula with labels, e.g. 'MC = VENTES DE MARCHANDISES (1000.00) - ...'")]
    pub formule_text: String,

    #[schemars(description = "Formula with amounts only, e.g. 'MC = 1000.00 - 400.00 = 600.00'")]
    pub formule_numeric: String,

    pub sous_indicateurs: Vec<SubIndicatorReport>,
}

impl IndicatorReport {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(IndicatorReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

impl From<&IndicatorResult> for IndicatorReport {
    fn from(result: &IndicatorResult) -> Self {
        let sous_indicateurs = result
            .components
            .iter()
            .filter(|c| c.kind == ComponentKind::SubIndicator)
            .map(|c| SubIndicatorReport {
                sous_indicateur: c.name.clone(),
                initiales: abbreviation(&c.name),
                montant: c.amount,
            })
            .collect();

        IndicatorReport {
            indicateur: result.code,
            libelle: result.label.clone(),
            valeur: result.value,
            formule_text: result.formula_text.clone(),
            formule_numeric: result.formula_numeric.clone(),
            sous_indicateurs,
        }
    }
}

/// Reports in cascade order.
pub fn reports_from_results(results: &IndicatorSet) -> Vec<IndicatorReport> {
    results.values().map(IndicatorReport::from).collect()
}

/// Reports keyed by period ("2023", "2023-Q2", "2023-05", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodReport {
    pub periods: BTreeMap<String, Vec<IndicatorReport>>,
}

impl PeriodReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, period: impl Into<String>, results: &IndicatorSet) {
        self.periods.insert(period.into(), reports_from_results(results));
    }

    /// Builds a report from any period-keyed set of results, formatting keys with `label`.
    pub fn from_periods<K, F>(series: &BTreeMap<K, IndicatorSet>, label: F) -> Self
    where
        F: Fn(&K) -> String,
    {
        let mut report = Self::new();
        for (key, results) in series {
            report.insert(label(key), results);
        }
        report
    }

    pub fn from_yearly(series: &BTreeMap<i32, IndicatorSet>) -> Self {
        Self::from_periods(series, |year| year.to_string())
    }

    pub fn from_monthly(year: i32, series: &BTreeMap<u32, IndicatorSet>) -> Self {
        Self::from_periods(series, |month| format!("{}-{:02}", year, month))
    }

    pub fn from_quarterly(quarter: impl Display, series: &BTreeMap<i32, IndicatorSet>) -> Self {
        let quarter = quarter.to_string();
        Self::from_periods(series, |year| format!("{}-Q{}", year, quarter))
    }

    pub fn get(&self, period: &str) -> Option<&[IndicatorReport]> {
        self.periods.get(period).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::ChartOfAccounts;
    use crate::engine::{compute_all, CascadeOptions};
    use crate::enrichment::enrich_batch;
    use crate::schema::RawLedgerLine;
    use rust_decimal_macros::dec;

    fn results() -> IndicatorSet {
        let raws = vec![
            RawLedgerLine::new("707", dec!(0), dec!(1000), "2023-01-10"),
            RawLedgerLine::new("607", dec!(400), dec!(0), "2023-01-11"),
        ];
        compute_all(
            &enrich_batch(ChartOfAccounts::standard(), &raws),
            &CascadeOptions::default(),
        )
    }

    #[test]
    fn test_report_from_result() {
        let reports = reports_from_results(&results());
        assert_eq!(reports.len(), 5);

        let mc = &reports[0];
        assert_eq!(mc.indicateur, IndicatorCode::CommercialMargin);
        assert_eq!(mc.libelle, "Marge commerciale");
        assert_eq!(mc.valeur, dec!(600));
        assert_eq!(mc.sous_indicateurs.len(), 2);
        assert_eq!(mc.sous_indicateurs[0].initiales, "VDM");
        assert_eq!(mc.sous_indicateurs[1].montant, dec!(400));

        // the upstream MC term of VA is not a sub-indicator
        assert!(reports[1].sous_indicateurs.is_empty());
    }

    #[test]
    fn test_unlabelled_lines_get_a_clean_abbreviation() {
        let raws = vec![RawLedgerLine::new("6031", dec!(30), dec!(0), "2023-02-01")];
        let results = compute_all(
            &enrich_batch(ChartOfAccounts::standard(), &raws),
            &CascadeOptions::default(),
        );
        let reports = reports_from_results(&results);

        let va = &reports[0];
        assert_eq!(va.indicateur, IndicatorCode::ValueAdded);
        assert_eq!(va.sous_indicateurs[0].sous_indicateur, "SANS SOUS-INDICATEUR");
        assert_eq!(va.sous_indicateurs[0].initiales, "SSI");
        assert_eq!(va.sous_indicateurs[0].montant, dec!(30));
    }

    #[test]
    fn test_report_json_keys() {
        let reports = reports_from_results(&results());
        let value = serde_json::to_value(&reports[0]).unwrap();

        assert_eq!(value["indicateur"], "MC");
        assert_eq!(value["valeur"].as_f64(), Some(600.0));
        assert_eq!(value["formule_numeric"], "MC = 1000.00 - 400.00 = 600.00");
        assert_eq!(value["sous_indicateurs"][0]["sous_indicateur"], "VENTES DE MARCHANDISES");
        assert_eq!(value["sous_indicateurs"][0]["montant"].as_f64(), Some(1000.0));
        assert!(value.get("formule_text").is_some());
        assert!(value.get("libelle").is_some());
    }

    #[test]
    fn test_period_report_keys() {
        let mut yearly = BTreeMap::new();
        yearly.insert(2023, results());
        let report = PeriodReport::from_yearly(&yearly);
        assert_eq!(report.len(), 1);
        assert_eq!(report.get("2023").unwrap().len(), 5);

        let mut monthly = BTreeMap::new();
        monthly.insert(1u32, results());
        let report = PeriodReport::from_monthly(2023, &monthly);
        assert!(report.get("2023-01").is_some());

        let report = PeriodReport::from_quarterly(1, &yearly);
        assert!(report.get("2023-Q1").is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["2023-Q1"].is_array());
    }

    #[test]
    fn test_report_schema() {
        let schema = IndicatorReport::schema_as_json().unwrap();
        assert!(schema.contains("formule_numeric"));
        assert!(schema.contains("sous_indicateurs"));
    }
}
