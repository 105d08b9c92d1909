use crate::error::{Result, SigError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The five SIG indicators, declared in cascade order.
///
/// `Ord` follows the declaration order, so a `BTreeMap<IndicatorCode, _>`
/// iterates MC → VA → EBE → RE → R.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum IndicatorCode {
    #[serde(rename = "MC")]
    #[schemars(description = "Marge commerciale: sales of goods minus cost of goods sold")]
    CommercialMargin,

    #[serde(rename = "VA")]
    #[schemars(description = "Valeur ajoutée: MC plus production minus external consumption")]
    ValueAdded,

    #[serde(rename = "EBE")]
    #[schemars(
        description = "Excédent brut d'exploitation: VA adjusted for subsidies, taxes, personnel and external services"
    )]
    GrossOperatingSurplus,

    #[serde(rename = "RE")]
    #[schemars(
        description = "Résultat d'exploitation: EBE adjusted for other operating income/expense and depreciation"
    )]
    OperatingResult,

    #[serde(rename = "R")]
    #[schemars(
        description = "Résultat net: RE adjusted for financial and exceptional result and income tax"
    )]
    NetResult,
}

impl IndicatorCode {
    pub const ALL: [IndicatorCode; 5] = [
        IndicatorCode::CommercialMargin,
        IndicatorCode::ValueAdded,
        IndicatorCode::GrossOperatingSurplus,
        IndicatorCode::OperatingResult,
        IndicatorCode::NetResult,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            IndicatorCode::CommercialMargin => "MC",
            IndicatorCode::ValueAdded => "VA",
            IndicatorCode::GrossOperatingSurplus => "EBE",
            IndicatorCode::OperatingResult => "RE",
            IndicatorCode::NetResult => "R",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndicatorCode::CommercialMargin => "Marge commerciale",
            IndicatorCode::ValueAdded => "Valeur ajoutée",
            IndicatorCode::GrossOperatingSurplus => "Excédent brut d'exploitation",
            IndicatorCode::OperatingResult => "Résultat d'exploitation",
            IndicatorCode::NetResult => "Résultat net",
        }
    }

    /// The indicator whose value this one starts from.
    pub fn upstream(&self) -> Option<IndicatorCode> {
        match self {
            IndicatorCode::CommercialMargin => None,
            IndicatorCode::ValueAdded => Some(IndicatorCode::CommercialMargin),
            IndicatorCode::GrossOperatingSurplus => Some(IndicatorCode::ValueAdded),
            IndicatorCode::OperatingResult => Some(IndicatorCode::GrossOperatingSurplus),
            IndicatorCode::NetResult => Some(IndicatorCode::OperatingResult),
        }
    }
}

impl fmt::Display for IndicatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IndicatorCode {
    type Err = SigError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        IndicatorCode::ALL
            .into_iter()
            .find(|code| code.code() == normalized)
            .ok_or_else(|| SigError::UnknownIndicator(s.to_string()))
    }
}

/// One row of the chart-of-accounts table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountMappingEntry {
    #[schemars(description = "Account-code prefix, digits only (e.g. '607')")]
    pub prefix: String,

    pub indicator: IndicatorCode,

    #[serde(default)]
    #[schemars(description = "Sub-indicator label; empty for catch-all class prefixes")]
    pub sub_indicator: String,
}

impl AccountMappingEntry {
    pub fn new(prefix: &str, indicator: IndicatorCode, sub_indicator: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            indicator,
            sub_indicator: sub_indicator.to_string(),
        }
    }
}

/// Result of a longest-prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub indicator: IndicatorCode,
    /// `None` when the matching entry carries an empty sub-indicator.
    pub sub_indicator: Option<String>,
}

/// Balance convention of an account, derived from its class digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nature {
    /// Asset and expense accounts (classes 1–6): debit − credit.
    Asset,
    /// Liability and revenue accounts (classes 7–8): credit − debit.
    Liability,
}

impl Nature {
    pub fn of(account_code: &str) -> Self {
        match account_code.chars().next() {
            Some('7') | Some('8') => Nature::Liability,
            _ => Nature::Asset,
        }
    }

    pub fn signed_amount(&self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Nature::Asset => debit - credit,
            Nature::Liability => credit - debit,
        }
    }
}

/// A ledger line exactly as fetched from an accounting backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawLedgerLine {
    #[schemars(description = "General-ledger account code (e.g. '607100')")]
    pub account_code: String,

    #[serde(default)]
    #[schemars(description = "Account label; the line description is used when absent")]
    pub account_label: Option<String>,

    #[serde(default)]
    #[schemars(description = "Debit amount, non-negative")]
    pub debit: Decimal,

    #[serde(default)]
    #[schemars(description = "Credit amount, non-negative")]
    pub credit: Decimal,

    #[serde(default)]
    #[schemars(
        description = "Posting date, YYYY-MM-DD or an RFC 3339 timestamp. Unparseable values are tolerated."
    )]
    pub posting_date: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub document: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub dimension1: String,

    #[serde(default)]
    pub dimension2: String,
}

impl RawLedgerLine {
    pub fn new(account_code: &str, debit: Decimal, credit: Decimal, posting_date: &str) -> Self {
        Self {
            account_code: account_code.to_string(),
            account_label: None,
            debit,
            credit,
            posting_date: posting_date.to_string(),
            description: String::new(),
            document: String::new(),
            user: String::new(),
            source: String::new(),
            dimension1: String::new(),
            dimension2: String::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.account_label = Some(label.to_string());
        self
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RawLedgerLine)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// A ledger line after enrichment. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub account_code: String,
    pub account_label: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub posting_date: String,
    pub description: String,
    pub document: String,
    pub user: String,
    pub source: String,
    pub dimension1: String,
    pub dimension2: String,

    pub class: String,
    pub sub_class: String,
    pub sub_sub_class: String,
    pub indicator: Option<IndicatorCode>,
    pub sub_indicators: BTreeSet<String>,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
}

impl LedgerLine {
    /// Third-party (class 4) and financial (class 5) accounts.
    pub fn is_third_party(&self) -> bool {
        self.class == "4" || self.class == "5"
    }

    pub fn has_sub_indicator(&self, label: &str) -> bool {
        self.sub_indicators.contains(label)
    }

    /// Trimmed, case-insensitive match used by drill-down queries.
    pub fn matches_sub_indicator(&self, label: &str) -> bool {
        let wanted = label.trim().to_lowercase();
        self.sub_indicators
            .iter()
            .any(|s| s.trim().to_lowercase() == wanted)
    }

    pub fn nature(&self) -> Nature {
        Nature::of(&self.account_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// The upstream indicator carried into the formula (e.g. MC inside VA).
    Indicator,
    SubIndicator,
}

/// One term of an indicator formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTerm {
    pub name: String,
    pub kind: ComponentKind,
    /// Summed ledger amount (or the upstream value for indicator terms).
    pub amount: Decimal,
    /// Contribution to the indicator value: products as-is, charges as `-|amount|`.
    pub signed_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub code: IndicatorCode,
    pub label: String,
    pub value: Decimal,
    pub components: Vec<ComponentTerm>,
    pub formula_text: String,
    pub formula_numeric: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubIndicatorSummary {
    pub label: String,
    pub abbreviation: String,
    /// Static description from the chart of accounts.
    pub formula: String,
    /// Description listing the accounts actually seen, when built from lines.
    pub detailed_formula: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountTotal {
    pub account_code: String,
    pub account_label: String,
    pub amount: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountEntry {
    pub account_code: String,
    pub account_label: String,
    pub amount: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,
    pub posting_date: String,
    pub document: String,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_indicator_order_follows_cascade() {
        let mut codes = vec![
            IndicatorCode::NetResult,
            IndicatorCode::CommercialMargin,
            IndicatorCode::OperatingResult,
            IndicatorCode::ValueAdded,
            IndicatorCode::GrossOperatingSurplus,
        ];
        codes.sort();
        assert_eq!(codes, IndicatorCode::ALL.to_vec());
    }

    #[test]
    fn test_indicator_upstream_chain() {
        assert_eq!(IndicatorCode::CommercialMargin.upstream(), None);
        for pair in IndicatorCode::ALL.windows(2) {
            assert_eq!(pair[1].upstream(), Some(pair[0]));
        }
    }

    #[test]
    fn test_indicator_parsing() {
        assert_eq!("MC".parse::<IndicatorCode>().unwrap(), IndicatorCode::CommercialMargin);
        assert_eq!(" ebe ".parse::<IndicatorCode>().unwrap(), IndicatorCode::GrossOperatingSurplus);
        assert_eq!("R".parse::<IndicatorCode>().unwrap(), IndicatorCode::NetResult);
        assert!(matches!(
            "XYZ".parse::<IndicatorCode>(),
            Err(SigError::UnknownIndicator(_))
        ));
    }

    #[test]
    fn test_indicator_serializes_as_short_code() {
        let json = serde_json::to_string(&IndicatorCode::GrossOperatingSurplus).unwrap();
        assert_eq!(json, "\"EBE\"");
        let back: IndicatorCode = serde_json::from_str("\"RE\"").unwrap();
        assert_eq!(back, IndicatorCode::OperatingResult);
    }

    #[test]
    fn test_nature_by_class() {
        for code in ["101", "2154", "31", "401", "512", "607"] {
            assert_eq!(Nature::of(code), Nature::Asset, "code {}", code);
        }
        assert_eq!(Nature::of("707"), Nature::Liability);
        assert_eq!(Nature::of("86"), Nature::Liability);
        assert_eq!(Nature::of(""), Nature::Asset);
        assert_eq!(Nature::of("99"), Nature::Asset);
    }

    #[test]
    fn test_signed_amount_flips_with_debit_credit_swap() {
        for nature in [Nature::Asset, Nature::Liability] {
            let a = nature.signed_amount(dec!(250), dec!(40));
            let b = nature.signed_amount(dec!(40), dec!(250));
            assert_eq!(a, -b);
        }
        assert_eq!(Nature::Asset.signed_amount(dec!(400), dec!(0)), dec!(400));
        assert_eq!(Nature::Liability.signed_amount(dec!(0), dec!(1000)), dec!(1000));
    }

    #[test]
    fn test_raw_line_schema_generation() {
        let schema = RawLedgerLine::schema_as_json().unwrap();
        assert!(schema.contains("account_code"));
        assert!(schema.contains("posting_date"));
    }

    #[test]
    fn test_raw_line_deserializes_with_defaults() {
        let line: RawLedgerLine =
            serde_json::from_str(r#"{"account_code": "707", "credit": "1000.50"}"#).unwrap();
        assert_eq!(line.credit, dec!(1000.50));
        assert_eq!(line.debit, Decimal::ZERO);
        assert!(line.posting_date.is_empty());
        assert!(line.account_label.is_none());
    }
}
