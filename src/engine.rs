use crate::chart_of_accounts::{abbreviation, descriptive_formula, formula_terms, TermRole};
use crate::formula::{formula_numeric, formula_text, partition_labels};
use crate::schema::*;
use crate::utils::normalize_zero;
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Group label for lines whose chart entry carries no sub-indicator.
pub const NO_SUB_INDICATOR: &str = "SANS SOUS-INDICATEUR";

fn default_exclude_third_party() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CascadeOptions {
    /// Leave class 4 (third parties) and class 5 (financial) lines out of every sum.
    #[serde(default = "default_exclude_third_party")]
    pub exclude_third_party_accounts: bool,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            exclude_third_party_accounts: true,
        }
    }
}

// Internal struct holding the outcome of one cascade step
#[derive(Debug, Clone)]
struct CascadeStep {
    value: Decimal,
    components: Vec<ComponentTerm>,
    fallback: bool,
}

impl CascadeStep {
    fn is_computable(&self) -> bool {
        !(self.value.is_zero() && self.components.is_empty())
    }
}

/// Computes MC → VA → EBE → RE → R over one batch of enriched lines.
///
/// Totals are gathered once when the calculator is built and every step is
/// evaluated right away, so all accessors are cheap and deterministic.
pub struct IndicatorCascadeCalculator {
    options: CascadeOptions,
    line_count: usize,
    // (indicator, sub-indicator or NO_SUB_INDICATOR) -> summed amount
    sums: BTreeMap<(IndicatorCode, String), Decimal>,
    direct: BTreeMap<IndicatorCode, Decimal>,
    steps: BTreeMap<IndicatorCode, CascadeStep>,
}

impl IndicatorCascadeCalculator {
    pub fn new<'a, I>(lines: I, options: &CascadeOptions) -> Self
    where
        I: IntoIterator<Item = &'a LedgerLine>,
    {
        let mut sums: BTreeMap<(IndicatorCode, String), Decimal> = BTreeMap::new();
        let mut direct: BTreeMap<IndicatorCode, Decimal> = BTreeMap::new();
        let mut line_count = 0;

        for line in lines {
            line_count += 1;
            let Some(indicator) = line.indicator else {
                continue;
            };
            if options.exclude_third_party_accounts && line.is_third_party() {
                continue;
            }

            *direct.entry(indicator).or_default() += line.amount;

            if line.sub_indicators.is_empty() {
                *sums
                    .entry((indicator, NO_SUB_INDICATOR.to_string()))
                    .or_default() += line.amount;
            }
            for label in &line.sub_indicators {
                *sums.entry((indicator, label.clone())).or_default() += line.amount;
            }
        }

        let mut calculator = Self {
            options: *options,
            line_count,
            sums,
            direct,
            steps: BTreeMap::new(),
        };
        calculator.run_cascade();
        calculator
    }

    pub fn options(&self) -> &CascadeOptions {
        &self.options
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Summed amount of the lines filed under `indicator` and `label`.
    pub fn sub_indicator_sum(&self, indicator: IndicatorCode, label: &str) -> Decimal {
        self.sums
            .get(&(indicator, label.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of every line classified under `indicator`, whatever its sub-indicator.
    pub fn direct_sum(&self, indicator: IndicatorCode) -> Decimal {
        self.direct.get(&indicator).copied().unwrap_or(Decimal::ZERO)
    }

    fn run_cascade(&mut self) {
        for code in IndicatorCode::ALL {
            let step = self.evaluate(code);
            debug!(
                "{} = {} ({} components{})",
                code,
                step.value,
                step.components.len(),
                if step.fallback { ", direct sum" } else { "" }
            );
            self.steps.insert(code, step);
        }
    }

    fn evaluate(&self, code: IndicatorCode) -> CascadeStep {
        // 1. Upstream value; an omitted upstream carries 0
        let upstream = code
            .upstream()
            .map(|u| (u, self.steps.get(&u).map(|s| s.value).unwrap_or(Decimal::ZERO)));
        let upstream_value = upstream.map(|(_, v)| v).unwrap_or(Decimal::ZERO);

        // 2. Named terms, scoped to lines filed under this indicator
        let mut product_side = Decimal::ZERO;
        let mut charge_side = Decimal::ZERO;
        let terms: Vec<ComponentTerm> = formula_terms(code)
            .iter()
            .map(|term| {
                let amount = self.sub_indicator_sum(code, term.label);
                let signed_amount = match term.role {
                    TermRole::Product => {
                        product_side += amount;
                        amount
                    }
                    TermRole::Charge => {
                        charge_side += amount.abs();
                        normalize_zero(-amount.abs())
                    }
                };
                ComponentTerm {
                    name: term.label.to_string(),
                    kind: ComponentKind::SubIndicator,
                    amount,
                    signed_amount,
                }
            })
            .collect();
        let terms_are_zero = terms.iter().all(|t| t.amount.is_zero());

        // 3. Direct-sum fallback for the two leading indicators, decided on the
        // summed sides: VA production includes the carried MC
        let use_fallback = match code {
            IndicatorCode::CommercialMargin => product_side.is_zero() && charge_side.is_zero(),
            IndicatorCode::ValueAdded => {
                (upstream_value + product_side).is_zero() && charge_side.is_zero()
            }
            _ => false,
        };
        if use_fallback {
            return self.direct_step(code);
        }

        if upstream_value.is_zero() && terms_are_zero {
            return CascadeStep {
                value: Decimal::ZERO,
                components: Vec::new(),
                fallback: false,
            };
        }

        // 4. Upstream pseudo-component first, then non-zero contributions
        let mut components = Vec::new();
        if let Some((upstream_code, value)) = upstream {
            if !value.is_zero() {
                components.push(ComponentTerm {
                    name: upstream_code.code().to_string(),
                    kind: ComponentKind::Indicator,
                    amount: value,
                    signed_amount: value,
                });
            }
        }
        let term_total: Decimal = terms.iter().map(|t| t.signed_amount).sum();
        components.extend(terms.into_iter().filter(|t| !t.signed_amount.is_zero()));

        CascadeStep {
            value: normalize_zero(upstream_value + term_total),
            components,
            fallback: false,
        }
    }

    fn direct_step(&self, code: IndicatorCode) -> CascadeStep {
        let components = self
            .sums
            .iter()
            .filter(|((indicator, _), amount)| *indicator == code && !amount.is_zero())
            .map(|((_, label), amount)| ComponentTerm {
                name: label.clone(),
                kind: ComponentKind::SubIndicator,
                amount: *amount,
                signed_amount: *amount,
            })
            .collect();

        CascadeStep {
            value: normalize_zero(self.direct_sum(code)),
            components,
            fallback: true,
        }
    }

    /// Value of an indicator, `None` when it is not computable for this batch.
    pub fn value_of(&self, code: IndicatorCode) -> Option<Decimal> {
        self.steps
            .get(&code)
            .filter(|step| step.is_computable())
            .map(|step| step.value)
    }

    /// Whether the indicator came from the direct sum of its lines.
    pub fn used_fallback(&self, code: IndicatorCode) -> bool {
        self.steps.get(&code).map(|s| s.fallback).unwrap_or(false)
    }

    pub fn result(&self, code: IndicatorCode) -> Option<IndicatorResult> {
        let step = self.steps.get(&code).filter(|step| step.is_computable())?;
        Some(IndicatorResult {
            code,
            label: code.label().to_string(),
            value: step.value,
            components: step.components.clone(),
            formula_text: formula_text(code, &step.components, step.value),
            formula_numeric: formula_numeric(code, &step.components, step.value),
        })
    }

    /// Every computable indicator, in cascade order.
    pub fn compute_all(&self) -> BTreeMap<IndicatorCode, IndicatorResult> {
        IndicatorCode::ALL
            .into_iter()
            .filter_map(|code| self.result(code).map(|r| (code, r)))
            .collect()
    }

    /// Labels added and labels subtracted in the indicator's formula.
    ///
    /// The upstream indicator is placed by the sign of its computed value, the
    /// named terms by the sign of their contribution. Zero terms are left out.
    pub fn components_for(&self, code: IndicatorCode) -> (Vec<String>, Vec<String>) {
        match self.steps.get(&code) {
            Some(step) if step.fallback => partition_labels(&step.components),
            Some(_) => {
                let mut positive = Vec::new();
                let mut negative = Vec::new();

                if let Some(upstream) = code.upstream() {
                    let value = self.steps.get(&upstream).map(|s| s.value).unwrap_or_default();
                    if value > Decimal::ZERO {
                        positive.push(upstream.code().to_string());
                    } else if value < Decimal::ZERO {
                        negative.push(upstream.code().to_string());
                    }
                }

                for term in formula_terms(code) {
                    let amount = self.sub_indicator_sum(code, term.label);
                    let contribution = match term.role {
                        TermRole::Product => amount,
                        TermRole::Charge => -amount.abs(),
                    };
                    if contribution > Decimal::ZERO {
                        positive.push(term.label.to_string());
                    } else if contribution < Decimal::ZERO {
                        negative.push(term.label.to_string());
                    }
                }

                (positive, negative)
            }
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Every label associated with the indicator, with its (possibly zero) amount.
    pub fn sub_indicator_amounts(&self, code: IndicatorCode) -> Vec<SubIndicatorSummary> {
        let mut summaries = Vec::new();

        if let Some(upstream) = code.upstream() {
            summaries.push(SubIndicatorSummary {
                label: upstream.code().to_string(),
                abbreviation: upstream.code().to_string(),
                formula: upstream.label().to_string(),
                detailed_formula: None,
                amount: self.value_of(upstream).unwrap_or(Decimal::ZERO),
            });
        }

        for term in formula_terms(code) {
            summaries.push(SubIndicatorSummary {
                label: term.label.to_string(),
                abbreviation: abbreviation(term.label),
                formula: descriptive_formula(term.label),
                detailed_formula: None,
                amount: self.sub_indicator_sum(code, term.label),
            });
        }

        summaries
    }
}

/// Runs the whole cascade over one batch of lines.
pub fn compute_all(
    lines: &[LedgerLine],
    options: &CascadeOptions,
) -> BTreeMap<IndicatorCode, IndicatorResult> {
    IndicatorCascadeCalculator::new(lines, options).compute_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::ChartOfAccounts;
    use crate::enrichment::enrich_batch;
    use rust_decimal_macros::dec;

    fn lines(rows: &[(&str, Decimal, Decimal)]) -> Vec<LedgerLine> {
        let raws: Vec<RawLedgerLine> = rows
            .iter()
            .map(|(code, debit, credit)| RawLedgerLine::new(code, *debit, *credit, "2023-06-15"))
            .collect();
        enrich_batch(ChartOfAccounts::standard(), &raws)
    }

    fn sales_and_purchases() -> Vec<LedgerLine> {
        lines(&[("707", dec!(0), dec!(1000)), ("607", dec!(400), dec!(0))])
    }

    #[test]
    fn test_commercial_margin_example() {
        let results = compute_all(&sales_and_purchases(), &CascadeOptions::default());
        let mc = results.get(&IndicatorCode::CommercialMargin).unwrap();

        assert_eq!(mc.value, dec!(600));
        assert_eq!(mc.label, "Marge commerciale");
        assert_eq!(mc.formula_numeric, "MC = 1000.00 - 400.00 = 600.00");
        assert_eq!(
            mc.formula_text,
            "MC = VENTES DE MARCHANDISES (1000.00) - ACHATS DE MARCHANDISES (400.00) = 600.00"
        );
        assert_eq!(mc.components.len(), 2);
        assert_eq!(mc.components[1].amount, dec!(400));
        assert_eq!(mc.components[1].signed_amount, dec!(-400));
    }

    #[test]
    fn test_upstream_value_flows_down_the_cascade() {
        let results = compute_all(&sales_and_purchases(), &CascadeOptions::default());
        assert_eq!(results.len(), 5);
        for code in IndicatorCode::ALL {
            assert_eq!(results[&code].value, dec!(600), "{}", code);
        }

        let va = &results[&IndicatorCode::ValueAdded];
        assert_eq!(va.components.len(), 1);
        assert_eq!(va.components[0].kind, ComponentKind::Indicator);
        assert_eq!(va.formula_numeric, "VA = 600.00 = 600.00");
        assert_eq!(va.formula_text, "VA = MC (600.00) = 600.00");
    }

    #[test]
    fn test_empty_batch_omits_everything() {
        let empty: Vec<LedgerLine> = Vec::new();
        let calculator = IndicatorCascadeCalculator::new(&empty, &CascadeOptions::default());
        assert!(calculator.compute_all().is_empty());
        assert_eq!(calculator.value_of(IndicatorCode::NetResult), None);
        assert_eq!(
            calculator.components_for(IndicatorCode::ValueAdded),
            (vec![], vec![])
        );
    }

    #[test]
    fn test_zero_chain_is_omitted_but_balanced_margin_is_kept() {
        let batch = lines(&[("707", dec!(0), dec!(100)), ("607", dec!(100), dec!(0))]);
        let results = compute_all(&batch, &CascadeOptions::default());

        let mc = results.get(&IndicatorCode::CommercialMargin).unwrap();
        assert_eq!(mc.value, Decimal::ZERO);
        assert!(!mc.value.is_sign_negative());
        assert_eq!(serde_json::to_string(&mc.value).unwrap(), "\"0\"");
        assert_eq!(mc.formula_numeric, "MC = 100.00 - 100.00 = 0.00");

        assert!(!results.contains_key(&IndicatorCode::ValueAdded));
        assert!(!results.contains_key(&IndicatorCode::GrossOperatingSurplus));
        assert!(!results.contains_key(&IndicatorCode::OperatingResult));
        assert!(!results.contains_key(&IndicatorCode::NetResult));
    }

    #[test]
    fn test_value_added_without_margin_starts_from_zero() {
        let batch = lines(&[("713", dec!(0), dec!(80)), ("601", dec!(30), dec!(0))]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert_eq!(calculator.value_of(IndicatorCode::CommercialMargin), None);
        let va = calculator.result(IndicatorCode::ValueAdded).unwrap();
        assert_eq!(va.value, dec!(50));
        assert!(!calculator.used_fallback(IndicatorCode::ValueAdded));
        assert_eq!(va.formula_numeric, "VA = 80.00 - 30.00 = 50.00");
        assert_eq!(
            calculator.components_for(IndicatorCode::ValueAdded),
            (
                vec!["PRODUCTION STOCKÉE".to_string()],
                vec!["ACHATS STOCKES".to_string()]
            )
        );
    }

    #[test]
    fn test_margin_falls_back_to_direct_sum() {
        let batch = lines(&[("355", dec!(300), dec!(0)), ("37", dec!(20), dec!(0))]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert!(calculator.used_fallback(IndicatorCode::CommercialMargin));
        let mc = calculator.result(IndicatorCode::CommercialMargin).unwrap();
        assert_eq!(mc.value, dec!(320));
        let names: Vec<&str> = mc.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![NO_SUB_INDICATOR, "STOCKS DE MARCHANDISES"]);
        assert_eq!(mc.formula_numeric, "MC = 20.00 + 300.00 = 320.00");

        assert_eq!(calculator.value_of(IndicatorCode::ValueAdded), Some(dec!(320)));
        assert!(!calculator.used_fallback(IndicatorCode::ValueAdded));
    }

    #[test]
    fn test_value_added_falls_back_to_direct_sum() {
        let batch = lines(&[("709", dec!(0), dec!(50))]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert_eq!(calculator.value_of(IndicatorCode::CommercialMargin), None);
        assert!(calculator.used_fallback(IndicatorCode::ValueAdded));
        let va = calculator.result(IndicatorCode::ValueAdded).unwrap();
        assert_eq!(va.value, dec!(50));
        assert_eq!(va.components[0].name, NO_SUB_INDICATOR);
        assert_eq!(calculator.value_of(IndicatorCode::NetResult), Some(dec!(50)));
    }

    #[test]
    fn test_margin_falls_back_when_sales_cancel_out() {
        let batch = lines(&[
            ("707", dec!(0), dec!(100)),
            ("701", dec!(100), dec!(0)),
            ("355", dec!(50), dec!(0)),
        ]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert!(calculator.used_fallback(IndicatorCode::CommercialMargin));
        let mc = calculator.result(IndicatorCode::CommercialMargin).unwrap();
        assert_eq!(mc.value, dec!(50));
        let names: Vec<&str> = mc.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["STOCKS DE MARCHANDISES", "VENTES DE MARCHANDISES", "VENTES DE PRODUITS FINIS"]
        );
        assert_eq!(mc.formula_numeric, "MC = (50.00 + 100.00) - 100.00 = 50.00");
    }

    #[test]
    fn test_value_added_falls_back_when_production_offsets_margin() {
        let batch = lines(&[
            ("607", dec!(100), dec!(0)),
            ("713", dec!(0), dec!(100)),
            ("6031", dec!(30), dec!(0)),
        ]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert_eq!(calculator.value_of(IndicatorCode::CommercialMargin), Some(dec!(-100)));
        assert!(!calculator.used_fallback(IndicatorCode::CommercialMargin));

        // production (MC -100 + stored production 100) and consumption are both zero
        assert!(calculator.used_fallback(IndicatorCode::ValueAdded));
        let va = calculator.result(IndicatorCode::ValueAdded).unwrap();
        assert_eq!(va.value, dec!(130));
        let names: Vec<&str> = va.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["PRODUCTION STOCKÉE", NO_SUB_INDICATOR]);
        assert_eq!(calculator.value_of(IndicatorCode::NetResult), Some(dec!(130)));
    }

    #[test]
    fn test_cancelling_terms_never_yield_negative_zero() {
        let batch = lines(&[
            ("707", dec!(0), dec!(250)),
            ("607", dec!(250), dec!(0)),
            ("641", dec!(0), dec!(0)),
        ]);
        let results = compute_all(&batch, &CascadeOptions::default());
        let mc = &results[&IndicatorCode::CommercialMargin];
        assert!(!mc.value.is_sign_negative());
        let json = serde_json::to_value(mc).unwrap();
        assert_eq!(json["value"], "0");
    }

    #[test]
    fn test_third_party_exclusion_toggle() {
        let mut batch = sales_and_purchases();
        batch.extend(lines(&[("4457", dec!(0), dec!(200))]));

        let excluded = compute_all(&batch, &CascadeOptions::default());
        assert_eq!(excluded[&IndicatorCode::CommercialMargin].value, dec!(600));

        let options = CascadeOptions {
            exclude_third_party_accounts: false,
        };
        let included = compute_all(&batch, &options);
        let mc = &included[&IndicatorCode::CommercialMargin];
        // class 4 is an asset account: debit - credit = -200
        assert_eq!(mc.value, dec!(400));
        assert_eq!(mc.formula_numeric, "MC = 1000.00 - (200.00 + 400.00) = 400.00");
    }

    #[test]
    fn test_third_party_only_batch_is_empty_by_default() {
        let batch = lines(&[("401", dec!(0), dec!(500)), ("512", dec!(500), dec!(0))]);
        assert!(compute_all(&batch, &CascadeOptions::default()).is_empty());
    }

    #[test]
    fn test_gross_operating_surplus_subtracts_external_services() {
        let mut batch = sales_and_purchases();
        batch.extend(lines(&[
            ("641", dec!(100), dec!(0)),
            ("613", dec!(50), dec!(0)),
            ("631", dec!(30), dec!(0)),
            ("74", dec!(0), dec!(20)),
        ]));
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert_eq!(calculator.value_of(IndicatorCode::ValueAdded), Some(dec!(600)));
        let ebe = calculator.result(IndicatorCode::GrossOperatingSurplus).unwrap();
        assert_eq!(ebe.value, dec!(420));
        assert_eq!(
            ebe.formula_numeric,
            "EBE = 600.00 - (30.00 + 100.00 + 50.00) = 420.00"
        );
        assert_eq!(calculator.value_of(IndicatorCode::OperatingResult), Some(dec!(440)));
    }

    #[test]
    fn test_net_result_formula() {
        let mut batch = sales_and_purchases();
        batch.extend(lines(&[
            ("758", dec!(0), dec!(10)),
            ("661", dec!(40), dec!(0)),
            ("695", dec!(100), dec!(0)),
        ]));
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        let r = calculator.result(IndicatorCode::NetResult).unwrap();
        assert_eq!(r.value, dec!(470));
        assert_eq!(r.formula_numeric, "R = (600.00 + 10.00) - (40.00 + 100.00) = 470.00");
        assert_eq!(
            calculator.components_for(IndicatorCode::NetResult),
            (
                vec!["RE".to_string(), "PRODUITS FINANCIERS".to_string()],
                vec![
                    "CHARGES FINANCIÈRES".to_string(),
                    "IMPÔTS SUR LES BÉNÉFICES".to_string()
                ]
            )
        );
    }

    #[test]
    fn test_negative_upstream_goes_to_negative_side() {
        let batch = lines(&[("607", dec!(250), dec!(0))]);
        let calculator = IndicatorCascadeCalculator::new(&batch, &CascadeOptions::default());

        assert_eq!(calculator.value_of(IndicatorCode::CommercialMargin), Some(dec!(-250)));
        assert_eq!(
            calculator.components_for(IndicatorCode::ValueAdded),
            (vec![], vec!["MC".to_string()])
        );
        let va = calculator.result(IndicatorCode::ValueAdded).unwrap();
        assert_eq!(va.formula_numeric, "VA = -(250.00) = -250.00");
    }

    #[test]
    fn test_charge_refund_is_still_subtracted() {
        let mut batch = lines(&[("707", dec!(0), dec!(1000))]);
        batch.extend(lines(&[("607", dec!(0), dec!(50))]));
        let results = compute_all(&batch, &CascadeOptions::default());
        assert_eq!(results[&IndicatorCode::CommercialMargin].value, dec!(950));
    }

    #[test]
    fn test_sub_indicator_amounts_list_every_associated_label() {
        let calculator =
            IndicatorCascadeCalculator::new(&sales_and_purchases(), &CascadeOptions::default());

        let mc = calculator.sub_indicator_amounts(IndicatorCode::CommercialMargin);
        assert_eq!(mc.len(), 6);
        assert_eq!(mc[0].label, "VENTES DE MARCHANDISES");
        assert_eq!(mc[0].abbreviation, "VDM");
        assert_eq!(mc[0].amount, dec!(1000));
        assert!(mc.iter().any(|s| s.label == "TVA COLLECTEE" && s.amount.is_zero()));

        let va = calculator.sub_indicator_amounts(IndicatorCode::ValueAdded);
        assert_eq!(va[0].label, "MC");
        assert_eq!(va[0].amount, dec!(600));
    }

    #[test]
    fn test_compute_all_is_idempotent() {
        let mut batch = sales_and_purchases();
        batch.extend(lines(&[("641", dec!(100), dec!(0)), ("758", dec!(0), dec!(3.335))]));

        let first = serde_json::to_string(&compute_all(&batch, &CascadeOptions::default())).unwrap();
        let second = serde_json::to_string(&compute_all(&batch, &CascadeOptions::default())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_options_deserialize_with_default() {
        let options: CascadeOptions = serde_json::from_str("{}").unwrap();
        assert!(options.exclude_third_party_accounts);
    }
}
