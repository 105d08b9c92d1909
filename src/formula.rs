//! Audit strings for indicator formulas.
//!
//! Terms with a positive contribution are added, terms with a negative one are
//! shown by absolute value after the minus sign:
//!
//! ```text
//! MC = VENTES DE MARCHANDISES (1000.00) - ACHATS DE MARCHANDISES (400.00) = 600.00
//! MC = 1000.00 - 400.00 = 600.00
//! ```
//!
//! A group holding several terms is parenthesised. The trailing value is the
//! computed indicator value, never a re-sum of the rendered terms.

use crate::schema::{ComponentTerm, IndicatorCode};
use crate::utils::format_amount;
use rust_decimal::Decimal;

/// Splits components into the labels added and the labels subtracted.
/// Zero contributions are left out.
pub fn partition_labels(components: &[ComponentTerm]) -> (Vec<String>, Vec<String>) {
    let positive = components
        .iter()
        .filter(|c| c.signed_amount > Decimal::ZERO)
        .map(|c| c.name.clone())
        .collect();
    let negative = components
        .iter()
        .filter(|c| c.signed_amount < Decimal::ZERO)
        .map(|c| c.name.clone())
        .collect();
    (positive, negative)
}

fn group(terms: &[String]) -> String {
    if terms.len() > 1 {
        format!("({})", terms.join(" + "))
    } else {
        terms.join(" + ")
    }
}

fn render<F>(code: IndicatorCode, components: &[ComponentTerm], value: Decimal, term: F) -> String
where
    F: Fn(&ComponentTerm) -> String,
{
    let plus: Vec<String> = components
        .iter()
        .filter(|c| c.signed_amount > Decimal::ZERO)
        .map(&term)
        .collect();
    let minus: Vec<String> = components
        .iter()
        .filter(|c| c.signed_amount < Decimal::ZERO)
        .map(&term)
        .collect();
    let value = format_amount(value);

    match (plus.is_empty(), minus.is_empty()) {
        (false, false) => format!("{} = {} - {} = {}", code, group(&plus), group(&minus), value),
        (false, true) => format!("{} = {} = {}", code, plus.join(" + "), value),
        (true, false) => format!("{} = -({}) = {}", code, minus.join(" + "), value),
        (true, true) => format!("{} = {}", code, value),
    }
}

pub fn formula_text(code: IndicatorCode, components: &[ComponentTerm], value: Decimal) -> String {
    render(code, components, value, |c| {
        format!("{} ({})", c.name, format_amount(c.signed_amount.abs()))
    })
}

pub fn formula_numeric(code: IndicatorCode, components: &[ComponentTerm], value: Decimal) -> String {
    render(code, components, value, |c| format_amount(c.signed_amount.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ComponentKind;
    use rust_decimal_macros::dec;

    fn term(name: &str, signed: Decimal) -> ComponentTerm {
        ComponentTerm {
            name: name.to_string(),
            kind: ComponentKind::SubIndicator,
            amount: signed.abs(),
            signed_amount: signed,
        }
    }

    #[test]
    fn test_single_terms() {
        let components = vec![
            term("VENTES DE MARCHANDISES", dec!(1000)),
            term("ACHATS DE MARCHANDISES", dec!(-400)),
        ];
        let code = IndicatorCode::CommercialMargin;

        assert_eq!(
            formula_numeric(code, &components, dec!(600)),
            "MC = 1000.00 - 400.00 = 600.00"
        );
        assert_eq!(
            formula_text(code, &components, dec!(600)),
            "MC = VENTES DE MARCHANDISES (1000.00) - ACHATS DE MARCHANDISES (400.00) = 600.00"
        );
    }

    #[test]
    fn test_grouped_terms_are_parenthesised() {
        let components = vec![
            term("MC", dec!(600)),
            term("PRODUCTION STOCKÉE", dec!(50)),
            term("ACHATS STOCKES", dec!(-100)),
            term("FOURNITURES", dec!(-25.5)),
        ];
        assert_eq!(
            formula_numeric(IndicatorCode::ValueAdded, &components, dec!(524.5)),
            "VA = (600.00 + 50.00) - (100.00 + 25.50) = 524.50"
        );
    }

    #[test]
    fn test_only_positive_terms() {
        let components = vec![term("VA", dec!(10)), term("SUBVENTIONS D'EXPLOITATION", dec!(5))];
        assert_eq!(
            formula_numeric(IndicatorCode::GrossOperatingSurplus, &components, dec!(15)),
            "EBE = 10.00 + 5.00 = 15.00"
        );
    }

    #[test]
    fn test_only_negative_terms() {
        let components = vec![term("CHARGES FINANCIÈRES", dec!(-40))];
        assert_eq!(
            formula_numeric(IndicatorCode::NetResult, &components, dec!(-40)),
            "R = -(40.00) = -40.00"
        );
        assert_eq!(
            formula_text(IndicatorCode::NetResult, &components, dec!(-40)),
            "R = -(CHARGES FINANCIÈRES (40.00)) = -40.00"
        );
    }

    #[test]
    fn test_no_terms() {
        assert_eq!(
            formula_numeric(IndicatorCode::OperatingResult, &[], Decimal::ZERO),
            "RE = 0.00"
        );
        assert_eq!(formula_text(IndicatorCode::OperatingResult, &[], Decimal::ZERO), "RE = 0.00");
    }

    #[test]
    fn test_zero_terms_are_ignored() {
        let components = vec![term("A", dec!(3)), term("B", Decimal::ZERO)];
        let (plus, minus) = partition_labels(&components);
        assert_eq!(plus, vec!["A".to_string()]);
        assert!(minus.is_empty());
        assert_eq!(
            formula_numeric(IndicatorCode::CommercialMargin, &components, dec!(3)),
            "MC = 3.00 = 3.00"
        );
    }
}
