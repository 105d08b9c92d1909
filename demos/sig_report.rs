use rust_decimal_macros::dec;
use sig_ledger::{
    accounts_for_sub_indicator, format_amount, IndicatorCode, InMemoryLedger, LedgerSource,
    PeriodFilter, RawLedgerLine, SigEngine,
};

fn main() {
    let ledger = InMemoryLedger::new(vec![
        RawLedgerLine::new("707100", dec!(0), dec!(42_000), "2023-03-31").with_label("Ventes boutique"),
        RawLedgerLine::new("706000", dec!(0), dec!(6_500), "2023-06-30").with_label("Ateliers"),
        RawLedgerLine::new("607100", dec!(18_000), dec!(0), "2023-03-15").with_label("Achats marchandises"),
        RawLedgerLine::new("606100", dec!(420), dec!(0), "2023-04-02").with_label("Fournitures"),
        RawLedgerLine::new("613200", dec!(7_200), dec!(0), "2023-12-31").with_label("Loyer"),
        RawLedgerLine::new("641000", dec!(9_600), dec!(0), "2023-12-31").with_label("Salaires"),
        RawLedgerLine::new("681100", dec!(1_100), dec!(0), "2023-12-31").with_label("Dotations"),
        RawLedgerLine::new("661600", dec!(180), dec!(0), "2023-12-31").with_label("Intérêts"),
        RawLedgerLine::new("695000", dec!(1_400), dec!(0), "2023-12-31").with_label("IS"),
        RawLedgerLine::new("445710", dec!(0), dec!(9_700), "2023-12-31").with_label("TVA collectée"),
    ]);

    let engine = SigEngine::standard();

    let raws = ledger
        .fetch_lines(&PeriodFilter::year(2023))
        .expect("in-memory ledger should serve 2023");
    let lines = engine.enrich(&raws);
    let results = engine.compute(&lines);

    println!("SIG 2023");
    for result in results.values() {
        println!(" - {:<30} {:>12}", result.label, format_amount(result.value));
        println!("     {}", result.formula_text);
    }

    if let Some(mc) = results.get(&IndicatorCode::CommercialMargin) {
        println!("Commercial margin drill-down ({}):", mc.formula_numeric);
        for account in accounts_for_sub_indicator(&lines, "VENTES DE MARCHANDISES") {
            println!(
                " - {} {}: {}",
                account.account_code,
                account.account_label,
                format_amount(account.amount)
            );
        }
    }

    let quarterly = engine
        .quarterly_report(&raws, 1)
        .expect("quarter 1 is valid");
    let json = serde_json::to_string_pretty(&quarterly).expect("report should serialize");
    println!("Q1 report:\n{}", json);
}
