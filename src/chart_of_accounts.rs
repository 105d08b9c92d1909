//! French general chart of accounts (PCG) mapped onto the SIG indicators.

use crate::error::{Result, SigError};
use crate::schema::{AccountMappingEntry, Classification, IndicatorCode};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schema::IndicatorCode::{
    CommercialMargin as MC, GrossOperatingSurplus as EBE, NetResult as R, OperatingResult as RE,
    ValueAdded as VA,
};

/// Built-in table, in declaration order. The order matters: among entries
/// sharing the same prefix the first one wins.
const STANDARD_MAPPING: &[(&str, IndicatorCode, &str)] = &[
    // Classe 1 : Capitaux
    ("1", R, ""),
    ("10", R, "CAPITAL"),
    ("106", R, "RESERVES"),
    ("108", R, "COMPTE DE LEXPLOITANT"),
    // Classe 2 : Immobilisations
    ("2", R, ""),
    ("20", R, "INCORPORELLES"),
    ("21", R, "CORPORELLES"),
    ("22", R, "EN COURS"),
    ("23", R, "FINANCIERES"),
    // Classe 3 : Stocks
    ("3", MC, ""),
    ("31", MC, "MATIERES PREMIERES"),
    ("32", MC, "AUTRES APPROVISIONNEMENTS"),
    ("33", MC, "EN-COURS DE PRODUCTION"),
    ("34", MC, "STOCKS DE PRODUITS"),
    ("35", MC, "STOCKS DE MARCHANDISES"),
    // Classe 4 : Tiers
    ("4", MC, ""),
    ("40", MC, "FOURNISSEURS"),
    ("408", MC, "FACTURES NON PARVENUES"),
    ("41", MC, "CLIENTS"),
    ("419", MC, "AVANCES ET ACOMPTES CLIENTS"),
    ("42", MC, "PERSONNEL"),
    ("43", MC, "ORGANISMES SOCIAUX"),
    ("445", MC, "TVA"),
    ("4456", MC, "TVA DEDUCTIBLE"),
    ("4457", MC, "TVA COLLECTEE"),
    ("46", MC, "DIVERS"),
    ("47", MC, "TRANSITOIRES"),
    // Classe 5 : Financiers
    ("5", MC, ""),
    ("50", MC, "VMP"),
    ("51", MC, "BANQUES"),
    ("53", MC, "CAISSE"),
    // Classe 6 : Charges
    ("6", VA, ""),
    ("601", VA, "ACHATS STOCKES"),
    ("6011", VA, "MATIERES PREMIERES"),
    ("602", VA, "ACHATS NON STOCKES"),
    ("606", VA, "FOURNITURES"),
    ("6061", VA, "FOURNITURES ADMINISTRATIVES"),
    ("607", MC, "ACHATS DE MARCHANDISES"),
    ("61", EBE, "SERVICES EXTÉRIEURS"),
    ("62", EBE, "AUTRES SERVICES EXTÉRIEURS"),
    ("63", EBE, "IMPÔTS ET TAXES"),
    ("64", EBE, "CHARGES DE PERSONNEL"),
    ("65", RE, "AUTRES CHARGES DE GESTION COURANTE"),
    ("66", R, "CHARGES FINANCIÈRES"),
    ("67", R, "CHARGES EXCEPTIONNELLES"),
    ("68", RE, "DOTATIONS AMORTISSEMENTS"),
    ("681", RE, "DOTATIONS AMORTISSEMENTS"),
    ("69", R, "IMPÔTS SUR LES BÉNÉFICES"),
    // Classe 7 : Produits
    ("7", VA, ""),
    ("701", MC, "VENTES DE PRODUITS FINIS"),
    ("702", MC, "VENTES DE SERVICES"),
    ("706", MC, "PRESTATIONS DE SERVICES"),
    ("707", MC, "VENTES DE MARCHANDISES"),
    ("71", VA, "PRODUCTION STOCKÉE"),
    ("72", VA, "PRODUCTION IMMOBILISÉE"),
    ("73", EBE, "SUBVENTIONS D'EXPLOITATION"),
    ("74", RE, "AUTRES PRODUITS DE GESTION COURANTE"),
    ("75", R, "PRODUITS FINANCIERS"),
    ("76", R, "PRODUITS EXCEPTIONNELS"),
    ("77", R, "PRODUITS EXCEPTIONNELS"),
    ("78", RE, "REPRISES AMORTISSEMENTS"),
    ("79", R, "TRANSFERTS DE CHARGES"),
    // Classe 8 : Spéciaux
    ("8", R, ""),
    ("86", R, "ENGAGEMENTS DONNES"),
    ("87", R, "ENGAGEMENTS RECUS"),
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("SANS SOUS-INDICATEUR", "SSI"),
    ("CAPITAL", "CAP"),
    ("RESERVES", "RES"),
    ("COMPTE DE LEXPLOITANT", "CDL"),
    ("INCORPORELLES", "INC"),
    ("CORPORELLES", "CORP"),
    ("EN COURS", "EC"),
    ("FINANCIERES", "FIN"),
    ("MATIERES PREMIERES", "MP"),
    ("AUTRES APPROVISIONNEMENTS", "APPR"),
    ("EN-COURS DE PRODUCTION", "ECDP"),
    ("STOCKS DE PRODUITS", "SDP"),
    ("STOCKS DE MARCHANDISES", "SDM"),
    ("FOURNISSEURS", "FRN"),
    ("FACTURES NON PARVENUES", "FNP"),
    ("CLIENTS", "CLI"),
    ("AVANCES ET ACOMPTES CLIENTS", "AAC"),
    ("PERSONNEL", "PERS"),
    ("ORGANISMES SOCIAUX", "ORGSOC"),
    ("TVA", "TVA"),
    ("TVA DEDUCTIBLE", "TD"),
    ("TVA COLLECTEE", "TC"),
    ("DIVERS", "DIV"),
    ("TRANSITOIRES", "TRANS"),
    ("VMP", "VMP"),
    ("BANQUES", "BQ"),
    ("CAISSE", "CAISSE"),
    ("ACHATS STOCKES", "AS"),
    ("ACHATS NON STOCKES", "ANS"),
    ("FOURNITURES", "FRN"),
    ("FOURNITURES ADMINISTRATIVES", "FA"),
    ("ACHATS DE MARCHANDISES", "ADM"),
    ("SERVICES EXTÉRIEURS", "SE"),
    ("AUTRES SERVICES EXTÉRIEURS", "ASE"),
    ("IMPÔTS ET TAXES", "IT"),
    ("CHARGES DE PERSONNEL", "CDP"),
    ("AUTRES CHARGES DE GESTION COURANTE", "ACGC"),
    ("CHARGES FINANCIÈRES", "CF"),
    ("CHARGES EXCEPTIONNELLES", "CE"),
    ("DOTATIONS AMORTISSEMENTS", "DA"),
    ("IMPÔTS SUR LES BÉNÉFICES", "ISLB"),
    ("VENTES DE PRODUITS FINIS", "VDPF"),
    ("VENTES DE SERVICES", "VDS"),
    ("PRESTATIONS DE SERVICES", "PDS"),
    ("VENTES DE MARCHANDISES", "VDM"),
    ("PRODUCTION STOCKÉE", "PS"),
    ("PRODUCTION IMMOBILISÉE", "PI"),
    ("SUBVENTIONS D'EXPLOITATION", "SE"),
    ("AUTRES PRODUITS DE GESTION COURANTE", "APDGC"),
    ("PRODUITS FINANCIERS", "PF"),
    ("PRODUITS EXCEPTIONNELS", "PE"),
    ("REPRISES AMORTISSEMENTS", "RA"),
    ("TRANSFERTS DE CHARGES", "TDC"),
    ("ENGAGEMENTS DONNES", "ED"),
    ("ENGAGEMENTS RECUS", "ER"),
];

const DESCRIPTIVE_FORMULAS: &[(&str, &str)] = &[
    // Stocks, tiers, financiers, charges, capitaux, immobilisations: Débit - Crédit
    ("MATIERES PREMIERES", "Σ (Débit - Crédit) des comptes 31*"),
    ("AUTRES APPROVISIONNEMENTS", "Σ (Débit - Crédit) des comptes 32*"),
    ("EN-COURS DE PRODUCTION", "Σ (Débit - Crédit) des comptes 33*"),
    ("STOCKS DE PRODUITS", "Σ (Débit - Crédit) des comptes 34*"),
    ("STOCKS DE MARCHANDISES", "Σ (Débit - Crédit) des comptes 35*"),
    ("FOURNISSEURS", "Σ (Débit - Crédit) des comptes 40*"),
    ("FACTURES NON PARVENUES", "Σ (Débit - Crédit) des comptes 408*"),
    ("CLIENTS", "Σ (Débit - Crédit) des comptes 41*"),
    ("AVANCES ET ACOMPTES CLIENTS", "Σ (Débit - Crédit) des comptes 419*"),
    ("PERSONNEL", "Σ (Débit - Crédit) des comptes 42*"),
    ("ORGANISMES SOCIAUX", "Σ (Débit - Crédit) des comptes 43*"),
    ("TVA", "Σ (Débit - Crédit) des comptes 445*"),
    ("TVA DEDUCTIBLE", "Σ (Débit - Crédit) des comptes 4456*"),
    ("TVA COLLECTEE", "Σ (Débit - Crédit) des comptes 4457*"),
    ("DIVERS", "Σ (Débit - Crédit) des comptes 46*"),
    ("TRANSITOIRES", "Σ (Débit - Crédit) des comptes 47*"),
    ("VMP", "Σ (Débit - Crédit) des comptes 50*"),
    ("BANQUES", "Σ (Débit - Crédit) des comptes 51*"),
    ("CAISSE", "Σ (Débit - Crédit) des comptes 53*"),
    ("ACHATS STOCKES", "Σ (Débit - Crédit) des comptes 601*"),
    ("ACHATS NON STOCKES", "Σ (Débit - Crédit) des comptes 602*"),
    ("FOURNITURES", "Σ (Débit - Crédit) des comptes 606*"),
    ("FOURNITURES ADMINISTRATIVES", "Σ (Débit - Crédit) des comptes 6061*"),
    ("ACHATS DE MARCHANDISES", "Σ (Débit - Crédit) des comptes 607*"),
    ("SERVICES EXTÉRIEURS", "Σ (Débit - Crédit) des comptes 61*"),
    ("AUTRES SERVICES EXTÉRIEURS", "Σ (Débit - Crédit) des comptes 62*"),
    ("IMPÔTS ET TAXES", "Σ (Débit - Crédit) des comptes 63*"),
    ("CHARGES DE PERSONNEL", "Σ (Débit - Crédit) des comptes 64*"),
    ("AUTRES CHARGES DE GESTION COURANTE", "Σ (Débit - Crédit) des comptes 65*"),
    ("CHARGES FINANCIÈRES", "Σ (Débit - Crédit) des comptes 66*"),
    ("CHARGES EXCEPTIONNELLES", "Σ (Débit - Crédit) des comptes 67*"),
    ("DOTATIONS AMORTISSEMENTS", "Σ (Débit - Crédit) des comptes 68*"),
    ("IMPÔTS SUR LES BÉNÉFICES", "Σ (Débit - Crédit) des comptes 69*"),
    // Produits: Crédit - Débit
    ("VENTES DE PRODUITS FINIS", "Σ (Crédit - Débit) des comptes 701*"),
    ("VENTES DE SERVICES", "Σ (Crédit - Débit) des comptes 702*"),
    ("PRESTATIONS DE SERVICES", "Σ (Crédit - Débit) des comptes 706*"),
    ("VENTES DE MARCHANDISES", "Σ (Crédit - Débit) des comptes 707*"),
    ("PRODUCTION STOCKÉE", "Σ (Crédit - Débit) des comptes 71*"),
    ("PRODUCTION IMMOBILISÉE", "Σ (Crédit - Débit) des comptes 72*"),
    ("SUBVENTIONS D'EXPLOITATION", "Σ (Crédit - Débit) des comptes 73*"),
    ("AUTRES PRODUITS DE GESTION COURANTE", "Σ (Crédit - Débit) des comptes 74*"),
    ("PRODUITS FINANCIERS", "Σ (Crédit - Débit) des comptes 75*"),
    ("PRODUITS EXCEPTIONNELS", "Σ (Crédit - Débit) des comptes 76* + 77*"),
    ("REPRISES AMORTISSEMENTS", "Σ (Crédit - Débit) des comptes 78*"),
    ("TRANSFERTS DE CHARGES", "Σ (Crédit - Débit) des comptes 79*"),
    ("CAPITAL", "Σ (Débit - Crédit) des comptes 10*"),
    ("RESERVES", "Σ (Débit - Crédit) des comptes 106*"),
    ("COMPTE DE LEXPLOITANT", "Σ (Débit - Crédit) des comptes 108*"),
    ("INCORPORELLES", "Σ (Débit - Crédit) des comptes 20*"),
    ("CORPORELLES", "Σ (Débit - Crédit) des comptes 21*"),
    ("EN COURS", "Σ (Débit - Crédit) des comptes 22*"),
    ("FINANCIERES", "Σ (Débit - Crédit) des comptes 23*"),
    ("ENGAGEMENTS DONNES", "Σ (Débit - Crédit) des comptes 86*"),
    ("ENGAGEMENTS RECUS", "Σ (Débit - Crédit) des comptes 87*"),
];

/// How a sub-indicator enters its indicator's formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermRole {
    /// Added with its sign (sales, production, subsidies, income).
    Product,
    /// Subtracted as an absolute value (purchases, consumption, charges, taxes).
    Charge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaTerm {
    pub label: &'static str,
    pub role: TermRole,
}

const fn product(label: &'static str) -> FormulaTerm {
    FormulaTerm {
        label,
        role: TermRole::Product,
    }
}

const fn charge(label: &'static str) -> FormulaTerm {
    FormulaTerm {
        label,
        role: TermRole::Charge,
    }
}

const MC_TERMS: &[FormulaTerm] = &[
    product("VENTES DE MARCHANDISES"),
    product("VENTES DE PRODUITS FINIS"),
    product("VENTES DE SERVICES"),
    product("PRESTATIONS DE SERVICES"),
    product("TVA COLLECTEE"),
    charge("ACHATS DE MARCHANDISES"),
];

const VA_TERMS: &[FormulaTerm] = &[
    product("PRESTATIONS DE SERVICES"),
    product("VENTES DE PRODUITS FINIS"),
    product("PRODUCTION STOCKÉE"),
    product("PRODUCTION IMMOBILISÉE"),
    charge("ACHATS STOCKES"),
    charge("MATIERES PREMIERES"),
    charge("ACHATS NON STOCKES"),
    charge("FOURNITURES"),
    charge("FOURNITURES ADMINISTRATIVES"),
    charge("SERVICES EXTÉRIEURS"),
    charge("AUTRES SERVICES EXTÉRIEURS"),
];

const EBE_TERMS: &[FormulaTerm] = &[
    product("SUBVENTIONS D'EXPLOITATION"),
    charge("IMPÔTS ET TAXES"),
    charge("CHARGES DE PERSONNEL"),
    charge("SERVICES EXTÉRIEURS"),
    charge("AUTRES SERVICES EXTÉRIEURS"),
];

const RE_TERMS: &[FormulaTerm] = &[
    product("AUTRES PRODUITS DE GESTION COURANTE"),
    product("REPRISES AMORTISSEMENTS"),
    charge("AUTRES CHARGES DE GESTION COURANTE"),
    charge("DOTATIONS AMORTISSEMENTS"),
];

const R_TERMS: &[FormulaTerm] = &[
    product("PRODUITS FINANCIERS"),
    charge("CHARGES FINANCIÈRES"),
    product("PRODUITS EXCEPTIONNELS"),
    charge("CHARGES EXCEPTIONNELLES"),
    charge("IMPÔTS SUR LES BÉNÉFICES"),
];

/// Named sub-indicator terms of an indicator formula, in rendering order.
pub fn formula_terms(code: IndicatorCode) -> &'static [FormulaTerm] {
    match code {
        IndicatorCode::CommercialMargin => MC_TERMS,
        IndicatorCode::ValueAdded => VA_TERMS,
        IndicatorCode::GrossOperatingSurplus => EBE_TERMS,
        IndicatorCode::OperatingResult => RE_TERMS,
        IndicatorCode::NetResult => R_TERMS,
    }
}

/// Every label that contributes to an indicator: the upstream indicator code
/// first (VA, EBE, RE, R), then the sub-indicator terms.
pub fn associated_sub_indicators(code: IndicatorCode) -> Vec<&'static str> {
    code.upstream()
        .map(|upstream| upstream.code())
        .into_iter()
        .chain(formula_terms(code).iter().map(|term| term.label))
        .collect()
}

static ABBREVIATION_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| ABBREVIATIONS.iter().copied().collect());

static FORMULA_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| DESCRIPTIVE_FORMULAS.iter().copied().collect());

static STANDARD_CHART: Lazy<ChartOfAccounts> = Lazy::new(|| ChartOfAccounts {
    entries: STANDARD_MAPPING
        .iter()
        .map(|(prefix, indicator, sub)| AccountMappingEntry::new(prefix, *indicator, sub))
        .collect(),
});

/// Short code for a sub-indicator label; unknown labels fall back to their
/// first five characters, trimmed and upper-cased.
pub fn abbreviation(label: &str) -> String {
    match ABBREVIATION_INDEX.get(label) {
        Some(abbr) => abbr.to_string(),
        None => label
            .chars()
            .take(5)
            .collect::<String>()
            .trim()
            .to_uppercase(),
    }
}

pub fn descriptive_formula(label: &str) -> String {
    match FORMULA_INDEX.get(label) {
        Some(formula) => formula.to_string(),
        None => format!("Σ (Crédit - Débit) des comptes liés à \"{}\"", label),
    }
}

/// Immutable prefix table mapping account codes to SIG indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    entries: Vec<AccountMappingEntry>,
}

impl ChartOfAccounts {
    /// The built-in French PCG table, built once per process.
    pub fn standard() -> &'static ChartOfAccounts {
        &STANDARD_CHART
    }

    pub fn from_entries(entries: Vec<AccountMappingEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(SigError::EmptyChart);
        }

        for entry in &entries {
            if entry.prefix.is_empty() {
                return Err(SigError::InvalidMapping {
                    prefix: entry.prefix.clone(),
                    details: "prefix must not be empty".to_string(),
                });
            }
            if !entry.prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(SigError::InvalidMapping {
                    prefix: entry.prefix.clone(),
                    details: "prefix must contain digits only".to_string(),
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<AccountMappingEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[AccountMappingEntry] {
        &self.entries
    }

    /// Longest-prefix lookup.
    ///
    /// Candidate prefixes are tried from the full code down to its first
    /// character; at each length the first entry (in declaration order) with
    /// an equal prefix wins. `None` when nothing matches at any length.
    pub fn find_best_mapping(&self, account_code: &str) -> Option<&AccountMappingEntry> {
        let code = account_code.trim();
        let boundaries: Vec<usize> = code
            .char_indices()
            .map(|(idx, c)| idx + c.len_utf8())
            .collect();

        boundaries.iter().rev().find_map(|&end| {
            let candidate = &code[..end];
            self.entries.iter().find(|entry| entry.prefix == candidate)
        })
    }

    pub fn classify(&self, account_code: &str) -> Option<Classification> {
        self.find_best_mapping(account_code)
            .map(|entry| Classification {
                indicator: entry.indicator,
                sub_indicator: if entry.sub_indicator.is_empty() {
                    None
                } else {
                    Some(entry.sub_indicator.clone())
                },
            })
    }

    pub fn abbreviation(&self, label: &str) -> String {
        abbreviation(label)
    }

    pub fn descriptive_formula(&self, label: &str) -> String {
        descriptive_formula(label)
    }

    pub fn associated_sub_indicators(&self, code: IndicatorCode) -> Vec<&'static str> {
        associated_sub_indicators(code)
    }

    pub fn formula_terms(&self, code: IndicatorCode) -> &'static [FormulaTerm] {
        formula_terms(code)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("# Plan comptable → SIG\n\n");
        output.push_str("| Préfixe | Indicateur | Sous-indicateur |\n");
        output.push_str("|---|---|---|\n");

        for entry in &self.entries {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.prefix, entry.indicator, entry.sub_indicator
            ));
        }

        output
    }
}

impl Default for ChartOfAccounts {
    fn default() -> Self {
        Self::standard().clone()
    }
}
