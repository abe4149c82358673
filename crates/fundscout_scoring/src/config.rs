//! Injected scoring tables.
//!
//! The keyword lists, TLD tiers, region-term tables and organization-type
//! lexicon are configuration, not code: operators tune them per deployment
//! (TOML), and the builtin tables below are a workable starting point, not a
//! frozen contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A term with the weight it contributes when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: Decimal,
}

/// One host-suffix credibility tier, checked in table order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuffixTier {
    pub suffix: String,
    pub score: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityConfig {
    /// Host substrings marking junk sources. Checked first.
    pub spam_markers: Vec<String>,
    pub spam_score: Decimal,
    /// Host labels granting top credibility (exact label match).
    pub authority_labels: Vec<String>,
    pub authority_score: Decimal,
    pub fallback: Decimal,
    pub suffix_tiers: Vec<SuffixTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub match_score: Decimal,
    /// Broader geography terms worth partial credit.
    pub continent_terms: Vec<String>,
    pub continent_score: Decimal,
    pub fallback: Decimal,
    /// Region code -> terms naming that region.
    pub region_terms: BTreeMap<String, Vec<String>>,
}

/// One organization class; first matching class wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgClass {
    pub name: String,
    /// Matched against title + description.
    pub terms: Vec<String>,
    /// Matched against host labels (exact).
    pub host_labels: Vec<String>,
    pub score: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgTypeConfig {
    pub fallback: Decimal,
    pub classes: Vec<OrgClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub funding_keywords: Vec<WeightedTerm>,
    pub credibility: CredibilityConfig,
    pub geography: GeoConfig,
    pub organization: OrgTypeConfig,
}

fn d(mantissa: i64) -> Decimal {
    Decimal::new(mantissa, 2)
}

fn terms(weights: &[(&str, i64)]) -> Vec<WeightedTerm> {
    weights
        .iter()
        .map(|(term, w)| WeightedTerm {
            term: (*term).to_string(),
            weight: d(*w),
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl ScoringConfig {
    /// Builtin tables.
    pub fn builtin() -> Self {
        Self {
            funding_keywords: terms(&[
                ("scholarship", 45),
                ("call for proposals", 40),
                ("grant", 40),
                ("bursary", 35),
                ("fellowship", 35),
                ("financial aid", 35),
                ("funding", 30),
                ("stipend", 30),
                ("endowment", 30),
                ("subsidy", 30),
                ("donation", 25),
                ("sponsorship", 25),
            ]),
            credibility: CredibilityConfig {
                spam_markers: strings(&[
                    "casino", "gambling", "poker", "lottery", "blog", "forum", "coupon",
                ]),
                spam_score: d(10),
                authority_labels: strings(&["gov", "edu", "mil"]),
                authority_score: d(100),
                fallback: d(50),
                suffix_tiers: vec![
                    SuffixTier { suffix: ".int".into(), score: d(80) },
                    SuffixTier { suffix: ".org".into(), score: d(70) },
                    SuffixTier { suffix: ".eu".into(), score: d(60) },
                    SuffixTier { suffix: ".com".into(), score: d(40) },
                    SuffixTier { suffix: ".net".into(), score: d(40) },
                    SuffixTier { suffix: ".info".into(), score: d(30) },
                ],
            },
            geography: GeoConfig {
                match_score: d(100),
                continent_terms: strings(&["europe", "european union", "european"]),
                continent_score: d(60),
                fallback: d(15),
                region_terms: BTreeMap::from([
                    (
                        "BG".to_string(),
                        strings(&["bulgaria", "bulgarian", "sofia", "plovdiv"]),
                    ),
                    (
                        "US".to_string(),
                        strings(&["united states", "american", "u.s."]),
                    ),
                    (
                        "DE".to_string(),
                        strings(&["germany", "german", "deutschland"]),
                    ),
                    ("FR".to_string(), strings(&["france", "french"])),
                    ("RO".to_string(), strings(&["romania", "romanian"])),
                ]),
            },
            organization: OrgTypeConfig {
                fallback: d(30),
                classes: vec![
                    OrgClass {
                        name: "government".into(),
                        terms: strings(&[
                            "ministry",
                            "government",
                            "municipality",
                            "national agency",
                            "public agency",
                        ]),
                        host_labels: strings(&["gov"]),
                        score: d(100),
                    },
                    OrgClass {
                        name: "academic".into(),
                        terms: strings(&["university", "institute", "academy", "college"]),
                        host_labels: strings(&["edu", "ac"]),
                        score: d(85),
                    },
                    OrgClass {
                        name: "foundation".into(),
                        terms: strings(&[
                            "foundation",
                            "endowment",
                            "charitable trust",
                            "ngo",
                            "nonprofit",
                            "non-profit",
                            "charity",
                        ]),
                        host_labels: strings(&["foundation"]),
                        score: d(80),
                    },
                    OrgClass {
                        name: "corporate".into(),
                        terms: strings(&["corporation", "company", "ltd", "plc"]),
                        host_labels: vec![],
                        score: d(40),
                    },
                    OrgClass {
                        name: "personal".into(),
                        terms: strings(&["blog", "how to", "tips", "tricks"]),
                        host_labels: vec![],
                        score: d(10),
                    },
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_well_formed() {
        let config = ScoringConfig::builtin();
        assert!(!config.funding_keywords.is_empty());
        for kw in &config.funding_keywords {
            assert!(kw.weight > Decimal::ZERO && kw.weight <= Decimal::ONE);
        }
        assert!(config.geography.region_terms.contains_key("BG"));
        assert!(config.organization.classes.iter().any(|c| c.name == "government"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = ScoringConfig::builtin();
        let text = toml::to_string(&config).unwrap();
        let back: ScoringConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.funding_keywords.len(), config.funding_keywords.len());
        assert_eq!(back.credibility.fallback, config.credibility.fallback);
    }
}
