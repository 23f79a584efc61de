//! US Census target distributions.
//!
//! Tables are ordered slices so that sampling with a seeded RNG walks the
//! categories in a fixed order. Weights are not required to sum to one;
//! [`weighted_choice`] treats them proportionally (the age table covers the
//! adult population only and sums to 0.80).

use rand::Rng;

use crate::persona::config::{
    age_bracket, BehavioralTrait, DemographicField, Education, Gender, IncomeBracket,
    LocationType, MaritalStatus, RaceEthnicity,
};

/// Inclusive age range used by the census age table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, age: u8) -> bool {
        self.min <= age && age <= self.max
    }

    /// Polling bracket label ("18-24", ..., "65+").
    pub fn label(&self) -> &'static str {
        age_bracket(self.min)
    }

    /// Intersection with `[min, max]`, if any.
    pub fn clamp_to(&self, min: u8, max: u8) -> Option<AgeRange> {
        let lo = self.min.max(min);
        let hi = self.max.min(max);
        (lo <= hi).then(|| AgeRange::new(lo, hi))
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Demographic and behavioral target distributions (approximate 2022 figures).
pub struct CensusData;

impl CensusData {
    pub const AGE: &'static [(AgeRange, f64)] = &[
        (AgeRange::new(18, 24), 0.09),
        (AgeRange::new(25, 34), 0.14),
        (AgeRange::new(35, 44), 0.13),
        (AgeRange::new(45, 54), 0.13),
        (AgeRange::new(55, 64), 0.14),
        (AgeRange::new(65, 85), 0.17),
    ];

    pub const RACE_ETHNICITY: &'static [(RaceEthnicity, f64)] = &[
        (RaceEthnicity::White, 0.601),
        (RaceEthnicity::Hispanic, 0.187),
        (RaceEthnicity::Black, 0.134),
        (RaceEthnicity::Asian, 0.061),
        (RaceEthnicity::Mixed, 0.017),
    ];

    pub const GENDER: &'static [(Gender, f64)] = &[(Gender::Female, 0.507), (Gender::Male, 0.493)];

    /// Adults 25 and over.
    pub const EDUCATION: &'static [(Education, f64)] = &[
        (Education::NoHighSchool, 0.11),
        (Education::HighSchool, 0.28),
        (Education::SomeCollege, 0.21),
        (Education::College, 0.25),
        (Education::Graduate, 0.15),
    ];

    pub const LOCATION_TYPE: &'static [(LocationType, f64)] = &[
        (LocationType::Urban, 0.82),
        (LocationType::Suburban, 0.12),
        (LocationType::Rural, 0.06),
    ];

    /// Household income.
    pub const INCOME: &'static [(IncomeBracket, f64)] = &[
        (IncomeBracket::Under30k, 0.19),
        (IncomeBracket::From30kTo50k, 0.17),
        (IncomeBracket::From50kTo75k, 0.20),
        (IncomeBracket::From75kTo100k, 0.17),
        (IncomeBracket::Over100k, 0.27),
    ];

    pub const MARITAL_STATUS: &'static [(MaritalStatus, f64)] = &[
        (MaritalStatus::Single, 0.34),
        (MaritalStatus::Married, 0.48),
        (MaritalStatus::Divorced, 0.11),
        (MaritalStatus::Widowed, 0.07),
    ];

    /// Base distribution for a behavioral trait, estimated from polling.
    /// Traits without a table are left unassigned by the generator.
    pub fn behavioral(t: BehavioralTrait) -> Option<&'static [(&'static str, f64)]> {
        let table: &'static [(&'static str, f64)] = match t {
            BehavioralTrait::MediaConsumption => &[
                ("social_media", 0.35),
                ("local_news", 0.25),
                ("cable_news", 0.20),
                ("npr", 0.12),
                ("none", 0.08),
            ],
            BehavioralTrait::RiskTolerance => &[
                ("risk_averse", 0.45),
                ("moderate", 0.40),
                ("risk_taking", 0.15),
            ],
            BehavioralTrait::SpendingStyle => &[
                ("saver", 0.30),
                ("budgeter", 0.35),
                ("spender", 0.25),
                ("investor", 0.10),
            ],
            BehavioralTrait::CivicEngagement => &[
                ("highly_engaged", 0.25),
                ("occasional_voter", 0.50),
                ("politically_disengaged", 0.25),
            ],
            BehavioralTrait::TrustInInstitutions => &[
                ("high_trust", 0.20),
                ("skeptical", 0.55),
                ("distrustful", 0.25),
            ],
            _ => return None,
        };
        Some(table)
    }

    /// Normalized target shares for one demographic field, keyed the same
    /// way as [`Demographics::field_value`](crate::persona::config::Demographics::field_value).
    pub fn target_distribution(field: DemographicField) -> Vec<(String, f64)> {
        fn keyed<T: ToString>(table: &[(T, f64)]) -> Vec<(String, f64)> {
            normalized(table.iter().map(|(k, w)| (k.to_string(), *w)).collect())
        }
        match field {
            DemographicField::Age => normalized(
                Self::AGE
                    .iter()
                    .map(|(r, w)| (r.label().to_string(), *w))
                    .collect(),
            ),
            DemographicField::RaceEthnicity => keyed(Self::RACE_ETHNICITY),
            DemographicField::Gender => keyed(Self::GENDER),
            DemographicField::Education => keyed(Self::EDUCATION),
            DemographicField::LocationType => keyed(Self::LOCATION_TYPE),
            DemographicField::Income => keyed(Self::INCOME),
        }
    }
}

fn normalized(mut table: Vec<(String, f64)>) -> Vec<(String, f64)> {
    let total: f64 = table.iter().map(|(_, w)| *w).sum();
    if total > 0.0 {
        for (_, w) in &mut table {
            *w /= total;
        }
    }
    table
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Draw one item with probability proportional to its weight.
///
/// Returns `None` only for an empty table. Non-positive totals fall back to
/// the first item.
pub fn weighted_choice<'a, T, R>(rng: &mut R, table: &'a [(T, f64)]) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let (first, _) = table.first()?;
    let total: f64 = table.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return Some(first);
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (item, weight) in table {
        cumulative += weight.max(0.0);
        if target < cumulative {
            return Some(item);
        }
    }
    // Rounding at the top end.
    table.last().map(|(item, _)| item)
}
