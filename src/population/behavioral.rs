//! Demographically correlated behavioral traits.
//!
//! Each trait starts from its census base distribution. Every demographic
//! feature of the persona that has a correlation rule adds its boosts (each
//! share capped at 1.0), and the result is sampled proportionally.

use rand::Rng;

use crate::persona::config::{
    BehavioralTrait, Education, IncomeBracket, LocationType, PersonaConfig, RaceEthnicity,
};
use crate::population::census::{weighted_choice, CensusData};

/// Demographic feature a correlation rule is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
    AgeUnder35,
    AgeOver55,
    Education(Education),
    Income(IncomeBracket),
    Location(LocationType),
    Race(RaceEthnicity),
}

type Boosts = &'static [(&'static str, f64)];

/// Trait, then (feature, boosts) pairs, in assignment order.
const CORRELATION_RULES: &[(BehavioralTrait, &[(ContextKey, Boosts)])] = &[
    (
        BehavioralTrait::MediaConsumption,
        &[
            (
                ContextKey::Education(Education::Graduate),
                &[("npr", 0.4), ("social_media", 0.3)],
            ),
            (
                ContextKey::Education(Education::NoHighSchool),
                &[("local_news", 0.5), ("none", 0.3)],
            ),
            (ContextKey::AgeUnder35, &[("social_media", 0.6)]),
            (
                ContextKey::AgeOver55,
                &[("cable_news", 0.4), ("local_news", 0.3)],
            ),
            (
                ContextKey::Location(LocationType::Rural),
                &[("local_news", 0.4), ("cable_news", 0.3)],
            ),
            (
                ContextKey::Location(LocationType::Urban),
                &[("social_media", 0.4), ("npr", 0.2)],
            ),
        ],
    ),
    (
        BehavioralTrait::RiskTolerance,
        &[
            (
                ContextKey::AgeUnder35,
                &[("risk_taking", 0.3), ("moderate", 0.5)],
            ),
            (ContextKey::AgeOver55, &[("risk_averse", 0.6)]),
            (
                ContextKey::Income(IncomeBracket::Over100k),
                &[("risk_taking", 0.4), ("moderate", 0.4)],
            ),
            (
                ContextKey::Income(IncomeBracket::Under30k),
                &[("risk_averse", 0.7)],
            ),
            (
                ContextKey::Education(Education::Graduate),
                &[("moderate", 0.5), ("risk_taking", 0.3)],
            ),
        ],
    ),
    (
        BehavioralTrait::SpendingStyle,
        &[
            (
                ContextKey::Income(IncomeBracket::Over100k),
                &[("investor", 0.3), ("spender", 0.4)],
            ),
            (
                ContextKey::Income(IncomeBracket::Under30k),
                &[("saver", 0.5), ("budgeter", 0.4)],
            ),
            (ContextKey::AgeUnder35, &[("spender", 0.4)]),
            (
                ContextKey::AgeOver55,
                &[("saver", 0.5), ("investor", 0.2)],
            ),
            (
                ContextKey::Education(Education::Graduate),
                &[("investor", 0.3), ("budgeter", 0.4)],
            ),
        ],
    ),
    (
        BehavioralTrait::CivicEngagement,
        &[
            (
                ContextKey::Education(Education::Graduate),
                &[("highly_engaged", 0.5)],
            ),
            (
                ContextKey::Education(Education::NoHighSchool),
                &[("politically_disengaged", 0.5)],
            ),
            (ContextKey::AgeOver55, &[("highly_engaged", 0.4)]),
            (ContextKey::AgeUnder35, &[("occasional_voter", 0.6)]),
            (
                ContextKey::Income(IncomeBracket::Over100k),
                &[("highly_engaged", 0.4)],
            ),
        ],
    ),
    (
        BehavioralTrait::TrustInInstitutions,
        &[
            (
                ContextKey::Education(Education::Graduate),
                &[("skeptical", 0.5), ("high_trust", 0.3)],
            ),
            (
                ContextKey::Education(Education::NoHighSchool),
                &[("distrustful", 0.4), ("skeptical", 0.4)],
            ),
            (
                ContextKey::AgeOver55,
                &[("high_trust", 0.3), ("skeptical", 0.5)],
            ),
            (
                ContextKey::Location(LocationType::Rural),
                &[("distrustful", 0.4), ("skeptical", 0.4)],
            ),
            (
                ContextKey::Location(LocationType::Urban),
                &[("skeptical", 0.5), ("high_trust", 0.3)],
            ),
        ],
    ),
];

/// Demographic features of `persona` that correlation rules can match.
pub fn demographic_context(persona: &PersonaConfig) -> Vec<ContextKey> {
    let mut context = Vec::with_capacity(5);
    if persona.age < 35 {
        context.push(ContextKey::AgeUnder35);
    } else if persona.age > 55 {
        context.push(ContextKey::AgeOver55);
    }
    context.push(ContextKey::Education(persona.education));
    context.push(ContextKey::Income(persona.income));
    context.push(ContextKey::Location(persona.location_type));
    context.push(ContextKey::Race(persona.race_ethnicity));
    context
}

/// Assigns behavioral traits from demographic correlations.
#[derive(Debug, Clone, Copy, Default)]
pub struct BehavioralCharacteristicEngine;

impl BehavioralCharacteristicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Traits this engine knows how to assign.
    pub fn traits(&self) -> impl Iterator<Item = BehavioralTrait> {
        CORRELATION_RULES.iter().map(|(t, _)| *t)
    }

    /// Base distribution for `t` with every matching boost applied.
    /// Shares are capped at 1.0 but not normalized.
    pub fn adjusted_distribution(
        &self,
        t: BehavioralTrait,
        persona: &PersonaConfig,
    ) -> Vec<(&'static str, f64)> {
        let Some(base) = CensusData::behavioral(t) else {
            return Vec::new();
        };
        let mut adjusted = base.to_vec();
        let Some((_, rules)) = CORRELATION_RULES.iter().find(|(rt, _)| *rt == t) else {
            return adjusted;
        };

        for key in demographic_context(persona) {
            for (rule_key, boosts) in rules.iter() {
                if *rule_key != key {
                    continue;
                }
                for (value, boost) in boosts.iter() {
                    if let Some(entry) = adjusted.iter_mut().find(|(v, _)| v == value) {
                        entry.1 = (entry.1 + boost).min(1.0);
                    }
                }
            }
        }
        adjusted
    }

    /// Fill every correlated trait that `persona` does not already have.
    pub fn assign_behavioral_characteristics<R>(&self, persona: &mut PersonaConfig, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for t in self.traits() {
            if persona.trait_value(t).is_some() {
                continue;
            }
            let distribution = self.adjusted_distribution(t, persona);
            if let Some(value) = weighted_choice(rng, &distribution) {
                persona.behavior.insert(t, value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::config::Gender;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn young_urban_graduate() -> PersonaConfig {
        PersonaConfig::new(
            "Amy Chen",
            30,
            RaceEthnicity::Asian,
            Gender::Female,
            Education::Graduate,
            LocationType::Urban,
            IncomeBracket::Over100k,
        )
    }

    fn share(dist: &[(&str, f64)], key: &str) -> f64 {
        dist.iter().find(|(k, _)| *k == key).map(|(_, v)| *v).unwrap()
    }

    #[test]
    fn test_context_extraction() {
        let p = young_urban_graduate();
        let ctx = demographic_context(&p);
        assert_eq!(ctx[0], ContextKey::AgeUnder35);
        assert!(ctx.contains(&ContextKey::Race(RaceEthnicity::Asian)));

        let mut middle = p.clone();
        middle.age = 45;
        assert_eq!(demographic_context(&middle).len(), 4);
    }

    #[test]
    fn test_boosts_are_added_and_capped() {
        let engine = BehavioralCharacteristicEngine::new();
        let dist = engine.adjusted_distribution(BehavioralTrait::MediaConsumption, &young_urban_graduate());
        // 0.35 + 0.6 (under 35) + 0.3 (graduate) + 0.4 (urban), capped.
        assert_eq!(share(&dist, "social_media"), 1.0);
        // 0.12 + 0.4 (graduate) + 0.2 (urban)
        assert!((share(&dist, "npr") - 0.72).abs() < 1e-9);
        // untouched
        assert!((share(&dist, "none") - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_uncorrelated_trait_has_no_distribution() {
        let engine = BehavioralCharacteristicEngine::new();
        assert!(engine
            .adjusted_distribution(BehavioralTrait::BrandLoyalty, &young_urban_graduate())
            .is_empty());
    }

    #[test]
    fn test_assignment_keeps_existing_traits() {
        let engine = BehavioralCharacteristicEngine::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut p = young_urban_graduate().with_trait(BehavioralTrait::RiskTolerance, "custom");
        engine.assign_behavioral_characteristics(&mut p, &mut rng);

        assert_eq!(p.trait_value(BehavioralTrait::RiskTolerance), Some("custom"));
        assert_eq!(p.behavior.len(), 5);
        let media = p.trait_value(BehavioralTrait::MediaConsumption).unwrap();
        assert!(CensusData::behavioral(BehavioralTrait::MediaConsumption)
            .unwrap()
            .iter()
            .any(|(v, _)| *v == media));
    }

    #[test]
    fn test_rural_respondents_lean_local_news() {
        let engine = BehavioralCharacteristicEngine::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut rural = young_urban_graduate();
        rural.age = 60;
        rural.education = Education::NoHighSchool;
        rural.location_type = LocationType::Rural;

        let draws = 500;
        let local = (0..draws)
            .filter(|_| {
                let mut p = rural.clone();
                engine.assign_behavioral_characteristics(&mut p, &mut rng);
                p.trait_value(BehavioralTrait::MediaConsumption) == Some("local_news")
            })
            .count();
        // local_news is capped at 1.0 out of a 2.75 total.
        assert!(local as f64 / draws as f64 > 0.25);
    }
}
