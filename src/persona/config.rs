//! Persona demographic records.
//!
//! A [`PersonaConfig`] is the flat demographic and behavioral description of
//! one simulated respondent. Categorical fields are closed enums; the ten
//! behavioral tags are free-form strings keyed by [`BehavioralTrait`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Youngest age a persona may have.
pub const MIN_AGE: u8 = 18;
/// Oldest age a persona may have.
pub const MAX_AGE: u8 = 85;
/// Upper bound on `children`, rejecting obviously corrupt records.
pub const MAX_CHILDREN: u8 = 20;

// ---------------------------------------------------------------------------
// Categorical fields
// ---------------------------------------------------------------------------

string_enum! {
    /// Race / ethnicity category.
    pub enum RaceEthnicity {
        White => "white",
        Black => "black",
        Hispanic => "hispanic" | "latino",
        Asian => "asian",
        Mixed => "mixed",
        Other => "other",
    }
}

string_enum! {
    pub enum Gender {
        Male => "male",
        Female => "female",
        NonBinary => "non_binary" | "non-binary" | "nonbinary",
    }
}

string_enum! {
    /// Highest completed education level.
    pub enum Education {
        NoHighSchool => "no_hs",
        HighSchool => "high_school",
        SomeCollege => "some_college",
        College => "college",
        Graduate => "graduate",
    }
}

string_enum! {
    pub enum LocationType {
        Urban => "urban",
        Suburban => "suburban",
        Rural => "rural",
    }
}

string_enum! {
    /// Household income bracket.
    pub enum IncomeBracket {
        Under30k => "under_30k",
        From30kTo50k => "30k_50k",
        From50kTo75k => "50k_75k",
        From75kTo100k => "75k_100k",
        Over100k => "over_100k",
    }
}

string_enum! {
    pub enum MaritalStatus {
        Single => "single",
        Married => "married",
        Divorced => "divorced",
        Widowed => "widowed",
    }
}

string_enum! {
    /// Optional behavioral tags that refine how a persona answers.
    pub enum BehavioralTrait {
        MediaConsumption => "media_consumption",
        SocialCircle => "social_circle",
        RiskTolerance => "risk_tolerance",
        ChangeOrientation => "change_orientation",
        SpendingStyle => "spending_style",
        BrandLoyalty => "brand_loyalty",
        CivicEngagement => "civic_engagement",
        TrustInInstitutions => "trust_in_institutions",
        DecisionMaking => "decision_making",
        InformationProcessing => "information_processing",
    }
}

string_enum! {
    /// Demographic dimensions used for breakdowns and poll slices.
    pub enum DemographicField {
        Age => "age",
        RaceEthnicity => "race_ethnicity",
        Gender => "gender",
        Education => "education",
        LocationType => "location_type",
        Income => "income",
    }
}

impl IncomeBracket {
    /// Human-readable form used in prompts ("30k-50k").
    pub fn display_label(&self) -> String {
        self.as_str().replace('_', "-")
    }
}

impl BehavioralTrait {
    /// Label used when rendering the trait in prompts ("Risk Tolerance").
    pub fn title(&self) -> String {
        title_case(self.as_str())
    }
}

/// Convert `snake_case` to `Title Case`.
pub(crate) fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map an age to its polling bracket (18-24, 25-34, ..., 65+).
pub fn age_bracket(age: u8) -> &'static str {
    match age {
        0..=24 => "18-24",
        25..=34 => "25-34",
        35..=44 => "35-44",
        45..=54 => "45-54",
        55..=64 => "55-64",
        _ => "65+",
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Every problem found in a persona record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid persona: {}", .0.join("; "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// PersonaConfig
// ---------------------------------------------------------------------------

/// Demographics and characteristics of one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    /// Age in years, 18 to 85.
    pub age: u8,
    pub race_ethnicity: RaceEthnicity,
    pub gender: Gender,
    pub education: Education,
    pub location_type: LocationType,
    pub income: IncomeBracket,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default)]
    pub children: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    /// US state, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Behavioral tags that are set. Absent traits are simply missing.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub behavior: BTreeMap<BehavioralTrait, String>,

    /// Cached identity prompt, filled in when a firefly is born.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_prompt: Option<String>,
}

impl PersonaConfig {
    /// Create a persona with the required demographics and no optional data.
    pub fn new(
        name: impl Into<String>,
        age: u8,
        race_ethnicity: RaceEthnicity,
        gender: Gender,
        education: Education,
        location_type: LocationType,
        income: IncomeBracket,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            race_ethnicity,
            gender,
            education,
            location_type,
            income,
            religion: None,
            marital_status: None,
            children: 0,
            occupation: None,
            state: None,
            behavior: BTreeMap::new(),
            persona_prompt: None,
        }
    }

    pub fn with_marital_status(mut self, status: MaritalStatus) -> Self {
        self.marital_status = Some(status);
        self
    }

    pub fn with_children(mut self, children: u8) -> Self {
        self.children = children;
        self
    }

    pub fn with_occupation(mut self, occupation: impl Into<String>) -> Self {
        self.occupation = Some(occupation.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_religion(mut self, religion: impl Into<String>) -> Self {
        self.religion = Some(religion.into());
        self
    }

    pub fn with_trait(mut self, t: BehavioralTrait, value: impl Into<String>) -> Self {
        self.behavior.insert(t, value.into());
        self
    }

    /// Value of one behavioral tag, if set.
    pub fn trait_value(&self, t: BehavioralTrait) -> Option<&str> {
        self.behavior.get(&t).map(String::as_str)
    }

    /// All behavioral tags that are set, in declaration order.
    pub fn behavioral_characteristics(&self) -> &BTreeMap<BehavioralTrait, String> {
        &self.behavior
    }

    /// Stable identifier used in simulation results: `{name}_{age}_{race}`.
    pub fn persona_id(&self) -> String {
        format!("{}_{}_{}", self.name, self.age, self.race_ethnicity)
    }

    /// First word of the name, used by the activation check.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Demographic summary attached to every response.
    pub fn demographics(&self) -> Demographics {
        Demographics {
            age: self.age,
            race_ethnicity: self.race_ethnicity,
            gender: self.gender,
            education: self.education,
            location_type: self.location_type,
            income: self.income,
            state: self.state.clone(),
        }
    }

    /// Check the record, reporting every problem rather than the first one.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            errors.push(format!(
                "age must be between {} and {}, got {}",
                MIN_AGE, MAX_AGE, self.age
            ));
        }
        if self.children > MAX_CHILDREN {
            errors.push(format!(
                "children must be at most {}, got {}",
                MAX_CHILDREN, self.children
            ));
        }
        for (t, value) in &self.behavior {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty when set", t));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Build a persona from string key/value pairs (CSV rows, CLI flags,
    /// loosely typed JSON). All problems are collected before failing.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();

        fn required<'a>(
            fields: &'a HashMap<String, String>,
            key: &str,
            errors: &mut Vec<String>,
        ) -> Option<&'a str> {
            match fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                Some(v) => Some(v),
                None => {
                    errors.push(format!("missing required field '{}'", key));
                    None
                }
            }
        }

        fn parse<T: std::str::FromStr>(
            raw: Option<&str>,
            key: &str,
            errors: &mut Vec<String>,
        ) -> Option<T>
        where
            T::Err: std::fmt::Display,
        {
            let raw = raw?;
            match raw.parse::<T>() {
                Ok(v) => Some(v),
                Err(e) => {
                    errors.push(format!("{}: {}", key, e));
                    None
                }
            }
        }

        let name = required(fields, "name", &mut errors).map(str::to_string);
        let age_raw = required(fields, "age", &mut errors);
        let age = age_raw.and_then(|raw| match raw.parse::<u8>() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(format!("age: '{}' is not a valid age", raw));
                None
            }
        });
        let race = parse::<RaceEthnicity>(
            required(fields, "race_ethnicity", &mut errors),
            "race_ethnicity",
            &mut errors,
        );
        let gender = parse::<Gender>(required(fields, "gender", &mut errors), "gender", &mut errors);
        let education = parse::<Education>(
            required(fields, "education", &mut errors),
            "education",
            &mut errors,
        );
        let location = parse::<LocationType>(
            required(fields, "location_type", &mut errors),
            "location_type",
            &mut errors,
        );
        let income = parse::<IncomeBracket>(
            required(fields, "income", &mut errors),
            "income",
            &mut errors,
        );

        let optional = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let marital = parse::<MaritalStatus>(
            optional("marital_status").as_deref(),
            "marital_status",
            &mut errors,
        );
        let children = match optional("children") {
            Some(raw) => match raw.parse::<u8>() {
                Ok(v) => v,
                Err(_) => {
                    errors.push(format!("children: '{}' is not a valid count", raw));
                    0
                }
            },
            None => 0,
        };

        const KNOWN: &[&str] = &[
            "name",
            "age",
            "race_ethnicity",
            "gender",
            "education",
            "location_type",
            "income",
            "religion",
            "marital_status",
            "children",
            "occupation",
            "state",
        ];
        let mut behavior = BTreeMap::new();
        let mut unknown: Vec<&String> = Vec::new();
        for (key, value) in fields {
            if KNOWN.contains(&key.as_str()) {
                continue;
            }
            match key.parse::<BehavioralTrait>() {
                Ok(t) => {
                    let value = value.trim();
                    if !value.is_empty() {
                        behavior.insert(t, value.to_string());
                    }
                }
                Err(_) => unknown.push(key),
            }
        }
        unknown.sort();
        for key in unknown {
            errors.push(format!("unknown field '{}'", key));
        }

        match (name, age, race, gender, education, location, income) {
            (Some(name), Some(age), Some(race), Some(gender), Some(education), Some(location), Some(income))
                if errors.is_empty() =>
            {
                let persona = Self {
                    religion: optional("religion"),
                    marital_status: marital,
                    children,
                    occupation: optional("occupation"),
                    state: optional("state"),
                    behavior,
                    ..Self::new(name, age, race, gender, education, location, income)
                };
                persona.validate()?;
                Ok(persona)
            }
            _ => Err(ValidationErrors(errors)),
        }
    }
}

// ---------------------------------------------------------------------------
// Demographics
// ---------------------------------------------------------------------------

/// Flat demographic summary carried on responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u8,
    pub race_ethnicity: RaceEthnicity,
    pub gender: Gender,
    pub education: Education,
    pub location_type: LocationType,
    pub income: IncomeBracket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Demographics {
    /// Grouping key for one dimension. Ages are bucketed into polling
    /// brackets so breakdowns stay readable.
    pub fn field_value(&self, field: DemographicField) -> String {
        match field {
            DemographicField::Age => age_bracket(self.age).to_string(),
            DemographicField::RaceEthnicity => self.race_ethnicity.to_string(),
            DemographicField::Gender => self.gender.to_string(),
            DemographicField::Education => self.education.to_string(),
            DemographicField::LocationType => self.location_type.to_string(),
            DemographicField::Income => self.income.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maria() -> PersonaConfig {
        PersonaConfig::new(
            "Maria Rodriguez",
            34,
            RaceEthnicity::Hispanic,
            Gender::Female,
            Education::College,
            LocationType::Urban,
            IncomeBracket::From50kTo75k,
        )
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(IncomeBracket::From30kTo50k.as_str(), "30k_50k");
        assert_eq!(IncomeBracket::From30kTo50k.display_label(), "30k-50k");
        assert_eq!("NON-BINARY".parse::<Gender>().unwrap(), Gender::NonBinary);
        assert_eq!(Education::NoHighSchool.to_string(), "no_hs");
        assert!("martian".parse::<RaceEthnicity>().is_err());
        assert_eq!(BehavioralTrait::TrustInInstitutions.title(), "Trust In Institutions");
    }

    #[test]
    fn test_serde_uses_snake_case_strings() {
        let json = serde_json::to_value(maria().with_trait(BehavioralTrait::RiskTolerance, "moderate"))
            .unwrap();
        assert_eq!(json["income"], "50k_75k");
        assert_eq!(json["race_ethnicity"], "hispanic");
        assert_eq!(json["behavior"]["risk_tolerance"], "moderate");
        let back: PersonaConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.trait_value(BehavioralTrait::RiskTolerance), Some("moderate"));
    }

    #[test]
    fn test_persona_id_and_first_name() {
        let p = maria();
        assert_eq!(p.persona_id(), "Maria Rodriguez_34_hispanic");
        assert_eq!(p.first_name(), "Maria");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut p = maria();
        p.name = "  ".into();
        p.age = 12;
        p.children = 30;
        let err = p.validate().unwrap_err();
        assert_eq!(err.messages().len(), 3);
        assert!(err.to_string().starts_with("Invalid persona:"));
    }

    #[test]
    fn test_age_bounds_are_inclusive() {
        let mut p = maria();
        p.age = 18;
        assert!(p.validate().is_ok());
        p.age = 85;
        assert!(p.validate().is_ok());
        p.age = 86;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_from_fields_happy_path() {
        let p = PersonaConfig::from_fields(&fields(&[
            ("name", "James Wilson"),
            ("age", "58"),
            ("race_ethnicity", "white"),
            ("gender", "male"),
            ("education", "high_school"),
            ("location_type", "rural"),
            ("income", "30k_50k"),
            ("marital_status", "married"),
            ("children", "2"),
            ("state", "Ohio"),
            ("media_consumption", "local_news"),
        ]))
        .unwrap();
        assert_eq!(p.age, 58);
        assert_eq!(p.marital_status, Some(MaritalStatus::Married));
        assert_eq!(p.children, 2);
        assert_eq!(p.trait_value(BehavioralTrait::MediaConsumption), Some("local_news"));
    }

    #[test]
    fn test_from_fields_reports_every_problem() {
        let err = PersonaConfig::from_fields(&fields(&[
            ("name", "X"),
            ("age", "old"),
            ("race_ethnicity", "martian"),
            ("gender", "male"),
            ("education", "college"),
            ("income", "lots"),
            ("favorite_color", "blue"),
        ]))
        .unwrap_err();
        let msgs = err.messages();
        assert!(msgs.iter().any(|m| m.starts_with("age:")));
        assert!(msgs.iter().any(|m| m.contains("RaceEthnicity")));
        assert!(msgs.iter().any(|m| m.contains("'location_type'")));
        assert!(msgs.iter().any(|m| m.contains("IncomeBracket")));
        assert!(msgs.iter().any(|m| m.contains("'favorite_color'")));
    }

    #[test]
    fn test_from_fields_runs_range_validation() {
        let err = PersonaConfig::from_fields(&fields(&[
            ("name", "Young"),
            ("age", "16"),
            ("race_ethnicity", "asian"),
            ("gender", "female"),
            ("education", "no_hs"),
            ("location_type", "suburban"),
            ("income", "under_30k"),
        ]))
        .unwrap_err();
        assert!(err.messages()[0].contains("between 18 and 85"));
    }

    #[test]
    fn test_age_bracket() {
        assert_eq!(age_bracket(18), "18-24");
        assert_eq!(age_bracket(34), "25-34");
        assert_eq!(age_bracket(64), "55-64");
        assert_eq!(age_bracket(65), "65+");
        let d = maria().demographics();
        assert_eq!(d.field_value(DemographicField::Age), "25-34");
        assert_eq!(d.field_value(DemographicField::Income), "50k_75k");
    }
}
