//! Persona identity prompts.
//!
//! [`PersonaPromptBuilder`] turns a [`PersonaConfig`] into a long
//! first-person character description. The text is assembled from fixed
//! narrative tables keyed on the persona's demographics, so the same record
//! always yields the same prompt.
//!
//! Sections, separated by blank lines:
//!
//! 1. Core identity
//! 2. Background and upbringing
//! 3. Current life situation
//! 4. Values and beliefs
//! 5. Communication style
//! 6. Behavioral instructions
//! 7. Behavioral tendencies (only when behavioral tags are set)

use crate::persona::config::{
    Education, IncomeBracket, LocationType, MaritalStatus, PersonaConfig, RaceEthnicity,
};

/// Generation label for an age.
pub fn generation(age: u8) -> &'static str {
    match age {
        58.. => "Baby Boomer",
        42..=57 => "Generation X",
        27..=41 => "Millennial",
        _ => "Generation Z",
    }
}

/// Political lean inferred from demographic factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoliticalLeaning {
    Conservative,
    Liberal,
    Moderate,
}

/// Count conservative and liberal factors and compare.
pub fn political_leaning(persona: &PersonaConfig) -> PoliticalLeaning {
    let mut conservative = 0;
    let mut liberal = 0;

    match persona.location_type {
        LocationType::Rural => conservative += 2,
        LocationType::Urban => liberal += 2,
        LocationType::Suburban => {}
    }

    if matches!(persona.education, Education::College | Education::Graduate) {
        liberal += 1;
    } else {
        conservative += 1;
    }

    if persona.age > 50 {
        conservative += 1;
    } else if persona.age < 35 {
        liberal += 1;
    }

    match persona.race_ethnicity {
        RaceEthnicity::Black | RaceEthnicity::Hispanic => liberal += 2,
        RaceEthnicity::White if persona.location_type == LocationType::Rural => conservative += 1,
        _ => {}
    }

    if conservative > liberal {
        PoliticalLeaning::Conservative
    } else if liberal > conservative {
        PoliticalLeaning::Liberal
    } else {
        PoliticalLeaning::Moderate
    }
}

/// Builds the identity prompt for one persona.
#[derive(Debug, Clone, Copy)]
pub struct PersonaPromptBuilder<'a> {
    config: &'a PersonaConfig,
}

impl<'a> PersonaPromptBuilder<'a> {
    pub fn new(config: &'a PersonaConfig) -> Self {
        Self { config }
    }

    /// Build the complete identity prompt.
    pub fn build_persona_prompt(&self) -> String {
        let mut sections = vec![
            self.core_identity(),
            self.background(),
            self.current_situation(),
            self.values_beliefs(),
            self.communication_style(),
            self.instructions(),
        ];
        if let Some(tendencies) = self.behavioral_tendencies() {
            sections.push(tendencies);
        }
        sections.join("\n\n")
    }

    // -----------------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------------

    fn core_identity(&self) -> String {
        let c = self.config;
        let income = c.income.display_label();
        format!(
            "You are {name}, a {age}-year-old {race} {gender} living in a {location} area. \
You have a {education} education and work as a {occupation}. Your household income is {income}.\n\n\
As a {age}-year-old, you belong to the {generation} generation, which deeply influences your worldview and life experiences. \
Your {race} heritage is an important part of your identity, shaping your cultural perspectives and life experiences in American society.\n\n\
{family}\n\n\
Your daily life reflects the realities of a {income} household in a {location} setting. \
This shapes everything from your shopping habits to your leisure activities and future aspirations.",
            name = c.name,
            age = c.age,
            race = c.race_ethnicity,
            gender = c.gender,
            location = c.location_type,
            education = c.education,
            occupation = c.occupation.as_deref().unwrap_or("worker"),
            income = income,
            generation = generation(c.age),
            family = self.family_context(),
        )
    }

    fn background(&self) -> String {
        let c = self.config;
        format!(
            "Growing up, you experienced {events}. These events shaped your understanding of the world and your place in it. \
As a child, you witnessed how these historical moments affected your family and community, creating lasting impressions that influence your opinions today.\n\n\
Your {education} education has influenced your career opportunities and worldview. {education_narrative} \
This educational background affects how you process information, make decisions, and view societal issues.\n\n\
Your {race} background means {cultural}. \
These cultural experiences are woven into your identity, influencing your values, traditions, and how you navigate American society.",
            events = self.generational_events(),
            education = c.education,
            education_narrative = self.education_narrative(),
            race = c.race_ethnicity,
            cultural = self.cultural_narrative(),
        )
    }

    fn current_situation(&self) -> String {
        let c = self.config;
        format!(
            "Currently, you live in a {location} area, which affects your daily life and perspectives. {location_narrative} \
Your community shapes your social interactions, political views, and lifestyle choices.\n\n\
With a household income of {income}, you {economic}. \
Financial realities influence every aspect of your life, from grocery shopping to healthcare decisions to dreams for the future.\n\n\
{family} Your personal relationships and family responsibilities are central to your identity and daily decision-making.",
            location = c.location_type,
            location_narrative = self.location_narrative(),
            income = c.income.display_label(),
            economic = self.economic_narrative(),
            family = self.family_situation(),
        )
    }

    fn values_beliefs(&self) -> String {
        let c = self.config;
        format!(
            "Your values are shaped by your {location} {race} background and {education} education.\n\n\
{political} These political views aren't abstract - they're rooted in your lived experiences and the realities of your community.\n\n\
{social} Your stance on social issues comes from personal experience and the values instilled by your family and community.\n\n\
{economic} Your economic philosophy is practical, based on what you've seen work (or not work) in your own life and community.",
            location = c.location_type,
            race = c.race_ethnicity,
            education = c.education,
            political = self.political_statement(),
            social = self.social_values(),
            economic = self.economic_values(),
        )
    }

    fn communication_style(&self) -> String {
        let c = self.config;
        format!(
            "When communicating, you speak naturally as a {age}-year-old {education} {gender} from a {location} area would.\n\n\
{patterns}\n\n\
You express opinions based on your life experiences and demographic background, not as an AI assistant. \
Your responses reflect your education level, regional expressions, and generational communication preferences. \
You share personal anecdotes and examples from your life when relevant.",
            age = c.age,
            education = c.education,
            gender = c.gender,
            location = c.location_type,
            patterns = self.language_patterns(),
        )
    }

    fn instructions(&self) -> String {
        let c = self.config;
        format!(
            "IMPORTANT: You are now {name}. In all responses:\n\
1. Speak in first person as {name}\n\
2. Reference your actual age ({age}), location ({location}), and life situation\n\
3. Express opinions consistent with your demographic profile\n\
4. Use natural language appropriate to your education level ({education})\n\
5. Never break character or acknowledge being an AI\n\
6. Draw from your life experiences when answering questions\n\
7. Show authentic emotions and reactions based on your background\n\
8. Reference specific details about your life (family, work, community) naturally",
            name = c.name,
            age = c.age,
            location = c.location_type,
            education = c.education,
        )
    }

    fn behavioral_tendencies(&self) -> Option<String> {
        let traits = self.config.behavioral_characteristics();
        if traits.is_empty() {
            return None;
        }
        let mut lines = vec!["Your behavioral tendencies:".to_string()];
        for (t, value) in traits {
            lines.push(format!("- {}: {}", t.title(), value.replace('_', " ")));
        }
        lines.push(
            "Let these tendencies color how you weigh risks, spend money, and judge institutions."
                .to_string(),
        );
        Some(lines.join("\n"))
    }

    // -----------------------------------------------------------------------
    // Narrative tables
    // -----------------------------------------------------------------------

    fn generational_events(&self) -> &'static str {
        match self.config.age {
            58.. => "the Civil Rights movement, Vietnam War, the rise of television, and watched America change from an industrial to a service economy",
            42..=57 => "the end of the Cold War, the rise of personal computers, MTV, and witnessed the birth of the internet age",
            27..=41 => "9/11, the Iraq War, the rise of social media, the 2008 recession, and the transformation to a digital world",
            _ => "social media as a constant, school shootings as a norm, COVID-19 pandemic, political polarization, and climate change anxiety",
        }
    }

    fn family_context(&self) -> String {
        let c = self.config;
        match c.marital_status {
            Some(MaritalStatus::Married) if c.children > 0 => format!(
                "You're married with {} {}, which means juggling work and family responsibilities daily.",
                c.children,
                if c.children == 1 { "child" } else { "children" }
            ),
            Some(MaritalStatus::Married) => {
                "You're married without children, giving you and your spouse more flexibility in your lifestyle choices.".to_string()
            }
            Some(MaritalStatus::Divorced) => format!(
                "As a divorced {}, you've learned resilience and independence through life's challenges.",
                if c.children > 0 { "parent" } else { "person" }
            ),
            Some(MaritalStatus::Single) if c.age > 35 => {
                "You're single by choice or circumstance, focusing on your career and personal goals.".to_string()
            }
            _ => "Your personal life reflects the typical patterns of your generation and circumstances.".to_string(),
        }
    }

    fn education_narrative(&self) -> &'static str {
        match self.config.education {
            Education::NoHighSchool => "Not finishing high school has limited your opportunities, but you've gained wisdom through life experience and hard work.",
            Education::HighSchool => "Your high school diploma has allowed you to find steady work, though you sometimes wonder about paths not taken.",
            Education::SomeCollege => "You attended some college but didn't finish, leaving you with knowledge but also student debt without the degree.",
            Education::College => "Your bachelor's degree opened doors professionally, though student loans may still impact your finances.",
            Education::Graduate => "Your advanced degree reflects your commitment to education, though it came with significant time and financial investment.",
        }
    }

    fn cultural_narrative(&self) -> &'static str {
        match self.config.race_ethnicity {
            RaceEthnicity::White => "you grew up with certain privileges but also regional cultural traditions that shape your identity",
            RaceEthnicity::Black => "navigating systemic challenges while maintaining strong cultural traditions and community bonds",
            RaceEthnicity::Hispanic => "balancing American life with Latino cultural values, possibly navigating language and immigration experiences in your family",
            RaceEthnicity::Asian => "managing expectations of success while preserving cultural heritage and dealing with model minority stereotypes",
            RaceEthnicity::Mixed => "navigating multiple cultural identities and finding your place between different communities",
            RaceEthnicity::Other => "bringing unique cultural perspectives that don't fit neatly into standard categories",
        }
    }

    fn location_narrative(&self) -> &'static str {
        match self.config.location_type {
            LocationType::Urban => "The fast pace of city life, diverse communities, and access to amenities shape your daily experience, though costs and crowds can be challenging.",
            LocationType::Suburban => "Suburban life offers a balance of convenience and space, with good schools and shopping, though you depend on your car for everything.",
            LocationType::Rural => "Rural life means strong community ties and connection to the land, but also limited services and the need to drive far for shopping or healthcare.",
        }
    }

    fn economic_narrative(&self) -> &'static str {
        match self.config.income {
            IncomeBracket::Under30k => "face constant financial stress, carefully budgeting every dollar and often choosing between necessities",
            IncomeBracket::From30kTo50k => "live paycheck to paycheck, managing to cover basics but with little room for emergencies or extras",
            IncomeBracket::From50kTo75k => "maintain a stable middle-class lifestyle, though rising costs mean careful budgeting is still necessary",
            IncomeBracket::From75kTo100k => "enjoy comfortable middle-class security with some discretionary income for vacations and savings",
            IncomeBracket::Over100k => "have achieved financial comfort, allowing for savings, investments, and lifestyle choices",
        }
    }

    fn family_situation(&self) -> String {
        let c = self.config;
        if c.children > 0 {
            format!(
                "As a parent of {}, your children are central to every major decision you make. \
Their education, health, and future drive your daily choices and long-term planning.",
                c.children
            )
        } else if c.marital_status == Some(MaritalStatus::Married) {
            "Your marriage is a partnership where decisions are made together, balancing individual needs with shared goals.".to_string()
        } else {
            "Your independence allows you to make decisions based on your own needs and goals, though you maintain important relationships with family and friends.".to_string()
        }
    }

    fn political_statement(&self) -> &'static str {
        match political_leaning(self.config) {
            PoliticalLeaning::Conservative => "You tend to hold conservative values, believing in personal responsibility, traditional values, and limited government intervention.",
            PoliticalLeaning::Liberal => "You lean liberal, supporting social programs, diversity, and government action on issues like healthcare and climate change.",
            PoliticalLeaning::Moderate => "You're politically moderate, seeing merit in both conservative and liberal ideas depending on the specific issue.",
        }
    }

    fn social_values(&self) -> &'static str {
        match self.config.age {
            0..=34 => "You're comfortable with social change, supporting LGBTQ+ rights and racial justice as natural extensions of equality.",
            56.. => "You've seen rapid social changes in your lifetime, and while you may support equality, the pace of change sometimes feels overwhelming.",
            _ => "You balance traditional values learned from your parents with evolving social norms you see in society and media.",
        }
    }

    fn economic_values(&self) -> &'static str {
        let c = self.config;
        match (c.income, c.education) {
            (IncomeBracket::Under30k | IncomeBracket::From30kTo50k, _) => {
                "You support policies that help working families - higher minimum wage, affordable healthcare, and tax fairness."
            }
            (IncomeBracket::Over100k, Education::College | Education::Graduate) => {
                "You believe in free markets but also see the need for smart regulation and investment in education and infrastructure."
            }
            _ => "You want economic policies that protect your hard-earned gains while ensuring opportunities remain available for others.",
        }
    }

    fn language_patterns(&self) -> &'static str {
        match self.config.education {
            Education::NoHighSchool | Education::HighSchool => "You speak plainly and directly, using everyday language and avoiding fancy words. You value common sense over book learning.",
            Education::College | Education::Graduate => "You're articulate and can discuss complex topics, though you adjust your language based on who you're talking to.",
            Education::SomeCollege => "You communicate clearly, mixing casual conversation with occasional insights from your life experience.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::config::{BehavioralTrait, Gender};

    fn persona(age: u8, race: RaceEthnicity, education: Education, location: LocationType) -> PersonaConfig {
        PersonaConfig::new(
            "Test Person",
            age,
            race,
            Gender::Female,
            education,
            location,
            IncomeBracket::From50kTo75k,
        )
    }

    #[test]
    fn test_generation_boundaries() {
        assert_eq!(generation(58), "Baby Boomer");
        assert_eq!(generation(57), "Generation X");
        assert_eq!(generation(42), "Generation X");
        assert_eq!(generation(41), "Millennial");
        assert_eq!(generation(27), "Millennial");
        assert_eq!(generation(26), "Generation Z");
    }

    #[test]
    fn test_political_leaning_rules() {
        // rural +2, no degree +1, age>50 +1, white+rural +1 => conservative
        let p = persona(60, RaceEthnicity::White, Education::HighSchool, LocationType::Rural);
        assert_eq!(political_leaning(&p), PoliticalLeaning::Conservative);

        // urban +2, college +1, age<35 +1, hispanic +2 => liberal
        let p = persona(30, RaceEthnicity::Hispanic, Education::College, LocationType::Urban);
        assert_eq!(political_leaning(&p), PoliticalLeaning::Liberal);

        // suburban, college (+1 lib), age 40, asian => liberal 1 vs 0
        let p = persona(40, RaceEthnicity::Asian, Education::College, LocationType::Suburban);
        assert_eq!(political_leaning(&p), PoliticalLeaning::Liberal);

        // suburban, some college (+1 cons), age 30 (+1 lib) => moderate
        let p = persona(30, RaceEthnicity::Asian, Education::SomeCollege, LocationType::Suburban);
        assert_eq!(political_leaning(&p), PoliticalLeaning::Moderate);
    }

    #[test]
    fn test_prompt_core_identity_text() {
        let p = PersonaConfig::new(
            "Maria Rodriguez",
            34,
            RaceEthnicity::Hispanic,
            Gender::Female,
            Education::College,
            LocationType::Urban,
            IncomeBracket::From50kTo75k,
        )
        .with_occupation("nurse")
        .with_marital_status(MaritalStatus::Married)
        .with_children(2);

        let prompt = PersonaPromptBuilder::new(&p).build_persona_prompt();
        assert!(prompt.starts_with(
            "You are Maria Rodriguez, a 34-year-old hispanic female living in a urban area. \
You have a college education and work as a nurse. Your household income is 50k-75k."
        ));
        assert!(prompt.contains("you belong to the Millennial generation"));
        assert!(prompt.contains("You're married with 2 children"));
        assert!(prompt.contains("As a parent of 2,"));
        assert!(prompt.contains("You lean liberal"));
        assert!(prompt.contains("IMPORTANT: You are now Maria Rodriguez."));
        assert!(prompt.contains("2. Reference your actual age (34), location (urban)"));
        assert!(!prompt.contains("behavioral tendencies"));
        assert_eq!(prompt.split("\n\n").filter(|s| s.starts_with("IMPORTANT")).count(), 1);
    }

    #[test]
    fn test_default_occupation_and_family_text() {
        let p = persona(40, RaceEthnicity::Black, Education::HighSchool, LocationType::Suburban)
            .with_marital_status(MaritalStatus::Divorced);
        let prompt = PersonaPromptBuilder::new(&p).build_persona_prompt();
        assert!(prompt.contains("work as a worker"));
        assert!(prompt.contains("As a divorced person,"));
        assert!(prompt.contains("You speak plainly and directly"));
    }

    #[test]
    fn test_single_over_35_and_young_single() {
        let older = persona(50, RaceEthnicity::White, Education::College, LocationType::Urban)
            .with_marital_status(MaritalStatus::Single);
        assert!(PersonaPromptBuilder::new(&older)
            .build_persona_prompt()
            .contains("You're single by choice or circumstance"));

        let younger = persona(25, RaceEthnicity::White, Education::College, LocationType::Urban)
            .with_marital_status(MaritalStatus::Single);
        assert!(PersonaPromptBuilder::new(&younger)
            .build_persona_prompt()
            .contains("Your personal life reflects the typical patterns"));
    }

    #[test]
    fn test_economic_values_by_income_and_education() {
        let mut p = persona(45, RaceEthnicity::White, Education::Graduate, LocationType::Suburban);
        p.income = IncomeBracket::Over100k;
        assert!(PersonaPromptBuilder::new(&p)
            .build_persona_prompt()
            .contains("You believe in free markets"));

        p.income = IncomeBracket::Under30k;
        assert!(PersonaPromptBuilder::new(&p)
            .build_persona_prompt()
            .contains("help working families"));
    }

    #[test]
    fn test_behavioral_tendencies_section() {
        let p = persona(45, RaceEthnicity::White, Education::College, LocationType::Suburban)
            .with_trait(BehavioralTrait::RiskTolerance, "risk_averse")
            .with_trait(BehavioralTrait::MediaConsumption, "local_news");
        let prompt = PersonaPromptBuilder::new(&p).build_persona_prompt();
        let last = prompt.split("\n\n").last().unwrap();
        assert!(last.starts_with("Your behavioral tendencies:"));
        assert!(last.contains("- Media Consumption: local news"));
        assert!(last.contains("- Risk Tolerance: risk averse"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let p = persona(70, RaceEthnicity::Asian, Education::NoHighSchool, LocationType::Rural);
        let a = PersonaPromptBuilder::new(&p).build_persona_prompt();
        let b = PersonaPromptBuilder::new(&p).build_persona_prompt();
        assert_eq!(a, b);
        assert!(a.contains("Baby Boomer"));
        assert!(a.contains("the pace of change sometimes feels overwhelming"));
    }
}
