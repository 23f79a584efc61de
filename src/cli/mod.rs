//! `persona-sim` command-line interface.
//!
//! ```text
//! persona-sim generate --size 500 --seed 42 --output personas.json
//! persona-sim ask --question "How do you feel about remote work?"
//! persona-sim simulate --question "Do you support universal healthcare?" --size 100
//! persona-sim seed-polls
//! persona-sim validate --size 50 --max-targets 3
//! persona-sim report --days 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::firefly::PersonaFirefly;
use crate::handler::PersonaHandler;
use crate::llms::{create_llm, PersonaLlmAdapter};
use crate::persona::{PersonaConfig, PersonaPromptBuilder, PollContext, StimulusConfig};
use crate::polls::{load_sample_poll_data, PollDataSelector, PollDatabase, DEFAULT_RECENCY_WEIGHT};
use crate::population::CensusPersonaGenerator;
use crate::simulation::{print_results_summary, PersonaSimulation, ScenarioConfig, ScenarioType};
use crate::utilities::config::AppConfig;
use crate::utilities::printer::{Printer, PrinterColor};
use crate::validation::{
    print_accuracy_report, print_validation_results, ValidationDatabase, ValidationFramework,
    DEFAULT_MIN_SAMPLE_SIZE, DEFAULT_VALIDATION_CONCURRENCY,
};

/// LLM persona simulation
#[derive(Debug, Parser)]
#[command(name = "persona-sim")]
#[command(about = "Simulate survey answers with census-weighted LLM personas", long_about = None)]
#[command(version)]
pub struct Cli {
    /// YAML configuration file (defaults to $PERSONA_SIM_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub plain: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a census-representative population
    Generate {
        #[arg(short, long)]
        size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Skip behavioral characteristics
        #[arg(long)]
        no_behavioral: bool,
        /// Write personas to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask one persona a question
    Ask {
        #[arg(short, long)]
        question: String,
        /// Persona JSON file; a random persona is generated when omitted
        #[arg(short, long)]
        persona: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Include relevant historical polls in the prompt
        #[arg(long)]
        with_polls: bool,
    },

    /// Run a scenario across a population
    Simulate {
        #[arg(short, long)]
        question: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, default_value = "policy")]
        scenario_type: ScenarioType,
        #[arg(long)]
        scenario_id: Option<String>,
        /// Personas JSON file; a population is generated when omitted
        #[arg(short, long)]
        personas: Option<PathBuf>,
        #[arg(short, long)]
        size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[arg(long)]
        with_polls: bool,
    },

    /// Load the built-in sample polls and events
    SeedPolls,

    /// Validate simulated answers against stored polls
    Validate {
        #[arg(short, long)]
        size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 10)]
        max_targets: usize,
        /// Only use polls on this topic
        #[arg(long)]
        topic: Option<String>,
    },

    /// Summarize recent validation accuracy
    Report {
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(1..))]
        days: i64,
    },
}

/// Run using the current process arguments.
pub async fn run() -> Result<()> {
    run_with(Cli::parse()).await
}

/// Run an already parsed command line.
pub async fn run_with(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let app = App {
        printer: if cli.plain { Printer::plain() } else { Printer::new() },
        json: cli.json,
        config,
    };

    match cli.command {
        Commands::Generate {
            size,
            seed,
            no_behavioral,
            output,
        } => app.generate(size, seed, !no_behavioral, output.as_deref()),
        Commands::Ask {
            question,
            persona,
            seed,
            with_polls,
        } => app.ask(&question, persona.as_deref(), seed, with_polls).await,
        Commands::Simulate {
            question,
            description,
            scenario_type,
            scenario_id,
            personas,
            size,
            seed,
            max_concurrent,
            with_polls,
        } => {
            let scenario = ScenarioConfig::new(
                scenario_id.unwrap_or_else(|| format!("{}_cli", scenario_type)),
                scenario_type,
                question.clone(),
            )
            .with_description(description.unwrap_or(question));
            let personas = app.load_or_generate(personas.as_deref(), size, seed)?;
            app.simulate(&scenario, &personas, max_concurrent, with_polls)
                .await
        }
        Commands::SeedPolls => app.seed_polls(),
        Commands::Validate {
            size,
            seed,
            max_targets,
            topic,
        } => app.validate(size, seed, max_targets, topic.as_deref()).await,
        Commands::Report { days } => app.report(days),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct App {
    config: AppConfig,
    printer: Printer,
    json: bool,
}

impl App {
    fn emit<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn handler(&self) -> PersonaHandler {
        PersonaHandler::new(PersonaLlmAdapter::new(create_llm(&self.config.llm)))
    }

    fn simulation(&self) -> PersonaSimulation {
        PersonaSimulation::new(self.handler())
            .with_batch_delay(Duration::from_millis(self.config.simulation.batch_delay_ms))
            .with_confidence_level(self.config.simulation.confidence_level)
    }

    fn poll_database(&self) -> Result<PollDatabase> {
        Ok(PollDatabase::new(Some(self.config.poll_db_path()))?)
    }

    fn population(
        &self,
        size: Option<usize>,
        seed: Option<u64>,
        include_behavioral: bool,
    ) -> Result<Vec<PersonaConfig>> {
        let size = size.unwrap_or(self.config.simulation.population_size);
        let seed = seed.or(self.config.simulation.seed);
        Ok(CensusPersonaGenerator::new(seed).generate_representative_population(
            size,
            include_behavioral,
            None,
        )?)
    }

    fn load_or_generate(
        &self,
        path: Option<&Path>,
        size: Option<usize>,
        seed: Option<u64>,
    ) -> Result<Vec<PersonaConfig>> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing personas from {}", path.display()))
            }
            None => self.population(size, seed, true),
        }
    }

    fn poll_context_for(&self, description: &str, persona: &PersonaConfig) -> Result<PollContext> {
        let selector = PollDataSelector::new(self.poll_database()?);
        Ok(selector.select_relevant_polls(
            description,
            persona,
            self.config.simulation.max_context_polls,
            DEFAULT_RECENCY_WEIGHT,
        )?)
    }

    fn generate(
        &self,
        size: Option<usize>,
        seed: Option<u64>,
        include_behavioral: bool,
        output: Option<&Path>,
    ) -> Result<()> {
        let generator_seed = seed.or(self.config.simulation.seed);
        let mut generator = CensusPersonaGenerator::new(generator_seed);
        let personas = generator.generate_representative_population(
            size.unwrap_or(self.config.simulation.population_size),
            include_behavioral,
            None,
        )?;
        let validation = generator.validate_population_accuracy(&personas);

        if let Some(path) = output {
            std::fs::write(path, serde_json::to_string_pretty(&personas)?)
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("Wrote {} personas to {}", personas.len(), path.display());
        } else if self.json {
            return self.emit(&personas);
        }

        if self.json {
            return self.emit(&validation);
        }
        self.printer.print(
            &format!("Generated {} personas", personas.len()),
            PrinterColor::BoldCyan,
        );
        for (field, accuracy) in &validation.demographic_accuracy {
            self.printer.print_bar(field.as_str(), *accuracy);
        }
        self.printer.print(
            &format!("Validation score: {:.3}", validation.validation_score),
            PrinterColor::for_score(validation.validation_score),
        );
        for gap in &validation.representation_gaps {
            self.printer.print(&format!("  gap: {}", gap), PrinterColor::Yellow);
        }
        for rec in &validation.recommendations {
            println!("  - {}", rec);
        }
        if output.is_none() {
            for p in personas.iter().take(5) {
                println!(
                    "  {} ({}, {} {}, {})",
                    p.name, p.age, p.race_ethnicity, p.gender, p.location_type
                );
            }
        }
        Ok(())
    }

    async fn ask(
        &self,
        question: &str,
        persona_path: Option<&Path>,
        seed: Option<u64>,
        with_polls: bool,
    ) -> Result<()> {
        let persona = match persona_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str::<PersonaConfig>(&text)
                    .with_context(|| format!("parsing persona from {}", path.display()))?
            }
            None => match self.population(Some(1), seed, true)?.pop() {
                Some(p) => p,
                None => bail!("population generator returned no persona"),
            },
        };

        let mut firefly = PersonaFirefly::new(persona.clone(), self.handler())
            .with_purpose(format!("Answer: {}", question));
        if with_polls {
            firefly = firefly.with_poll_context(self.poll_context_for(question, &persona)?);
        }
        let stimulus = StimulusConfig::question("cli_question", question);
        let response = firefly.glow(&stimulus).await?;

        if self.json {
            return self.emit(&response);
        }
        self.printer.print(
            &format!("{} ({})", response.persona_name, persona.persona_id()),
            PrinterColor::BoldCyan,
        );
        log::debug!(
            "Persona identity:\n{}",
            PersonaPromptBuilder::new(&persona).build_persona_prompt()
        );
        self.printer.print_field("Question", question);
        self.printer.print_field("Answer", &response.persona_response);
        Ok(())
    }

    async fn simulate(
        &self,
        scenario: &ScenarioConfig,
        personas: &[PersonaConfig],
        max_concurrent: Option<usize>,
        with_polls: bool,
    ) -> Result<()> {
        let context = match (with_polls, personas.first()) {
            (true, Some(first)) => Some(self.poll_context_for(&scenario.description, first)?),
            _ => None,
        };
        let results = self
            .simulation()
            .run_scenario_simulation(
                scenario,
                personas,
                context.as_ref(),
                max_concurrent.unwrap_or(self.config.simulation.max_concurrent),
            )
            .await?;
        if self.json {
            return self.emit(&results);
        }
        print_results_summary(&results, &self.printer);
        Ok(())
    }

    fn seed_polls(&self) -> Result<()> {
        let db = self.poll_database()?;
        let loaded = load_sample_poll_data(&db)?;
        let total = db.count_polls()?;
        if self.json {
            return self.emit(&serde_json::json!({
                "loaded": loaded,
                "total_polls": total,
                "database": db.path(),
            }));
        }
        self.printer.print(
            &format!("Loaded {} sample polls ({} stored)", loaded, total),
            PrinterColor::BoldGreen,
        );
        self.printer
            .print_field("Database", &db.path().display().to_string());
        Ok(())
    }

    async fn validate(
        &self,
        size: Option<usize>,
        seed: Option<u64>,
        max_targets: usize,
        topic: Option<&str>,
    ) -> Result<()> {
        let personas = self.population(size, seed, true)?;
        let validation_db = ValidationDatabase::new(Some(self.config.validation_db_path()))?;
        let mut framework =
            ValidationFramework::new(self.simulation(), self.poll_database()?, validation_db)
                .with_context_polls(self.config.simulation.max_context_polls);
        if let Some(topic) = topic {
            framework
                .acreate_validation_targets_from_polls(
                    Some(topic.to_string()),
                    DEFAULT_MIN_SAMPLE_SIZE,
                    max_targets,
                )
                .await?;
        }
        let results = framework
            .run_comprehensive_validation(&personas, max_targets, DEFAULT_VALIDATION_CONCURRENCY)
            .await?;
        if self.json {
            return self.emit(&results);
        }
        print_validation_results(&results, &self.printer);
        Ok(())
    }

    fn report(&self, days: i64) -> Result<()> {
        let validation_db = ValidationDatabase::new(Some(self.config.validation_db_path()))?;
        let framework =
            ValidationFramework::new(self.simulation(), self.poll_database()?, validation_db);
        let report = framework.generate_accuracy_report(days)?;
        if self.json {
            return self.emit(&report);
        }
        print_accuracy_report(&report, &self.printer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("config.yaml");
        let yaml = format!(
            "llm:\n  provider: mock\n  mock_response: \"I support it.\"\nsimulation:\n  batch_delay_ms: 0\n  seed: 11\nstorage:\n  data_dir: {}\n",
            dir.path().join("data").display()
        );
        std::fs::write(&path, yaml).unwrap();
        path
    }

    fn cli(dir: &TempDir, args: &[&str]) -> Cli {
        let config = config_file(dir);
        let mut argv = vec!["persona-sim", "--plain", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "persona-sim",
            "simulate",
            "--question",
            "Would you buy it?",
            "--scenario-type",
            "product",
            "--size",
            "25",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Simulate {
                scenario_type,
                size,
                ..
            } => {
                assert_eq!(scenario_type, ScenarioType::Product);
                assert_eq!(size, Some(25));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_scenario_type() {
        let parsed = Cli::try_parse_from([
            "persona-sim",
            "simulate",
            "--question",
            "q",
            "--scenario-type",
            "weather",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_report_days_must_be_positive() {
        for days in ["0", "-5"] {
            let parsed = Cli::try_parse_from(["persona-sim", "report", "--days", days]);
            assert!(parsed.is_err(), "--days {days} accepted");
        }
        let cli = Cli::try_parse_from(["persona-sim", "report", "--days", "200000000"]).unwrap();
        assert!(matches!(cli.command, Commands::Report { days: 200_000_000 }));
    }

    #[tokio::test]
    async fn test_generate_writes_personas() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("personas.json");
        run_with(cli(
            &dir,
            &["generate", "--size", "20", "--output", out.to_str().unwrap()],
        ))
        .await
        .unwrap();
        let personas: Vec<PersonaConfig> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(personas.len(), 20);
    }

    #[tokio::test]
    async fn test_seed_validate_report_pipeline() {
        let dir = TempDir::new().unwrap();
        run_with(cli(&dir, &["seed-polls"])).await.unwrap();
        run_with(cli(&dir, &["validate", "--size", "12", "--max-targets", "2"]))
            .await
            .unwrap();
        run_with(cli(&dir, &["report", "--days", "1"])).await.unwrap();

        let store =
            ValidationDatabase::new(Some(dir.path().join("data").join("validation_data.db")))
                .unwrap();
        assert_eq!(store.get_accuracy_history(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_simulate_from_personas_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("personas.json");
        run_with(cli(
            &dir,
            &["generate", "--size", "5", "--output", out.to_str().unwrap()],
        ))
        .await
        .unwrap();
        run_with(cli(
            &dir,
            &[
                "simulate",
                "--question",
                "Do you support it?",
                "--personas",
                out.to_str().unwrap(),
            ],
        ))
        .await
        .unwrap();
    }
}
