//! # lifesim CLI
//!
//! Command-line front end for the habit simulator and its media helpers.
//!
//! Usage:
//!   lifesim simulate --state-file state.txt --program "..." --horizon 4 --baseline --summarize
//!   lifesim summarize trajectory.json --tone resigned
//!   lifesim program "I sleep five hours and skip breakfast"
//!   lifesim habits "I sleep five hours and skip breakfast"
//!   lifesim image --prompt "a photo of img running" --images photos/ --out out/
//!   lifesim speak "I feel great" --out recap.wav
//!
//! Results go to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use lifesim_core::{
    PairedSummary, Program, ProgramGenerator, Simulator, SimulatorConfig, State, Summarizer, Tone,
    Trajectory,
};
use lifesim_error::{Error, Result};
use lifesim_provider::image::load_reference_images;
use lifesim_provider::{
    AnyProvider, GoogleSpeechSynthesizer, ImageGenerator, ImageRequest, LlmProvider, ProviderConfig,
    ProviderType, ReplicateConfig, ReplicateImageGenerator, SpeechConfig, SpeechSynthesizer,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lifesim")]
#[command(author, version, about = "lifesim - simulate how habits evolve under a coaching program")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Text model backend: openai, anthropic, gemini or local
    #[arg(short, long, global = true, default_value = "gemini")]
    provider: ProviderType,

    /// Simulator config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the fixed-choice action catalogue instead of free text
    #[arg(long, global = true)]
    fixed_choice: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a trajectory from an initial state under a program
    Simulate {
        /// Initial state text
        #[arg(long, conflicts_with = "state_file", required_unless_present = "state_file")]
        state: Option<String>,

        /// File holding the initial state
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Program text
        #[arg(long, conflicts_with = "program_file", required_unless_present = "program_file")]
        program: Option<String>,

        /// File holding the program
        #[arg(long)]
        program_file: Option<PathBuf>,

        /// Number of weekly steps
        #[arg(long, default_value = "4")]
        horizon: usize,

        /// Also run the do-nothing baseline
        #[arg(long)]
        baseline: bool,

        /// Add first-person summaries
        #[arg(long)]
        summarize: bool,
    },
    /// Summarize a saved trajectory
    Summarize {
        /// Trajectory JSON (bare, or wrapped in "life_simulation")
        file: PathBuf,

        #[arg(long, default_value = "motivational")]
        tone: Tone,
    },
    /// Draft a coaching program from a self description
    Program {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// Sort a self description into life domains
    Habits {
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// Generate pictures of a person from reference photos
    Image {
        #[arg(long)]
        prompt: String,

        /// Directory of reference photos (png/jpg)
        #[arg(long)]
        images: PathBuf,

        #[arg(long, default_value = "50")]
        steps: u32,

        #[arg(long)]
        negative_prompt: Option<String>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Read text aloud into a WAV file
    Speak {
        text: String,

        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(verbose: bool, quiet: bool) -> Result<()> {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let directive: Directive = format!("lifesim={}", level).parse().map_err(|e| {
        Error::config_invalid(format!("invalid log directive: {}", e)).with_operation("cli::init_tracing")
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<SimulatorConfig> {
    match (&cli.config, cli.fixed_choice) {
        (Some(path), _) => SimulatorConfig::from_file(path),
        (None, true) => Ok(SimulatorConfig::fixed_choice()),
        (None, false) => Ok(SimulatorConfig::free_choice()),
    }
}

fn text_provider(provider_type: ProviderType) -> Result<AnyProvider> {
    AnyProvider::new(ProviderConfig::from_env(provider_type)?)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("cli::read_text")
            .with_context("path", path.display().to_string())
    })
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| {
        Error::from(e)
            .with_operation("cli::write_bytes")
            .with_context("path", path.display().to_string())
    })
}

/// Inline value wins; otherwise read the file
fn text_arg(inline: Option<String>, file: Option<&Path>, what: &str) -> Result<String> {
    let text = match (inline, file) {
        (Some(text), _) => text,
        (None, Some(path)) => read_text(path)?,
        (None, None) => {
            return Err(Error::invalid_argument(format!("no {} given", what)).with_operation("cli::text_arg"))
        }
    };
    if text.trim().is_empty() {
        return Err(Error::invalid_argument(format!("{} must not be empty", what)).with_operation("cli::text_arg"));
    }
    Ok(text.trim().to_string())
}

/// Accept a bare trajectory or the `life_simulation` wrapper
fn parse_trajectory(text: &str) -> Result<Trajectory> {
    let mut value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        Error::invalid_argument(format!("trajectory file is not JSON: {}", e))
            .with_operation("cli::parse_trajectory")
            .set_source(e)
    })?;
    if let Some(inner) = value.get_mut("life_simulation") {
        value = inner.take();
    }
    serde_json::from_value(value).map_err(|e| {
        Error::invalid_argument(format!("invalid trajectory: {}", e))
            .with_operation("cli::parse_trajectory")
            .set_source(e)
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        Error::serialization_failed(format!("failed to encode output: {}", e))
            .with_operation("cli::print_json")
            .set_source(e)
    })?;
    println!("{}", text);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        Error::serialization_failed(format!("failed to encode output: {}", e))
            .with_operation("cli::to_json")
            .set_source(e)
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Simulate {
            state,
            state_file,
            program,
            program_file,
            horizon,
            baseline,
            summarize,
        } => {
            let state = State::new(text_arg(state, state_file.as_deref(), "initial state")?);
            let program = Program::new(text_arg(program, program_file.as_deref(), "program")?);
            let provider = text_provider(cli.provider)?;
            let simulator = Simulator::new(&provider, config.clone())?;
            info!(provider = provider.name(), horizon, baseline, "starting simulation");

            if baseline {
                let result = simulator.simulate_with_baseline(state, &program, horizon).await?;
                let mut output = json!({
                    "program": to_json(&result.program_trajectory)?,
                    "habits": to_json(&result.baseline_trajectory)?,
                });
                if summarize {
                    let summary: PairedSummary =
                        Summarizer::new(&provider, config)?.summarize_result(&result).await?;
                    output["summary"] = to_json(&summary)?;
                }
                print_json(&output)
            } else {
                let trajectory = simulator.simulate(state, &program, horizon).await?;
                let mut output = json!({ "life_simulation": to_json(&trajectory)? });
                if summarize {
                    let summary = Summarizer::new(&provider, config)?
                        .summarize_trajectory(&trajectory, Tone::Motivational)
                        .await?;
                    output["summary"] = json!(summary);
                }
                print_json(&output)
            }
        }
        Commands::Summarize { file, tone } => {
            let trajectory = parse_trajectory(&read_text(&file)?)?;
            let provider = text_provider(cli.provider)?;
            let summary = Summarizer::new(provider, config)?
                .summarize_trajectory(&trajectory, tone)
                .await?;
            print_json(&json!({ "summary": summary, "tone": tone }))
        }
        Commands::Program { query } => {
            let generator = ProgramGenerator::new(text_provider(cli.provider)?, config)?;
            let plan = generator.generate_program(&query.join(" ")).await?;
            print_json(&json!({
                "plan": to_json(&plan)?,
                "program": plan.to_program(),
            }))
        }
        Commands::Habits { query } => {
            let generator = ProgramGenerator::new(text_provider(cli.provider)?, config)?;
            let profile = generator.categorize_habits(&query.join(" ")).await?;
            print_json(&json!({
                "habits": to_json(&profile)?,
                "state": profile.to_state(),
            }))
        }
        Commands::Image {
            prompt,
            images,
            steps,
            negative_prompt,
            out,
        } => {
            let mut request = ImageRequest::new(prompt)
                .with_reference_images(load_reference_images(&images)?)
                .with_steps(steps);
            if let Some(negative) = negative_prompt {
                request = request.with_negative_prompt(negative);
            }

            let generator = ReplicateImageGenerator::new(ReplicateConfig::from_env()?)?;
            let generated = generator.generate_images(request).await?;

            std::fs::create_dir_all(&out).map_err(|e| {
                Error::from(e)
                    .with_operation("cli::image")
                    .with_context("path", out.display().to_string())
            })?;
            let mut written = Vec::with_capacity(generated.len());
            for (i, bytes) in generated.iter().enumerate() {
                let path = out.join(format!("image_{}.png", i + 1));
                write_bytes(&path, bytes)?;
                written.push(path.display().to_string());
            }
            info!(count = written.len(), "images written");
            print_json(&json!({ "images": written }))
        }
        Commands::Speak { text, out } => {
            let synthesizer = GoogleSpeechSynthesizer::new(SpeechConfig::from_env()?)?;
            let audio = synthesizer.synthesize(&text).await?;
            write_bytes(&out, &audio)?;
            print_json(&json!({ "audio": out.display().to_string(), "bytes": audio.len() }))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.quiet) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simulate_args() {
        let cli = Cli::try_parse_from([
            "lifesim",
            "--provider",
            "openai",
            "simulate",
            "--state",
            "I sleep 5 hours",
            "--program",
            "Sleep more",
            "--horizon",
            "3",
            "--baseline",
        ])
        .unwrap();

        assert_eq!(cli.provider, ProviderType::OpenAI);
        match cli.command {
            Commands::Simulate {
                state,
                horizon,
                baseline,
                summarize,
                ..
            } => {
                assert_eq!(state.as_deref(), Some("I sleep 5 hours"));
                assert_eq!(horizon, 3);
                assert!(baseline);
                assert!(!summarize);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_simulate_requires_state_and_program() {
        assert!(Cli::try_parse_from(["lifesim", "simulate", "--program", "p"]).is_err());
        assert!(Cli::try_parse_from(["lifesim", "simulate", "--state", "s"]).is_err());
        assert!(Cli::try_parse_from([
            "lifesim",
            "simulate",
            "--state",
            "s",
            "--state-file",
            "s.txt",
            "--program",
            "p"
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_and_defaults() {
        let cli = Cli::try_parse_from(["lifesim", "summarize", "t.json", "-q"]).unwrap();
        assert_eq!(cli.provider, ProviderType::Gemini);
        assert!(cli.quiet);
        match cli.command {
            Commands::Summarize { tone, .. } => assert_eq!(tone, Tone::Motivational),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["lifesim", "-v", "-q", "habits", "x"]).is_err());
        assert!(Cli::try_parse_from(["lifesim", "--provider", "nope", "habits", "x"]).is_err());
        assert!(Cli::try_parse_from(["lifesim", "summarize", "t.json", "--tone", "angry"]).is_err());
    }

    #[test]
    fn test_query_words_are_collected() {
        let cli = Cli::try_parse_from(["lifesim", "program", "I", "skip", "breakfast"]).unwrap();
        match cli.command {
            Commands::Program { query } => assert_eq!(query.join(" "), "I skip breakfast"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fixed_choice_flag_selects_profile() {
        let cli = Cli::try_parse_from(["lifesim", "--fixed-choice", "habits", "x"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config, SimulatorConfig::fixed_choice());
    }

    #[test]
    fn test_text_arg() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  I walk every day  ").unwrap();

        assert_eq!(text_arg(Some(" s ".into()), None, "state").unwrap(), "s");
        assert_eq!(text_arg(None, Some(file.path()), "state").unwrap(), "I walk every day");
        assert!(text_arg(Some("   ".into()), None, "state").is_err());
        assert!(text_arg(None, Some(Path::new("/nonexistent/state.txt")), "state").is_err());
    }

    #[test]
    fn test_parse_trajectory_accepts_wrapper() {
        let bare = r#"{"actions": [{"Sleep": "8-hour sleep"}], "states": ["s0", "s1"]}"#;
        let wrapped = format!(r#"{{"life_simulation": {}}}"#, bare);

        assert_eq!(parse_trajectory(bare).unwrap(), parse_trajectory(&wrapped).unwrap());
        assert!(parse_trajectory(r#"{"actions": [], "states": []}"#).is_err());
        assert!(parse_trajectory("not json").is_err());
    }
}
