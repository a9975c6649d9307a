//! # lifesim-core
//!
//! Simulates how a person's habits evolve week by week under a coaching
//! program, using a text model for every judgement.
//!
//! ## Pieces
//! - **Simulator**: the step loop, two model calls per step, and the paired
//!   program/baseline run
//! - **Parser**: turns the model's action choice into an `ActionSet`
//! - **Summarizer**: first-person recap of a trajectory in a chosen tone
//! - **ProgramGenerator**: drafts programs and habit profiles from a free-text
//!   self description
//!
//! ## Example
//!
//! ```rust,ignore
//! use lifesim_core::{Simulator, SimulatorConfig};
//! use lifesim_provider::{AnyProvider, ProviderConfig, ProviderType};
//!
//! let provider = AnyProvider::new(ProviderConfig::from_env(ProviderType::Gemini)?)?;
//! let simulator = Simulator::new(provider, SimulatorConfig::free_choice())?;
//! let result = simulator
//!     .simulate_with_baseline("I sleep 5 hours a night".into(), &"Sleep 8 hours".into(), 4)
//!     .await?;
//! ```

pub mod collaborator;
pub mod config;
pub mod parser;
pub mod program;
pub mod prompt;
pub mod simulator;
pub mod summarizer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborator::TextCollaborator;
pub use config::{Category, CategorySet, GenerationOptions, SimulatorConfig, BASELINE_PROGRAM};
pub use parser::{extract_braced, ActionParser, EscapeHandling};
pub use program::{HabitProfile, ProgramGenerator, ProgramPlan};
pub use prompt::{render, PromptTemplates, Tone};
pub use simulator::Simulator;
pub use summarizer::{PairedSummary, Summarizer};
pub use types::{ActionSet, Program, SimulationResult, State, Trajectory};

pub use lifesim_error::{Error, ErrorKind, Result};
