//! Trajectory summaries
//!
//! Turns a sequence of actions and states into a short first-person recap.

use crate::collaborator::TextCollaborator;
use crate::config::SimulatorConfig;
use crate::prompt::{render, Tone};
use crate::types::{ActionSet, SimulationResult, State, Trajectory};
use lifesim_error::{Error, Result};
use lifesim_provider::LlmProvider;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One recap per trajectory of a paired simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedSummary {
    pub program: String,
    pub baseline: String,
}

pub struct Summarizer<P> {
    collaborator: TextCollaborator<P>,
    config: SimulatorConfig,
}

impl<P: LlmProvider> Summarizer<P> {
    pub fn new(provider: P, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let collaborator = TextCollaborator::new(
            provider,
            config.generation.clone(),
            config.templates.system.clone(),
            config.call_timeout(),
        );
        Ok(Self {
            collaborator,
            config,
        })
    }

    /// Summarize in at most the configured number of sentences
    pub async fn summarize(&self, actions: &[ActionSet], states: &[State], tone: Tone) -> Result<String> {
        let op = "summarizer::summarize";
        let actions_text = serde_json::to_string(actions).map_err(|e| {
            Error::serialization_failed(format!("failed to encode actions: {}", e))
                .with_operation(op)
                .set_source(e)
        })?;
        let states_text = serde_json::to_string(states).map_err(|e| {
            Error::serialization_failed(format!("failed to encode states: {}", e))
                .with_operation(op)
                .set_source(e)
        })?;
        let max_sentences = self.config.summary_sentences.to_string();

        let prompt = render(
            &self.config.templates.summarize,
            &[
                ("actions", &actions_text),
                ("states", &states_text),
                ("max_sentences", &max_sentences),
                ("tone", self.config.templates.tone_instruction(tone)),
            ],
        );

        let summary = self.collaborator.generate(&prompt, op).await?;
        info!(%tone, chars = summary.len(), "summary ready");
        Ok(summary)
    }

    pub async fn summarize_trajectory(&self, trajectory: &Trajectory, tone: Tone) -> Result<String> {
        self.summarize(trajectory.actions(), trajectory.states(), tone).await
    }

    /// Motivational recap of the program run, resigned recap of the baseline
    pub async fn summarize_result(&self, result: &SimulationResult) -> Result<PairedSummary> {
        let (program, baseline) = tokio::try_join!(
            self.summarize_trajectory(&result.program_trajectory, Tone::Motivational),
            self.summarize_trajectory(&result.baseline_trajectory, Tone::Resigned),
        )?;
        Ok(PairedSummary { program, baseline })
    }
}
