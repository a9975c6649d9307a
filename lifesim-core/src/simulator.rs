//! State-evolution simulator
//!
//! Each step makes two collaborator calls: one picks the week's actions from
//! the current state and the program, the other derives the next state from
//! the current state and those actions. A trajectory is strictly sequential.

use crate::collaborator::TextCollaborator;
use crate::config::SimulatorConfig;
use crate::parser::preview;
use crate::prompt::{render, NO_INFORMATION};
use crate::types::{ActionSet, Program, SimulationResult, State, Trajectory};
use lifesim_error::Result;
use lifesim_provider::LlmProvider;
use tracing::{info, warn};

/// Which of the paired trajectories a call belongs to
const PROGRAM_TRAJECTORY: &str = "program";
const BASELINE_TRAJECTORY: &str = "baseline";

pub struct Simulator<P> {
    collaborator: TextCollaborator<P>,
    config: SimulatorConfig,
    category_names: Vec<String>,
}

impl<P: LlmProvider> Simulator<P> {
    pub fn new(provider: P, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let collaborator = TextCollaborator::new(
            provider,
            config.generation.clone(),
            config.templates.system.clone(),
            config.call_timeout(),
        );
        let category_names = config.categories.names().into_iter().map(String::from).collect();
        Ok(Self {
            collaborator,
            config,
            category_names,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        self.collaborator.provider()
    }

    /// Run `time_horizon` steps from `initial_state` under `program`.
    ///
    /// Any failure aborts the run; no partial trajectory is returned.
    pub async fn simulate(
        &self,
        initial_state: State,
        program: &Program,
        time_horizon: usize,
    ) -> Result<Trajectory> {
        self.run(initial_state, program, time_horizon, PROGRAM_TRAJECTORY).await
    }

    /// Run the program trajectory and the baseline trajectory side by side.
    ///
    /// Both start from the same state; the baseline follows the configured
    /// no-op program. Either failure fails the whole call.
    pub async fn simulate_with_baseline(
        &self,
        initial_state: State,
        program: &Program,
        time_horizon: usize,
    ) -> Result<SimulationResult> {
        let baseline = Program::new(self.config.baseline_program.as_str());
        let (program_trajectory, baseline_trajectory) = tokio::try_join!(
            self.run(initial_state.clone(), program, time_horizon, PROGRAM_TRAJECTORY),
            self.run(initial_state, &baseline, time_horizon, BASELINE_TRAJECTORY),
        )?;

        Ok(SimulationResult {
            program_trajectory,
            baseline_trajectory,
        })
    }

    async fn run(
        &self,
        initial_state: State,
        program: &Program,
        time_horizon: usize,
        trajectory: &'static str,
    ) -> Result<Trajectory> {
        let mut result = Trajectory::new(initial_state);

        for step in 0..time_horizon {
            let state = result.final_state().clone();
            let tag = |e: lifesim_error::Error| {
                e.with_context("trajectory", trajectory)
                    .with_context("step", step.to_string())
            };

            let actions = self.choose_actions(&state, program).await.map_err(tag)?;
            let next = self.advance_state(&state, &actions).await.map_err(tag)?;
            info!(trajectory, step = step + 1, of = time_horizon, "step complete");
            result.push(actions, next);
        }

        info!(trajectory, steps = result.steps(), "trajectory complete");
        Ok(result)
    }

    /// Ask the collaborator which actions the person takes this step
    pub async fn choose_actions(&self, state: &State, program: &Program) -> Result<ActionSet> {
        let op = "simulator::choose_actions";
        let categories = self.config.categories.describe();
        let output_format = self.config.parser.format_instruction(&self.category_names);
        let prompt = render(
            &self.config.templates.choose_actions,
            &[
                ("state", state.as_str()),
                ("program", program.as_str()),
                ("categories", &categories),
                ("output_format", &output_format),
            ],
        );

        let reply = self.collaborator.generate(&prompt, op).await?;
        self.config
            .parser
            .parse_actions(&reply, &self.category_names)
            .map_err(|e| {
                warn!(reply = %preview(&reply), error = %e, "could not parse chosen actions");
                e.with_operation(op)
            })
    }

    /// Ask the collaborator for the state that follows `state` under `actions`
    pub async fn advance_state(&self, state: &State, actions: &ActionSet) -> Result<State> {
        let op = "simulator::advance_state";
        let actions_text = actions.to_prompt_text();
        let prompt = render(
            &self.config.templates.advance_state,
            &[
                ("state", state.as_str()),
                ("actions", &actions_text),
                ("no_information", NO_INFORMATION),
            ],
        );

        let reply = self.collaborator.generate(&prompt, op).await?;
        Ok(State::new(reply))
    }
}
