//! Program generation and habit categorisation
//!
//! Both calls take a person's free-text description of themselves. One asks
//! for a coaching program per life domain; the other sorts the description's
//! own phrases into the domains, which makes a ready-made initial state.

use crate::collaborator::TextCollaborator;
use crate::config::{GenerationOptions, SimulatorConfig};
use crate::parser::{scan_object, value_text, EscapeHandling};
use crate::prompt::{render, NO_INFORMATION};
use crate::types::{Program, State};
use lifesim_error::{Error, Result};
use lifesim_provider::{LlmProvider, ResponseFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Domains programs and habit profiles are organised by
pub const PROGRAM_DOMAINS: [&str; 11] = [
    "Sleep",
    "Nutrition",
    "Exercise",
    "Smoking",
    "Alcohol",
    "Social relationships",
    "Mental health",
    "Motivation",
    "Hydration",
    "Stress management",
    "Screen time",
];

/// Token allowance for program and habit replies
const PLAN_MAX_TOKENS: usize = 5000;

/// Domain -> action id -> action description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramPlan(BTreeMap<String, BTreeMap<String, String>>);

impl ProgramPlan {
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn actions(&self, domain: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(domain)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Render as the program text a simulation follows
    pub fn to_program(&self) -> Program {
        let text = self
            .0
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(domain, actions)| {
                let steps: Vec<&str> = actions.values().map(String::as_str).collect();
                format!("{}: {}", domain, steps.join(" "))
            })
            .collect::<Vec<_>>()
            .join("\n");
        Program::new(text)
    }

    fn from_object(object: serde_json::Map<String, Value>) -> Self {
        let plan = object
            .into_iter()
            .map(|(domain, value)| {
                let actions = match value {
                    Value::Object(actions) => actions
                        .into_iter()
                        .map(|(id, action)| (id, value_text(action)))
                        .collect(),
                    Value::Null => BTreeMap::new(),
                    other => BTreeMap::from([("action_1".to_string(), value_text(other))]),
                };
                (domain, actions)
            })
            .collect();
        Self(plan)
    }
}

/// Domain -> the person's own words about it, empty when they said nothing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitProfile(BTreeMap<String, String>);

impl HabitProfile {
    pub fn get(&self, domain: &str) -> Option<&str> {
        self.0.get(domain).map(String::as_str)
    }

    /// Render as an initial simulation state, one line per domain
    pub fn to_state(&self) -> State {
        let text = PROGRAM_DOMAINS
            .iter()
            .map(|domain| {
                let habits = self.get(domain).map(str::trim).unwrap_or_default();
                if habits.is_empty() {
                    format!("{}: {}.", domain, NO_INFORMATION)
                } else {
                    format!("{}: {}", domain, habits)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        State::new(text)
    }

    fn from_object(object: serde_json::Map<String, Value>) -> Self {
        let mut profile: BTreeMap<String, String> = PROGRAM_DOMAINS
            .iter()
            .map(|d| (d.to_string(), String::new()))
            .collect();
        for (domain, value) in object {
            let text = match value {
                Value::Null => String::new(),
                other => value_text(other),
            };
            profile.insert(domain, text);
        }
        Self(profile)
    }
}

pub struct ProgramGenerator<P> {
    provider: P,
    config: SimulatorConfig,
}

impl<P: LlmProvider> ProgramGenerator<P> {
    pub fn new(provider: P, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    fn options(&self) -> GenerationOptions {
        GenerationOptions {
            max_output_tokens: PLAN_MAX_TOKENS.max(self.config.generation.max_output_tokens),
            response_format: ResponseFormat::Json,
            ..self.config.generation.clone()
        }
    }

    async fn ask_object(
        &self,
        system_template: &str,
        query: &str,
        op: &'static str,
    ) -> Result<serde_json::Map<String, Value>> {
        if query.trim().is_empty() {
            return Err(Error::invalid_argument("query must not be empty").with_operation(op));
        }

        let categories = PROGRAM_DOMAINS.join(", ");
        let system = render(system_template, &[("categories", &categories)]);
        let collaborator = TextCollaborator::new(
            &self.provider,
            self.options(),
            system,
            self.config.call_timeout(),
        );

        let reply = collaborator.generate(query, op).await?;
        scan_object(&reply, EscapeHandling::StripBackslashes).map_err(|e| e.with_operation(op))
    }

    /// Draft a coaching program from a free-text self description
    pub async fn generate_program(&self, query: &str) -> Result<ProgramPlan> {
        let object = self
            .ask_object(&self.config.templates.program_system, query, "program::generate")
            .await?;
        let plan = ProgramPlan::from_object(object);
        info!(domains = plan.0.len(), "program generated");
        Ok(plan)
    }

    /// Sort the description's own phrases into the life domains
    pub async fn categorize_habits(&self, query: &str) -> Result<HabitProfile> {
        let object = self
            .ask_object(&self.config.templates.habits_system, query, "program::categorize_habits")
            .await?;
        let profile = HabitProfile::from_object(object);
        info!(
            filled = profile.0.values().filter(|v| !v.trim().is_empty()).count(),
            "habits categorised"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use lifesim_error::ErrorKind;
    use lifesim_provider::Role;

    #[tokio::test]
    async fn test_generate_program() {
        let mock = MockProvider::fixed(
            r#"```json
{"Sleep": {"action_1": "Go to bed at 10pm.", "action_2": "No screens after 9pm."},
 "Hydration": {"action_1": "Drink 2 litres of water a day."}}
```"#,
        );
        let generator = ProgramGenerator::new(&mock, SimulatorConfig::default()).unwrap();
        let plan = generator.generate_program("I sleep badly and drink little").await.unwrap();

        assert_eq!(plan.domains().collect::<Vec<_>>(), vec!["Hydration", "Sleep"]);
        assert_eq!(plan.actions("Sleep").unwrap()["action_2"], "No screens after 9pm.");

        let program = plan.to_program();
        assert_eq!(
            program.as_str(),
            "Hydration: Drink 2 litres of water a day.\nSleep: Go to bed at 10pm. No screens after 9pm."
        );

        let request = &mock.calls()[0];
        assert_eq!(request.max_tokens, Some(5000));
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Nutrition"));
        assert_eq!(request.messages[1].content, "I sleep badly and drink little");
    }

    #[tokio::test]
    async fn test_plain_string_domain_becomes_single_action() {
        let mock = MockProvider::fixed(r#"{"Exercise": "Walk 20 minutes a day."}"#);
        let generator = ProgramGenerator::new(&mock, SimulatorConfig::default()).unwrap();
        let plan = generator.generate_program("I never move").await.unwrap();
        assert_eq!(plan.actions("Exercise").unwrap()["action_1"], "Walk 20 minutes a day.");
    }

    #[tokio::test]
    async fn test_categorize_habits_fills_every_domain() {
        let mock = MockProvider::fixed(r#"{"Sleep": "I sleep 5 hours", "Smoking": "", "Alcohol": null}"#);
        let generator = ProgramGenerator::new(&mock, SimulatorConfig::default()).unwrap();
        let profile = generator
            .categorize_habits("I sleep 5 hours and I am stressed")
            .await
            .unwrap();

        assert_eq!(profile.get("Sleep"), Some("I sleep 5 hours"));
        assert_eq!(profile.get("Alcohol"), Some(""));
        assert_eq!(profile.get("Screen time"), Some(""));

        let state = profile.to_state();
        let lines: Vec<&str> = state.as_str().lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Sleep: I sleep 5 hours");
        assert_eq!(lines[1], format!("Nutrition: {}.", NO_INFORMATION));
    }

    #[tokio::test]
    async fn test_unparseable_reply() {
        let mock = MockProvider::fixed("I cannot help with that.");
        let generator = ProgramGenerator::new(&mock, SimulatorConfig::default()).unwrap();
        let err = generator.generate_program("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.operation(), "program::generate");
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_call() {
        let mock = MockProvider::fixed("{}");
        let generator = ProgramGenerator::new(&mock, SimulatorConfig::default()).unwrap();
        let err = generator.categorize_habits("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(mock.call_count(), 0);
    }
}
