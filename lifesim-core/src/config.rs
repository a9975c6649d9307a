//! Simulator configuration
//!
//! Everything the simulator would otherwise hard-code lives here: sampling
//! options, the category catalogue, the parser policy, the baseline program
//! and the prompt templates. A config file is JSON and every field is
//! optional.

use crate::parser::ActionParser;
use crate::prompt::{PromptTemplates, NO_INFORMATION};
use lifesim_error::{Error, Result};
use lifesim_provider::ResponseFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Program followed by the control trajectory
pub const BASELINE_PROGRAM: &str = "Keep doing exactly what you are doing.";

/// Domains a free-choice simulation works over
pub const LIFE_DOMAINS: [&str; 11] = [
    "Sleep",
    "Diet",
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

/// Sampling options sent with every collaborator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Provider default when unset
    pub model: Option<String>,
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub response_format: ResponseFormat,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_output_tokens: 512,
            temperature: 0.3,
            top_p: 0.95,
            response_format: ResponseFormat::Text,
        }
    }
}

/// One action category, optionally restricted to a fixed list of choices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl Category {
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            choices: Vec::new(),
        }
    }

    pub fn fixed<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        !self.choices.is_empty()
    }
}

/// Ordered category catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet(Vec<Category>);

impl CategorySet {
    pub fn new(categories: Vec<Category>) -> Self {
        Self(categories)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    /// Category list as embedded in the choose-actions prompt
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .map(|c| {
                if c.is_fixed() {
                    format!("{} (one of: {})", c.name, c.choices.join("; "))
                } else {
                    format!(
                        "{} (free text, or '{}' when the state says nothing about it)",
                        c.name, NO_INFORMATION
                    )
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self(LIFE_DOMAINS.iter().map(|name| Category::open(*name)).collect())
    }
}

/// Full simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub generation: GenerationOptions,
    /// Upper bound on each collaborator call; unbounded when unset
    pub call_timeout_secs: Option<f64>,
    pub parser: ActionParser,
    pub categories: CategorySet,
    pub baseline_program: String,
    pub templates: PromptTemplates,
    pub summary_sentences: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::free_choice()
    }
}

impl SimulatorConfig {
    /// Open-ended actions over every life domain, read back as a JSON object
    pub fn free_choice() -> Self {
        Self {
            generation: GenerationOptions::default(),
            call_timeout_secs: None,
            parser: ActionParser::default(),
            categories: CategorySet::default(),
            baseline_program: BASELINE_PROGRAM.into(),
            templates: PromptTemplates::default(),
            summary_sentences: 3,
        }
    }

    /// A small catalogue of fixed choices, read back as a comma-separated list
    pub fn fixed_choice() -> Self {
        let categories = CategorySet::new(vec![
            Category::fixed(
                "Sleep",
                [
                    "More than 8 hours on average",
                    "7 to 8 hours on average",
                    "5 to 7 hours on average",
                    "Less than 5 hours on average",
                ],
            ),
            Category::fixed(
                "Diet",
                [
                    "Balanced diet on average",
                    "High-protein diet on average",
                    "High-carb diet on average",
                    "High-fat diet on average",
                    "Vegetarian diet on average",
                    "Vegan diet on average",
                ],
            ),
            Category::fixed(
                "Number of Workouts",
                [
                    "More than 3 times a week",
                    "2 to 3 times a week",
                    "1 time a week",
                    "No workout",
                ],
            ),
            Category::fixed(
                "Duration of Workout",
                [
                    "More than 2 hours",
                    "1 to 2 hours",
                    "30 to 60 minutes",
                    "Less than 30 minutes",
                    "No workout",
                ],
            ),
            Category::fixed(
                "Smoking",
                [
                    "No smoking at all",
                    "1 cigarette a week",
                    "1 cigarette a day",
                    "More than 5 cigarettes a day",
                ],
            ),
        ]);

        Self {
            parser: ActionParser::PositionalSplit,
            categories,
            ..Self::free_choice()
        }
    }

    /// Load a JSON config file. Missing fields take free-choice defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::from_file")
                .with_context("path", path.display().to_string())
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::config_invalid(format!("invalid simulator config: {}", e))
                .with_operation("config::from_file")
                .with_context("path", path.display().to_string())
                .set_source(e)
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulator cannot run with
    pub fn validate(&self) -> Result<()> {
        let op = "config::validate";
        if self.categories.is_empty() {
            return Err(Error::config_invalid("at least one action category is required").with_operation(op));
        }
        if self.baseline_program.trim().is_empty() {
            return Err(Error::config_invalid("baseline program must not be empty").with_operation(op));
        }
        if self.summary_sentences == 0 {
            return Err(Error::config_invalid("summary_sentences must be at least 1").with_operation(op));
        }
        if self.generation.max_output_tokens == 0 {
            return Err(Error::config_invalid("max_output_tokens must be at least 1").with_operation(op));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::config_invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.generation.temperature
            ))
            .with_operation(op));
        }
        if !(self.generation.top_p > 0.0 && self.generation.top_p <= 1.0) {
            return Err(Error::config_invalid(format!(
                "top_p {} is outside (0.0, 1.0]",
                self.generation.top_p
            ))
            .with_operation(op));
        }
        if let Some(secs) = self.call_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(Error::config_invalid(format!("call timeout {} is not a positive number of seconds", secs))
                    .with_operation(op));
            }
        }
        self.templates.validate()
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifesim_error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_free_choice_defaults() {
        let config = SimulatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.categories.len(), 11);
        assert_eq!(config.generation.max_output_tokens, 512);
        assert_eq!(config.generation.temperature, 0.3);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.baseline_program, BASELINE_PROGRAM);
        assert!(config.call_timeout().is_none());
    }

    #[test]
    fn test_fixed_choice_profile() {
        let config = SimulatorConfig::fixed_choice();
        config.validate().unwrap();
        assert_eq!(config.parser, ActionParser::PositionalSplit);
        assert_eq!(config.categories.names()[2], "Number of Workouts");
        assert!(config.categories.iter().all(Category::is_fixed));

        let described = config.categories.describe();
        assert!(described.contains("Smoking (one of: No smoking at all;"));
    }

    #[test]
    fn test_open_categories_mention_missing_information() {
        let described = CategorySet::new(vec![Category::open("Hydration")]).describe();
        assert!(described.starts_with("Hydration (free text"));
        assert!(described.contains(NO_INFORMATION));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "generation": {{ "model": "gemini-1.5-flash", "temperature": 0.7 }},
                "call_timeout_secs": 2.5,
                "parser": {{ "policy": "structured_scan", "escapes": "preserve" }},
                "categories": [{{ "name": "Sleep" }}, {{ "name": "Smoking", "choices": ["none", "some"] }}]
            }}"#
        )
        .unwrap();

        let config = SimulatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.generation.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.generation.temperature, 0.7);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.call_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.categories.names(), vec!["Sleep", "Smoking"]);
        assert_eq!(config.summary_sentences, 3);
    }

    #[test]
    fn test_invalid_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = SimulatorConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "categories": [] }}"#).unwrap();
        let err = SimulatorConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = SimulatorConfig::from_file("/nonexistent/lifesim.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimulatorConfig::default();
        config.call_timeout_secs = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.generation.top_p = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.summary_sentences = 0;
        assert!(config.validate().is_err());
    }
}
