//! Prompt templates and rendering
//!
//! Templates are plain data with `{name}` placeholders. Rendering is a single
//! left-to-right pass: substituted values are never scanned again, and braces
//! that do not name a known placeholder (JSON examples, for instance) are
//! copied through untouched.

use lifesim_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Answer the model gives for a category it knows nothing about
pub const NO_INFORMATION: &str = "I do not have any information on that category";

/// Phrasing requested for a trajectory recap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Proud of the progress made
    Motivational,
    /// Disappointed that nothing changed
    Resigned,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Motivational => "motivational",
            Tone::Resigned => "resigned",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motivational" => Ok(Tone::Motivational),
            "resigned" => Ok(Tone::Resigned),
            other => Err(Error::invalid_argument(format!(
                "unknown tone '{}', expected motivational or resigned",
                other
            ))),
        }
    }
}

/// Every prompt the core sends, as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// System instruction for simulation and summary calls
    pub system: String,
    /// Placeholders: `{state}`, `{program}`, `{categories}`, `{output_format}`
    pub choose_actions: String,
    /// Placeholders: `{state}`, `{actions}`
    pub advance_state: String,
    /// Placeholders: `{actions}`, `{states}`, `{max_sentences}`, `{tone}`
    pub summarize: String,
    pub tone_motivational: String,
    pub tone_resigned: String,
    /// System instruction for program generation. Placeholder: `{categories}`
    pub program_system: String,
    /// System instruction for habit categorisation. Placeholder: `{categories}`
    pub habits_system: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant that can answer questions and help with tasks."
                .into(),
            choose_actions: "I present you someone's state that describes their health state and habits: {state}. \
They received those recommendations from their personal coach: {program}. \
This is an ideal program, which means that they might not be able to respect each step of it; \
it depends on their motivation, their objectives and everything else you can find in their state. \
Your goal is to find the realistic actions that they are going to take during the next week, \
based on their current state and the program they are given. \
Do not pick the optimal actions but the most realistic ones given their characteristics. \
The actions are split into the following categories: {categories}. \
For each category, you must choose 1 and only 1 action, the most probable one according to you. \
{output_format}"
                .into(),
            advance_state: "I present you someone's state that describes the health state and habits \
they had at the beginning of the week: {state}. \
During this week, they took the following actions, grouped by category: {actions}. \
These actions are all they did during this week; do not assume that they did anything else. \
Your goal is to determine their state at the end of the week, taking into account their \
characteristics and the actions they have taken. \
Turning an action into a habit takes time, so their state cannot change drastically in a week. \
If a category contains '{no_information}', ignore it and do not invent anything for it. \
Output the new state as plain text, detailed and precise but as concise as possible."
                .into(),
            summarize: "I present you a series of actions that a person took during the past few weeks: {actions}. \
The first actions correspond to the first week and the last ones to the past week. \
I also present you the series of states they went through during those weeks: {states}. \
Your goal is to summarize what they did and what they have been through during those weeks. \
The summary must not exceed {max_sentences} sentences. {tone} \
You must use the first person. Output only the summary."
                .into(),
            tone_motivational: "The summary should have a motivational tone, because they feel \
proud of what they accomplished and the progress they made."
                .into(),
            tone_resigned: "The summary should have a disappointed, resigned tone, because they \
did not make any progress and feel sad about it."
                .into(),
            program_system: "You are an empathetic and supportive coach who helps users improve \
their life habits. From the user's unstructured description of their habits, feelings or concerns, \
create a personalized program of concise, realistic and specific actions. \
Only consider the domains relevant to the user among: {categories}. \
Use a warm and encouraging tone, do not give medical diagnoses, and gently suggest professional \
help when it seems necessary. \
Answer with a JSON object mapping each relevant domain to an object of actions, for example \
{\"Sleep\": {\"action_1\": \"Go to bed at the same time every day.\"}}."
                .into(),
            habits_system: "You analyze a user's unstructured description of their life habits. \
Extract the sentences or phrases relevant to each of these categories: {categories}. \
Keep the user's exact words, do not paraphrase, interpret or comment. \
A phrase relevant to several categories goes in each of them. \
Answer with a JSON object that has every category as a key and the extracted text as value, \
using an empty string when nothing relates to a category."
                .into(),
        }
    }
}

impl PromptTemplates {
    pub fn tone_instruction(&self, tone: Tone) -> &str {
        match tone {
            Tone::Motivational => &self.tone_motivational,
            Tone::Resigned => &self.tone_resigned,
        }
    }

    /// Check that every template still carries the placeholders its callers fill
    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str, &[&str]); 3] = [
            ("choose_actions", &self.choose_actions, &["state", "program"]),
            ("advance_state", &self.advance_state, &["state", "actions"]),
            ("summarize", &self.summarize, &["actions", "states"]),
        ];

        for (name, template, keys) in required {
            for key in keys {
                if !template.contains(&format!("{{{}}}", key)) {
                    return Err(Error::config_invalid(format!(
                        "template '{}' is missing the {{{}}} placeholder",
                        name, key
                    ))
                    .with_operation("prompt::validate")
                    .with_context("template", name));
                }
            }
        }
        Ok(())
    }
}

/// Substitute `{key}` placeholders in one pass.
///
/// Unknown keys and unbalanced braces are copied literally.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            let is_name = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !is_name {
                return None;
            }
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
