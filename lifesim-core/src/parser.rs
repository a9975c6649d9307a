//! Action extraction from free model text
//!
//! Two policies exist. The structured scan takes the outermost `{...}` span
//! and decodes it as a JSON object. The positional split treats the reply as
//! a comma-separated list whose fields line up with the category order.

use crate::types::ActionSet;
use lifesim_error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How backslashes inside a scanned span are treated before decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeHandling {
    /// Drop every `\` before decoding. Escaped quotes inside values break.
    #[default]
    StripBackslashes,
    /// Decode standard JSON escapes
    Preserve,
}

/// Parsing policy for the choose-actions reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ActionParser {
    StructuredScan {
        #[serde(default)]
        escapes: EscapeHandling,
    },
    PositionalSplit,
}

impl Default for ActionParser {
    fn default() -> Self {
        Self::StructuredScan {
            escapes: EscapeHandling::default(),
        }
    }
}

impl ActionParser {
    /// Turn a raw reply into one action per category
    pub fn parse_actions<S: AsRef<str>>(&self, raw: &str, categories: &[S]) -> Result<ActionSet> {
        match self {
            Self::StructuredScan { escapes } => scan_object(raw, *escapes)
                .map(|object| {
                    object
                        .into_iter()
                        .map(|(k, v)| (k, value_text(v)))
                        .collect()
                })
                .map_err(|e| e.with_operation("parser::structured_scan")),
            Self::PositionalSplit => split_positional(raw, categories)
                .map_err(|e| e.with_operation("parser::positional_split")),
        }
    }

    /// Sentence appended to the choose-actions prompt describing the answer shape
    pub fn format_instruction<S: AsRef<str>>(&self, categories: &[S]) -> String {
        match self {
            Self::StructuredScan { .. } => {
                let example: serde_json::Map<String, Value> = categories
                    .iter()
                    .map(|c| (c.as_ref().to_string(), Value::String("action".into())))
                    .collect();
                format!(
                    "Answer with a JSON object that has each category as a key and the chosen action as value, \
for example {}. Do not add anything else.",
                    Value::Object(example)
                )
            }
            Self::PositionalSplit => {
                let names: Vec<&str> = categories.iter().map(AsRef::as_ref).collect();
                format!(
                    "Answer with the chosen actions only, separated by commas, in this order: {}. \
Do not add anything else.",
                    names.join(", ")
                )
            }
        }
    }
}

/// The span from the first `{` to the last `}`, inclusive
pub fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Decode the outermost braced span of `raw` as a JSON object
pub(crate) fn scan_object(
    raw: &str,
    escapes: EscapeHandling,
) -> Result<serde_json::Map<String, Value>> {
    let span = extract_braced(raw).ok_or_else(|| {
        Error::parse_failed("no balanced delimiter found").with_context("preview", preview(raw))
    })?;

    let decoded: serde_json::Map<String, Value> = match escapes {
        EscapeHandling::StripBackslashes => serde_json::from_str(&span.replace('\\', "")),
        EscapeHandling::Preserve => serde_json::from_str(span),
    }
    .map_err(|e| {
        Error::parse_failed(format!("malformed object: {}", e))
            .with_context("preview", preview(span))
            .set_source(e)
    })?;

    Ok(decoded)
}

fn split_positional<S: AsRef<str>>(raw: &str, categories: &[S]) -> Result<ActionSet> {
    let flattened: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let fields: Vec<&str> = flattened.split(',').map(str::trim).collect();

    if fields.len() < categories.len() {
        return Err(Error::parse_failed(format!(
            "expected {} comma-separated fields, found {}",
            categories.len(),
            fields.len()
        ))
        .with_context("preview", preview(raw)));
    }

    Ok(categories
        .iter()
        .zip(fields)
        .map(|(category, field)| (category.as_ref().to_string(), field.to_string()))
        .collect())
}

pub(crate) fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// First characters of a reply, for error context and logs
pub(crate) fn preview(text: &str) -> String {
    const MAX: usize = 80;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
