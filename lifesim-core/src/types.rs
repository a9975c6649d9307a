//! Simulation data model: states, programs, action sets and trajectories

use crate::parser::value_text;
use lifesim_error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Natural-language snapshot of a person's habits and health at one step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(String);

impl State {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for State {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for State {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Natural-language habit-change plan, constant over one trajectory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program(String);

impl Program {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Program {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Program {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Category name -> chosen action for one step.
///
/// Keeps categories in the order they were given or returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ActionSet(Map<String, Value>);

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.0.get(category).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
    }

    /// Compact JSON object, the form embedded in prompts
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

// Non-string actions are kept as their JSON text
impl From<Map<String, Value>> for ActionSet {
    fn from(object: Map<String, Value>) -> Self {
        object.into_iter().map(|(k, v)| (k, value_text(v))).collect()
    }
}

impl From<ActionSet> for Map<String, Value> {
    fn from(actions: ActionSet) -> Self {
        actions.0
    }
}

impl FromIterator<(String, String)> for ActionSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ActionSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// States and the actions between them.
///
/// Always holds exactly one more state than action sets: `states[i + 1]`
/// follows from `states[i]` under `actions[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    actions: Vec<ActionSet>,
    states: Vec<State>,
}

#[derive(Deserialize)]
struct RawTrajectory {
    actions: Vec<ActionSet>,
    states: Vec<State>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = Error;

    fn try_from(raw: RawTrajectory) -> Result<Self> {
        Self::from_parts(raw.actions, raw.states)
    }
}

impl Trajectory {
    /// A trajectory that has not moved yet
    pub fn new(initial_state: State) -> Self {
        Self {
            actions: Vec::new(),
            states: vec![initial_state],
        }
    }

    /// Rebuild from separate sequences, checking the length invariant
    pub fn from_parts(actions: Vec<ActionSet>, states: Vec<State>) -> Result<Self> {
        if states.len() != actions.len() + 1 {
            return Err(Error::invalid_argument(format!(
                "trajectory needs one more state than action sets, got {} states and {} action sets",
                states.len(),
                actions.len()
            ))
            .with_operation("trajectory::from_parts"));
        }
        Ok(Self { actions, states })
    }

    /// Record one step
    pub fn push(&mut self, actions: ActionSet, next_state: State) {
        self.actions.push(actions);
        self.states.push(next_state);
    }

    pub fn actions(&self) -> &[ActionSet] {
        &self.actions
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn initial_state(&self) -> &State {
        &self.states[0]
    }

    pub fn final_state(&self) -> &State {
        &self.states[self.states.len() - 1]
    }

    /// Number of steps taken
    pub fn steps(&self) -> usize {
        self.actions.len()
    }
}

/// Paired treatment/control trajectories from the same initial state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Followed the recommended program
    #[serde(alias = "program")]
    pub program_trajectory: Trajectory,
    /// Kept doing what they were already doing
    #[serde(alias = "habits")]
    pub baseline_trajectory: Trajectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifesim_error::ErrorKind;

    #[test]
    fn test_new_trajectory_has_only_initial_state() {
        let t = Trajectory::new(State::new("s0"));
        assert_eq!(t.states().len(), 1);
        assert_eq!(t.steps(), 0);
        assert_eq!(t.initial_state(), t.final_state());
    }

    #[test]
    fn test_push_keeps_invariant() {
        let mut t = Trajectory::new("s0".into());
        t.push(ActionSet::from([("Sleep", "8-hour sleep")]), "s1".into());
        t.push(ActionSet::from([("Sleep", "7-hour sleep")]), "s2".into());

        assert_eq!(t.states().len(), t.actions().len() + 1);
        assert_eq!(t.final_state().as_str(), "s2");
        assert_eq!(t.actions()[1].get("Sleep"), Some("7-hour sleep"));
    }

    #[test]
    fn test_deserialize_rejects_broken_invariant() {
        let ok: Trajectory = serde_json::from_value(serde_json::json!({
            "actions": [{ "Diet": "healthy diet" }],
            "states": ["before", "after"]
        }))
        .unwrap();
        assert_eq!(ok.steps(), 1);

        let bad = serde_json::from_value::<Trajectory>(serde_json::json!({
            "actions": [],
            "states": []
        }));
        assert!(bad.is_err());

        let err = Trajectory::from_parts(vec![ActionSet::new()], vec!["only".into()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_serialized_shape() {
        let mut t = Trajectory::new("s0".into());
        t.push(ActionSet::from([("Exercise", "do nothing")]), "s1".into());

        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["states"], serde_json::json!(["s0", "s1"]));
        assert_eq!(value["actions"][0]["Exercise"], "do nothing");
    }

    #[test]
    fn test_result_accepts_legacy_keys() {
        let result: SimulationResult = serde_json::from_value(serde_json::json!({
            "program": { "actions": [], "states": ["s0"] },
            "habits": { "actions": [], "states": ["s0"] }
        }))
        .unwrap();
        assert_eq!(result.program_trajectory, result.baseline_trajectory);
    }

    #[test]
    fn test_action_set_prompt_text() {
        let actions = ActionSet::from([("Sleep", "8-hour sleep"), ("Diet", "healthy diet")]);
        assert_eq!(actions.to_prompt_text(), r#"{"Sleep":"8-hour sleep","Diet":"healthy diet"}"#);
        let order: Vec<&str> = actions.iter().map(|(k, _)| k).collect();
        assert_eq!(order, ["Sleep", "Diet"]);
    }

    #[test]
    fn test_action_set_deserialize_keeps_reply_order() {
        let actions: ActionSet =
            serde_json::from_str(r#"{"Work":"no overtime","Exercise":3,"Alcohol":"none"}"#).unwrap();
        let order: Vec<&str> = actions.iter().map(|(k, _)| k).collect();
        assert_eq!(order, ["Work", "Exercise", "Alcohol"]);
        assert_eq!(actions.get("Exercise"), Some("3"));
        assert_eq!(
            serde_json::to_string(&actions).unwrap(),
            r#"{"Work":"no overtime","Exercise":"3","Alcohol":"none"}"#
        );
    }
}
