//! The named-output mapping every strategy returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix marking a key whose string value is one agent's raw output.
pub const OUTPUT_SUFFIX: &str = "_output";

/// Named outputs of one strategy run, in insertion order.
///
/// Keys ending in `_output` with a string value are agent outputs; the rest
/// are strategy-specific counters and lists (`rounds`, `candidates`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyOutput(Map<String, Value>);

impl StrategyOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert any JSON-convertible value, replacing an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`StrategyOutput::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, `None` when missing or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(name, text)` for every `<name>_output` key holding a string.
    pub fn agent_outputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(key, value)| {
            let name = key.strip_suffix(OUTPUT_SUFFIX)?;
            Some((name, value.as_str()?))
        })
    }

    /// The `strategy` key, if set.
    pub fn strategy_name(&self) -> Option<&str> {
        self.get_str("strategy")
    }

    /// String list stored under `key`; non-string items are skipped.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StrategyOutput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_outputs_skip_non_strings() {
        let out = StrategyOutput::new()
            .with("build_output", "fn main() {}")
            .with("rounds", 2)
            .with("bogus_output", json!(["not", "text"]))
            .with("strategy", "adversarial");

        let outputs: Vec<_> = out.agent_outputs().collect();
        assert_eq!(outputs, vec![("build", "fn main() {}")]);
        assert_eq!(out.strategy_name(), Some("adversarial"));
        assert_eq!(out.get_u64("rounds"), Some(2));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let out = StrategyOutput::new()
            .with("zeta_output", "z")
            .with("alpha_output", "a")
            .with("strategy", "pipeline");
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["zeta_output", "alpha_output", "strategy"]);
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.find("zeta_output") < json.find("alpha_output"));
    }

    #[test]
    fn test_serialises_as_plain_object() {
        let out = StrategyOutput::new().with("dispatch_output", "ok");
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value, json!({"dispatch_output": "ok"}));
    }

    #[test]
    fn test_str_list() {
        let out = StrategyOutput::new().with("candidates", json!(["a", 1, "b"]));
        assert_eq!(out.get_str_list("candidates"), vec!["a", "b"]);
        assert!(out.get_str_list("missing").is_empty());
    }
}
