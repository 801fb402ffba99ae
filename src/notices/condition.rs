//! Declarative conditions attached to notice fields.

use crate::option_store::OptionStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// What a condition looks at. Unrecognized keys are kept so they survive a
/// round trip, and always evaluate to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKey {
    Screen,
    Option,
    Other(String),
}

impl From<String> for ConditionKey {
    fn from(value: String) -> Self {
        match value.as_str() {
            "screen" => ConditionKey::Screen,
            "option" => ConditionKey::Option,
            _ => ConditionKey::Other(value),
        }
    }
}

impl From<ConditionKey> for String {
    fn from(value: ConditionKey) -> Self {
        match value {
            ConditionKey::Screen => "screen".to_string(),
            ConditionKey::Option => "option".to_string(),
            ConditionKey::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Comparison {
    Identical,
    NotIdentical,
    Other(String),
}

impl From<String> for Comparison {
    fn from(value: String) -> Self {
        match value.as_str() {
            "===" => Comparison::Identical,
            "!==" => Comparison::NotIdentical,
            _ => Comparison::Other(value),
        }
    }
}

impl From<Comparison> for String {
    fn from(value: Comparison) -> Self {
        match value {
            Comparison::Identical => "===".to_string(),
            Comparison::NotIdentical => "!==".to_string(),
            Comparison::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: ConditionKey,
    pub compare: Comparison,
    #[serde(default)]
    pub value: Value,
    /// Option name, for `option` conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Condition {
    pub fn screen(compare: Comparison, screen: &str) -> Self {
        Self {
            key: ConditionKey::Screen,
            compare,
            value: Value::String(screen.to_string()),
            name: None,
        }
    }

    pub fn option(name: &str, compare: Comparison, value: Value) -> Self {
        Self {
            key: ConditionKey::Option,
            compare,
            value,
            name: Some(name.to_string()),
        }
    }
}

/// Evaluates conditions against the screen being viewed and the stored
/// options. Never mutates anything.
pub struct ConditionEvaluator<'a> {
    current_screen: &'a str,
    options: &'a dyn OptionStore,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(current_screen: &'a str, options: &'a dyn OptionStore) -> Self {
        Self {
            current_screen,
            options,
        }
    }

    pub fn current_screen(&self) -> &str {
        self.current_screen
    }

    pub fn evaluate(&self, condition: &Condition) -> bool {
        match condition.key {
            ConditionKey::Screen => {
                let screen = Value::String(self.current_screen.to_string());
                compare(&condition.compare, &condition.value, Some(&screen))
            }
            ConditionKey::Option => {
                let stored = condition
                    .name
                    .as_deref()
                    .and_then(|name| self.read_option(name))
                    .map(Value::String);
                compare(&condition.compare, &condition.value, stored.as_ref())
            }
            ConditionKey::Other(_) => false,
        }
    }

    /// Whether the current screen is exactly `screen`.
    pub fn is_screen(&self, screen: &str) -> bool {
        self.evaluate(&Condition::screen(Comparison::Identical, screen))
    }

    fn read_option(&self, name: &str) -> Option<String> {
        match self.options.get_option(name) {
            Ok(value) => value,
            Err(err) => {
                warn!("Failed to read option {} for condition: {}", name, err);
                None
            }
        }
    }
}

/// Strict comparison. A missing actual value never equals anything.
fn compare(comparison: &Comparison, expected: &Value, actual: Option<&Value>) -> bool {
    let identical = actual.is_some_and(|actual| actual == expected);
    match comparison {
        Comparison::Identical => identical,
        Comparison::NotIdentical => !identical,
        Comparison::Other(_) => false,
    }
}
