//! Notice data models

use super::condition::Condition;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_PRIORITY: i64 = 255;

/// Severity of a notice. Only the three named variants are ever displayed;
/// anything else is kept in storage untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoticeType {
    Error,
    Warning,
    Information,
    Other(String),
}

impl NoticeType {
    pub fn as_str(&self) -> &str {
        match self {
            NoticeType::Error => "error",
            NoticeType::Warning => "warning",
            NoticeType::Information => "information",
            NoticeType::Other(other) => other,
        }
    }

    pub fn is_displayable(&self) -> bool {
        !matches!(self, NoticeType::Other(_))
    }
}

impl From<String> for NoticeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "error" => NoticeType::Error,
            "warning" => NoticeType::Warning,
            "information" => NoticeType::Information,
            _ => NoticeType::Other(value),
        }
    }
}

impl From<&str> for NoticeType {
    fn from(value: &str) -> Self {
        NoticeType::from(value.to_string())
    }
}

impl From<NoticeType> for String {
    fn from(value: NoticeType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for NoticeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(one) => std::slice::from_ref(one),
            OneOrMany::Many(many) => many,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OneOrMany::One(one) => one.is_empty(),
            OneOrMany::Many(many) => many.is_empty(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.as_slice().iter().any(|item| item == value)
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(String::from).collect())
    }
}

/// An icon or image: a URL, a markup snippet, or an explicit source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSpec {
    Markup(String),
    Source {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Conditional {
        condition: Condition,
        #[serde(rename = "true")]
        when_true: String,
        #[serde(rename = "false")]
        when_false: String,
    },
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoticeStyles {
    Inline(String),
    Properties(IndexMap<String, StyleValue>),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoticeButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DismissSpec {
    Markup(String),
    Control {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attr: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavigationSpec {
    Markup(String),
    Menu {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        #[serde(default)]
        items: Vec<NavigationItem>,
    },
}

/// A persisted notice.
///
/// Every field is optional on disk: records written by other tools may lack
/// anything, and the filter engine decides what to do with them. Fields this
/// type does not know about are kept in `extra` and written back unchanged.
///
/// Fields are read leniently. Loosely typed values (`"priority": "10"`,
/// `"dismissible": 1`, `"data": []`) are coerced where the intent is clear
/// and left unset otherwise, so one odd field never hides the whole notice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoticeRecord {
    #[serde(default, deserialize_with = "or_default")]
    pub id: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub notice_type: Option<NoticeType>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_priority",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<i64>,
    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub dismissible: bool,
    #[serde(
        default,
        deserialize_with = "string_or_false",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_false",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub page: Option<OneOrMany>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_exclude: Option<OneOrMany>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub capability: Option<OneOrMany>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<String>,

    // Presentation
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<ImageSpec>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<ImageSpec>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub class: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title_class: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title_tag: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub wrap_class: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub wrap_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub buttons: Vec<NoticeButton>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub buttons_wrap_start: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub buttons_wrap_end: Option<String>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub styles: Option<NoticeStyles>,
    #[serde(
        default,
        deserialize_with = "lenient_data",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub data: IndexMap<String, String>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub dismiss: Option<DismissSpec>,
    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub nav: bool,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub navigation: Option<NavigationSpec>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl NoticeRecord {
    /// Starts a set of fields for `NoticeStore::add` carrying a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Starts a set of fields for `NoticeStore::add` carrying a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn is_displayable(&self) -> bool {
        self.notice_type
            .as_ref()
            .is_some_and(NoticeType::is_displayable)
    }

    /// The capability gating this notice, if any. Only the first listed
    /// capability is ever checked.
    pub fn required_capability(&self) -> Option<&str> {
        self.capability
            .as_ref()
            .filter(|capability| !capability.is_empty())
            .and_then(OneOrMany::first)
    }

    pub(crate) fn has_text(&self) -> bool {
        let non_empty = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        non_empty(&self.title) || non_empty(&self.message)
    }

    /// Fills every unset default field, the way a freshly added notice is
    /// persisted.
    pub(crate) fn apply_defaults(&mut self, id: &str, notice_type: NoticeType) {
        self.id = id.to_string();
        self.notice_type.get_or_insert(notice_type);
        self.message.get_or_insert_with(String::new);
        self.title.get_or_insert_with(String::new);
        self.icon
            .get_or_insert_with(|| ImageSpec::Markup(String::new()));
        self.class.get_or_insert_with(String::new);
        self.priority.get_or_insert(DEFAULT_PRIORITY);
    }
}

/// Accepts a date string, `false`, or null. Empty strings count as unset.
/// Any other value is kept as text, which no date parser accepts, so the
/// notice stays hidden instead of ignoring its window.
fn string_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Falls back to `T::default()` when the stored value has the wrong shape.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn lenient_type<'de, D>(deserializer: D) -> Result<Option<NoticeType>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(NoticeType::from(s)),
        _ => None,
    })
}

/// Integers, floats (truncated) and numeric strings.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    })
}

/// Loose truthiness: `""`, `"0"`, `0`, `false`, null and empty containers
/// are false.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

/// A string or a list of strings. Scalars inside a list are taken as text
/// and anything else in it is dropped.
fn lenient_list<'de, D>(deserializer: D) -> Result<Option<OneOrMany>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(OneOrMany::Many(
            items.into_iter().filter_map(scalar_text).collect(),
        )),
        Value::Object(map) => Some(OneOrMany::Many(
            map.into_iter().filter_map(|(_, v)| scalar_text(v)).collect(),
        )),
        other => scalar_text(other).map(OneOrMany::One),
    })
}

/// Data attributes. An empty list stands for an empty map.
fn lenient_data<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| scalar_text(v).map(|v| (k, v)))
            .collect(),
        _ => IndexMap::new(),
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
