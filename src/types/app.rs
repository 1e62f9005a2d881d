//! App Builder payloads.
//!
//! Different backend versions name the App identifier differently, so decoding an
//! [`App`] walks [`APP_ID_FIELDS`] in order and falls back to a generated placeholder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field names tried, in order, when resolving an App identifier.
pub const APP_ID_FIELDS: [&str; 3] = ["id", "app_id", "uuid"];

const PLACEHOLDER_PREFIX: &str = "missing-id-";

/// A server-defined, parameterized prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawApp")]
pub struct App {
    /// Resolved identifier; see [`App::is_queryable`].
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_model: Option<String>,
    pub files: Vec<AppFile>,
    pub constants: Option<Vec<AppConstant>>,
    pub user_inputs: Vec<UserInput>,
    pub prompt_sections: Vec<PromptSection>,
}

impl App {
    /// Only Apps whose identifier is a real UUID can be queried.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::types::App;
    ///
    /// let app: App = serde_json::from_str(r#"{"name":"Summarizer"}"#).unwrap();
    /// assert!(app.id.starts_with("missing-id-"));
    /// assert!(!app.is_queryable());
    /// ```
    pub fn is_queryable(&self) -> bool {
        is_valid_uuid(&self.id)
    }

    /// Whether the identifier was generated locally because none was sent.
    pub fn has_placeholder_id(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Accepts only the canonical hyphenated 36-character UUID form.
pub fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

#[derive(Deserialize)]
struct RawApp {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_model: Option<String>,
    #[serde(default)]
    files: Option<Vec<AppFile>>,
    #[serde(default)]
    constants: Option<Vec<AppConstant>>,
    #[serde(default)]
    user_inputs: Option<Vec<UserInput>>,
    #[serde(default)]
    prompt_sections: Option<Vec<PromptSection>>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawApp> for App {
    fn from(raw: RawApp) -> Self {
        Self {
            id: resolve_app_id(&raw.rest),
            name: raw.name,
            description: raw.description,
            default_model: raw.default_model,
            files: raw.files.unwrap_or_default(),
            constants: raw.constants,
            user_inputs: raw.user_inputs.unwrap_or_default(),
            prompt_sections: raw.prompt_sections.unwrap_or_default(),
        }
    }
}

/// Picks the first string-valued field from [`APP_ID_FIELDS`], or generates a
/// `missing-id-{uuid}` placeholder that differs on every call.
pub(crate) fn resolve_app_id(fields: &Map<String, Value>) -> String {
    APP_ID_FIELDS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4()))
}

/// A file bound into an App.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppFile {
    pub size: u64,
    pub module: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
    pub file_key: String,
    pub file_type: String,
    pub object_id: String,
    #[serde(default)]
    pub description: String,
    pub display_name: String,
    pub variable_name: String,
    pub variable_type: String,
}

/// A fixed value bound into an App.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppConstant {
    pub object_id: String,
    pub variable_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub variable_type: String,
    pub value: String,
}

/// An input the user fills in before running an App.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInput {
    /// Presentation order, ascending.
    pub position: i64,
    pub required: bool,
    pub object_id: String,
    #[serde(default)]
    pub description: String,
    pub display_name: String,
    /// Key under which the value is sent in `inputs`.
    pub variable_name: String,
    pub variable_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptSection {
    pub body: String,
    pub position: i64,
}

/// Body of `POST /v1/app/{id}/query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppQueryRequest {
    pub inputs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_uuids: Option<Vec<String>>,
}

impl AppQueryRequest {
    /// Builds a non-streaming query; an empty `file_uuids` list is omitted.
    pub fn new(
        inputs: BTreeMap<String, String>,
        model: Option<String>,
        file_uuids: Vec<String>,
    ) -> Self {
        Self {
            inputs,
            model,
            stream: false,
            file_uuids: (!file_uuids.is_empty()).then_some(file_uuids),
        }
    }
}
