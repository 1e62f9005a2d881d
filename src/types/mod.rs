//! Typed payloads exchanged with the Hatz API.
//!
//! Request types serialize to the exact wire shape the service expects; response
//! types are lenient where the service has been seen to vary.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod app;

pub use app::{
    APP_ID_FIELDS, App, AppConstant, AppFile, AppQueryRequest, PromptSection, UserInput,
    is_valid_uuid,
};

/// Chat role string as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn user() -> Self {
        Self("user".to_string())
    }

    pub fn assistant() -> Self {
        Self("assistant".to_string())
    }
}

/// A model the account may use, as listed by `GET /v1/chat/models`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    /// Unique key passed back as `model` in requests.
    pub name: String,
    pub developer: String,
    pub display_name: String,
    pub max_tokens: u64,
    /// Whether the model accepts image input.
    pub vision: bool,
}

/// A file previously uploaded to the account.
///
/// The listing schema is not fixed, so only commonly seen fields are typed and every
/// field is also kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    #[serde(default, alias = "file_uuid")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "filename", alias = "file_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, alias = "mime_type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl RemoteFile {
    /// Identifier usable in `file_uuids`, preferring `uuid` over `id`.
    pub fn reference(&self) -> Option<&str> {
        self.uuid.as_deref().or(self.id.as_deref())
    }
}

/// `{ "data": [...] }` envelope used by the listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub(crate) data: Vec<T>,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::user(), content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::assistant(), content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::system(), content)
    }
}

/// Session-scoped message history. Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Removes and returns the most recent message.
    pub fn pop_last(&mut self) -> Option<ChatMessage> {
        self.messages.pop()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Body of `POST /v1/chat/completions`.
///
/// # Examples
///
/// ```
/// use hatz_client::types::{ChatCompletionRequest, ChatMessage};
///
/// let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")])
///     .with_stream(true);
/// let body = serde_json::to_value(&request).unwrap();
/// assert_eq!(body["auto_tool_selection"], true);
/// assert_eq!(body["file_uuids"], serde_json::json!([]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub auto_tool_selection: bool,
    pub file_uuids: Vec<String>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            auto_tool_selection: true,
            file_uuids: Vec::new(),
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_file_uuids(mut self, file_uuids: Vec<String>) -> Self {
        self.file_uuids = file_uuids;
        self
    }
}

/// Non-streaming completion body shared by chat completions and App queries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionMessage {
    pub content: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice, or an empty string when there is none.
    pub fn into_first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("static UUID pattern compiles")
});

/// Result of `POST /v1/files/upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Response body as returned, whether or not it is JSON.
    pub raw: String,
    /// First UUID-shaped token found in `raw`.
    pub file_uuid: Option<String>,
}

impl UploadedFile {
    /// Wraps a raw upload response and extracts the file UUID from it.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::types::UploadedFile;
    ///
    /// let uploaded = UploadedFile::from_body(r#"{"file":{"uuid":"3F2504E0-4F89-11D3-9A0C-0305E82C3301"}}"#);
    /// assert_eq!(uploaded.file_uuid.as_deref(), Some("3F2504E0-4F89-11D3-9A0C-0305E82C3301"));
    /// ```
    pub fn from_body(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let file_uuid = first_uuid(&raw);
        Self { raw, file_uuid }
    }
}

/// Returns the first UUID-shaped token in `text`, matched case-insensitively.
pub fn first_uuid(text: &str) -> Option<String> {
    UUID_PATTERN.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_list_decodes() {
        let body = r#"{"data":[{"name":"gpt-4o","developer":"openai","display_name":"GPT-4o","max_tokens":128000,"vision":true}]}"#;
        let parsed: ListResponse<Model> = serde_json::from_str(body).expect("models");
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].name, "gpt-4o");
        assert!(parsed.data[0].vision);
    }

    #[test]
    fn remote_file_keeps_unknown_fields() {
        let file: RemoteFile = serde_json::from_value(json!({
            "file_uuid": "0b7c1d1e-2f3a-4b5c-8d9e-0f1a2b3c4d5e",
            "filename": "report.pdf",
            "owner": "me"
        }))
        .expect("file");
        assert_eq!(file.reference(), Some("0b7c1d1e-2f3a-4b5c-8d9e-0f1a2b3c4d5e"));
        assert_eq!(file.name.as_deref(), Some("report.pdf"));
        assert_eq!(file.extra.get("owner"), Some(&json!("me")));
    }

    #[test]
    fn chat_request_serializes_wire_shape() {
        let request = ChatCompletionRequest::new(
            "gpt-4o",
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        )
        .with_file_uuids(vec!["f-1".to_string()]);
        let value = serde_json::to_value(&request).expect("json");
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": false,
                "auto_tool_selection": true,
                "file_uuids": ["f-1"]
            })
        );
    }

    #[test]
    fn completion_first_content_defaults_to_empty() {
        let empty: CompletionResponse =
            serde_json::from_str(r#"{"choices":[],"model":"m"}"#).expect("json");
        assert_eq!(empty.into_first_content(), "");

        let full: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"one","role":"assistant"}},{"message":{"content":"two","role":"assistant"}}]}"#,
        )
        .expect("json");
        assert_eq!(full.into_first_content(), "one");
    }

    #[test]
    fn uuid_extraction_handles_plain_text_bodies() {
        let uploaded = UploadedFile::from_body("stored as 6fa459ea-ee8a-3ca4-894e-db77e160355e ok");
        assert_eq!(
            uploaded.file_uuid.as_deref(),
            Some("6fa459ea-ee8a-3ca4-894e-db77e160355e")
        );
        assert_eq!(UploadedFile::from_body("no id here").file_uuid, None);
        assert_eq!(first_uuid("x6fa459ea-ee8a-3ca4-894e-db77e160355e"), None);
    }

    #[test]
    fn conversation_accumulates_and_clears() {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("hi"));
        conversation.push(ChatMessage::assistant("hello"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[1].role, Role::assistant());
        conversation.clear();
        assert!(conversation.is_empty());
    }
}
