//! Per-user session state: the active client, cached models and Apps, and the
//! running conversation.
//!
//! A session starts inactive until an API key is set and is torn down again when the
//! key is cleared. Nothing is persisted.

use std::fmt;

use tracing::{debug, info};

use crate::apps::{AppForm, preselect_model};
use crate::client::HatzClient;
use crate::config::{ClientConfig, build_client};
use crate::error::HatzError;
use crate::http::DynHttpTransport;
use crate::stream::CancelFlag;
use crate::types::{App, ChatCompletionRequest, ChatMessage, Conversation, Model};

/// An App detail ready for input: the App, its form, and the preselected model.
#[derive(Debug, Clone)]
pub struct LoadedApp {
    pub app: App,
    pub form: AppForm,
    pub model: String,
}

/// Explicit context object passed to whatever needs the API.
pub struct Session {
    config: ClientConfig,
    transport: DynHttpTransport,
    client: Option<HatzClient>,
    models: Vec<Model>,
    apps: Vec<App>,
    conversation: Conversation,
    last_used_model: Option<String>,
    last_error: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("models", &self.models.len())
            .field("apps", &self.apps.len())
            .field("turns", &self.conversation.len())
            .field("last_used_model", &self.last_used_model)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session from `config`; a blank `api_key` leaves it inactive.
    ///
    /// # Errors
    ///
    /// Returns [`HatzError::InvalidConfig`] when a key is present but the rest of the
    /// configuration is invalid.
    pub fn new(config: ClientConfig, transport: DynHttpTransport) -> Result<Self, HatzError> {
        let api_key = config.api_key.clone();
        let mut session = Self {
            config,
            transport,
            client: None,
            models: Vec::new(),
            apps: Vec::new(),
            conversation: Conversation::new(),
            last_used_model: None,
            last_error: None,
        };
        session.set_api_key(&api_key)?;
        Ok(session)
    }

    /// Activates the session with `api_key`, or tears it down when the key is blank.
    ///
    /// Setting a key always starts from a clean slate: cached models, Apps and the
    /// conversation belong to the previous key.
    pub fn set_api_key(&mut self, api_key: &str) -> Result<(), HatzError> {
        let api_key = api_key.trim();
        self.teardown();
        if api_key.is_empty() {
            info!("session deactivated");
            return Ok(());
        }
        self.config.api_key = api_key.to_string();
        self.client = Some(build_client(&self.config, self.transport.clone())?);
        info!("session activated");
        Ok(())
    }

    fn teardown(&mut self) {
        self.config.api_key.clear();
        self.client = None;
        self.models.clear();
        self.apps.clear();
        self.conversation.clear();
        self.last_error = None;
    }

    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    /// The active client.
    ///
    /// # Errors
    ///
    /// Returns [`HatzError::MissingApiKey`] when the session is inactive.
    pub fn client(&self) -> Result<&HatzClient, HatzError> {
        self.client.as_ref().ok_or(HatzError::MissingApiKey)
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn last_used_model(&self) -> Option<&str> {
        self.last_used_model.as_deref()
    }

    /// Message of the most recent failed operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Clears the message history.
    pub fn new_conversation(&mut self) {
        self.conversation.clear();
    }

    /// Reloads the model list.
    pub async fn refresh_models(&mut self) -> Result<&[Model], HatzError> {
        let result = self.active_client()?.fetch_models().await;
        self.models = self.record(result)?;
        Ok(&self.models)
    }

    /// Reloads the App list.
    pub async fn refresh_apps(&mut self) -> Result<&[App], HatzError> {
        let result = self.active_client()?.fetch_apps().await;
        self.apps = self.record(result)?;
        Ok(&self.apps)
    }

    /// Fetches an App's detail and prepares its input form.
    ///
    /// Values already typed into `previous` survive for inputs the App still has.
    pub async fn load_app(
        &mut self,
        app_id: &str,
        previous: Option<&AppForm>,
    ) -> Result<LoadedApp, HatzError> {
        let result = self.active_client()?.fetch_app(app_id).await;
        let app = self.record(result)?;
        let form = AppForm::for_app(&app, previous);
        let model = preselect_model(
            app.default_model.as_deref(),
            self.last_used_model.as_deref(),
            &self.models,
        );
        Ok(LoadedApp { app, form, model })
    }

    /// Sends `prompt` as the next user turn and appends the assistant's reply.
    ///
    /// The whole conversation goes out with the request. With streaming, tokens reach
    /// `on_token` as they arrive and the reply is their concatenation, including a
    /// partial reply when `cancel` fires. On failure the user turn is taken back out
    /// of the conversation.
    pub async fn send_message<F>(
        &mut self,
        model: &str,
        prompt: &str,
        file_uuids: Vec<String>,
        stream: bool,
        mut on_token: F,
        cancel: Option<&CancelFlag>,
    ) -> Result<String, HatzError>
    where
        F: FnMut(&str),
    {
        let client = self.active_client()?;
        self.conversation.push(ChatMessage::user(prompt));
        let request = ChatCompletionRequest::new(model, self.conversation.messages().to_vec())
            .with_stream(stream)
            .with_file_uuids(file_uuids);

        let mut streamed = String::new();
        let result = client
            .chat_complete(
                request,
                |token| {
                    streamed.push_str(token);
                    on_token(token);
                },
                cancel,
            )
            .await;

        match self.record(result) {
            Ok(text) => {
                let reply = if stream { streamed } else { text };
                self.conversation.push(ChatMessage::assistant(reply.clone()));
                self.last_used_model = Some(model.to_string());
                debug!(turns = self.conversation.len(), "conversation updated");
                Ok(reply)
            }
            Err(err) => {
                self.conversation.pop_last();
                Err(err)
            }
        }
    }

    /// Runs `app` with the values in `form`.
    ///
    /// Queryability and required inputs are checked locally first; those failures are
    /// validation errors and no request is sent.
    pub async fn run_app(
        &mut self,
        app: &App,
        model: &str,
        form: &AppForm,
        file_uuids: Vec<String>,
    ) -> Result<String, HatzError> {
        let client = self.active_client()?;
        let checked = if app.is_queryable() {
            form.validate(app)
        } else {
            Err(HatzError::validation(
                "This App is missing a valid UUID, so it cannot be queried.",
            ))
        };
        self.record(checked)?;
        let result = client
            .query_app(&app.id, Some(model), form.values().clone(), file_uuids)
            .await;
        let text = self.record(result)?;
        self.last_used_model = Some(model.to_string());
        Ok(text)
    }

    // Like `client`, but a missing key also lands in `last_error`.
    fn active_client(&mut self) -> Result<HatzClient, HatzError> {
        let client = self.client.clone().ok_or(HatzError::MissingApiKey);
        self.record(client)
    }

    fn record<T>(&mut self, result: Result<T, HatzError>) -> Result<T, HatzError> {
        if let Err(err) = &result {
            self.last_error = Some(err.to_string());
        }
        result
    }
}
