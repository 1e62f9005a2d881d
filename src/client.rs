use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{DEFAULT_API_KEY_HEADER, DEFAULT_BASE_URL};
use crate::error::HatzError;
use crate::http::{
    DynHttpTransport, FilePart, HttpRequest, HttpResponse, HttpStreamResponse, collect_body,
    encode_json, is_success,
};
use crate::stream::{CancelFlag, TokenStream};
use crate::types::{
    App, AppQueryRequest, ChatCompletionRequest, CompletionResponse, ListResponse, Model,
    RemoteFile, UploadedFile, is_valid_uuid,
};

/// Hatz API 客户端
///
/// Every call sends the API key header and `Accept: application/json`, treats any
/// status outside `200..=299` as [`HatzError::Status`], and decodes the body into the
/// expected shape. Nothing is retried.
#[derive(Clone)]
pub struct HatzClient {
    transport: DynHttpTransport,
    base_url: String,
    api_key: String,
    api_key_header: String,
    timeout: Option<Duration>,
}

impl fmt::Debug for HatzClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HatzClient")
            .field("base_url", &self.base_url)
            .field("api_key_header", &self.api_key_header)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HatzClient {
    /// 创建带默认 base_url 的客户端
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            timeout: None,
        }
    }

    /// 自定义 base_url
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 自定义鉴权 header
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }

    /// 设置请求超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Joins `path` onto the base URL, adding `/v1` unless the base already ends in it.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/{path}")
        } else {
            format!("{base}/v1/{path}")
        }
    }

    /// URL of an App resource. `app_id` is percent-encoded as one path segment, so
    /// ids taken from fallback fields cannot change the path.
    ///
    /// # Errors
    ///
    /// Returns [`HatzError::InvalidConfig`] when the base URL does not parse.
    pub fn app_endpoint(&self, app_id: &str, action: Option<&str>) -> Result<String, HatzError> {
        let invalid = |reason: String| HatzError::InvalidConfig {
            field: "base_url".to_string(),
            reason,
        };
        let mut url = Url::parse(&self.endpoint("app")).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be used as a base".to_string()))?
            .push(app_id)
            .extend(action);
        Ok(url.into())
    }

    /// Lists the models available to the account.
    pub async fn fetch_models(&self) -> Result<Vec<Model>, HatzError> {
        let list: ListResponse<Model> = self.get_json(self.endpoint("chat/models")).await?;
        debug!(count = list.data.len(), "fetched models");
        Ok(list.data)
    }

    /// Lists files previously uploaded to the account.
    pub async fn list_files(&self) -> Result<Vec<RemoteFile>, HatzError> {
        let list: ListResponse<RemoteFile> = self.get_json(self.endpoint("files/")).await?;
        debug!(count = list.data.len(), "listed files");
        Ok(list.data)
    }

    /// Uploads `data` as the multipart field `file`.
    ///
    /// The response body is returned verbatim together with the first UUID found in
    /// it, since the service does not always answer with structured JSON.
    pub async fn upload_file(
        &self,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<UploadedFile, HatzError> {
        debug!(filename, mime_type, bytes = data.len(), "uploading file");
        let part = FilePart {
            field: "file".to_string(),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            data,
        };
        let response = self
            .send(HttpRequest::upload(self.endpoint("files/upload"), part))
            .await?;
        let uploaded = UploadedFile::from_body(response.text());
        if uploaded.file_uuid.is_none() {
            debug!("upload response carried no UUID");
        }
        Ok(uploaded)
    }

    /// Runs a chat completion.
    ///
    /// Without streaming the first choice's content is returned and `on_token` is not
    /// called. With streaming every decoded token goes to `on_token` and the result is
    /// an empty string once the stream ends, reaches `[DONE]`, or `cancel` is set.
    ///
    /// # Errors
    ///
    /// Fails on transport errors (including mid-stream ones), non-2xx statuses, and
    /// undecodable non-streaming bodies. No partial text is returned on error.
    pub async fn chat_complete<F>(
        &self,
        request: ChatCompletionRequest,
        mut on_token: F,
        cancel: Option<&CancelFlag>,
    ) -> Result<String, HatzError>
    where
        F: FnMut(&str),
    {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            files = request.file_uuids.len(),
            stream = request.stream,
            "chat completion"
        );
        if !request.stream {
            let response: CompletionResponse = self
                .post_json(self.endpoint("chat/completions"), &request)
                .await?;
            return Ok(response.into_first_content());
        }

        let mut tokens = self.stream_chat(request).await?;
        if let Some(cancel) = cancel {
            tokens = tokens.with_cancel(cancel.clone());
        }
        while let Some(token) = tokens.next().await {
            let token = token?;
            on_token(token.as_str());
        }
        Ok(String::new())
    }

    /// Starts a streaming chat completion and returns the decoded tokens as a stream.
    ///
    /// `request.stream` is forced to `true`. A non-2xx status is reported here, after
    /// draining the body, before any token is produced.
    pub async fn stream_chat(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<TokenStream, HatzError> {
        let request = request.with_stream(true);
        let payload = encode_json(&request)?;
        let http = self.request(HttpRequest::post_json(
            self.endpoint("chat/completions"),
            payload,
        ));
        let response: HttpStreamResponse = self.transport.send_stream(http).await?;
        if !is_success(response.status) {
            let status = response.status;
            let body = collect_body(response.body).await.unwrap_or_else(|err| {
                debug!(error = %err, "failed to drain error body");
                Vec::new()
            });
            warn!(status, "streaming chat completion rejected");
            return Err(HatzError::from_status(status, &body));
        }
        Ok(TokenStream::new(response.body))
    }

    /// Lists the Apps visible to the account.
    pub async fn fetch_apps(&self) -> Result<Vec<App>, HatzError> {
        let list: ListResponse<App> = self.get_json(self.endpoint("app/list")).await?;
        let placeholders = list.data.iter().filter(|app| app.has_placeholder_id()).count();
        debug!(count = list.data.len(), placeholders, "fetched apps");
        Ok(list.data)
    }

    /// Fetches a single App with its full input and prompt definitions.
    pub async fn fetch_app(&self, app_id: &str) -> Result<App, HatzError> {
        let url = self.app_endpoint(app_id, None)?;
        self.get_json(url).await
    }

    /// Runs an App and returns the first choice's content.
    ///
    /// # Errors
    ///
    /// Returns [`HatzError::Validation`] without sending anything when `app_id` is not
    /// a UUID.
    pub async fn query_app(
        &self,
        app_id: &str,
        model: Option<&str>,
        inputs: BTreeMap<String, String>,
        file_uuids: Vec<String>,
    ) -> Result<String, HatzError> {
        if !is_valid_uuid(app_id) {
            return Err(HatzError::validation(format!(
                "App {app_id} has no valid UUID and cannot be queried"
            )));
        }
        let body = AppQueryRequest::new(inputs, model.map(str::to_string), file_uuids);
        debug!(app_id, model = ?body.model, inputs = body.inputs.len(), "querying app");
        let url = self.app_endpoint(app_id, Some("query"))?;
        let response: CompletionResponse = self.post_json(url, &body).await?;
        Ok(response.into_first_content())
    }

    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (self.api_key_header.clone(), self.api_key.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_headers(self.headers())
            .with_timeout(self.timeout)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HatzError> {
        let response = self.transport.send(self.request(request)).await?;
        if !response.is_success() {
            warn!(status = response.status, "request rejected");
        }
        response.error_for_status()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, HatzError> {
        let response = self.send(HttpRequest::get(url)).await?;
        Self::parse(&response)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, HatzError> {
        let payload = encode_json(body)?;
        let response = self.send(HttpRequest::post_json(url, payload)).await?;
        Self::parse(&response)
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, HatzError> {
        serde_json::from_slice(&response.body).map_err(|err| HatzError::decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::reqwest::default_dyn_transport;

    fn client(base_url: &str) -> HatzClient {
        HatzClient::new(default_dyn_transport().expect("transport"), "key").with_base_url(base_url)
    }

    #[test]
    fn endpoint_adds_version_prefix_once() {
        assert_eq!(
            client("https://ai.hatz.ai").endpoint("chat/models"),
            "https://ai.hatz.ai/v1/chat/models"
        );
        assert_eq!(
            client("https://ai.hatz.ai/v1/").endpoint("/app/list"),
            "https://ai.hatz.ai/v1/app/list"
        );
        assert_eq!(
            client("http://localhost:8080").endpoint("files/"),
            "http://localhost:8080/v1/files/"
        );
    }

    #[test]
    fn app_endpoint_escapes_the_id_as_one_segment() {
        let client = client("https://ai.hatz.ai");
        assert_eq!(
            client.app_endpoint("legacy 7", None).expect("url"),
            "https://ai.hatz.ai/v1/app/legacy%207"
        );
        assert_eq!(
            client
                .app_endpoint("9b2f3c44-1d2e-4f5a-8b6c-7d8e9f0a1b2c", Some("query"))
                .expect("url"),
            "https://ai.hatz.ai/v1/app/9b2f3c44-1d2e-4f5a-8b6c-7d8e9f0a1b2c/query"
        );
        let tricky = client.app_endpoint("a/../b?x#y", None).expect("url");
        assert!(tricky.starts_with("https://ai.hatz.ai/v1/app/a%2F..%2Fb%3Fx%23y"), "{tricky}");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = HatzClient::new(default_dyn_transport().expect("transport"), "sk-secret");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret"), "{rendered}");
    }

    #[test]
    fn headers_carry_key_and_accept() {
        let headers = client("https://ai.hatz.ai")
            .with_api_key_header("X-Custom-Key")
            .headers();
        assert_eq!(headers.get("X-Custom-Key"), Some(&"key".to_string()));
        assert_eq!(headers.get("Accept"), Some(&"application/json".to_string()));
    }
}
