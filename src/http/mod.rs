use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::HatzError;

pub mod reqwest;

/// Enumerates HTTP methods used by the Hatz API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A file sent as one part of a `multipart/form-data` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name, e.g. `file`.
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Request payload. Multipart encoding is left to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    /// Pre-encoded bytes sent with the request's own `Content-Type`.
    Bytes(Vec<u8>),
    /// A single-file `multipart/form-data` form.
    File(FilePart),
}

impl HttpBody {
    /// Raw bytes of a [`HttpBody::Bytes`] payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::File(_) => None,
        }
    }

    /// The file of a [`HttpBody::File`] payload.
    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            Self::File(part) => Some(part),
            Self::Bytes(_) => None,
        }
    }
}

/// Minimal HTTP request representation handed to a [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<HttpBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a body-less GET request.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::get("https://example.com/v1/chat/models");
    /// assert_eq!(request.method, HttpMethod::Get);
    /// assert!(request.body.is_none());
    /// ```
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Builds a POST request with a JSON request body.
    ///
    /// The helper sets the `Content-Type` header to `application/json` and stores the
    /// provided buffer as the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::post(url, "application/json", body)
    }

    /// Builds a POST request carrying `body` with the given content type.
    pub fn post(url: impl Into<String>, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), content_type.into())]),
            body: Some(HttpBody::Bytes(body)),
            timeout: None,
        }
    }

    /// Builds a POST request uploading `part` as `multipart/form-data`.
    ///
    /// No `Content-Type` is set here; the transport adds it together with the boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::{FilePart, HttpRequest};
    ///
    /// let part = FilePart {
    ///     field: "file".into(),
    ///     filename: "notes.txt".into(),
    ///     mime_type: "text/plain".into(),
    ///     data: b"hello".to_vec(),
    /// };
    /// let request = HttpRequest::upload("https://example.com/v1/files/upload", part);
    /// assert_eq!(request.body.as_ref().and_then(|body| body.as_file()).map(|p| p.filename.as_str()), Some("notes.txt"));
    /// assert!(!request.headers.contains_key("Content-Type"));
    /// ```
    pub fn upload(url: impl Into<String>, part: FilePart) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::new(),
            body: Some(HttpBody::File(part)),
            timeout: None,
        }
    }

    /// Adds or replaces a single header.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::HttpRequest;
    ///
    /// let request = HttpRequest::get("https://example.com").with_header("X-API-KEY", "secret");
    /// assert_eq!(request.headers.get("X-API-KEY"), Some(&"secret".to_string()));
    /// ```
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merges `headers` into the request, replacing entries with the same name.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets a per-request timeout. `None` keeps the transport default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Minimal HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns `true` for statuses within `200..=299`.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Fails with [`HatzError::Status`] unless the status is 2xx.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::HttpResponse;
    ///
    /// let response = HttpResponse { status: 403, headers: Default::default(), body: b"forbidden".to_vec() };
    /// let err = response.error_for_status().unwrap_err();
    /// assert_eq!(err.to_string(), "forbidden");
    /// ```
    pub fn error_for_status(self) -> Result<Self, HatzError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HatzError::from_status(self.status, &self.body))
        }
    }

    /// Decodes the body as lossy UTF-8 text.
    ///
    /// # Examples
    ///
    /// ```
    /// use hatz_client::http::HttpResponse;
    ///
    /// let response = HttpResponse { status: 200, headers: Default::default(), body: b"ok".to_vec() };
    /// assert_eq!(response.text(), "ok");
    /// ```
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP response that carries a streaming body.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, HatzError>> + Send>>;

/// Transport abstraction used to decouple the client from the concrete HTTP stack.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    ///
    /// # Examples
    ///
    /// ```
    /// # use async_trait::async_trait;
    /// # use hatz_client::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse};
    /// # use hatz_client::error::HatzError;
    /// # use futures_util::stream;
    /// struct MemoryTransport;
    ///
    /// #[async_trait]
    /// impl HttpTransport for MemoryTransport {
    ///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HatzError> {
    ///         Ok(HttpResponse { status: 200, headers: request.headers, body: b"ok".to_vec() })
    ///     }
    ///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HatzError> {
    ///         Ok(HttpStreamResponse { status: 200, headers: request.headers, body: Box::pin(stream::empty()) })
    ///     }
    /// }
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let response = MemoryTransport
    ///     .send(HttpRequest::get("https://example.com"))
    ///     .await
    ///     .unwrap();
    /// assert_eq!(response.status, 200);
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// Implementations map network failures to [`HatzError::Transport`]. Non-2xx
    /// statuses are returned as ordinary responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HatzError>;

    /// Sends a request and returns the body as a stream of byte chunks.
    ///
    /// # Errors
    ///
    /// Implementations return [`HatzError::Transport`] when no response is received.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HatzError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

pub(crate) fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Serializes `body` to JSON bytes.
///
/// # Errors
///
/// Returns [`HatzError::Validation`] if serialization fails.
pub(crate) fn encode_json<T: Serialize>(body: &T) -> Result<Vec<u8>, HatzError> {
    serde_json::to_vec(body)
        .map_err(|err| HatzError::validation(format!("failed to serialize request: {err}")))
}

/// Drains a streaming body into a single buffer.
pub(crate) async fn collect_body(mut body: HttpBodyStream) -> Result<Vec<u8>, HatzError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}
