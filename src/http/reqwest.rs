use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

use crate::error::HatzError;

use super::{
    DynHttpTransport, FilePart, HttpBody, HttpBodyStream, HttpMethod, HttpRequest, HttpResponse,
    HttpStreamResponse, HttpTransport,
};

/// 基于 reqwest 的默认 HttpTransport
///
/// Byte bodies are sent as-is; [`HttpBody::File`] becomes a `reqwest` multipart form,
/// which also sets the `Content-Type` boundary.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 使用自定义 reqwest::Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 创建默认配置
    pub fn default_client() -> Result<Self, HatzError> {
        Client::builder()
            .build()
            .map(Self::new)
            .map_err(|err| HatzError::transport(format!("failed to create reqwest client: {err}")))
    }

    fn prepare(&self, request: HttpRequest) -> Result<RequestBuilder, HatzError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        let method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        debug!(method = %method, url = %url, "dispatching request");

        let mut builder = self.client.request(method, &url).headers(header_map(headers)?);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder = match body {
            Some(HttpBody::Bytes(bytes)) => builder.body(bytes),
            Some(HttpBody::File(part)) => builder.multipart(file_form(part)?),
            None => builder,
        };
        Ok(builder)
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<Response, HatzError> {
        self.prepare(request)?
            .send()
            .await
            .map_err(|err| HatzError::transport(err.to_string()))
    }
}

fn header_map(headers: HashMap<String, String>) -> Result<HeaderMap, HatzError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| HatzError::transport(format!("invalid header name {name:?}: {err}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|err| HatzError::transport(format!("invalid value for header {name}: {err}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn file_form(part: FilePart) -> Result<Form, HatzError> {
    debug!(
        field = %part.field,
        filename = %part.filename,
        bytes = part.data.len(),
        "encoding multipart upload"
    );
    let file = Part::bytes(part.data)
        .file_name(part.filename)
        .mime_str(&part.mime_type)
        .map_err(|err| {
            HatzError::validation(format!("invalid MIME type {:?}: {err}", part.mime_type))
        })?;
    Ok(Form::new().part(part.field, file))
}

// Non-ASCII header values are dropped rather than failing the response.
fn response_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HatzError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let headers = response_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| HatzError::transport(format!("failed to read response body: {err}")))?
            .to_vec();
        debug!(status, bytes = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HatzError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let headers = response_headers(response.headers());
        debug!(status, "streaming response started");
        let body: HttpBodyStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| HatzError::transport(format!("stream interrupted: {err}")))
        }));
        Ok(HttpStreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// 便捷构造线程安全 Transport
pub fn default_dyn_transport() -> Result<DynHttpTransport, HatzError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}
