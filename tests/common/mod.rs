#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use hatz_client::error::HatzError;
use hatz_client::http::{
    DynHttpTransport, FilePart, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport,
};

pub const APP_UUID: &str = "9b2f3c44-1d2e-4f5a-8b6c-7d8e9f0a1b2c";

/// Canned reply served by [`MockTransport`].
pub struct MockReply {
    pub status: u16,
    pub chunks: Vec<Result<Vec<u8>, HatzError>>,
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![Ok(body.as_bytes().to_vec())],
        }
    }

    pub fn chunks(status: u16, chunks: Vec<&[u8]>) -> Self {
        Self {
            status,
            chunks: chunks.into_iter().map(|chunk| Ok(chunk.to_vec())).collect(),
        }
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.chunks.push(Err(HatzError::transport(message)));
        self
    }
}

/// In-memory transport that replays queued replies and records every request.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(replies: Vec<MockReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests()
            .pop()
            .expect("at least one request was sent")
    }

    pub fn last_json_body(&self) -> serde_json::Value {
        let body = self.last_request().body.expect("request body");
        let bytes = body.as_bytes().expect("byte request body");
        serde_json::from_slice(bytes).expect("JSON request body")
    }

    pub fn last_file_part(&self) -> FilePart {
        let body = self.last_request().body.expect("request body");
        body.as_file().cloned().expect("multipart file body")
    }

    fn next_reply(&self, request: HttpRequest) -> MockReply {
        self.requests.lock().expect("requests lock").push(request);
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .expect("a queued reply for every request")
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HatzError> {
        let reply = self.next_reply(request);
        let mut body = Vec::new();
        for chunk in reply.chunks {
            body.extend_from_slice(&chunk?);
        }
        Ok(HttpResponse {
            status: reply.status,
            headers: Default::default(),
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HatzError> {
        let reply = self.next_reply(request);
        Ok(HttpStreamResponse {
            status: reply.status,
            headers: Default::default(),
            body: Box::pin(stream::iter(reply.chunks)),
        })
    }
}

/// Routes `tracing` output through the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn dyn_transport(mock: &Arc<MockTransport>) -> DynHttpTransport {
    mock.clone()
}

pub fn app_detail_json(id_field: &str, id: &str) -> String {
    format!(
        r#"{{
            "{id_field}": "{id}",
            "name": "Blog Outline",
            "description": "Outlines a blog post",
            "default_model": "gpt-4o",
            "files": [],
            "constants": [{{
                "object_id": "c-1",
                "variable_name": "voice",
                "display_name": "Voice",
                "description": null,
                "variable_type": "string",
                "value": "friendly"
            }}],
            "user_inputs": [
                {{"position": 2, "required": false, "object_id": "i-2", "description": "", "display_name": "Tone", "variable_name": "tone", "variable_type": "string"}},
                {{"position": 1, "required": true, "object_id": "i-1", "description": "What to write about", "display_name": "Topic", "variable_name": "topic", "variable_type": "paragraph"}}
            ],
            "prompt_sections": [{{"body": "Outline {{{{topic}}}}", "position": 0}}]
        }}"#
    )
}
