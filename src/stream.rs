use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::Deserialize;
use tracing::debug;

use crate::error::HatzError;
use crate::http::HttpBodyStream;

/// Marker line that ends a streamed completion successfully.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &[u8] = b"data:";

/// Event produced by [`LineDecoder`] for one complete line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to hand to the token callback.
    Token(String),
    /// The `[DONE]` sentinel was seen; nothing follows.
    Done,
}

#[derive(Deserialize)]
struct StreamingChunk {
    #[allow(dead_code)]
    r#type: String,
    message: String,
}

/// Incremental decoder for newline-delimited, optionally `data:`-prefixed chunks.
///
/// Bytes are buffered raw and only decoded once a full line is available, so a
/// multi-byte code point split across two reads is never seen half-way. Feeding the
/// same bytes in any chunking yields the same events.
///
/// # Examples
///
/// ```
/// use hatz_client::stream::{LineDecoder, StreamEvent};
///
/// let mut decoder = LineDecoder::new();
/// assert!(decoder.feed(b"data: {\"type\":\"token\",\"mess").is_empty());
/// let events = decoder.feed(b"age\":\"hi\"}\ndata: [DONE]\n");
/// assert_eq!(events, vec![StreamEvent::Token("hi".into()), StreamEvent::Done]);
/// assert!(decoder.is_done());
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel was seen or [`LineDecoder::finish`] was called.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Appends `chunk` and returns the events for every line it completed.
    ///
    /// Decoding stops at the `[DONE]` sentinel; anything after it, in this chunk or
    /// later ones, is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(line) = self.next_line() {
            match decode_line(&line) {
                Some(StreamEvent::Done) => {
                    self.done = true;
                    self.buffer.clear();
                    events.push(StreamEvent::Done);
                    break;
                }
                Some(event) => events.push(event),
                None => {}
            }
        }
        events
    }

    /// Marks the end of the byte stream.
    ///
    /// A trailing fragment without a line terminator is discarded.
    pub fn finish(&mut self) {
        if !self.done && !self.buffer.is_empty() {
            debug!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing stream line"
            );
        }
        self.buffer.clear();
        self.done = true;
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

/// Decodes one line with its terminator already removed.
///
/// Returns `None` for lines that carry nothing (empty after prefix stripping).
///
/// # Examples
///
/// ```
/// use hatz_client::stream::{decode_line, StreamEvent};
///
/// assert_eq!(decode_line(b"plain text chunk"), Some(StreamEvent::Token("plain text chunk".into())));
/// assert_eq!(decode_line(b"data: [DONE]"), Some(StreamEvent::Done));
/// assert_eq!(decode_line(b"data:"), None);
/// ```
pub fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    if payload.is_empty() {
        return None;
    }
    let cleaned = String::from_utf8_lossy(payload);
    if cleaned.trim() == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<StreamingChunk>(&cleaned) {
        Ok(chunk) => Some(StreamEvent::Token(chunk.message)),
        // The service occasionally emits bare text lines.
        Err(_) => Some(StreamEvent::Token(cleaned.into_owned())),
    }
}

/// Cooperative cancellation handle shared between a caller and a running stream.
///
/// # Examples
///
/// ```
/// use hatz_client::stream::CancelFlag;
///
/// let flag = CancelFlag::new();
/// let handle = flag.clone();
/// handle.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stream of decoded tokens read from a streaming completion body.
///
/// Ends on the `[DONE]` sentinel, on the end of the body, or once the attached
/// [`CancelFlag`] is set. The flag is checked before every poll, so a cancelled stream
/// stops without reading another chunk. Transport errors are yielded once and end the
/// stream.
pub struct TokenStream {
    body: HttpBodyStream,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    cancel: Option<CancelFlag>,
    finished: bool,
}

impl TokenStream {
    pub fn new(body: HttpBodyStream) -> Self {
        Self {
            body,
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            cancel: None,
            finished: false,
        }
    }

    /// Attaches a cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    fn absorb(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            match event {
                StreamEvent::Token(token) => self.pending.push_back(token),
                StreamEvent::Done => debug!("stream reached [DONE] sentinel"),
            }
        }
    }
}

impl Stream for TokenStream {
    type Item = Result<String, HatzError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.is_cancelled() {
            if !this.finished {
                debug!("stream cancelled by caller");
                this.finished = true;
                this.pending.clear();
            }
            return Poll::Ready(None);
        }

        loop {
            if let Some(token) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(token)));
            }
            if this.finished || this.decoder.is_done() {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let events = this.decoder.feed(&bytes);
                    this.absorb(events);
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    this.pending.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.decoder.finish();
                    this.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
