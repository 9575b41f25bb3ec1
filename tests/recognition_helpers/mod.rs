//! Shared test helpers: a scripted transport and canned provider replies.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use vision_relay_lib::llm::transport::{RawRequest, RawResponse, Transport, TransportError};
use vision_relay_lib::llm::types::ImageInput;

type Responder = dyn Fn(&RawRequest, usize) -> Result<RawResponse, TransportError> + Send + Sync;

/// Transport double. Records every request and answers through a closure
/// that sees the request and its zero-based index.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<RawRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&RawRequest, usize) -> Result<RawResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same status and body for every request.
    pub fn always(status: u16, body: impl Into<String>) -> Arc<Self> {
        let body = body.into();
        Self::new(move |_, _| Ok(RawResponse::new(status, body.clone())))
    }

    pub fn requests(&self) -> Vec<RawRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(&request, index)
    }
}

/// Serialized request body, for substring checks on the prompt.
pub fn body_text(request: &RawRequest) -> String {
    request
        .body
        .as_ref()
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub fn is_taxonomy_call(request: &RawRequest) -> bool {
    body_text(request).contains("Classify the main content")
}

pub fn is_confidence_call(request: &RawRequest) -> bool {
    body_text(request).contains("How confident are you")
}

pub fn gemini_reply(text: &str) -> String {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] }, "finishReason": "STOP" }
        ],
        "modelVersion": "gemini-2.0-flash"
    })
    .to_string()
}

pub fn openai_reply(text: &str) -> String {
    json!({
        "model": "gpt-4o-mini",
        "choices": [
            { "message": { "role": "assistant", "content": text }, "finish_reason": "stop" }
        ]
    })
    .to_string()
}

pub fn ok(body: String) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(200, body))
}

pub fn status(code: u16, message: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(
        code,
        json!({ "error": { "message": message } }).to_string(),
    ))
}

/// Small PNG-tagged image of `len` bytes.
pub fn png_image(len: usize) -> ImageInput {
    ImageInput::from_bytes(vec![7u8; len])
        .with_mime_type("image/png")
        .with_source_name("sample.png")
}

pub const RECEIPT_TEXT: &str = "CORNER MARKET\n2024-03-15\nApples 3.50\nBread 2.25\nTotal 5.75";

pub const TABLE_TEXT: &str = "| Item | Qty |\n|---|---|\n| Pens | 4 |\n| Ink | 2 |";
