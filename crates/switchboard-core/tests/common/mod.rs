//! Scripted in-memory transport for exercising clients without a network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{StreamExt, stream};
use http::{HeaderMap, Method, Request, Response, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;
use switchboard_core::http_client::{self, ByteStream, HttpClientExt};
use switchboard_core::json_utils::DecodeMode;
use switchboard_core::providers::gemini;

/// What the transport answers to the next request.
pub enum Scripted {
    /// A buffered body. Non-2xx statuses are reported the way real transports report them.
    Body(StatusCode, String),
    /// An event stream made of these `data:` payloads.
    Events(Vec<String>),
    /// An event stream repeating one payload forever. The flag is set once the body is dropped.
    Endless(String, Arc<AtomicBool>),
}

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Default)]
struct State {
    script: VecDeque<Scripted>,
    requests: Vec<Recorded>,
}

#[derive(Clone, Default)]
pub struct MockHttp {
    state: Arc<Mutex<State>>,
}

impl MockHttp {
    pub fn push(&self, scripted: Scripted) -> &Self {
        self.state.lock().unwrap().script.push_back(scripted);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    fn record(&self, req: Request<Bytes>) -> Option<Scripted> {
        let (parts, body) = req.into_parts();
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });
        state.script.pop_front()
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn event(data: &str) -> http_client::Result<Bytes> {
    Ok(Bytes::from(format!("data: {data}\r\n\r\n")))
}

fn no_script() -> http_client::Error {
    http_client::Error::Instance("no scripted reply left".into())
}

impl HttpClientExt for MockHttp {
    fn send(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = http_client::Result<Response<Bytes>>> + Send + 'static {
        let scripted = self.record(req);
        async move {
            match scripted.ok_or_else(no_script)? {
                Scripted::Body(status, body) if status.is_success() => Response::builder()
                    .status(status)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Bytes::from(body))
                    .map_err(http_client::Error::from),
                Scripted::Body(status, body) => Err(
                    http_client::Error::InvalidStatusCodeWithMessage(status, body),
                ),
                _ => Err(http_client::Error::Instance(
                    "an event stream was scripted for a buffered request".into(),
                )),
            }
        }
    }

    fn send_streaming(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = http_client::Result<Response<ByteStream>>> + Send + 'static {
        let scripted = self.record(req);
        async move {
            let body: ByteStream = match scripted.ok_or_else(no_script)? {
                Scripted::Body(status, body) if !status.is_success() => {
                    return Err(http_client::Error::InvalidStatusCodeWithMessage(status, body));
                }
                Scripted::Body(_, body) => stream::once(async move { Ok(Bytes::from(body)) }).boxed(),
                Scripted::Events(events) => {
                    stream::iter(events.into_iter().map(|data| event(&data))).boxed()
                }
                Scripted::Endless(data, dropped) => {
                    let guard = SetOnDrop(dropped);
                    stream::repeat_with(move || {
                        let _alive = &guard;
                        event(&data)
                    })
                    .boxed()
                }
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/event-stream")
                .body(body)
                .map_err(http_client::Error::from)
        }
    }
}

/// Route logs to the test harness. Set `RUST_LOG=switchboard=trace` to see wire bodies.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn client(http: &MockHttp) -> gemini::Client<MockHttp> {
    init_tracing();
    gemini::Client::builder("test-key")
        .http_client(http.clone())
        .decode_mode(DecodeMode::Strict)
        .build()
        .unwrap()
}

/// A response or stream chunk with a single model candidate.
pub fn candidate(parts: Value, finish_reason: Option<&str>, usage: Option<Value>) -> String {
    let mut candidate = serde_json::json!({"content": {"role": "model", "parts": parts}});
    if let Some(reason) = finish_reason {
        candidate["finishReason"] = reason.into();
    }
    let mut response = serde_json::json!({"candidates": [candidate]});
    if let Some(usage) = usage {
        response["usageMetadata"] = usage;
    }
    response.to_string()
}
