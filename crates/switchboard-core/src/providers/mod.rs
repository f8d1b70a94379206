//! Backend adapters.
//!
//! A [Provider] is the per-backend half of a [Client](crate::client::Client): it translates the
//! canonical conversation into the backend's wire request, decodes whole responses and stream
//! chunks back into canonical types, and classifies error bodies. Everything network related
//! stays in the client, so a provider is plain data mapping and can be tested without a
//! transport.
//!
//! Currently supported backends:
//! - Gemini generateContent

pub mod gemini;

use http::{HeaderMap, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    completion::CompletionError,
    error::{ApiError, normalize_error_body},
    json_utils::{self, DecodeMode},
    message::{Generation, Message, TokenLogprob, Usage},
    model::ModelInfo,
    options::GenOption,
    streaming::Fragment,
};

/// How a response body is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Http,
    Sse,
}

/// What a translator needs to know besides the conversation itself.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    pub model: &'a str,
    /// Catalog entry of `model`, when a catalog was supplied.
    pub model_info: Option<&'a ModelInfo>,
    /// Largest document sent inline, in bytes.
    pub inline_limit: usize,
}

/// A translated request, together with the requested options the backend had to drop.
#[derive(Clone, Debug, PartialEq)]
pub struct Translated<R> {
    pub request: R,
    pub unsupported: Vec<String>,
}

/// What one stream chunk contributed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkOutput {
    pub fragments: Vec<Fragment>,
    /// The new running usage, `None` when the chunk did not change it.
    pub usage: Option<Usage>,
    pub logprobs: Vec<TokenLogprob>,
}

/// The contract every backend adapter satisfies.
pub trait Provider: Clone + Send + Sync + 'static {
    type Request: Serialize + Send + 'static;
    type Response: DeserializeOwned + Serialize;
    type StreamChunk: DeserializeOwned + Serialize;
    /// Typed error body, tried before the generic normalizer.
    type ErrorResponse: DeserializeOwned + Serialize + Into<ApiError>;

    /// Reported as `gen_ai.provider.name`.
    const NAME: &'static str;
    const BASE_URL: &'static str;
    const DEFAULT_MODEL: &'static str;
    const API_KEY_ENV: &'static str;
    /// Where to get a new credential, appended to authentication errors.
    const API_KEY_URL: Option<&'static str> = None;
    /// Whether the backend reports `stop` when it actually stopped to call tools.
    const REWRITES_STOP_TO_TOOL_CALLS: bool = true;

    fn build_uri(&self, base_url: &str, model: &str, transport: Transport) -> String;

    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap, http::Error>;

    /// Translate a conversation. Validation runs first and its error is passed through as is;
    /// options the backend cannot honor are collected in [Translated::unsupported] unless a hard
    /// error also occurred, in which case everything is joined.
    fn init_request(
        &self,
        messages: &[Message],
        options: &[GenOption],
        ctx: &RequestContext<'_>,
    ) -> Result<Translated<Self::Request>, CompletionError>;

    /// Decode a whole response.
    fn to_generation(
        &self,
        response: Self::Response,
        mode: DecodeMode,
    ) -> Result<Generation, CompletionError>;

    /// Decode one stream chunk. `usage` is the running usage before this chunk.
    fn process_chunk(
        &self,
        chunk: Self::StreamChunk,
        usage: &Usage,
        mode: DecodeMode,
    ) -> Result<ChunkOutput, CompletionError>;

    /// Classify an error body. Never fails.
    fn decode_error(&self, status: StatusCode, body: &[u8], mode: DecodeMode) -> ApiError {
        let mut error = match json_utils::decode::<Self::ErrorResponse>(body, mode) {
            Ok(typed) => typed.into(),
            Err(e) => {
                tracing::debug!(
                    target: "switchboard::completions",
                    provider = Self::NAME,
                    "error body is not the typed shape ({e}), normalizing"
                );
                normalize_error_body(status, body)
            }
        };
        if error.http_status.is_none() {
            error = error.with_http_status(status);
        }
        if error.is_unauthorized() {
            error.help_url = Self::API_KEY_URL.map(str::to_string);
        }
        error
    }
}
