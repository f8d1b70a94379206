use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::completion::{
    self, GEMINI_2_5_FLASH,
    gemini_api_types::{ErrorResponse, GenerateContentRequest, GenerateContentResponse},
};
use super::streaming;
use crate::{
    client,
    completion::CompletionError,
    error::ApiError,
    http_client::{self, HttpClientExt},
    json_utils::{self, DecodeMode},
    message::{Generation, Message, Usage},
    model::{ModelCatalog, ModelInfo},
    options::GenOption,
    providers::{ChunkOutput, Provider, RequestContext, Translated, Transport},
};

// ================================================================
// Google Gemini Client
// ================================================================
const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Provider for the Gemini generateContent API.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gemini;

/// Gemini client.
pub type Client<H = reqwest::Client> = client::Client<Gemini, H>;
/// Builder for the Gemini client.
pub type ClientBuilder<H = reqwest::Client> = client::ClientBuilder<Gemini, H>;

impl Provider for Gemini {
    type Request = GenerateContentRequest;
    type Response = GenerateContentResponse;
    type StreamChunk = GenerateContentResponse;
    type ErrorResponse = ErrorResponse;

    const NAME: &'static str = "gemini";
    const BASE_URL: &'static str = GEMINI_API_BASE_URL;
    const DEFAULT_MODEL: &'static str = GEMINI_2_5_FLASH;
    const API_KEY_ENV: &'static str = "GEMINI_API_KEY";
    const API_KEY_URL: Option<&'static str> =
        Some("https://ai.google.dev/gemini-api/docs/getting-started");

    fn build_uri(&self, base_url: &str, model: &str, transport: Transport) -> String {
        let base_url = base_url.trim_end_matches('/');
        let model = model.strip_prefix("models/").unwrap_or(model);
        match transport {
            Transport::Http => format!("{base_url}/v1beta/models/{model}:generateContent"),
            Transport::Sse => {
                format!("{base_url}/v1beta/models/{model}:streamGenerateContent?alt=sse")
            }
        }
    }

    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap, http::Error> {
        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    fn init_request(
        &self,
        messages: &[Message],
        options: &[GenOption],
        ctx: &RequestContext<'_>,
    ) -> Result<Translated<Self::Request>, CompletionError> {
        completion::create_request(messages, options, ctx)
    }

    fn to_generation(
        &self,
        response: Self::Response,
        mode: DecodeMode,
    ) -> Result<Generation, CompletionError> {
        completion::create_generation(response, mode)
    }

    fn process_chunk(
        &self,
        chunk: Self::StreamChunk,
        usage: &Usage,
        mode: DecodeMode,
    ) -> Result<ChunkOutput, CompletionError> {
        streaming::process_chunk(chunk, usage, mode)
    }
}

// ================================================================
// Model listing
// ================================================================

/// https://ai.google.dev/api/models#method:-models.list
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_model_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub input_token_limit: u64,
    #[serde(default)]
    pub output_token_limit: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_generation_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thinking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl From<Model> for ModelInfo {
    fn from(model: Model) -> Self {
        ModelInfo {
            id: model
                .name
                .strip_prefix("models/")
                .unwrap_or(&model.name)
                .to_string(),
            display_name: model.display_name,
            input_token_limit: model.input_token_limit,
            output_token_limit: model.output_token_limit,
            thinking: model.thinking,
        }
    }
}

impl From<ModelsResponse> for ModelCatalog {
    fn from(response: ModelsResponse) -> Self {
        response.models.into_iter().map(ModelInfo::from).collect()
    }
}

impl<H> client::Client<Gemini, H>
where
    H: HttpClientExt,
{
    /// Fetch a catalog snapshot of the models available to this API key.
    pub async fn list_models(&self) -> Result<ModelCatalog, CompletionError> {
        let uri = format!(
            "{}/v1beta/models?pageSize=1000",
            self.base_url().trim_end_matches('/')
        );
        let req = self
            .request(Method::GET, uri)
            .body(Bytes::new())
            .map_err(http_client::Error::from)?;

        let response = match self.http_client().send(req).await {
            Ok(response) => response,
            Err(http_client::Error::InvalidStatusCodeWithMessage(status, text)) => {
                return Err(self.api_error(status, text.as_bytes()).into());
            }
            Err(e) => return Err(e.into()),
        };
        let models: ModelsResponse = json_utils::decode(response.body(), self.decode_mode())?;
        Ok(models.into())
    }

    fn api_error(&self, status: StatusCode, body: &[u8]) -> ApiError {
        Gemini.decode_error(status, body, self.decode_mode())
    }
}
