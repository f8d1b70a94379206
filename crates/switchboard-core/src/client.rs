//! The caller-facing entry points, [Client::generate_sync] and [Client::generate_stream].
//!
//! A [Client] pairs a [Provider] with a transport and the per-client configuration built by a
//! [ClientBuilder]. It owns everything network related: it sends the translated request,
//! normalizes non-2xx responses, and for streams spawns the producer task that decodes events
//! into the bounded queue a [GenerationStream] reads from.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::{HeaderMap, Method, header::CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

use crate::{
    completion::{CompletionError, CompletionResponse},
    http_client::{self, HttpClientExt, sse, util::BodyPreview},
    json_utils::{self, DecodeMode},
    message::{Message, Usage},
    model::ModelCatalog,
    options::GenOption,
    providers::{Provider, RequestContext, Translated, Transport},
    streaming::{Accumulator, GenerationStream, StreamEvent},
};

/// Capacity of the queue between the stream producer and the caller.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
/// Largest document sent inline, in bytes.
pub const DEFAULT_INLINE_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ClientBuilderError {
    #[error("missing API key: set {0} or pass one explicitly")]
    MissingApiKey(&'static str),
    #[error("invalid API key: {0}")]
    InvalidApiKey(#[source] http::Error),
}

// ================================================================
// Builder
// ================================================================

pub struct ClientBuilder<P, H = reqwest::Client> {
    provider: P,
    api_key: String,
    base_url: String,
    model: String,
    decode_mode: DecodeMode,
    queue_capacity: usize,
    inline_limit: usize,
    catalog: Option<Arc<ModelCatalog>>,
    http_client: Option<H>,
}

impl<P> ClientBuilder<P, reqwest::Client>
where
    P: Provider + Default,
{
    pub fn new(api_key: impl Into<String>) -> Self {
        ClientBuilder {
            provider: P::default(),
            api_key: api_key.into(),
            base_url: P::BASE_URL.to_string(),
            model: P::DEFAULT_MODEL.to_string(),
            decode_mode: DecodeMode::from_env(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            inline_limit: DEFAULT_INLINE_LIMIT,
            catalog: None,
            http_client: None,
        }
    }

    /// Read the API key from the provider's environment variable.
    pub fn from_env() -> Result<Self, ClientBuilderError> {
        match std::env::var(P::API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(ClientBuilderError::MissingApiKey(P::API_KEY_ENV)),
        }
    }
}

impl<P, H> ClientBuilder<P, H>
where
    P: Provider,
{
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    /// Capacity of the stream queue. Clamped to at least 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn inline_limit(mut self, bytes: usize) -> Self {
        self.inline_limit = bytes;
        self
    }

    /// Model capabilities used to check requests before sending them.
    pub fn catalog(mut self, catalog: Arc<ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn http_client<U>(self, http_client: U) -> ClientBuilder<P, U> {
        ClientBuilder {
            provider: self.provider,
            api_key: self.api_key,
            base_url: self.base_url,
            model: self.model,
            decode_mode: self.decode_mode,
            queue_capacity: self.queue_capacity,
            inline_limit: self.inline_limit,
            catalog: self.catalog,
            http_client: Some(http_client),
        }
    }
}

impl<P, H> ClientBuilder<P, H>
where
    P: Provider,
    H: HttpClientExt + Default,
{
    pub fn build(self) -> Result<Client<P, H>, ClientBuilderError> {
        if self.api_key.is_empty() {
            return Err(ClientBuilderError::MissingApiKey(P::API_KEY_ENV));
        }
        let headers = self
            .provider
            .auth_headers(&self.api_key)
            .map_err(ClientBuilderError::InvalidApiKey)?;
        Ok(Client {
            provider: self.provider,
            base_url: self.base_url,
            model: self.model,
            headers,
            decode_mode: self.decode_mode,
            queue_capacity: self.queue_capacity,
            inline_limit: self.inline_limit,
            catalog: self.catalog,
            http_client: self.http_client.unwrap_or_default(),
        })
    }
}

// ================================================================
// Client
// ================================================================

#[derive(Clone)]
pub struct Client<P, H = reqwest::Client> {
    provider: P,
    base_url: String,
    model: String,
    headers: HeaderMap,
    decode_mode: DecodeMode,
    queue_capacity: usize,
    inline_limit: usize,
    catalog: Option<Arc<ModelCatalog>>,
    http_client: H,
}

impl<P, H> Debug for Client<P, H>
where
    P: Provider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("provider", &P::NAME)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"******")
            .field("decode_mode", &self.decode_mode)
            .field("queue_capacity", &self.queue_capacity)
            .field("inline_limit", &self.inline_limit)
            .field("catalog", &self.catalog.as_ref().map(|c| c.len()))
            .finish()
    }
}

impl<P> Client<P, reqwest::Client>
where
    P: Provider + Default,
{
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder<P, reqwest::Client> {
        ClientBuilder::new(api_key)
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientBuilderError> {
        Self::builder(api_key).build()
    }

    pub fn from_env() -> Result<Self, ClientBuilderError> {
        ClientBuilder::<P>::from_env()?.build()
    }
}

impl<P, H> Client<P, H>
where
    P: Provider,
    H: HttpClientExt,
{
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The same client, generating with another model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http_client(&self) -> &H {
        &self.http_client
    }

    pub(crate) fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    /// A request builder carrying the authentication headers.
    pub(crate) fn request(&self, method: Method, uri: String) -> http_client::Builder {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
    }

    fn post<T: Serialize>(
        &self,
        transport: Transport,
        body: &T,
    ) -> Result<http::Request<Bytes>, CompletionError> {
        let body = serde_json::to_vec(body).map_err(http_client::instance_error)?;
        tracing::trace!(
            target: "switchboard::completions",
            body = ?BodyPreview::new(&body),
            "sending request"
        );
        let uri = self
            .provider
            .build_uri(&self.base_url, &self.model, transport);
        Ok(self
            .request(Method::POST, uri)
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.essence_str())
            .body(Bytes::from(body))
            .map_err(http_client::Error::from)?)
    }

    fn translate(
        &self,
        messages: &[Message],
        options: &[GenOption],
    ) -> Result<Translated<P::Request>, CompletionError> {
        let ctx = RequestContext {
            model: &self.model,
            model_info: self.catalog.as_deref().and_then(|c| c.get(&self.model)),
            inline_limit: self.inline_limit,
        };
        self.provider.init_request(messages, options, &ctx)
    }

    /// Non-2xx responses become normalized API errors, anything else is a transport failure.
    fn transport_error(&self, error: http_client::Error) -> CompletionError {
        match error {
            http_client::Error::InvalidStatusCodeWithMessage(status, text) => self
                .provider
                .decode_error(status, text.as_bytes(), self.decode_mode)
                .into(),
            other => other.into(),
        }
    }

    fn span(&self) -> tracing::Span {
        if tracing::Span::current().is_disabled() {
            tracing::info_span!(
                target: "switchboard::completions",
                "generate",
                gen_ai.operation.name = "chat",
                gen_ai.provider.name = P::NAME,
                gen_ai.request.model = %self.model,
                gen_ai.usage.input_tokens = tracing::field::Empty,
                gen_ai.usage.output_tokens = tracing::field::Empty,
            )
        } else {
            tracing::Span::current()
        }
    }

    /// Generate a whole reply in one round trip.
    ///
    /// Options the backend cannot honor are dropped and listed in
    /// [CompletionResponse::unsupported].
    pub async fn generate_sync(
        &self,
        messages: &[Message],
        options: &[GenOption],
    ) -> Result<CompletionResponse, CompletionError> {
        let span = self.span();
        async move {
            let Translated {
                request,
                unsupported,
            } = self.translate(messages, options)?;
            if !unsupported.is_empty() {
                tracing::warn!(
                    target: "switchboard::completions",
                    unsupported = ?unsupported,
                    "dropping unsupported options"
                );
            }
            let req = self.post(Transport::Http, &request)?;
            let response = self
                .http_client
                .send(req)
                .await
                .map_err(|e| self.transport_error(e))?;
            tracing::trace!(
                target: "switchboard::completions",
                body = ?BodyPreview::new(response.body()),
                "received response"
            );

            let decoded: P::Response = json_utils::decode(response.body(), self.decode_mode)?;
            let generation = self.provider.to_generation(decoded, self.decode_mode)?;

            let span = tracing::Span::current();
            span.record("gen_ai.usage.input_tokens", generation.usage.input_tokens);
            span.record("gen_ai.usage.output_tokens", generation.usage.output_tokens);
            Ok(CompletionResponse {
                generation,
                unsupported,
            })
        }
        .instrument(span)
        .await
    }

    /// Start a streamed generation.
    ///
    /// Errors before the first byte (validation, connection, non-2xx status) are returned here.
    /// Later failures end the stream and are reported by [GenerationStream::finish].
    pub async fn generate_stream(
        &self,
        messages: &[Message],
        options: &[GenOption],
    ) -> Result<GenerationStream, CompletionError> {
        let span = self.span();
        let events = async {
            let Translated {
                request,
                unsupported,
            } = self.translate(messages, options)?;
            if !unsupported.is_empty() {
                tracing::warn!(
                    target: "switchboard::completions",
                    unsupported = ?unsupported,
                    "dropping unsupported options"
                );
            }
            let req = self.post(Transport::Sse, &request)?;
            let response = self
                .http_client
                .send_streaming(req)
                .await
                .map_err(|e| self.transport_error(e))?;
            let events = sse::data_events(response)?;
            Ok::<_, CompletionError>((events, unsupported))
        }
        .instrument(span.clone())
        .await;
        let (events, unsupported) = events?;

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let token = CancellationToken::new();
        let producer = tokio::spawn(
            produce(
                self.provider.clone(),
                events,
                tx,
                token.clone(),
                self.decode_mode,
            )
            .instrument(span.clone()),
        );
        let accumulator =
            Accumulator::new().rewrite_stop_to_tool_calls(P::REWRITES_STOP_TO_TOOL_CALLS);
        Ok(GenerationStream::new(
            rx,
            token,
            producer,
            accumulator,
            unsupported,
            span,
        ))
    }
}

/// Decode event payloads into the queue until the stream ends, fails, or is cancelled. Every
/// wait also watches the token, so a producer never outlives its consumer.
async fn produce<P: Provider>(
    provider: P,
    mut events: BoxStream<'static, http_client::Result<String>>,
    tx: mpsc::Sender<StreamEvent>,
    token: CancellationToken,
    mode: DecodeMode,
) -> Result<(), CompletionError> {
    let mut usage = Usage::default();
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(CompletionError::Cancelled),
            event = events.next() => event,
        };
        let Some(data) = event.transpose()? else {
            break;
        };

        // Error payloads can arrive in the middle of a stream.
        if let Ok(error) = serde_json::from_str::<P::ErrorResponse>(&data) {
            return Err(CompletionError::Api(error.into()));
        }
        let chunk: P::StreamChunk = json_utils::decode(data.as_bytes(), mode)?;
        let output = provider.process_chunk(chunk, &usage, mode)?;
        if let Some(next) = output.usage {
            usage = next;
        }

        let logprobs = (!output.logprobs.is_empty()).then_some(output.logprobs);
        let queued = output
            .fragments
            .into_iter()
            .map(StreamEvent::Fragment)
            .chain(logprobs.map(StreamEvent::Logprobs))
            .chain(output.usage.map(StreamEvent::Usage));
        for event in queued {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CompletionError::Cancelled),
                sent = tx.send(event) => {
                    if sent.is_err() {
                        // The consumer went away.
                        return Err(CompletionError::Cancelled);
                    }
                }
            }
        }
    }
    tracing::debug!(target: "switchboard::streaming", "event stream ended");
    Ok(())
}
