// ================================================================
// Google Gemini generateContent API
// ================================================================
//
// https://ai.google.dev/api/generate-content

/// `gemini-2.5-pro` completion model
pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
/// `gemini-2.5-flash` completion model
pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
/// `gemini-2.5-flash-lite` completion model
pub const GEMINI_2_5_FLASH_LITE: &str = "gemini-2.5-flash-lite";
/// `gemini-2.0-flash` completion model
pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";

use serde_json::{Map, Value};

use self::gemini_api_types::{
    Blob, CitationMetadata, Content, FileData, FinishReason, FunctionCall,
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, FunctionResponse,
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, LogprobsResult, Modality,
    Part, PartKind, ThinkingConfig, Tool, ToolConfig, UsageMetadata,
};
use crate::{
    completion::CompletionError,
    json_utils::DecodeMode,
    message::{
        self, Citation, CitationSource, Document, DocumentSource, Generation, Message, Reply,
        Request, Role, SourceKind, TokenLogprob, ToolCall, ToolCallResult, TopLogprob, Usage,
        ValidationError, validate_conversation,
    },
    model::ModelInfo,
    options::{DecodeTarget, GenOption, TextOptions, ToolCallMode, ToolOptions, validate_options},
    providers::{RequestContext, Translated},
    schema::{Field, Schema, TypeDescription, build_schema},
};

/// Opaque key under which thought signatures round-trip.
pub const SIGNATURE: &str = "signature";

/// Whether `model` accepts a thinking configuration, judged by its name: Gemini models except
/// lite ones, 1.x, and 2.0 flash unless it is a thinking variant.
pub fn supports_thinking(model: &str) -> bool {
    let model = model.strip_prefix("models/").unwrap_or(model);
    model.starts_with("gemini-")
        && !model.contains("lite")
        && !model.starts_with("gemini-1")
        && (!model.starts_with("gemini-2.0-flash") || model.contains("thinking"))
}

// ================================================================
// Request translation
// ================================================================

pub(crate) fn create_request(
    messages: &[Message],
    options: &[GenOption],
    ctx: &RequestContext<'_>,
) -> Result<Translated<GenerateContentRequest>, CompletionError> {
    validate_conversation(messages)?;
    validate_options(options)?;

    let thinking = ctx
        .model_info
        .map_or_else(|| supports_thinking(ctx.model), |info| info.thinking);

    let mut request = GenerateContentRequest::default();
    request.generation_config.response_modalities = vec![Modality::Text];
    if thinking {
        // Must be present to turn thinking off, and must be absent on models without it.
        request.generation_config.thinking_config = Some(ThinkingConfig::default());
    }

    let mut errors: Vec<CompletionError> = Vec::new();
    let mut unsupported: Vec<String> = Vec::new();

    for (i, option) in options.iter().enumerate() {
        match option {
            GenOption::Text(text) => apply_text_options(
                &mut request.generation_config,
                text,
                ctx.model_info,
                &mut errors,
                &mut unsupported,
            ),
            GenOption::Tools(tools) => {
                apply_tool_options(&mut request, tools, &mut errors, &mut unsupported)
            }
            GenOption::SystemPrompt(prompt) => request
                .system_instruction
                .get_or_insert_with(Content::default)
                .parts
                .push(Part::text(prompt.clone())),
            GenOption::Decode(target) => {
                if let Err(e) = apply_decode_target(&mut request.generation_config, target) {
                    errors.push(e.within(format!("options[{i}]")).into());
                }
            }
            GenOption::Thinking { budget_tokens } => {
                if thinking {
                    request.generation_config.thinking_config = Some(ThinkingConfig {
                        include_thoughts: *budget_tokens > 0,
                        thinking_budget: *budget_tokens,
                    });
                } else {
                    unsupported.push("thinking".into());
                }
            }
        }
    }

    for (i, message) in messages.iter().enumerate() {
        match Content::from_message(message, ctx.inline_limit) {
            Ok(content) => request.contents.push(content),
            Err(e) => errors.push(e.within(format!("messages[{i}]")).into()),
        }
    }

    if !errors.is_empty() && !unsupported.is_empty() {
        errors.push(CompletionError::UnsupportedOptions(std::mem::take(
            &mut unsupported,
        )));
    }
    match CompletionError::join(errors) {
        Some(error) => Err(error),
        None => Ok(Translated {
            request,
            unsupported,
        }),
    }
}

fn apply_text_options(
    config: &mut GenerationConfig,
    opts: &TextOptions,
    model_info: Option<&ModelInfo>,
    errors: &mut Vec<CompletionError>,
    unsupported: &mut Vec<String>,
) {
    if let (Some(max_tokens), Some(info)) = (opts.max_tokens, model_info)
        && info.output_token_limit > 0
        && max_tokens > info.output_token_limit
    {
        errors.push(
            ValidationError::new(
                "max_tokens",
                format!(
                    "{max_tokens} exceeds the output limit of {} for {}",
                    info.output_token_limit, info.id
                ),
            )
            .into(),
        );
    }
    // Later options only override the fields they set.
    config.max_output_tokens = opts.max_tokens.or(config.max_output_tokens);
    config.temperature = opts.temperature.or(config.temperature);
    config.top_p = opts.top_p.or(config.top_p);
    config.top_k = opts.top_k.or(config.top_k);
    config.seed = opts.seed.or(config.seed);
    config.presence_penalty = opts.presence_penalty.or(config.presence_penalty);
    config.frequency_penalty = opts.frequency_penalty.or(config.frequency_penalty);
    if !opts.stop.is_empty() {
        config.stop_sequences = opts.stop.clone();
    }
    if let Some(n) = opts.top_logprobs
        && n > 0
    {
        config.response_logprobs = true;
        config.logprobs = Some(n);
    }
    if opts.user.is_some() {
        unsupported.push("user".into());
    }
}

fn apply_tool_options(
    request: &mut GenerateContentRequest,
    opts: &ToolOptions,
    errors: &mut Vec<CompletionError>,
    unsupported: &mut Vec<String>,
) {
    if opts.parallel_calls {
        unsupported.push("parallel_calls".into());
    }
    if opts.tools.is_empty() {
        return;
    }
    let response = function_response_schema();
    for (i, tool) in opts.tools.iter().enumerate() {
        match tool.parameters_schema() {
            Ok(parameters) => request.tools.push(Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters,
                    response: response.clone(),
                }],
            }),
            Err(e) => errors.push(e.within(format!("tools[{i}]")).into()),
        }
    }
    let mode = match opts.mode {
        ToolCallMode::Any => FunctionCallingMode::Validated,
        ToolCallMode::Required => FunctionCallingMode::Any,
        ToolCallMode::None => FunctionCallingMode::None,
    };
    request.tool_config = Some(ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names: Vec::new(),
        },
    });
}

/// Tool results are sent back as `{"response": "<result>"}`.
fn function_response_schema() -> Option<Schema> {
    build_schema(&TypeDescription::structure(
        "FunctionResponse",
        vec![Field::new("response", TypeDescription::String)],
    ))
    .ok()
}

fn apply_decode_target(
    config: &mut GenerationConfig,
    target: &DecodeTarget,
) -> Result<(), ValidationError> {
    config.response_schema = target.schema()?;
    config.response_mime_type = Some(mime::APPLICATION_JSON.essence_str().to_string());
    Ok(())
}

impl Content {
    fn from_message(message: &Message, inline_limit: usize) -> Result<Self, ValidationError> {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
            Role::Computer => {
                return Err(ValidationError::new(
                    "role",
                    "unsupported role computer",
                ));
            }
        };

        let mut parts = Vec::new();
        for (i, request) in message.requests.iter().enumerate() {
            parts.push(
                Part::from_request(request, inline_limit)
                    .map_err(|e| e.within(format!("requests[{i}]")))?,
            );
        }
        for (i, reply) in message.replies.iter().enumerate() {
            if let Some(part) = Part::from_reply(reply, inline_limit)
                .map_err(|e| e.within(format!("replies[{i}]")))?
            {
                parts.push(part);
            }
        }
        parts.extend(message.tool_call_results.iter().map(Part::from));

        Ok(Content {
            role: role.to_string(),
            parts,
        })
    }
}

fn signature(opaque: &Map<String, Value>) -> Option<String> {
    opaque
        .get(SIGNATURE)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl Part {
    fn from_request(request: &Request, inline_limit: usize) -> Result<Self, ValidationError> {
        match &request.document {
            Some(document) => Part::from_document(document, inline_limit),
            None => Ok(Part::text(request.text.clone())),
        }
    }

    /// Citations annotate output and are not sent back.
    fn from_reply(reply: &Reply, inline_limit: usize) -> Result<Option<Self>, ValidationError> {
        let mut part = if let Some(tool_call) = &reply.tool_call {
            let args = if tool_call.arguments.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&tool_call.arguments).map_err(|e| {
                    ValidationError::new(
                        "tool_call.arguments",
                        format!("must be a JSON object: {e}"),
                    )
                })?
            };
            let mut part = Part::new(PartKind::FunctionCall(FunctionCall {
                id: tool_call.id.clone(),
                name: tool_call.name.clone(),
                args,
            }));
            part.thought_signature = signature(&tool_call.opaque);
            part
        } else if let Some(document) = &reply.document {
            Part::from_document(document, inline_limit)?
        } else if !reply.reasoning.is_empty() {
            Part {
                thought: true,
                ..Part::text(reply.reasoning.clone())
            }
        } else if !reply.text.is_empty() {
            Part::text(reply.text.clone())
        } else {
            return Ok(None);
        };
        if part.thought_signature.is_none() {
            part.thought_signature = signature(&reply.opaque);
        }
        Ok(Some(part))
    }

    fn from_document(document: &Document, inline_limit: usize) -> Result<Self, ValidationError> {
        let Some(mime_type) = document.resolved_media_type() else {
            return Err(ValidationError::new(
                "document.media_type",
                "could not determine the media type",
            ));
        };
        match &document.source {
            DocumentSource::Inline(data) => {
                if data.len() > inline_limit {
                    return Err(ValidationError::new(
                        "document",
                        format!(
                            "{} bytes is larger than the inline limit of {inline_limit} bytes",
                            data.len()
                        ),
                    ));
                }
                let is_plain_text = mime_type
                    .parse::<mime::Mime>()
                    .is_ok_and(|m| m.essence_str() == mime::TEXT_PLAIN.essence_str());
                if is_plain_text {
                    // Plain text attachments are refused as blobs.
                    let text = String::from_utf8(data.clone()).map_err(|_| {
                        ValidationError::new("document", "text/plain document is not valid UTF-8")
                    })?;
                    return Ok(Part::text(text));
                }
                Ok(Part::new(PartKind::InlineData(Blob {
                    mime_type,
                    data: data.clone(),
                })))
            }
            DocumentSource::Url(url) => Ok(Part::new(PartKind::FileData(FileData {
                mime_type,
                file_uri: url.clone(),
            }))),
        }
    }
}

impl From<&ToolCallResult> for Part {
    fn from(result: &ToolCallResult) -> Self {
        let mut response = Map::new();
        response.insert("response".into(), Value::String(result.result.clone()));
        Part::new(PartKind::FunctionResponse(FunctionResponse {
            id: result.id.clone(),
            name: result.name.clone(),
            response,
        }))
    }
}

// ================================================================
// Response decoding
// ================================================================

pub(crate) fn create_generation(
    response: GenerateContentResponse,
    mode: DecodeMode,
) -> Result<Generation, CompletionError> {
    let GenerateContentResponse {
        candidates,
        prompt_feedback,
        usage_metadata,
        ..
    } = response;
    let usage_metadata = usage_metadata.unwrap_or_default();

    let mut candidates = candidates.into_iter();
    let (candidate, extra) = (candidates.next(), candidates.len());
    let candidate = match candidate {
        Some(candidate) if extra == 0 => candidate,
        None if prompt_feedback
            .as_ref()
            .is_some_and(|f| f.block_reason.is_some()) =>
        {
            // The prompt itself was blocked, nothing was generated.
            let mut generation = Generation::default();
            generation.usage =
                usage_metadata.to_usage(message::FinishReason::ContentFilter);
            return Ok(generation);
        }
        _ => {
            return Err(CompletionError::decoder_bug(format!(
                "unexpected number of candidates; expected 1, got {}",
                usize::from(candidate.is_some()) + extra
            )));
        }
    };

    let mut generation = Generation::default();
    if let Some(content) = candidate.content {
        check_role(&content.role)?;
        let replies = &mut generation.message.replies;
        for part in content.parts {
            let reply = part.into_reply()?;
            if reply.kind().is_some() {
                replies.push(reply);
            } else if !reply.opaque.is_empty() {
                // A part carrying only a signature belongs to the part before it.
                let Some(last) = replies.last_mut() else {
                    return Err(CompletionError::decoder_bug(
                        "opaque data without a reply to attach to",
                    ));
                };
                last.opaque.extend(reply.opaque);
            }
        }
    }
    if let Some(citations) = candidate.citation_metadata {
        generation
            .message
            .replies
            .extend(citations.into_replies().into_iter().map(Reply::citation));
    }

    let finish_reason = match &candidate.finish_reason {
        Some(reason) => reason.to_canonical(mode)?,
        None => message::FinishReason::Pending,
    };
    generation.usage = usage_metadata.to_usage(finish_reason);
    if generation.usage.finish_reason == message::FinishReason::Stop
        && generation.message.tool_calls().next().is_some()
    {
        // Gemini reports STOP after calling tools.
        generation.usage.finish_reason = message::FinishReason::ToolCalls;
    }
    if let Some(logprobs) = candidate.logprobs_result {
        generation.logprobs = logprobs.into_token_logprobs();
    }

    generation
        .validate()
        .map_err(|e| CompletionError::decoder_bug(format!("invalid generation: {e}")))?;
    Ok(generation)
}

pub(crate) fn check_role(role: &str) -> Result<(), CompletionError> {
    match role {
        "model" | "" => Ok(()),
        other => Err(CompletionError::decoder_bug(format!(
            "unexpected role {other:?}"
        ))),
    }
}

impl Part {
    /// Decode a received part. Parts carrying only a signature decode to a reply without kind.
    pub(crate) fn into_reply(self) -> Result<Reply, CompletionError> {
        let Part {
            thought,
            thought_signature,
            data,
        } = self;
        let mut reply = match data {
            Some(PartKind::Text(text)) if thought => Reply::reasoning(text),
            Some(PartKind::Text(text)) => Reply::text(text),
            Some(PartKind::InlineData(blob)) => Reply::document(blob.into_document()?),
            Some(PartKind::FileData(file)) => {
                let mut document = Document::url(file.file_uri);
                if !file.mime_type.is_empty() {
                    document = document.with_media_type(file.mime_type);
                }
                Reply::document(document)
            }
            Some(PartKind::FunctionCall(call)) => {
                let mut tool_call = call.into_tool_call()?;
                if let Some(signature) = thought_signature {
                    tool_call
                        .opaque
                        .insert(SIGNATURE.into(), Value::String(signature));
                }
                return Ok(Reply::tool_call(tool_call));
            }
            Some(other) => return Err(other.unsupported()),
            None => Reply::default(),
        };
        if let Some(signature) = thought_signature {
            reply.opaque.insert(SIGNATURE.into(), Value::String(signature));
        }
        Ok(reply)
    }
}

impl PartKind {
    pub(crate) fn unsupported(&self) -> CompletionError {
        CompletionError::decoder_bug(format!("unsupported part {}", self.name()))
    }

    fn name(&self) -> &'static str {
        match self {
            PartKind::Text(_) => "text",
            PartKind::InlineData(_) => "inlineData",
            PartKind::FileData(_) => "fileData",
            PartKind::FunctionCall(_) => "functionCall",
            PartKind::FunctionResponse(_) => "functionResponse",
            PartKind::ExecutableCode(_) => "executableCode",
            PartKind::CodeExecutionResult(_) => "codeExecutionResult",
        }
    }
}

impl Blob {
    pub(crate) fn into_document(self) -> Result<Document, CompletionError> {
        let ext = mime_guess::get_mime_extensions_str(&self.mime_type)
            .and_then(|exts| exts.first())
            .ok_or_else(|| {
                CompletionError::decoder_bug(format!(
                    "mime type {:?} has no extension",
                    self.mime_type
                ))
            })?;
        Ok(Document {
            filename: Some(format!("content.{ext}")),
            media_type: Some(self.mime_type),
            source: DocumentSource::Inline(self.data),
        })
    }
}

impl FunctionCall {
    pub(crate) fn into_tool_call(self) -> Result<ToolCall, CompletionError> {
        let arguments = serde_json::to_string(&self.args).map_err(|e| {
            CompletionError::decoder_bug(format!("failed to encode function call arguments: {e}"))
        })?;
        Ok(ToolCall::new(self.id, self.name, arguments))
    }
}

impl CitationMetadata {
    pub(crate) fn into_replies(self) -> Vec<Citation> {
        self.citation_sources
            .into_iter()
            .filter_map(|source| {
                let url = source.uri.filter(|uri| !uri.is_empty())?;
                Some(Citation {
                    start_index: source.start_index.unwrap_or_default(),
                    end_index: source.end_index.unwrap_or_default(),
                    sources: vec![CitationSource {
                        kind: SourceKind::Web,
                        url,
                        ..Default::default()
                    }],
                })
            })
            .collect()
    }
}

impl FinishReason {
    pub(crate) fn to_canonical(
        &self,
        mode: DecodeMode,
    ) -> Result<message::FinishReason, CompletionError> {
        Ok(match self {
            FinishReason::Stop => message::FinishReason::Stop,
            FinishReason::MaxTokens => message::FinishReason::Length,
            FinishReason::Safety
            | FinishReason::Blocklist
            | FinishReason::ProhibitedContent
            | FinishReason::Spii
            | FinishReason::ImageSafety => message::FinishReason::ContentFilter,
            other => match mode {
                DecodeMode::Strict => {
                    return Err(CompletionError::decoder_bug(format!(
                        "unexpected finish reason {other:?}"
                    )));
                }
                DecodeMode::Lenient => {
                    tracing::warn!(
                        target: "switchboard::completions",
                        reason = ?other,
                        "unexpected finish reason, reporting other"
                    );
                    message::FinishReason::Other
                }
            },
        })
    }
}

impl UsageMetadata {
    pub(crate) fn is_zero(&self) -> bool {
        self.prompt_token_count == 0
            && self.candidates_token_count == 0
            && self.total_token_count == 0
    }

    pub(crate) fn to_usage(&self, finish_reason: message::FinishReason) -> Usage {
        Usage {
            input_tokens: self.prompt_token_count,
            input_cached_tokens: self.cached_content_token_count,
            reasoning_tokens: self.thoughts_token_count,
            output_tokens: self.candidates_token_count,
            total_tokens: self.total_token_count,
            finish_reason,
        }
    }
}

impl LogprobsResult {
    pub(crate) fn into_token_logprobs(self) -> Vec<TokenLogprob> {
        let mut top = self.top_candidates.into_iter();
        self.chosen_candidates
            .into_iter()
            .map(|chosen| TokenLogprob {
                bytes: chosen.token.clone().into_bytes(),
                top: top
                    .next()
                    .map(|t| {
                        t.candidates
                            .into_iter()
                            .map(|c| TopLogprob {
                                token: c.token,
                                logprob: c.log_probability,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                token: chosen.token,
                logprob: chosen.log_probability,
            })
            .collect()
    }
}

// ================================================================
// Gemini API wire types
// ================================================================

pub mod gemini_api_types {
    use serde::{Deserialize, Serialize};
    use serde_json::{Map, Value};

    use crate::error::ApiError;
    use crate::json_utils;
    use crate::schema::Schema;

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentRequest {
        pub contents: Vec<Content>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub tools: Vec<Tool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tool_config: Option<ToolConfig>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub system_instruction: Option<Content>,
        pub generation_config: GenerationConfig,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub cached_content: Option<String>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Content {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub role: String,
        #[serde(default)]
        pub parts: Vec<Part>,
    }

    /// One element of a content. `data` is `None` on parts that only carry a signature.
    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Part {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        pub thought: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub thought_signature: Option<String>,
        #[serde(flatten)]
        pub data: Option<PartKind>,
    }

    impl Part {
        pub fn new(data: PartKind) -> Self {
            Part {
                data: Some(data),
                ..Default::default()
            }
        }

        pub fn text(text: impl Into<String>) -> Self {
            Part::new(PartKind::Text(text.into()))
        }
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub enum PartKind {
        Text(String),
        InlineData(Blob),
        FileData(FileData),
        FunctionCall(FunctionCall),
        FunctionResponse(FunctionResponse),
        ExecutableCode(ExecutableCode),
        CodeExecutionResult(CodeExecutionResult),
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Blob {
        pub mime_type: String,
        #[serde(with = "json_utils::base64_bytes")]
        pub data: Vec<u8>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct FileData {
        #[serde(default)]
        pub mime_type: String,
        pub file_uri: String,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct FunctionCall {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub id: String,
        pub name: String,
        #[serde(default)]
        pub args: Map<String, Value>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct FunctionResponse {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub id: String,
        pub name: String,
        pub response: Map<String, Value>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct ExecutableCode {
        #[serde(default)]
        pub language: String,
        pub code: String,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct CodeExecutionResult {
        pub outcome: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub output: String,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Tool {
        pub function_declarations: Vec<FunctionDeclaration>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct FunctionDeclaration {
        pub name: String,
        pub description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub parameters: Option<Schema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub response: Option<Schema>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ToolConfig {
        pub function_calling_config: FunctionCallingConfig,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct FunctionCallingConfig {
        pub mode: FunctionCallingMode,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub allowed_function_names: Vec<String>,
    }

    #[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum FunctionCallingMode {
        Auto,
        Any,
        None,
        Validated,
    }

    #[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum Modality {
        Text,
        Image,
        Audio,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerationConfig {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub stop_sequences: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub response_mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub response_schema: Option<Schema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub response_modalities: Vec<Modality>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub candidate_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub max_output_tokens: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub top_p: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub top_k: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub seed: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub presence_penalty: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub frequency_penalty: Option<f64>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        pub response_logprobs: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub logprobs: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub thinking_config: Option<ThinkingConfig>,
    }

    /// Both fields are always sent: a zero budget is how thinking is turned off.
    #[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ThinkingConfig {
        pub include_thoughts: bool,
        pub thinking_budget: u64,
    }

    // Responses. Streamed chunks share the same shape.

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<ContentCandidate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub prompt_feedback: Option<PromptFeedback>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub usage_metadata: Option<UsageMetadata>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub model_version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub response_id: Option<String>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ContentCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub content: Option<Content>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub finish_reason: Option<FinishReason>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub safety_ratings: Vec<SafetyRating>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub citation_metadata: Option<CitationMetadata>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub token_count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub grounding_metadata: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub avg_logprobs: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub logprobs_result: Option<LogprobsResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub index: Option<u64>,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum FinishReason {
        FinishReasonUnspecified,
        Stop,
        MaxTokens,
        Safety,
        Recitation,
        Language,
        Other,
        Blocklist,
        ProhibitedContent,
        Spii,
        MalformedFunctionCall,
        ImageSafety,
        #[serde(other)]
        Unknown,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct SafetyRating {
        pub category: String,
        pub probability: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        pub blocked: bool,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct PromptFeedback {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub block_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub safety_ratings: Vec<SafetyRating>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct CitationMetadata {
        #[serde(default)]
        pub citation_sources: Vec<CitationSource>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct CitationSource {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub start_index: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub end_index: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub uri: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub license: Option<String>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LogprobsResult {
        #[serde(default)]
        pub top_candidates: Vec<TopCandidates>,
        #[serde(default)]
        pub chosen_candidates: Vec<LogprobCandidate>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    pub struct TopCandidates {
        #[serde(default)]
        pub candidates: Vec<LogprobCandidate>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LogprobCandidate {
        #[serde(default)]
        pub token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub token_id: Option<i64>,
        #[serde(default)]
        pub log_probability: f64,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct UsageMetadata {
        #[serde(default)]
        pub prompt_token_count: u64,
        #[serde(default)]
        pub cached_content_token_count: u64,
        #[serde(default)]
        pub candidates_token_count: u64,
        #[serde(default)]
        pub tool_use_prompt_token_count: u64,
        #[serde(default)]
        pub thoughts_token_count: u64,
        #[serde(default)]
        pub total_token_count: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub prompt_tokens_details: Vec<ModalityTokenCount>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub cache_tokens_details: Vec<ModalityTokenCount>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub candidates_tokens_details: Vec<ModalityTokenCount>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub tool_use_prompt_tokens_details: Vec<ModalityTokenCount>,
    }

    #[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct ModalityTokenCount {
        pub modality: String,
        #[serde(default)]
        pub token_count: u64,
    }

    // Errors

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct ErrorResponse {
        pub error: ErrorDetails,
    }

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    pub struct ErrorDetails {
        pub code: i64,
        pub message: String,
        #[serde(default)]
        pub status: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub details: Vec<Value>,
    }

    impl From<ErrorResponse> for ApiError {
        fn from(response: ErrorResponse) -> Self {
            let ErrorDetails {
                code,
                message,
                status,
                ..
            } = response.error;
            ApiError {
                http_status: u16::try_from(code).ok().filter(|c| (100..600).contains(c)),
                status,
                code: code.to_string(),
                message,
                help_url: None,
            }
        }
    }
}
