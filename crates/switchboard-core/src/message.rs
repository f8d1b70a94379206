//! The canonical conversation model shared by every backend.
//!
//! A conversation is an ordered list of [Message]s. Inputs are expressed as [Request] parts,
//! model outputs as [Reply] parts. Every backend translates to and from these types, so they
//! are deliberately provider-agnostic: a [Reply] that carries backend-private data (a thought
//! signature for example) keeps it in its `opaque` map untouched.
//!
//! Validation never touches the network. Translators call [validate_conversation] before doing
//! anything else and pass its [ValidationError] through unmodified.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::json_utils;

// ================================================================
// Validation
// ================================================================

/// A malformed input detected before anything was sent. `field` is a dotted path to the
/// offending value, e.g. `messages[1].requests[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the field path with its parent.
    pub fn within(mut self, parent: impl Display) -> Self {
        self.field = if self.field.is_empty() {
            parent.to_string()
        } else {
            format!("{parent}.{}", self.field)
        };
        self
    }
}

/// Validate a whole conversation, reporting the first offending message.
pub fn validate_conversation(messages: &[Message]) -> Result<(), ValidationError> {
    if messages.is_empty() {
        return Err(ValidationError::new(
            "messages",
            "at least one message is required",
        ));
    }
    for (i, message) in messages.iter().enumerate() {
        message
            .validate()
            .map_err(|e| e.within(format!("messages[{i}]")))?;
    }
    Ok(())
}

// ================================================================
// Messages
// ================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    /// Output of a program acting on behalf of the user, e.g. a computer-use tool.
    Computer,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Computer => "computer",
        };
        f.write_str(role)
    }
}

/// One turn of a conversation.
///
/// Inputs go in `requests`, model outputs in `replies`; a message never mixes both. Results of
/// tool calls are sent back by the user in `tool_call_results`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<Request>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_results: Vec<ToolCallResult>,
}

impl Message {
    /// A user message containing a single text request.
    pub fn user(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            requests: vec![Request::text(text)],
            ..Default::default()
        }
    }

    /// An assistant message containing a single text reply.
    pub fn assistant(text: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            replies: vec![Reply::text(text)],
            ..Default::default()
        }
    }

    /// A user message returning tool call results.
    pub fn tool_results(results: impl IntoIterator<Item = ToolCallResult>) -> Self {
        Message {
            role: Role::User,
            tool_call_results: results.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.requests.is_empty() && self.replies.is_empty() && self.tool_call_results.is_empty()
        {
            return Err(ValidationError::new(
                "",
                "at least one request, reply or tool call result is required",
            ));
        }
        if !self.requests.is_empty() && !self.replies.is_empty() {
            return Err(ValidationError::new(
                "",
                "a message cannot mix requests and replies",
            ));
        }
        if !self.replies.is_empty() && self.role != Role::Assistant {
            return Err(ValidationError::new(
                "replies",
                format!("only the assistant can reply, got role {}", self.role),
            ));
        }
        if !self.tool_call_results.is_empty() && self.role != Role::User {
            return Err(ValidationError::new(
                "tool_call_results",
                format!("only the user can return tool call results, got role {}", self.role),
            ));
        }
        for (i, request) in self.requests.iter().enumerate() {
            request
                .validate()
                .map_err(|e| e.within(format!("requests[{i}]")))?;
        }
        for (i, reply) in self.replies.iter().enumerate() {
            reply
                .validate()
                .map_err(|e| e.within(format!("replies[{i}]")))?;
        }
        for (i, result) in self.tool_call_results.iter().enumerate() {
            result
                .validate()
                .map_err(|e| e.within(format!("tool_call_results[{i}]")))?;
        }
        Ok(())
    }

    /// Concatenation of every text reply, or of every text request for input messages.
    pub fn text(&self) -> String {
        if self.replies.is_empty() {
            self.requests.iter().map(|r| r.text.as_str()).collect()
        } else {
            self.replies.iter().map(|r| r.text.as_str()).collect()
        }
    }

    /// Concatenation of every reasoning reply.
    pub fn reasoning(&self) -> String {
        self.replies.iter().map(|r| r.reasoning.as_str()).collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.replies.iter().filter_map(|r| r.tool_call.as_ref())
    }
}

// ================================================================
// Request parts
// ================================================================

/// One input part: either text or a document, never both.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Request {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

impl Request {
    pub fn text(text: impl Into<String>) -> Self {
        Request {
            text: text.into(),
            document: None,
        }
    }

    pub fn document(document: Document) -> Self {
        Request {
            text: String::new(),
            document: Some(document),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.text.is_empty(), &self.document) {
            (true, None) => Err(ValidationError::new(
                "",
                "exactly one of text or document must be set, got neither",
            )),
            (false, Some(_)) => Err(ValidationError::new(
                "",
                "exactly one of text or document must be set, got both",
            )),
            (true, Some(document)) => document.validate().map_err(|e| e.within("document")),
            (false, None) => Ok(()),
        }
    }
}

/// Where a document's content lives.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    /// Raw bytes, base64 encoded when serialized.
    Inline(#[serde(with = "json_utils::base64_bytes")] Vec<u8>),
    /// A reference the backend fetches itself.
    Url(String),
}

/// A document attached to a message, or produced by the model.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type. Inferred from the filename or URL extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub source: DocumentSource,
}

impl Document {
    pub fn inline(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Document {
            filename: Some(filename.into()),
            media_type: None,
            source: DocumentSource::Inline(data.into()),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Document {
            filename: None,
            media_type: None,
            source: DocumentSource::Url(url.into()),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// The explicit media type, or one guessed from the filename then the URL path.
    pub fn resolved_media_type(&self) -> Option<String> {
        if let Some(media_type) = &self.media_type {
            return Some(media_type.clone());
        }
        if let Some(filename) = &self.filename
            && let Some(guess) = mime_guess::from_path(filename).first()
        {
            return Some(guess.essence_str().to_string());
        }
        if let DocumentSource::Url(raw) = &self.source {
            let path = url::Url::parse(raw)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| raw.clone());
            return mime_guess::from_path(path)
                .first()
                .map(|m| m.essence_str().to_string());
        }
        None
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.source {
            DocumentSource::Inline(data) if data.is_empty() => {
                Err(ValidationError::new("source", "inline document is empty"))
            }
            DocumentSource::Url(url) if url.is_empty() => {
                Err(ValidationError::new("source", "document URL is empty"))
            }
            DocumentSource::Inline(_) if self.resolved_media_type().is_none() => {
                Err(ValidationError::new(
                    "media_type",
                    "cannot determine the media type; set it or use a filename with a known extension",
                ))
            }
            _ => Ok(()),
        }
    }
}

// ================================================================
// Reply parts
// ================================================================

/// One output part. Exactly one of `text`, `reasoning`, `tool_call` or `document` is set,
/// optionally annotated by a `citation`. A reply may also be a citation on its own.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
    /// Backend-private data, round-tripped untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub opaque: serde_json::Map<String, serde_json::Value>,
}

/// Which payload a [Reply] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    Text,
    Reasoning,
    ToolCall,
    Document,
    Citation,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        Reply {
            reasoning: reasoning.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(tool_call: ToolCall) -> Self {
        Reply {
            tool_call: Some(tool_call),
            ..Default::default()
        }
    }

    pub fn document(document: Document) -> Self {
        Reply {
            document: Some(document),
            ..Default::default()
        }
    }

    pub fn citation(citation: Citation) -> Self {
        Reply {
            citation: Some(citation),
            ..Default::default()
        }
    }

    /// The payload kind, or `None` when the reply is empty or ambiguous.
    pub fn kind(&self) -> Option<ReplyKind> {
        let kinds = [
            (!self.text.is_empty()).then_some(ReplyKind::Text),
            (!self.reasoning.is_empty()).then_some(ReplyKind::Reasoning),
            self.tool_call.as_ref().map(|_| ReplyKind::ToolCall),
            self.document.as_ref().map(|_| ReplyKind::Document),
        ];
        let mut set = kinds.into_iter().flatten();
        match (set.next(), set.next()) {
            (Some(kind), None) => Some(kind),
            (None, None) if self.citation.is_some() => Some(ReplyKind::Citation),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = self.kind().ok_or_else(|| {
            ValidationError::new(
                "",
                "exactly one of text, reasoning, tool_call or document must be set",
            )
        })?;
        match kind {
            ReplyKind::ToolCall => {
                if let Some(tool_call) = &self.tool_call {
                    tool_call.validate().map_err(|e| e.within("tool_call"))?;
                }
            }
            ReplyKind::Document => {
                if let Some(document) = &self.document {
                    document.validate().map_err(|e| e.within("document"))?;
                }
            }
            ReplyKind::Text | ReplyKind::Reasoning | ReplyKind::Citation => {}
        }
        if let Some(citation) = &self.citation {
            if !matches!(kind, ReplyKind::Text | ReplyKind::Citation) {
                return Err(ValidationError::new(
                    "citation",
                    "a citation can only annotate text",
                ));
            }
            citation.validate().map_err(|e| e.within("citation"))?;
        }
        Ok(())
    }
}

/// A request from the model to call a tool.
///
/// `id` is stable across every streamed fragment describing the same call and never changes once
/// assigned. `arguments` is JSON encoded.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub opaque: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            opaque: serde_json::Map::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ValidationError::new("", "id or name is required"));
        }
        if self.arguments.is_empty() {
            return Err(ValidationError::new("arguments", "arguments are required"));
        }
        serde_json::from_str::<serde_json::Value>(&self.arguments).map_err(|e| {
            ValidationError::new("arguments", format!("arguments are not valid JSON: {e}"))
        })?;
        Ok(())
    }

    /// Decode the arguments into the tool's input type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// The outcome of a tool call, sent back by the user.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ToolCallResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub result: String,
}

impl ToolCallResult {
    pub fn new(id: impl Into<String>, name: impl Into<String>, result: impl Into<String>) -> Self {
        ToolCallResult {
            id: id.into(),
            name: name.into(),
            result: result.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ValidationError::new("", "id or name is required"));
        }
        if self.result.is_empty() {
            return Err(ValidationError::new("result", "result is required"));
        }
        Ok(())
    }
}

// ================================================================
// Citations
// ================================================================

/// Attribution for a span of the accompanying text.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Citation {
    #[serde(default)]
    pub start_index: u64,
    #[serde(default)]
    pub end_index: u64,
    pub sources: Vec<CitationSource>,
}

impl Citation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end_index < self.start_index {
            return Err(ValidationError::new(
                "end_index",
                format!(
                    "end index {} is before start index {}",
                    self.end_index, self.start_index
                ),
            ));
        }
        if self.sources.is_empty() {
            return Err(ValidationError::new("sources", "at least one source is required"));
        }
        for (i, source) in self.sources.iter().enumerate() {
            source
                .validate()
                .map_err(|e| e.within(format!("sources[{i}]")))?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Web,
    WebImage,
    /// A search query the backend issued; the query is in `snippet`.
    WebQuery,
    Document,
    Tool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CitationSource {
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
}

impl CitationSource {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            SourceKind::Web | SourceKind::WebImage if self.url.is_empty() => {
                Err(ValidationError::new("url", "web sources require a URL"))
            }
            SourceKind::WebQuery if self.snippet.is_empty() => {
                Err(ValidationError::new("snippet", "web queries require the query text"))
            }
            SourceKind::Document if self.id.is_empty() && self.title.is_empty() => Err(
                ValidationError::new("", "document sources require an id or a title"),
            ),
            SourceKind::Tool if self.id.is_empty() => {
                Err(ValidationError::new("id", "tool sources require an id"))
            }
            _ => Ok(()),
        }
    }
}

// ================================================================
// Results
// ================================================================

/// Why generation stopped. Everything but [FinishReason::Pending] is terminal.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Pending,
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other,
}

impl FinishReason {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FinishReason::Pending)
    }
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            FinishReason::Pending => "pending",
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Other => "other",
        };
        f.write_str(reason)
    }
}

/// Token accounting for one generation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub input_cached_tokens: u64,
    pub reasoning_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub finish_reason: FinishReason,
}

/// Log-probability of one generated token and its strongest alternatives.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
    /// Raw bytes of the token, when the backend reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top: Vec<TopLogprob>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f64,
}

/// The finalized outcome of a generation call.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Generation {
    pub message: Message,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logprobs: Vec<TokenLogprob>,
}

impl Default for Generation {
    fn default() -> Self {
        Generation {
            message: Message {
                role: Role::Assistant,
                ..Default::default()
            },
            usage: Usage::default(),
            logprobs: Vec::new(),
        }
    }
}

impl Generation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.role != Role::Assistant {
            return Err(ValidationError::new(
                "message.role",
                format!("a generation is authored by the assistant, got {}", self.message.role),
            ));
        }
        for (i, reply) in self.message.replies.iter().enumerate() {
            reply
                .validate()
                .map_err(|e| e.within(format!("message.replies[{i}]")))?;
        }
        Ok(())
    }

    pub fn text(&self) -> String {
        self.message.text()
    }

    /// Decode the text replies as JSON, for structured decoding.
    pub fn decode_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_requires_exactly_one_payload() {
        assert!(Request::text("hi").validate().is_ok());
        assert!(Request::document(Document::inline("a.pdf", b"%PDF".to_vec())).validate().is_ok());

        let neither = Request::default();
        let err = neither.validate().unwrap_err();
        assert!(err.reason.contains("neither"));

        let both = Request {
            text: "hi".into(),
            document: Some(Document::url("https://example.com/a.pdf")),
        };
        let err = both.validate().unwrap_err();
        assert!(err.reason.contains("both"));
    }

    #[test]
    fn test_validation_error_path() {
        let messages = vec![
            Message::user("hello"),
            Message {
                role: Role::User,
                requests: vec![Request::default()],
                ..Default::default()
            },
        ];
        let err = validate_conversation(&messages).unwrap_err();
        assert_eq!(err.field, "messages[1].requests[0]");
    }

    #[test]
    fn test_empty_conversation_is_invalid() {
        assert!(validate_conversation(&[]).is_err());
    }

    #[test]
    fn test_role_rules() {
        let user_reply = Message {
            role: Role::User,
            replies: vec![Reply::text("nope")],
            ..Default::default()
        };
        assert_eq!(user_reply.validate().unwrap_err().field, "replies");

        let assistant_result = Message {
            role: Role::Assistant,
            tool_call_results: vec![ToolCallResult::new("1", "weather", "sunny")],
            ..Default::default()
        };
        assert_eq!(
            assistant_result.validate().unwrap_err().field,
            "tool_call_results"
        );

        let mixed = Message {
            role: Role::Assistant,
            requests: vec![Request::text("a")],
            replies: vec![Reply::text("b")],
            ..Default::default()
        };
        assert!(mixed.validate().is_err());

        assert!(Message::default().validate().is_err());
    }

    #[test]
    fn test_reply_kind() {
        assert_eq!(Reply::text("a").kind(), Some(ReplyKind::Text));
        assert_eq!(Reply::reasoning("a").kind(), Some(ReplyKind::Reasoning));
        assert_eq!(Reply::default().kind(), None);

        let ambiguous = Reply {
            text: "a".into(),
            reasoning: "b".into(),
            ..Default::default()
        };
        assert_eq!(ambiguous.kind(), None);
        assert!(ambiguous.validate().is_err());
    }

    #[test]
    fn test_tool_call_arguments() {
        assert!(ToolCall::new("1", "f", r#"{"a":1}"#).validate().is_ok());
        assert!(ToolCall::new("", "", "{}").validate().is_err());
        let empty = ToolCall::new("1", "f", "");
        assert_eq!(empty.validate().unwrap_err().field, "arguments");
        let broken = ToolCall::new("1", "f", "{");
        assert!(broken.validate().unwrap_err().reason.contains("JSON"));
    }

    #[test]
    fn test_citation_only_annotates_text() {
        let citation = Citation {
            start_index: 0,
            end_index: 4,
            sources: vec![CitationSource {
                kind: SourceKind::Web,
                url: "https://example.com".into(),
                ..Default::default()
            }],
        };
        let mut reply = Reply::text("abcd");
        reply.citation = Some(citation.clone());
        assert!(reply.validate().is_ok());
        assert!(Reply::citation(citation.clone()).validate().is_ok());

        let mut reasoning = Reply::reasoning("hmm");
        reasoning.citation = Some(citation);
        assert_eq!(reasoning.validate().unwrap_err().field, "citation");
    }

    #[test]
    fn test_citation_source_rules() {
        let missing_url = CitationSource::default();
        assert!(missing_url.validate().is_err());
        let query = CitationSource {
            kind: SourceKind::WebQuery,
            snippet: "rust async".into(),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_document_media_type_inference() {
        assert_eq!(
            Document::inline("report.pdf", vec![1]).resolved_media_type(),
            Some("application/pdf".to_string())
        );
        assert_eq!(
            Document::url("https://example.com/cat.png?size=2").resolved_media_type(),
            Some("image/png".to_string())
        );
        let unknown = Document {
            filename: None,
            media_type: None,
            source: DocumentSource::Inline(vec![1, 2]),
        };
        assert_eq!(unknown.validate().unwrap_err().field, "media_type");
    }

    #[test]
    fn test_message_serde() {
        let message = Message {
            role: Role::Assistant,
            replies: vec![
                Reply::text("hi"),
                Reply::tool_call(ToolCall::new("call_1", "weather", r#"{"city":"Paris"}"#)),
            ],
            ..Default::default()
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "replies": [
                    {"text": "hi"},
                    {"tool_call": {"id": "call_1", "name": "weather", "arguments": "{\"city\":\"Paris\"}"}}
                ]
            })
        );
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_inline_document_serializes_as_base64() {
        let document = Document::inline("a.txt", b"hello".to_vec());
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["source"], json!({"inline": "aGVsbG8="}));
    }

    #[test]
    fn test_generation_decode_as() {
        #[derive(serde::Deserialize)]
        struct Answer {
            value: i64,
        }
        let mut generation = Generation::default();
        generation.message.replies.push(Reply::text(r#"{"value": 42}"#));
        let answer: Answer = generation.decode_as().unwrap();
        assert_eq!(answer.value, 42);
    }
}
