//! Streaming generation.
//!
//! Backends decode their wire chunks into [Fragment]s. An [Accumulator] folds the fragments, in
//! arrival order, into one [Generation]:
//! - text and reasoning deltas concatenate onto the last reply when it has the same kind,
//! - tool call deltas are keyed by call ID: a new ID opens a reply, a known ID appends to that
//!   call's arguments,
//! - a document delta replaces the pending document,
//! - a citation is always a reply of its own.
//!
//! [GenerationStream] is the caller side of a streaming call. It yields fragments while
//! accumulating them, and [GenerationStream::finish] returns the finalized generation.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::completion::{CompletionError, CompletionResponse};
use crate::message::{
    Citation, Document, FinishReason, Generation, Reply, ReplyKind, TokenLogprob, ToolCall, Usage,
    ValidationError,
};

// ================================================================
// Fragments
// ================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Delta {
    Text(String),
    Reasoning(String),
    /// A piece of a tool call. `arguments` holds the next slice of the JSON arguments.
    ToolCall(ToolCall),
    Document(Document),
    Citation(Citation),
}

/// An incremental piece of a reply.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Fragment {
    pub delta: Delta,
    /// Backend-private data merged into the reply's `opaque` map.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub opaque: serde_json::Map<String, serde_json::Value>,
}

impl From<Delta> for Fragment {
    fn from(delta: Delta) -> Self {
        Fragment {
            delta,
            opaque: serde_json::Map::new(),
        }
    }
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Delta::Text(text.into()).into()
    }

    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        Delta::Reasoning(reasoning.into()).into()
    }

    pub fn tool_call(tool_call: ToolCall) -> Self {
        Delta::ToolCall(tool_call).into()
    }

    pub fn document(document: Document) -> Self {
        Delta::Document(document).into()
    }

    pub fn citation(citation: Citation) -> Self {
        Delta::Citation(citation).into()
    }

    pub fn with_opaque(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.opaque.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ReplyKind {
        match &self.delta {
            Delta::Text(_) => ReplyKind::Text,
            Delta::Reasoning(_) => ReplyKind::Reasoning,
            Delta::ToolCall(_) => ReplyKind::ToolCall,
            Delta::Document(_) => ReplyKind::Document,
            Delta::Citation(_) => ReplyKind::Citation,
        }
    }

    /// Tool call arguments may be partial JSON here; they are checked at finalization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.delta {
            Delta::Text(s) | Delta::Reasoning(s) if s.is_empty() && self.opaque.is_empty() => {
                Err(ValidationError::new("delta", "empty fragment"))
            }
            Delta::Text(_) | Delta::Reasoning(_) => Ok(()),
            Delta::ToolCall(call) if call.id.is_empty() && call.name.is_empty() => Err(
                ValidationError::new("delta.tool_call", "id or name is required"),
            ),
            Delta::ToolCall(_) => Ok(()),
            Delta::Document(document) => document.validate().map_err(|e| e.within("delta.document")),
            Delta::Citation(citation) => citation.validate().map_err(|e| e.within("delta.citation")),
        }
    }
}

// ================================================================
// Accumulation
// ================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulateError {
    #[error("invalid fragment: {0}")]
    InvalidFragment(ValidationError),
    #[error("invalid generation: {0}")]
    InvalidGeneration(ValidationError),
    #[error("fragment received after finish reason {0}")]
    AfterTerminal(FinishReason),
    #[error("finish reason cannot move from {from} to {to}")]
    FinishReason { from: FinishReason, to: FinishReason },
    #[error("usage {field} decreased from {from} to {to}")]
    UsageDecreased {
        field: &'static str,
        from: u64,
        to: u64,
    },
    #[error("tool call {id:?} changed name from {from:?} to {to:?}")]
    ToolCallRenamed { id: String, from: String, to: String },
    #[error("generation is already finalized")]
    Finalized,
}

impl From<AccumulateError> for CompletionError {
    fn from(error: AccumulateError) -> Self {
        CompletionError::DecoderBug(error.to_string())
    }
}

/// Folds fragments into a [Generation].
#[derive(Debug, Clone)]
pub struct Accumulator {
    generation: Generation,
    rewrite_stop: bool,
    finalized: bool,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator {
            generation: Generation::default(),
            rewrite_stop: true,
            finalized: false,
        }
    }

    /// Whether finalization turns [FinishReason::Stop] into [FinishReason::ToolCalls] when a tool
    /// call was produced. On by default; backends that report tool calls faithfully disable it.
    pub fn rewrite_stop_to_tool_calls(mut self, enabled: bool) -> Self {
        self.rewrite_stop = enabled;
        self
    }

    pub fn usage(&self) -> &Usage {
        &self.generation.usage
    }

    pub fn replies(&self) -> &[Reply] {
        &self.generation.message.replies
    }

    pub fn accumulate(&mut self, fragment: Fragment) -> Result<(), AccumulateError> {
        if self.finalized {
            return Err(AccumulateError::Finalized);
        }
        let finish_reason = self.generation.usage.finish_reason;
        if finish_reason.is_terminal() {
            return Err(AccumulateError::AfterTerminal(finish_reason));
        }
        fragment
            .validate()
            .map_err(AccumulateError::InvalidFragment)?;

        let kind = fragment.kind();
        let Fragment { delta, opaque } = fragment;
        let replies = &mut self.generation.message.replies;
        let last_kind = replies.last().and_then(Reply::kind);

        match delta {
            Delta::Text(text) | Delta::Reasoning(text) => {
                // A bare opaque payload, such as a trailing signature, belongs to the last reply.
                if last_kind == Some(kind) || text.is_empty() {
                    let Some(last) = replies.last_mut() else {
                        return Err(AccumulateError::InvalidFragment(ValidationError::new(
                            "delta",
                            "opaque data without a reply to attach to",
                        )));
                    };
                    if kind == ReplyKind::Text {
                        last.text.push_str(&text);
                    } else {
                        last.reasoning.push_str(&text);
                    }
                    last.opaque.extend(opaque);
                } else {
                    let mut reply = if kind == ReplyKind::Text {
                        Reply::text(text)
                    } else {
                        Reply::reasoning(text)
                    };
                    reply.opaque = opaque;
                    replies.push(reply);
                }
            }
            Delta::ToolCall(delta) => {
                let position = if delta.id.is_empty() {
                    None
                } else {
                    replies.iter().position(|r| {
                        r.tool_call
                            .as_ref()
                            .is_some_and(|call| call.id == delta.id)
                    })
                };
                match position.and_then(|i| replies.get_mut(i)) {
                    Some(Reply {
                        tool_call: Some(call),
                        opaque: reply_opaque,
                        ..
                    }) => {
                        if call.name.is_empty() {
                            call.name = delta.name;
                        } else if !delta.name.is_empty() && delta.name != call.name {
                            return Err(AccumulateError::ToolCallRenamed {
                                id: delta.id,
                                from: call.name.clone(),
                                to: delta.name,
                            });
                        }
                        call.arguments.push_str(&delta.arguments);
                        call.opaque.extend(delta.opaque);
                        reply_opaque.extend(opaque);
                    }
                    _ => {
                        let mut reply = Reply::tool_call(delta);
                        reply.opaque = opaque;
                        replies.push(reply);
                    }
                }
            }
            Delta::Document(document) => {
                if last_kind == Some(ReplyKind::Document)
                    && let Some(last) = replies.last_mut()
                {
                    last.document = Some(document);
                    last.opaque.extend(opaque);
                } else {
                    let mut reply = Reply::document(document);
                    reply.opaque = opaque;
                    replies.push(reply);
                }
            }
            Delta::Citation(citation) => {
                let mut reply = Reply::citation(citation);
                reply.opaque = opaque;
                replies.push(reply);
            }
        }
        Ok(())
    }

    /// Record the running usage. Counters never decrease and the finish reason only moves from
    /// pending to a terminal value.
    pub fn update_usage(&mut self, usage: Usage) -> Result<(), AccumulateError> {
        if self.finalized {
            return Err(AccumulateError::Finalized);
        }
        let current = self.generation.usage;
        if current.finish_reason.is_terminal() && usage.finish_reason != current.finish_reason {
            return Err(AccumulateError::FinishReason {
                from: current.finish_reason,
                to: usage.finish_reason,
            });
        }
        for (field, from, to) in [
            ("input_tokens", current.input_tokens, usage.input_tokens),
            (
                "input_cached_tokens",
                current.input_cached_tokens,
                usage.input_cached_tokens,
            ),
            ("reasoning_tokens", current.reasoning_tokens, usage.reasoning_tokens),
            ("output_tokens", current.output_tokens, usage.output_tokens),
            ("total_tokens", current.total_tokens, usage.total_tokens),
        ] {
            if to < from {
                return Err(AccumulateError::UsageDecreased { field, from, to });
            }
        }
        self.generation.usage = usage;
        Ok(())
    }

    pub fn extend_logprobs(&mut self, logprobs: impl IntoIterator<Item = TokenLogprob>) {
        self.generation.logprobs.extend(logprobs);
    }

    /// Validate and freeze the generation. Calling it again returns the same generation.
    pub fn finalize(&mut self) -> Result<Generation, AccumulateError> {
        if !self.finalized {
            let usage = &mut self.generation.usage;
            if self.rewrite_stop
                && usage.finish_reason == FinishReason::Stop
                && self.generation.message.tool_calls().next().is_some()
            {
                usage.finish_reason = FinishReason::ToolCalls;
            }
            if !self.generation.usage.finish_reason.is_terminal() {
                tracing::warn!(
                    target: "switchboard::streaming",
                    "generation finalized without a finish reason"
                );
            }
            self.generation
                .validate()
                .map_err(AccumulateError::InvalidGeneration)?;
            self.finalized = true;
        }
        Ok(self.generation.clone())
    }
}

// ================================================================
// Streaming handle
// ================================================================

/// What the background producer hands to the caller's task.
#[derive(Debug)]
pub(crate) enum StreamEvent {
    Fragment(Fragment),
    Usage(Usage),
    Logprobs(Vec<TokenLogprob>),
}

/// A live generation. Yields fragments as they arrive; [GenerationStream::finish] returns the
/// finalized result.
///
/// Dropping the stream early cancels the background producer.
pub struct GenerationStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    token: CancellationToken,
    producer: Option<JoinHandle<Result<(), CompletionError>>>,
    accumulator: Accumulator,
    error: Option<CompletionError>,
    done: bool,
    unsupported: Vec<String>,
    span: tracing::Span,
}

impl GenerationStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<StreamEvent>,
        token: CancellationToken,
        producer: JoinHandle<Result<(), CompletionError>>,
        accumulator: Accumulator,
        unsupported: Vec<String>,
        span: tracing::Span,
    ) -> Self {
        GenerationStream {
            rx,
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
            producer: Some(producer),
            accumulator,
            error: None,
            done: false,
            unsupported,
            span,
        }
    }

    /// A token that cancels this generation when triggered.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Options that were requested but dropped because the backend does not support them.
    pub fn unsupported(&self) -> &[String] {
        &self.unsupported
    }

    /// Replies accumulated so far.
    pub fn replies(&self) -> &[Reply] {
        self.accumulator.replies()
    }

    /// Consume the rest of the stream and return the finalized generation.
    ///
    /// A cancelled generation returns [CompletionError::Cancelled], never a partial result.
    pub async fn finish(mut self) -> Result<CompletionResponse, CompletionError> {
        while self.next().await.is_some() {}

        let produced = match self.producer.take() {
            Some(producer) => match producer.await {
                Ok(result) => result,
                Err(e) => Err(CompletionError::DecoderBug(format!(
                    "stream producer failed: {e}"
                ))),
            },
            None => Ok(()),
        };

        if let Some(error) = self.error.take() {
            match produced {
                Err(CompletionError::Cancelled) | Ok(()) => {}
                Err(other) => tracing::warn!(
                    target: "switchboard::streaming",
                    parent: &self.span,
                    error = %other,
                    "discarding secondary stream error"
                ),
            }
            return Err(error);
        }
        produced?;
        if self.token.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }

        let generation = self.accumulator.finalize()?;
        self.span
            .record("gen_ai.usage.input_tokens", generation.usage.input_tokens);
        self.span
            .record("gen_ai.usage.output_tokens", generation.usage.output_tokens);
        tracing::debug!(
            target: "switchboard::streaming",
            parent: &self.span,
            finish_reason = %generation.usage.finish_reason,
            "stream finished"
        );
        Ok(CompletionResponse {
            generation,
            unsupported: std::mem::take(&mut self.unsupported),
        })
    }

    fn fail(&mut self, error: CompletionError) {
        self.error = Some(error);
        self.done = true;
        self.token.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        if self.producer.is_some() {
            self.token.cancel();
        }
        // Drain so a producer blocked on a full queue observes the closure.
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Stream for GenerationStream {
    type Item = Fragment;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let stream = self.get_mut();
        loop {
            if stream.done {
                return Poll::Ready(None);
            }
            if stream.cancelled.as_mut().poll(cx).is_ready() {
                if stream.error.is_none() {
                    stream.error = Some(CompletionError::Cancelled);
                }
                stream.done = true;
                stream.rx.close();
                return Poll::Ready(None);
            }

            let event = match stream.rx.poll_recv(cx) {
                Poll::Ready(Some(event)) => event,
                Poll::Ready(None) => {
                    stream.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            };

            let result = match event {
                StreamEvent::Fragment(fragment) => {
                    match stream.accumulator.accumulate(fragment.clone()) {
                        Ok(()) => return Poll::Ready(Some(fragment)),
                        Err(e) => Err(e),
                    }
                }
                StreamEvent::Usage(usage) => stream.accumulator.update_usage(usage),
                StreamEvent::Logprobs(logprobs) => {
                    stream.accumulator.extend_logprobs(logprobs);
                    Ok(())
                }
            };
            if let Err(e) = result {
                stream.fail(e.into());
                return Poll::Ready(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CitationSource, SourceKind};
    use serde_json::json;

    fn stop() -> Usage {
        Usage {
            input_tokens: 3,
            output_tokens: 2,
            total_tokens: 5,
            finish_reason: FinishReason::Stop,
            ..Default::default()
        }
    }

    #[test]
    fn test_text_concatenates() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::text("Hel")).unwrap();
        acc.accumulate(Fragment::text("lo")).unwrap();
        acc.update_usage(stop()).unwrap();
        let generation = acc.finalize().unwrap();
        assert_eq!(generation.message.replies, vec![Reply::text("Hello")]);
        assert_eq!(generation.usage.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_kind_switch_opens_new_reply() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::reasoning("think")).unwrap();
        acc.accumulate(Fragment::reasoning("ing")).unwrap();
        acc.accumulate(Fragment::text("answer")).unwrap();
        acc.accumulate(Fragment::reasoning("more")).unwrap();
        let replies = acc.replies();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0].reasoning, "thinking");
        assert_eq!(replies[1].text, "answer");
        assert_eq!(replies[2].reasoning, "more");
    }

    #[test]
    fn test_tool_calls_keyed_by_id() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::tool_call(ToolCall::new("a", "add", "{\"x\":")))
            .unwrap();
        acc.accumulate(Fragment::tool_call(ToolCall::new("b", "mul", "{\"y\":2}")))
            .unwrap();
        acc.accumulate(Fragment::tool_call(ToolCall::new("a", "", "1}")))
            .unwrap();
        let calls: Vec<&ToolCall> = acc
            .replies()
            .iter()
            .filter_map(|r| r.tool_call.as_ref())
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, "{\"x\":1}");
        assert_eq!(calls[1].arguments, "{\"y\":2}");

        let err = acc
            .accumulate(Fragment::tool_call(ToolCall::new("a", "sub", "")))
            .unwrap_err();
        assert!(matches!(err, AccumulateError::ToolCallRenamed { .. }));
    }

    #[test]
    fn test_tool_call_without_id_always_opens() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::tool_call(ToolCall::new("", "now", "{}")))
            .unwrap();
        acc.accumulate(Fragment::tool_call(ToolCall::new("", "now", "{}")))
            .unwrap();
        assert_eq!(acc.replies().len(), 2);
    }

    #[test]
    fn test_tool_call_continuation_keeps_fragment_opaque() {
        let mut acc = Accumulator::new();
        acc.accumulate(
            Fragment::tool_call(ToolCall::new("a", "add", "{\"x\":")).with_opaque("first", 1),
        )
        .unwrap();
        acc.accumulate(Fragment::tool_call(ToolCall::new("a", "", "1}")).with_opaque("second", 2))
            .unwrap();
        let replies = acc.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].opaque.get("first"), Some(&json!(1)));
        assert_eq!(replies[0].opaque.get("second"), Some(&json!(2)));
        assert_eq!(
            replies[0].tool_call.as_ref().unwrap().arguments,
            "{\"x\":1}"
        );
    }

    #[test]
    fn test_stop_rewritten_to_tool_calls() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::tool_call(ToolCall::new("1", "now", "{}")))
            .unwrap();
        acc.update_usage(stop()).unwrap();
        assert_eq!(
            acc.finalize().unwrap().usage.finish_reason,
            FinishReason::ToolCalls
        );

        let mut acc = Accumulator::new().rewrite_stop_to_tool_calls(false);
        acc.accumulate(Fragment::tool_call(ToolCall::new("1", "now", "{}")))
            .unwrap();
        acc.update_usage(stop()).unwrap();
        assert_eq!(acc.finalize().unwrap().usage.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_finish_reason_never_regresses() {
        let mut acc = Accumulator::new();
        acc.update_usage(stop()).unwrap();
        let err = acc
            .update_usage(Usage {
                finish_reason: FinishReason::Pending,
                ..stop()
            })
            .unwrap_err();
        assert_eq!(
            err,
            AccumulateError::FinishReason {
                from: FinishReason::Stop,
                to: FinishReason::Pending
            }
        );
        assert!(
            acc.update_usage(Usage {
                finish_reason: FinishReason::Length,
                ..stop()
            })
            .is_err()
        );
        // Repeating the same terminal usage is fine.
        acc.update_usage(stop()).unwrap();
    }

    #[test]
    fn test_usage_counters_monotonic() {
        let mut acc = Accumulator::new();
        acc.update_usage(Usage {
            output_tokens: 5,
            ..Default::default()
        })
        .unwrap();
        let err = acc
            .update_usage(Usage {
                output_tokens: 4,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "usage output_tokens decreased from 5 to 4");
    }

    #[test]
    fn test_fragment_after_terminal_rejected() {
        let mut acc = Accumulator::new();
        acc.update_usage(stop()).unwrap();
        assert_eq!(
            acc.accumulate(Fragment::text("late")).unwrap_err(),
            AccumulateError::AfterTerminal(FinishReason::Stop)
        );
    }

    #[test]
    fn test_finalize_idempotent_and_frozen() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::text("done")).unwrap();
        acc.update_usage(stop()).unwrap();
        let first = serde_json::to_vec(&acc.finalize().unwrap()).unwrap();
        let second = serde_json::to_vec(&acc.finalize().unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            acc.update_usage(stop()).unwrap_err(),
            AccumulateError::Finalized
        );
    }

    #[test]
    fn test_invalid_tool_arguments_fail_finalize() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::tool_call(ToolCall::new("1", "f", "{\"a\":")))
            .unwrap();
        acc.update_usage(stop()).unwrap();
        assert!(matches!(
            acc.finalize().unwrap_err(),
            AccumulateError::InvalidGeneration(_)
        ));
    }

    #[test]
    fn test_document_replaces_pending_buffer() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::document(Document::inline("a.png", b"12".to_vec())))
            .unwrap();
        acc.accumulate(Fragment::document(Document::inline("a.png", b"1234".to_vec())))
            .unwrap();
        assert_eq!(acc.replies().len(), 1);
        assert_eq!(
            acc.replies()[0].document,
            Some(Document::inline("a.png", b"1234".to_vec()))
        );
    }

    #[test]
    fn test_citation_is_own_reply_and_opaque_merges() {
        let mut acc = Accumulator::new();
        acc.accumulate(Fragment::text("Paris")).unwrap();
        acc.accumulate(Fragment::citation(Citation {
            start_index: 0,
            end_index: 5,
            sources: vec![CitationSource {
                kind: SourceKind::Web,
                url: "https://example.com".into(),
                ..Default::default()
            }],
        }))
        .unwrap();
        acc.accumulate(Fragment::text("").with_opaque("signature", "c2ln"))
            .unwrap();
        let replies = acc.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].text, "Paris");
        assert!(replies[1].citation.is_some());
        assert_eq!(replies[1].opaque.get("signature"), Some(&json!("c2ln")));
    }

    #[test]
    fn test_empty_fragment_rejected() {
        let mut acc = Accumulator::new();
        assert!(matches!(
            acc.accumulate(Fragment::text("")).unwrap_err(),
            AccumulateError::InvalidFragment(_)
        ));
    }

    fn spawn_stream(events: Vec<StreamEvent>) -> GenerationStream {
        let (tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let producer = tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(())
        });
        GenerationStream::new(
            rx,
            token,
            producer,
            Accumulator::new(),
            vec![],
            tracing::Span::none(),
        )
    }

    #[tokio::test]
    async fn test_stream_yields_and_finishes() {
        let mut stream = spawn_stream(vec![
            StreamEvent::Fragment(Fragment::text("Hel")),
            StreamEvent::Fragment(Fragment::text("lo")),
            StreamEvent::Usage(stop()),
        ]);
        assert_eq!(stream.next().await, Some(Fragment::text("Hel")));
        let response = stream.finish().await.unwrap();
        assert_eq!(response.generation.text(), "Hello");
        assert_eq!(response.generation.usage.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_stream_surfaces_engine_errors() {
        let stream = spawn_stream(vec![
            StreamEvent::Usage(stop()),
            StreamEvent::Fragment(Fragment::text("late")),
        ]);
        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, CompletionError::DecoderBug(_)));
    }

    #[tokio::test]
    async fn test_cancelled_stream_has_no_result() {
        let stream = spawn_stream(vec![StreamEvent::Fragment(Fragment::text("partial"))]);
        stream.cancel_handle().cancel();
        assert!(matches!(
            stream.finish().await.unwrap_err(),
            CompletionError::Cancelled
        ));
    }
}
