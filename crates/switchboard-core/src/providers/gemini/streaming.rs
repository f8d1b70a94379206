//! Decoding of `streamGenerateContent?alt=sse` chunks into fragments.
//!
//! Gemini reports cumulative usage on most chunks and the finish reason on the last candidate.
//! Chunks with all-zero usage metadata leave the running usage untouched.

use serde_json::Value;

use super::completion::{
    SIGNATURE, check_role,
    gemini_api_types::{GenerateContentResponse, Part, PartKind},
};
use crate::{
    completion::CompletionError,
    json_utils::DecodeMode,
    message::{FinishReason, Usage},
    providers::ChunkOutput,
    streaming::Fragment,
};

pub(crate) fn process_chunk(
    chunk: GenerateContentResponse,
    usage: &Usage,
    mode: DecodeMode,
) -> Result<ChunkOutput, CompletionError> {
    let GenerateContentResponse {
        candidates,
        prompt_feedback,
        usage_metadata,
        ..
    } = chunk;
    if candidates.len() > 1 {
        return Err(CompletionError::decoder_bug(format!(
            "unexpected number of candidates; expected 1, got {}",
            candidates.len()
        )));
    }

    let mut output = ChunkOutput::default();
    let mut next_usage = *usage;
    if let Some(metadata) = usage_metadata
        && !metadata.is_zero()
    {
        next_usage = metadata.to_usage(usage.finish_reason);
    }
    if candidates.is_empty()
        && prompt_feedback
            .as_ref()
            .is_some_and(|f| f.block_reason.is_some())
    {
        // The prompt itself was blocked, nothing will be generated.
        next_usage.finish_reason = FinishReason::ContentFilter;
    }

    if let Some(candidate) = candidates.into_iter().next() {
        if let Some(content) = candidate.content {
            check_role(&content.role)?;
            for part in content.parts {
                if let Some(fragment) = part.into_fragment()? {
                    output.fragments.push(fragment);
                }
            }
        }
        if let Some(citations) = candidate.citation_metadata {
            output.fragments.extend(
                citations
                    .into_replies()
                    .into_iter()
                    .map(Fragment::citation),
            );
        }
        if let Some(logprobs) = candidate.logprobs_result {
            output.logprobs = logprobs.into_token_logprobs();
        }
        if let Some(reason) = &candidate.finish_reason {
            next_usage.finish_reason = reason.to_canonical(mode)?;
        }
    }

    if next_usage != *usage {
        output.usage = Some(next_usage);
    }
    Ok(output)
}

impl Part {
    /// Decode a streamed part. `Ok(None)` for parts that carry nothing.
    fn into_fragment(self) -> Result<Option<Fragment>, CompletionError> {
        let Part {
            thought,
            thought_signature,
            data,
        } = self;
        let fragment = match data {
            Some(PartKind::Text(text)) if thought => Fragment::reasoning(text),
            Some(PartKind::Text(text)) => Fragment::text(text),
            Some(PartKind::InlineData(blob)) => Fragment::document(blob.into_document()?),
            Some(PartKind::FunctionCall(call)) => {
                let mut tool_call = call.into_tool_call()?;
                if let Some(signature) = thought_signature {
                    tool_call
                        .opaque
                        .insert(SIGNATURE.into(), Value::String(signature));
                }
                return Ok(Some(Fragment::tool_call(tool_call)));
            }
            // File references, tool results and code execution cannot be accumulated.
            Some(other) => return Err(other.unsupported()),
            None => Fragment::text(""),
        };
        let fragment = match thought_signature {
            Some(signature) => fragment.with_opaque(SIGNATURE, signature),
            None => fragment,
        };
        if fragment.validate().is_err() {
            // Empty text without a signature.
            return Ok(None);
        }
        Ok(Some(fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;
    use crate::streaming::{Accumulator, Delta};
    use serde_json::json;

    fn chunk(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    fn process(value: Value, usage: &Usage) -> Result<ChunkOutput, CompletionError> {
        process_chunk(chunk(value), usage, DecodeMode::Lenient)
    }

    #[test]
    fn test_text_and_thoughts() {
        let out = process(
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "let me think", "thought": true},
                        {"text": "Hel"}
                    ]}
                }],
                "usageMetadata": {"promptTokenCount": 4, "totalTokenCount": 4}
            }),
            &Usage::default(),
        )
        .unwrap();

        assert_eq!(
            out.fragments,
            vec![Fragment::reasoning("let me think"), Fragment::text("Hel")]
        );
        let usage = out.usage.unwrap();
        assert_eq!(usage.input_tokens, 4);
        assert_eq!(usage.finish_reason, FinishReason::Pending);
    }

    #[test]
    fn test_blocked_prompt_is_content_filter() {
        let out = process(
            json!({
                "promptFeedback": {"blockReason": "SAFETY"},
                "usageMetadata": {"promptTokenCount": 7, "totalTokenCount": 7}
            }),
            &Usage::default(),
        )
        .unwrap();
        assert!(out.fragments.is_empty());
        let usage = out.usage.unwrap();
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.finish_reason, FinishReason::ContentFilter);
    }

    #[test]
    fn test_zero_usage_is_ignored() {
        let running = Usage {
            input_tokens: 4,
            total_tokens: 4,
            ..Default::default()
        };
        let out = process(
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}}],
                "usageMetadata": {}
            }),
            &running,
        )
        .unwrap();
        assert!(out.usage.is_none());
    }

    #[test]
    fn test_finish_reason_keeps_counters() {
        let running = Usage {
            input_tokens: 4,
            output_tokens: 1,
            total_tokens: 5,
            ..Default::default()
        };
        let out = process(
            json!({"candidates": [{"finishReason": "STOP"}]}),
            &running,
        )
        .unwrap();
        assert_eq!(
            out.usage,
            Some(Usage {
                finish_reason: FinishReason::Stop,
                ..running
            })
        );
    }

    #[test]
    fn test_function_call_with_signature() {
        let out = process(
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{
                    "functionCall": {"name": "get_weather", "args": {"city": "Paris"}},
                    "thoughtSignature": "c2ln"
                }]}}]
            }),
            &Usage::default(),
        )
        .unwrap();

        let mut expected = ToolCall::new("", "get_weather", r#"{"city":"Paris"}"#);
        expected.opaque.insert(SIGNATURE.into(), json!("c2ln"));
        assert_eq!(out.fragments, vec![Fragment::tool_call(expected)]);
    }

    #[test]
    fn test_inline_blob_becomes_document() {
        let out = process(
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{
                    "inlineData": {"mimeType": "image/png", "data": "iVBORw=="}
                }]}}]
            }),
            &Usage::default(),
        )
        .unwrap();
        let Some(Delta::Document(document)) = out.fragments.first().map(|f| &f.delta) else {
            panic!("expected a document fragment, got {:?}", out.fragments);
        };
        assert_eq!(document.filename.as_deref(), Some("content.png"));
        assert_eq!(document.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_unsupported_parts_are_decoder_bugs() {
        for part in [
            json!({"fileData": {"mimeType": "image/png", "fileUri": "gs://b/a.png"}}),
            json!({"functionResponse": {"name": "f", "response": {}}}),
            json!({"executableCode": {"language": "PYTHON", "code": "print(1)"}}),
            json!({"codeExecutionResult": {"outcome": "OUTCOME_OK"}}),
        ] {
            let err = process(
                json!({"candidates": [{"content": {"role": "model", "parts": [part]}}]}),
                &Usage::default(),
            )
            .unwrap_err();
            assert!(matches!(err, CompletionError::DecoderBug(_)), "{err}");
        }
    }

    #[test]
    fn test_unexpected_role() {
        let err = process(
            json!({"candidates": [{"content": {"role": "user", "parts": [{"text": "hi"}]}}]}),
            &Usage::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), r#"DecoderBug: unexpected role "user""#);
    }

    #[test]
    fn test_several_candidates() {
        let err = process(
            json!({"candidates": [{}, {}]}),
            &Usage::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected 1, got 2"));
    }

    #[test]
    fn test_unknown_finish_reason_by_mode() {
        let value = json!({"candidates": [{"finishReason": "RECITATION"}]});
        let lenient = process_chunk(chunk(value.clone()), &Usage::default(), DecodeMode::Lenient)
            .unwrap();
        assert_eq!(lenient.usage.unwrap().finish_reason, FinishReason::Other);

        let strict = process_chunk(chunk(value), &Usage::default(), DecodeMode::Strict);
        assert!(matches!(strict, Err(CompletionError::DecoderBug(_))));
    }

    #[test]
    fn test_chunks_accumulate() {
        let chunks = [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}],
                   "usageMetadata": {"promptTokenCount": 3, "totalTokenCount": 3}}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]},
                                   "finishReason": "STOP"}],
                   "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5}}),
        ];
        let mut acc = Accumulator::new();
        for value in chunks {
            let out = process(value, acc.usage()).unwrap();
            for fragment in out.fragments {
                acc.accumulate(fragment).unwrap();
            }
            if let Some(usage) = out.usage {
                acc.update_usage(usage).unwrap();
            }
        }
        let generation = acc.finalize().unwrap();
        assert_eq!(generation.text(), "Hello");
        assert_eq!(generation.usage.output_tokens, 2);
        assert_eq!(generation.usage.finish_reason, FinishReason::Stop);
    }
}
