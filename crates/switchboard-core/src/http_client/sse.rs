//! Server-sent event framing on top of a [ByteStream].

use async_stream::stream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use futures::stream::BoxStream;
use http::{Response, header::CONTENT_TYPE};

use super::{ByteStream, Error, Result, util::BodyPreview};

/// Payload that marks the end of a stream on backends that send one.
pub const DONE: &str = "[DONE]";

/// The `data:` payloads of an event stream response, in order.
///
/// Events without data are skipped and a `[DONE]` payload ends the stream. A response whose
/// content type is set to something other than `text/event-stream` is rejected up front.
pub fn data_events(response: Response<ByteStream>) -> Result<BoxStream<'static, Result<String>>> {
    if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        let is_event_stream = content_type
            .to_str()
            .ok()
            .and_then(|s| s.parse::<mime::Mime>().ok())
            .is_some_and(|m| m.essence_str() == mime::TEXT_EVENT_STREAM.essence_str());
        if !is_event_stream {
            return Err(Error::InvalidContentType(content_type.clone()));
        }
    }

    let mut events = response.into_body().eventsource();
    Ok(Box::pin(stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    let data = event.data.trim();
                    tracing::trace!(target: "switchboard::sse", event = %event.event, data = ?BodyPreview::new(data.as_bytes()), "received event");
                    if data.is_empty() {
                        continue;
                    }
                    if data == DONE {
                        break;
                    }
                    yield Ok(data.to_string());
                }
                Err(EventStreamError::Transport(e)) => {
                    yield Err(e);
                    break;
                }
                Err(e) => {
                    yield Err(Error::EventStream(e.to_string()));
                    break;
                }
            }
        }
    }))
}
