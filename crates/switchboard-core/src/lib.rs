//! Switchboard drives many generative-text backends through one conversation model.
//!
//! # Table of contents
//!
//! - [Simple example](#simple-example)
//! - [Core concepts](#core-concepts)
//! - [Streaming](#streaming)
//!
//! # Simple example:
//! ```no_run
//! use switchboard_core::{message::Message, options::TextOptions, providers::gemini};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // This requires the `GEMINI_API_KEY` environment variable to be set.
//!     let client = gemini::Client::from_env()?;
//!
//!     let options = [TextOptions {
//!         temperature: Some(0.2),
//!         ..Default::default()
//!     }
//!     .into()];
//!     let response = client
//!         .generate_sync(&[Message::user("Who are you?")], &options)
//!         .await?;
//!
//!     println!("Gemini: {}", response.generation.text());
//!     Ok(())
//! }
//! ```
//!
//! # Core concepts
//! ## Conversations and generations
//! A conversation is a list of [Message](message::Message)s, each made of request parts (what
//! the caller sends) and reply parts (what a model produced). A call returns a
//! [Generation](message::Generation): the assistant message, token usage, a finish reason and
//! optionally log-probabilities. Everything is validated before a request leaves the process.
//!
//! ## Options
//! [GenOption](options::GenOption) is a closed set: sampling parameters, tool definitions,
//! a system prompt, a structured-decoding target and a thinking budget. A backend that cannot
//! honor an option drops it and reports it as unsupported rather than failing the call.
//!
//! ## Schemas
//! Tool parameters and structured-decoding targets are described with
//! [TypeDescription](schema::TypeDescription) (or derived with `schemars`) and compiled to the
//! constrained [Schema](schema::Schema) dialect backends accept by [build_schema].
//!
//! ## Providers
//! A [Provider](providers::Provider) maps the canonical model to one backend's wire format and
//! back. Gemini is the reference backend.
//!
//! # Streaming
//! [Client::generate_stream](client::Client::generate_stream) returns a
//! [GenerationStream](streaming::GenerationStream) yielding [Fragment](streaming::Fragment)s as
//! they arrive. [finish](streaming::GenerationStream::finish) returns the same
//! [Generation](message::Generation) a synchronous call would have. Dropping the stream cancels
//! the background producer.

pub mod client;
pub mod completion;
pub mod error;
pub mod http_client;
pub mod json_utils;
pub mod message;
pub mod model;
pub mod options;
pub mod providers;
pub mod schema;
pub mod streaming;

pub use completion::{CompletionError, CompletionResponse};
pub use error::{ApiError, normalize_error_body};
pub use json_utils::DecodeMode;
pub use message::{Generation, Message, ValidationError};
pub use options::GenOption;
pub use schema::{Describe, Schema, SchemaError, TypeDescription, build_schema};
pub use streaming::{Accumulator, Fragment, GenerationStream};
