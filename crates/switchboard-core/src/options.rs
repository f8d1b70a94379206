//! Generation options.
//!
//! Options form a closed set of variants. Every backend matches on all of them, so adding one is
//! a compile error in every translator until it decides what to do with it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::ValidationError;
use crate::schema::{self, Describe, Schema, TypeDescription};

/// Upper bound for `max_tokens`, 1 GiB worth of tokens.
pub const MAX_TOKENS_LIMIT: u64 = 1024 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum GenOption {
    Text(TextOptions),
    Tools(ToolOptions),
    SystemPrompt(String),
    Decode(DecodeTarget),
    /// Let the model think before answering, within a token budget.
    Thinking { budget_tokens: u64 },
}

impl GenOption {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            GenOption::Text(text) => text.validate().map_err(|e| e.within("text")),
            GenOption::Tools(tools) => tools.validate().map_err(|e| e.within("tools")),
            GenOption::SystemPrompt(prompt) if prompt.trim().is_empty() => Err(
                ValidationError::new("system_prompt", "must not be empty"),
            ),
            GenOption::SystemPrompt(_) => Ok(()),
            GenOption::Decode(target) => target.validate().map_err(|e| e.within("decode")),
            GenOption::Thinking { budget_tokens } if *budget_tokens > MAX_TOKENS_LIMIT => Err(
                ValidationError::new("thinking.budget_tokens", "must be within [0, 1 GiB]"),
            ),
            GenOption::Thinking { .. } => Ok(()),
        }
    }
}

impl From<TextOptions> for GenOption {
    fn from(options: TextOptions) -> Self {
        GenOption::Text(options)
    }
}

impl From<ToolOptions> for GenOption {
    fn from(options: ToolOptions) -> Self {
        GenOption::Tools(options)
    }
}

impl From<DecodeTarget> for GenOption {
    fn from(target: DecodeTarget) -> Self {
        GenOption::Decode(target)
    }
}

/// Validate every option, reporting the first offending one.
pub fn validate_options(options: &[GenOption]) -> Result<(), ValidationError> {
    for (i, option) in options.iter().enumerate() {
        option
            .validate()
            .map_err(|e| e.within(format!("options[{i}]")))?;
    }
    Ok(())
}

// ================================================================
// Text
// ================================================================

/// Sampling and length controls. Unset values are left to the backend's defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Within `[0, 100]`. Backends clamp to their own range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Number of alternatives to report per token. Enables log-probabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Opaque end-user identifier for abuse detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl TextOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.seed.is_some_and(|s| s < 0) {
            return Err(ValidationError::new("seed", "must be non-negative"));
        }
        if self.temperature.is_some_and(|t| !(0.0..=100.0).contains(&t)) {
            return Err(ValidationError::new("temperature", "must be within [0, 100]"));
        }
        if self.max_tokens.is_some_and(|m| m > MAX_TOKENS_LIMIT) {
            return Err(ValidationError::new("max_tokens", "must be within [0, 1 GiB]"));
        }
        if self.top_p.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            return Err(ValidationError::new("top_p", "must be within [0, 1]"));
        }
        if self.top_k.is_some_and(|k| k > 1024) {
            return Err(ValidationError::new("top_k", "must be within [0, 1024]"));
        }
        for (name, penalty) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if penalty.is_some_and(|p| !(-2.0..=2.0).contains(&p)) {
                return Err(ValidationError::new(name, "must be within [-2, 2]"));
            }
        }
        if self.stop.iter().any(String::is_empty) {
            return Err(ValidationError::new("stop", "stop sequences must not be empty"));
        }
        Ok(())
    }
}

// ================================================================
// Tools
// ================================================================

/// Whether the model may, must, or must not call a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// The model decides.
    #[default]
    Any,
    Required,
    /// Tools are described but must not be called, e.g. to summarize after tool calls.
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolParameters {
    /// The tool takes no input.
    None,
    Described(TypeDescription),
    Schema(Schema),
}

/// A tool the model can call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        ToolDef {
            name: name.into(),
            description: description.into(),
            parameters: ToolParameters::None,
        }
    }

    /// Take the shape of `T` as the input.
    pub fn with_input<T: Describe>(mut self) -> Self {
        self.parameters = ToolParameters::Described(T::describe());
        self
    }

    pub fn with_description(mut self, parameters: TypeDescription) -> Self {
        self.parameters = ToolParameters::Described(parameters);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.parameters = ToolParameters::Schema(schema);
        self
    }

    /// The parameters schema, `None` for tools without input.
    pub fn parameters_schema(&self) -> Result<Option<Schema>, ValidationError> {
        match &self.parameters {
            ToolParameters::None => Ok(None),
            ToolParameters::Described(desc) => schema::build_schema(desc)
                .map(Some)
                .map_err(|e| ValidationError::new("parameters", e.to_string())),
            ToolParameters::Schema(schema) => Ok(Some(schema.clone())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid_name = (1..=64).contains(&self.name.len())
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(ValidationError::new(
                "name",
                "must be between 1 and 64 characters of [a-zA-Z0-9_-]",
            ));
        }
        if self.description.is_empty() {
            return Err(ValidationError::new("description", "required"));
        }
        self.parameters_schema()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolOptions {
    pub tools: Vec<ToolDef>,
    pub mode: ToolCallMode,
    /// Allow several tool calls in one reply.
    pub parallel_calls: bool,
}

impl ToolOptions {
    pub fn new(tools: Vec<ToolDef>) -> Self {
        ToolOptions {
            tools,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut names: HashMap<&str, usize> = HashMap::new();
        for (i, tool) in self.tools.iter().enumerate() {
            tool.validate()
                .map_err(|e| e.within(format!("tools[{i}]")))?;
            if let Some(j) = names.insert(&tool.name, i) {
                return Err(ValidationError::new(
                    format!("tools[{i}].name"),
                    format!("{:?} is already used by tools[{j}]", tool.name),
                ));
            }
        }
        if self.tools.is_empty() && self.mode == ToolCallMode::Required {
            return Err(ValidationError::new(
                "mode",
                "a tool call is required but no tool is defined",
            ));
        }
        Ok(())
    }
}

// ================================================================
// Structured decoding
// ================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum DecodeTarget {
    /// Any JSON value.
    Json,
    /// JSON following the shape of a described type.
    Schema(TypeDescription),
    /// JSON following a prebuilt schema, e.g. from [Schema::for_type].
    JsonSchema(Schema),
}

impl DecodeTarget {
    pub fn of<T: Describe>() -> Self {
        DecodeTarget::Schema(T::describe())
    }

    /// The schema to constrain decoding with, `None` for free JSON.
    pub fn schema(&self) -> Result<Option<Schema>, ValidationError> {
        match self {
            DecodeTarget::Json => Ok(None),
            DecodeTarget::Schema(desc) => schema::build_schema(desc)
                .map(Some)
                .map_err(|e| ValidationError::new("schema", e.to_string())),
            DecodeTarget::JsonSchema(schema) => Ok(Some(schema.clone())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schema().map(|_| ())
    }
}
