use serde::{Serialize, de::DeserializeOwned};

/// How tolerant response decoding is of fields the wire types don't know about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Unknown fields are ignored.
    #[default]
    Lenient,
    /// Unknown fields are an error. Useful to notice backend API drift in tests.
    Strict,
}

impl DecodeMode {
    pub const ENV_VAR: &'static str = "SWITCHBOARD_STRICT";

    /// `Strict` when `SWITCHBOARD_STRICT` is set to anything but `0`, `false` or an empty string.
    pub fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(value) if !matches!(value.trim(), "" | "0" | "false") => DecodeMode::Strict,
            _ => DecodeMode::Lenient,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown field {0:?}")]
    UnknownFields(String),
}

/// Decode `bytes` as `T`. In strict mode, every object key of the input must survive a
/// round trip through `T`.
pub fn decode<T>(bytes: &[u8], mode: DecodeMode) -> Result<T, DecodeError>
where
    T: DeserializeOwned + Serialize,
{
    match mode {
        DecodeMode::Lenient => Ok(serde_json::from_slice(bytes)?),
        DecodeMode::Strict => {
            let input: serde_json::Value = serde_json::from_slice(bytes)?;
            let decoded: T = serde_json::from_value(input.clone())?;
            let roundtrip = serde_json::to_value(&decoded)?;
            let mut unknown = Vec::new();
            unknown_fields(&input, &roundtrip, String::new(), &mut unknown);
            if unknown.is_empty() {
                Ok(decoded)
            } else {
                Err(DecodeError::UnknownFields(unknown.join(", ")))
            }
        }
    }
}

/// Collect the paths of keys present in `input` but missing from `known`. Zero input values
/// (null, false, 0, empty string, array or object) are not reported: wire types routinely skip
/// them when serializing.
fn unknown_fields(
    input: &serde_json::Value,
    known: &serde_json::Value,
    path: String,
    out: &mut Vec<String>,
) {
    use serde_json::Value;

    match (input, known) {
        (Value::Object(input), Value::Object(known)) => {
            for (key, value) in input {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match known.get(key) {
                    Some(known_value) => unknown_fields(value, known_value, child, out),
                    None if is_zero(value) => {}
                    None => out.push(child),
                }
            }
        }
        (Value::Array(input), Value::Array(known)) => {
            for (i, (value, known_value)) in input.iter().zip(known).enumerate() {
                unknown_fields(value, known_value, format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}

fn is_zero(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Raw bytes carried as a base64 string, the way most backends put blobs in JSON.
pub mod base64_bytes {
    use base64::{Engine, prelude::BASE64_STANDARD};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64_STANDARD.encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
