//! Constrained response and tool-parameter schemas.
//!
//! Backends that support structured decoding accept a restricted OpenAPI 3.0 subset rather than
//! full JSON Schema: no `additionalProperties`, no `$ref`, upper case type names, and an explicit
//! `propertyOrdering` since the property map itself is unordered on their side.
//!
//! Schemas are produced from a [TypeDescription], an explicit description of a native type's
//! shape (fields in declaration order, kinds, and `jsonschema` style tag metadata). Types
//! implement [Describe] to provide one. Types deriving `schemars::JsonSchema` can go through
//! [Schema::for_type] instead.
//!
//! ```
//! use switchboard_core::schema::{self, Field, TypeDescription};
//!
//! let desc = TypeDescription::structure("Weather", vec![
//!     Field::new("city", TypeDescription::String).tag("description=City name"),
//!     Field::new("unit", TypeDescription::String).tag("enum=celsius,enum=fahrenheit"),
//!     Field::new("days", TypeDescription::optional(TypeDescription::U8)),
//! ]);
//! let schema = schema::build_schema(&desc).unwrap();
//! assert_eq!(schema.required, vec!["city", "unit"]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ================================================================
// Schema
// ================================================================

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    TypeUnspecified,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => SchemaType::String,
            "NUMBER" => SchemaType::Number,
            "INTEGER" => SchemaType::Integer,
            "BOOLEAN" => SchemaType::Boolean,
            "ARRAY" => SchemaType::Array,
            "OBJECT" => SchemaType::Object,
            "NULL" => SchemaType::Null,
            _ => SchemaType::TypeUnspecified,
        }
    }
}

/// Format hint; see <https://spec.openapis.org/oas/v3.0.3#data-types>.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Float,
    Double,
    Int32,
    Int64,
    Enum,
    Date,
    DateTime,
    Byte,
    Password,
    Email,
    Uuid,
}

impl Format {
    fn parse(s: &str) -> Option<Self> {
        let format = match s {
            "float" => Format::Float,
            "double" => Format::Double,
            "int32" => Format::Int32,
            "int64" => Format::Int64,
            "enum" => Format::Enum,
            "date" => Format::Date,
            "date-time" => Format::DateTime,
            "byte" => Format::Byte,
            "password" => Format::Password,
            "email" => Format::Email,
            "uuid" => Format::Uuid,
            _ => return None,
        };
        Some(format)
    }
}

/// A schema in the constrained dialect. Integer bounds are serialized as strings, as int64
/// values are on the wire.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "string_u64"
    )]
    pub max_items: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "string_u64"
    )]
    pub min_items: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "string_u64"
    )]
    pub max_length: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "string_u64"
    )]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_ordering: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<SchemaType>,
}

mod string_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Number(u64),
        }

        match Option::<StringOrNumber>::deserialize(deserializer)? {
            None => Ok(None),
            Some(StringOrNumber::Number(n)) => Ok(Some(n)),
            Some(StringOrNumber::String(s)) => {
                s.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

// ================================================================
// Errors
// ================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown jsonschema tag: {0:?}")]
    UnknownTag(String),
    #[error("invalid value for jsonschema tag {tag:?}: {reason}")]
    InvalidTagValue { tag: String, reason: String },
    #[error("failed to convert example value {value} for type {kind}")]
    ConvertValue { value: String, kind: String },
    #[error("unsupported map key type {0:?} for schema generation; only string keys are supported")]
    UnsupportedMapKey(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("failed to convert property {name:?}: {source}")]
    Property {
        name: String,
        source: Box<SchemaError>,
    },
    #[error("failed to convert array/slice element type: {0}")]
    Items(Box<SchemaError>),
    #[error("unsupported JSON schema construct at {path}: {reason}")]
    JsonSchema { path: String, reason: String },
}

// ================================================================
// Type descriptions
// ================================================================

/// The shape of a native type, as far as schema generation is concerned.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescription {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// A point in time, rendered as an RFC 3339 string.
    DateTime,
    /// Fixed length sequence.
    Array {
        len: usize,
        items: Box<TypeDescription>,
    },
    /// Variable length sequence.
    Slice(Box<TypeDescription>),
    Struct(StructType),
    Map {
        key: Box<TypeDescription>,
        value: Box<TypeDescription>,
    },
    /// A value that may be absent. Nullable, and never required.
    Optional(Box<TypeDescription>),
    Channel,
    Function,
    Complex,
    /// An arbitrary dynamically typed value.
    Interface,
    Invalid,
}

impl TypeDescription {
    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Self {
        TypeDescription::Struct(StructType {
            name: name.into(),
            fields,
        })
    }

    pub fn optional(inner: TypeDescription) -> Self {
        TypeDescription::Optional(Box::new(inner))
    }

    pub fn slice(items: TypeDescription) -> Self {
        TypeDescription::Slice(Box::new(items))
    }

    pub fn array(len: usize, items: TypeDescription) -> Self {
        TypeDescription::Array {
            len,
            items: Box::new(items),
        }
    }

    pub fn map(key: TypeDescription, value: TypeDescription) -> Self {
        TypeDescription::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDescription::String => "string",
            TypeDescription::Bool => "bool",
            TypeDescription::I8 => "i8",
            TypeDescription::I16 => "i16",
            TypeDescription::I32 => "i32",
            TypeDescription::I64 => "i64",
            TypeDescription::Isize => "isize",
            TypeDescription::U8 => "u8",
            TypeDescription::U16 => "u16",
            TypeDescription::U32 => "u32",
            TypeDescription::U64 => "u64",
            TypeDescription::Usize => "usize",
            TypeDescription::F32 => "f32",
            TypeDescription::F64 => "f64",
            TypeDescription::DateTime => "datetime",
            TypeDescription::Array { .. } => "array",
            TypeDescription::Slice(_) => "slice",
            TypeDescription::Struct(_) => "struct",
            TypeDescription::Map { .. } => "map",
            TypeDescription::Optional(_) => "optional",
            TypeDescription::Channel => "chan",
            TypeDescription::Function => "func",
            TypeDescription::Complex => "complex",
            TypeDescription::Interface => "interface",
            TypeDescription::Invalid => "invalid",
        }
    }

    /// Coerce a tag literal to this kind's primitive JSON value.
    fn coerce(&self, value: &str) -> Result<serde_json::Value, SchemaError> {
        let fail = || SchemaError::ConvertValue {
            value: value.to_string(),
            kind: self.kind_name().to_string(),
        };
        let coerced = match self {
            TypeDescription::I8
            | TypeDescription::I16
            | TypeDescription::I32
            | TypeDescription::I64
            | TypeDescription::Isize => value.parse::<i64>().map_err(|_| fail())?.into(),
            TypeDescription::U8
            | TypeDescription::U16
            | TypeDescription::U32
            | TypeDescription::U64
            | TypeDescription::Usize => value.parse::<u64>().map_err(|_| fail())?.into(),
            TypeDescription::F32 | TypeDescription::F64 => {
                let f = value.parse::<f64>().map_err(|_| fail())?;
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .ok_or_else(fail)?
            }
            TypeDescription::Bool => match value {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => true.into(),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => false.into(),
                _ => return Err(fail()),
            },
            TypeDescription::String => value.into(),
            _ => return Err(fail()),
        };
        Ok(coerced)
    }
}

impl Display for TypeDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind_name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<Field>,
}

/// One struct field with its serialization name and tag metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Source field name.
    pub name: String,
    /// Serialized name when it differs from `name`.
    pub rename: Option<String>,
    pub ty: TypeDescription,
    /// Comma separated `key=value` overrides: `enum`, `default`, `example`, `description`,
    /// `title`, `minLength`, `maxLength`, `minItems`, `maxItems`, `type`.
    pub tag: String,
    /// Overrides any `description=` in `tag`, and may contain commas.
    pub description: Option<String>,
    /// Omitted from the serialized form when empty, hence not required.
    pub omit_empty: bool,
    /// Never serialized.
    pub skip: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescription) -> Self {
        Field {
            name: name.into(),
            rename: None,
            ty,
            tag: String::new(),
            description: None,
            omit_empty: false,
            skip: false,
        }
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn json_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

/// Types that can describe their own shape.
pub trait Describe {
    fn describe() -> TypeDescription;
}

macro_rules! describe_primitive {
    ($($ty:ty => $desc:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescription {
                    TypeDescription::$desc
                }
            }
        )*
    };
}

describe_primitive! {
    String => String,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    std::time::SystemTime => DateTime,
    serde_json::Value => Interface,
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescription {
        TypeDescription::optional(T::describe())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescription {
        T::describe()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescription {
        TypeDescription::slice(T::describe())
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn describe() -> TypeDescription {
        TypeDescription::array(N, T::describe())
    }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> TypeDescription {
        TypeDescription::map(K::describe(), V::describe())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescription {
        TypeDescription::map(K::describe(), V::describe())
    }
}

// ================================================================
// Generation
// ================================================================

/// Build the constrained schema for a type description.
pub fn build_schema(desc: &TypeDescription) -> Result<Schema, SchemaError> {
    let mut schema = Schema::default();
    fill(&mut schema, desc, "", None)?;
    Ok(schema)
}

impl Schema {
    /// Build the schema of a type implementing [Describe].
    pub fn for_described<T: Describe>() -> Result<Self, SchemaError> {
        build_schema(&T::describe())
    }
}

fn fill(
    schema: &mut Schema,
    desc: &TypeDescription,
    tag: &str,
    description: Option<&str>,
) -> Result<(), SchemaError> {
    // Optional unwraps first so tag values coerce to the pointee's kind.
    if let TypeDescription::Optional(inner) = desc {
        schema.nullable = true;
        return fill(schema, inner, tag, description);
    }

    apply_tag(schema, desc, tag)?;
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        schema.description = description.to_string();
    }
    if schema.r#type.is_some() {
        return Ok(());
    }

    match desc {
        TypeDescription::String => schema.r#type = Some(SchemaType::String),
        TypeDescription::Bool => schema.r#type = Some(SchemaType::Boolean),
        TypeDescription::I8 | TypeDescription::I16 | TypeDescription::Isize => {
            schema.r#type = Some(SchemaType::Integer)
        }
        TypeDescription::I32 => {
            schema.r#type = Some(SchemaType::Integer);
            schema.format = Some(Format::Int32);
        }
        TypeDescription::I64 => {
            schema.r#type = Some(SchemaType::Integer);
            schema.format = Some(Format::Int64);
        }
        TypeDescription::U8
        | TypeDescription::U16
        | TypeDescription::U32
        | TypeDescription::U64
        | TypeDescription::Usize => schema.r#type = Some(SchemaType::Integer),
        TypeDescription::F32 => {
            schema.r#type = Some(SchemaType::Number);
            schema.format = Some(Format::Float);
        }
        TypeDescription::F64 => {
            schema.r#type = Some(SchemaType::Number);
            schema.format = Some(Format::Double);
        }
        TypeDescription::DateTime => {
            schema.r#type = Some(SchemaType::String);
            schema.format = Some(Format::DateTime);
        }
        TypeDescription::Array { len, items } => {
            schema.r#type = Some(SchemaType::Array);
            schema.min_items = Some(*len as u64);
            schema.max_items = Some(*len as u64);
            schema.items = Some(Box::new(
                build_schema(items).map_err(|e| SchemaError::Items(Box::new(e)))?,
            ));
        }
        TypeDescription::Slice(items) => {
            schema.r#type = Some(SchemaType::Array);
            schema.items = Some(Box::new(
                build_schema(items).map_err(|e| SchemaError::Items(Box::new(e)))?,
            ));
        }
        TypeDescription::Struct(st) => {
            schema.r#type = Some(SchemaType::Object);
            let fields: Vec<&Field> = st.fields.iter().filter(|f| !f.skip).collect();
            for field in &fields {
                let mut property = Schema::default();
                fill(
                    &mut property,
                    &field.ty,
                    &field.tag,
                    field.description.as_deref(),
                )
                .map_err(|e| SchemaError::Property {
                    name: field.name.clone(),
                    source: Box::new(e),
                })?;
                let name = field.json_name().to_string();
                let optional = matches!(field.ty, TypeDescription::Optional(_));
                if !field.omit_empty && !optional {
                    schema.required.push(name.clone());
                }
                schema.properties.insert(name, property);
            }
            if fields.len() > 1 {
                schema.property_ordering = fields.iter().map(|f| f.json_name().to_string()).collect();
            }
        }
        TypeDescription::Map { key, .. } => {
            // The dialect has no additionalProperties: a string keyed map is an open object.
            schema.r#type = Some(SchemaType::Object);
            if !matches!(key.as_ref(), TypeDescription::String) {
                return Err(SchemaError::UnsupportedMapKey(key.kind_name().to_string()));
            }
        }
        TypeDescription::Optional(_) => {}
        TypeDescription::Channel
        | TypeDescription::Function
        | TypeDescription::Complex
        | TypeDescription::Interface
        | TypeDescription::Invalid => {
            return Err(SchemaError::UnsupportedType(desc.kind_name().to_string()));
        }
    }
    Ok(())
}

fn apply_tag(schema: &mut Schema, desc: &TypeDescription, tag: &str) -> Result<(), SchemaError> {
    for part in tag.split(',').filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(SchemaError::UnknownTag(part.to_string()));
        };
        match key {
            "enum" => schema.r#enum.push(value.to_string()),
            "default" => schema.default = Some(desc.coerce(value)?),
            "example" => schema.example = Some(desc.coerce(value)?),
            "description" => schema.description = value.to_string(),
            "title" => schema.title = value.to_string(),
            "minLength" => schema.min_length = Some(parse_bound(part, value)?),
            "maxLength" => schema.max_length = Some(parse_bound(part, value)?),
            "minItems" => schema.min_items = Some(parse_bound(part, value)?),
            "maxItems" => schema.max_items = Some(parse_bound(part, value)?),
            "type" => schema.r#type = Some(SchemaType::parse(value)),
            _ => return Err(SchemaError::UnknownTag(part.to_string())),
        }
    }
    Ok(())
}

fn parse_bound(tag: &str, value: &str) -> Result<u64, SchemaError> {
    value.parse().map_err(|e: std::num::ParseIntError| SchemaError::InvalidTagValue {
        tag: tag.to_string(),
        reason: e.to_string(),
    })
}

// ================================================================
// JSON Schema conversion
// ================================================================

const MAX_DEPTH: usize = 32;

impl Schema {
    /// Build the schema of a type deriving `schemars::JsonSchema`.
    pub fn for_type<T: schemars::JsonSchema>() -> Result<Self, SchemaError> {
        Self::from_json_schema(&schemars::schema_for!(T))
    }

    /// Convert a full JSON Schema document into the constrained dialect, inlining `$ref`s.
    pub fn from_json_schema(schema: &schemars::Schema) -> Result<Self, SchemaError> {
        let root = schema.as_value();
        let defs = root
            .get("$defs")
            .or_else(|| root.get("definitions"))
            .and_then(serde_json::Value::as_object);
        convert(root, defs, "#", 0)
    }
}

type Defs = serde_json::Map<String, serde_json::Value>;

fn convert(
    value: &serde_json::Value,
    defs: Option<&Defs>,
    path: &str,
    depth: usize,
) -> Result<Schema, SchemaError> {
    use serde_json::Value;

    let unsupported = |reason: &str| SchemaError::JsonSchema {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if depth > MAX_DEPTH {
        return Err(unsupported("nesting too deep, recursive types are not supported"));
    }
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Bool(true) => return Ok(Schema::default()),
        _ => return Err(unsupported("expected a schema object")),
    };

    let mut schema = if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
        let name = reference
            .rsplit('/')
            .next()
            .ok_or_else(|| unsupported("malformed $ref"))?;
        let target = defs
            .and_then(|d| d.get(name))
            .ok_or_else(|| unsupported(&format!("unresolved $ref {reference}")))?;
        convert(target, defs, reference, depth + 1)?
    } else {
        Schema::default()
    };

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(variants)) = obj.get(key) {
            let (nulls, others): (Vec<&Value>, Vec<&Value>) = variants
                .iter()
                .partition(|v| v.get("type").and_then(Value::as_str) == Some("null"));
            match (nulls.is_empty(), others.as_slice()) {
                (false, [only]) => {
                    schema = convert(only, defs, path, depth + 1)?;
                    schema.nullable = true;
                }
                _ => {
                    schema.nullable |= !nulls.is_empty();
                    for (i, variant) in others.iter().enumerate() {
                        schema.any_of.push(convert(
                            variant,
                            defs,
                            &format!("{path}/{key}/{i}"),
                            depth + 1,
                        )?);
                    }
                }
            }
        }
    }

    match obj.get("type") {
        Some(Value::String(t)) => schema.r#type = Some(SchemaType::parse(t)),
        Some(Value::Array(types)) => {
            let mut non_null = types.iter().filter_map(Value::as_str).filter(|t| *t != "null");
            schema.nullable |= types.iter().any(|t| t.as_str() == Some("null"));
            match (non_null.next(), non_null.next()) {
                (Some(t), None) => schema.r#type = Some(SchemaType::parse(t)),
                (None, None) => schema.r#type = Some(SchemaType::Null),
                _ => return Err(unsupported("multiple non-null types")),
            }
        }
        _ => {}
    }

    if let Some(Value::Array(values)) = obj.get("enum") {
        schema.r#enum = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        schema.nullable |= values.iter().any(Value::is_null);
    }
    if let Some(Value::String(constant)) = obj.get("const") {
        schema.r#enum = vec![constant.clone()];
        schema.r#type.get_or_insert(SchemaType::String);
    }
    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        // Formats outside the dialect (uint32, uint8, ...) are dropped.
        schema.format = Format::parse(format);
    }
    if let Some(description) = obj.get("description").and_then(Value::as_str) {
        schema.description = description.to_string();
    }
    if let Some(title) = obj.get("title").and_then(Value::as_str) {
        schema.title = title.to_string();
    }
    if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
        schema.pattern = pattern.to_string();
    }
    if let Some(default) = obj.get("default") {
        schema.default = Some(default.clone());
    }
    if let Some(example) = obj
        .get("examples")
        .and_then(Value::as_array)
        .and_then(|e| e.first())
    {
        schema.example = Some(example.clone());
    }
    schema.min_items = obj.get("minItems").and_then(Value::as_u64).or(schema.min_items);
    schema.max_items = obj.get("maxItems").and_then(Value::as_u64).or(schema.max_items);
    schema.min_length = obj.get("minLength").and_then(Value::as_u64).or(schema.min_length);
    schema.max_length = obj.get("maxLength").and_then(Value::as_u64).or(schema.max_length);
    schema.minimum = obj.get("minimum").and_then(Value::as_f64).or(schema.minimum);
    schema.maximum = obj.get("maximum").and_then(Value::as_f64).or(schema.maximum);

    match obj.get("items") {
        Some(items @ Value::Object(_)) => {
            schema.items = Some(Box::new(convert(
                items,
                defs,
                &format!("{path}/items"),
                depth + 1,
            )?));
        }
        Some(Value::Array(_)) => return Err(unsupported("tuple items")),
        _ => {}
    }
    if let Some(Value::Array(prefix)) = obj.get("prefixItems") {
        let mut items = prefix.iter();
        let first = items.next().ok_or_else(|| unsupported("empty prefixItems"))?;
        if items.any(|i| i != first) {
            return Err(unsupported("heterogeneous tuple items"));
        }
        schema.items = Some(Box::new(convert(
            first,
            defs,
            &format!("{path}/prefixItems"),
            depth + 1,
        )?));
    }

    if let Some(Value::Object(properties)) = obj.get("properties") {
        for (name, property) in properties {
            schema.properties.insert(
                name.clone(),
                convert(
                    property,
                    defs,
                    &format!("{path}/properties/{name}"),
                    depth + 1,
                )?,
            );
        }
        if schema.properties.len() > 1 {
            schema.property_ordering = schema.properties.keys().cloned().collect();
        }
    }
    if let Some(Value::Array(required)) = obj.get("required") {
        schema.required = required
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_json(desc: &TypeDescription) -> serde_json::Value {
        serde_json::to_value(build_schema(desc).unwrap()).unwrap()
    }

    #[test]
    fn test_string_and_optional_field() {
        let desc = TypeDescription::structure(
            "S",
            vec![
                Field::new("A", TypeDescription::String),
                Field::new("Opt", TypeDescription::optional(TypeDescription::String)),
            ],
        );
        assert_eq!(
            to_json(&desc),
            json!({
                "type": "OBJECT",
                "properties": {
                    "A": {"type": "STRING"},
                    "Opt": {"type": "STRING", "nullable": true}
                },
                "required": ["A"],
                "propertyOrdering": ["A", "Opt"]
            })
        );
    }

    #[test]
    fn test_single_field_has_no_ordering() {
        let desc = TypeDescription::structure("S", vec![Field::new("A", TypeDescription::I64)]);
        assert_eq!(
            to_json(&desc),
            json!({
                "type": "OBJECT",
                "properties": {"A": {"type": "INTEGER", "format": "int64"}},
                "required": ["A"]
            })
        );
    }

    #[test]
    fn test_empty_struct() {
        let desc = TypeDescription::structure("Empty", vec![]);
        assert_eq!(to_json(&desc), json!({"type": "OBJECT"}));
    }

    #[test]
    fn test_ordering_follows_declaration() {
        let desc = TypeDescription::structure(
            "S",
            vec![
                Field::new("zeta", TypeDescription::Bool),
                Field::new("alpha", TypeDescription::F32),
                Field::new("mid", TypeDescription::U16).rename("middle"),
                Field::new("hidden", TypeDescription::String).skip(),
            ],
        );
        let schema = build_schema(&desc).unwrap();
        assert_eq!(schema.property_ordering, vec!["zeta", "alpha", "middle"]);
        let keys: Vec<&String> = schema.properties.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "middle"]);
        assert_eq!(
            schema.properties["alpha"].format,
            Some(Format::Float)
        );
    }

    #[test]
    fn test_omit_empty_is_not_required() {
        let desc = TypeDescription::structure(
            "S",
            vec![
                Field::new("a", TypeDescription::String),
                Field::new("b", TypeDescription::String).omit_empty(),
            ],
        );
        assert_eq!(build_schema(&desc).unwrap().required, vec!["a"]);
    }

    #[test]
    fn test_fixed_array_bounds() {
        let desc = TypeDescription::array(3, TypeDescription::F64);
        assert_eq!(
            to_json(&desc),
            json!({
                "type": "ARRAY",
                "items": {"type": "NUMBER", "format": "double"},
                "minItems": "3",
                "maxItems": "3"
            })
        );
    }

    #[test]
    fn test_datetime() {
        assert_eq!(
            to_json(&TypeDescription::DateTime),
            json!({"type": "STRING", "format": "date-time"})
        );
    }

    #[test]
    fn test_tags() {
        let desc = TypeDescription::structure(
            "S",
            vec![
                Field::new("unit", TypeDescription::String)
                    .tag("enum=celsius,enum=fahrenheit,default=celsius,title=Unit"),
                Field::new("count", TypeDescription::I32)
                    .tag("example=4,description=ignored")
                    .description("How many, at most 10"),
                Field::new("tags", TypeDescription::slice(TypeDescription::String))
                    .tag("minItems=1,maxItems=5"),
                Field::new("opt", TypeDescription::optional(TypeDescription::U8)).tag("default=7"),
            ],
        );
        let schema = build_schema(&desc).unwrap();
        let unit = &schema.properties["unit"];
        assert_eq!(unit.r#enum, vec!["celsius", "fahrenheit"]);
        assert_eq!(unit.default, Some(json!("celsius")));
        assert_eq!(unit.title, "Unit");
        let count = &schema.properties["count"];
        assert_eq!(count.example, Some(json!(4)));
        assert_eq!(count.description, "How many, at most 10");
        let tags = &schema.properties["tags"];
        assert_eq!((tags.min_items, tags.max_items), (Some(1), Some(5)));
        let opt = &schema.properties["opt"];
        assert!(opt.nullable);
        assert_eq!(opt.default, Some(json!(7)));
        assert_eq!(schema.required, vec!["unit", "count", "tags"]);
    }

    #[test]
    fn test_type_override_skips_kind() {
        let desc = TypeDescription::structure(
            "S",
            vec![Field::new("when", TypeDescription::I64).tag("type=string")],
        );
        let schema = build_schema(&desc).unwrap();
        assert_eq!(schema.properties["when"].r#type, Some(SchemaType::String));
        assert_eq!(schema.properties["when"].format, None);
    }

    #[test]
    fn test_unknown_tag_fails() {
        let desc = TypeDescription::structure(
            "S",
            vec![Field::new("a", TypeDescription::String).tag("descripton=typo")],
        );
        assert_eq!(
            build_schema(&desc).unwrap_err().to_string(),
            r#"failed to convert property "a": unknown jsonschema tag: "descripton=typo""#
        );
    }

    #[test]
    fn test_bad_default_fails() {
        let desc = TypeDescription::structure(
            "S",
            vec![Field::new("n", TypeDescription::U32).tag("default=-1")],
        );
        let err = build_schema(&desc).unwrap_err();
        assert!(
            err.to_string()
                .contains("failed to convert example value -1 for type u32")
        );
    }

    #[test]
    fn test_maps() {
        assert_eq!(
            to_json(&TypeDescription::map(
                TypeDescription::String,
                TypeDescription::I32
            )),
            json!({"type": "OBJECT"})
        );
        let err = build_schema(&TypeDescription::map(
            TypeDescription::I32,
            TypeDescription::String,
        ))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"unsupported map key type "i32" for schema generation; only string keys are supported"#
        );
    }

    #[test]
    fn test_unsupported_kinds() {
        for (desc, name) in [
            (TypeDescription::Channel, "chan"),
            (TypeDescription::Function, "func"),
            (TypeDescription::Complex, "complex"),
            (TypeDescription::Interface, "interface"),
            (TypeDescription::Invalid, "invalid"),
        ] {
            assert_eq!(
                build_schema(&desc).unwrap_err(),
                SchemaError::UnsupportedType(name.to_string())
            );
        }
    }

    #[test]
    fn test_nested_error_path() {
        let desc = TypeDescription::structure(
            "Outer",
            vec![Field::new(
                "inner",
                TypeDescription::slice(TypeDescription::Function),
            )],
        );
        assert_eq!(
            build_schema(&desc).unwrap_err().to_string(),
            r#"failed to convert property "inner": failed to convert array/slice element type: unsupported type: func"#
        );
    }

    #[test]
    fn test_describe_impls() {
        assert_eq!(
            <Option<Vec<[u8; 2]>>>::describe(),
            TypeDescription::optional(TypeDescription::slice(TypeDescription::array(
                2,
                TypeDescription::U8
            )))
        );
        let schema = Schema::for_described::<HashMap<String, f64>>().unwrap();
        assert_eq!(schema.r#type, Some(SchemaType::Object));
        assert!(Schema::for_described::<HashMap<u32, f64>>().is_err());
    }

    #[test]
    fn test_bounds_accept_numbers_or_strings() {
        let schema: Schema =
            serde_json::from_value(json!({"type": "ARRAY", "minItems": 1, "maxItems": "2"}))
                .unwrap();
        assert_eq!((schema.min_items, schema.max_items), (Some(1), Some(2)));
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Recipe {
        /// Name of the dish.
        name: String,
        servings: Option<u32>,
        ingredients: Vec<Ingredient>,
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Ingredient {
        item: String,
        grams: f64,
    }

    #[test]
    fn test_from_json_schema() {
        let schema = Schema::for_type::<Recipe>().unwrap();
        assert_eq!(schema.r#type, Some(SchemaType::Object));
        assert_eq!(
            schema.property_ordering,
            vec!["name", "servings", "ingredients"]
        );
        assert_eq!(schema.required, vec!["name", "ingredients"]);
        assert_eq!(schema.properties["name"].description, "Name of the dish.");
        let servings = &schema.properties["servings"];
        assert!(servings.nullable);
        assert_eq!(servings.r#type, Some(SchemaType::Integer));
        assert_eq!(servings.format, None);
        let items = schema.properties["ingredients"].items.as_ref().unwrap();
        assert_eq!(items.r#type, Some(SchemaType::Object));
        assert_eq!(items.properties["grams"].format, Some(Format::Double));
    }
}
