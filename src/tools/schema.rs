//! Typed tool arguments.
//!
//! Every tool declares its arguments as a struct deriving [`Deserialize`] and
//! [`JsonSchema`]. The derived schema is what `tools/list` advertises, and
//! deserializing into the struct is the one validation step run before a
//! handler executes. Violations name the offending field as
//! `arguments.<name>`.

use std::fmt;

use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Arguments accepted by a tool.
pub trait ToolArguments: DeserializeOwned + JsonSchema + Send + 'static {
    /// Rules the type alone cannot express, checked right after deserializing.
    fn check(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

/// Arguments of tools that take none.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArguments {}

impl ToolArguments for NoArguments {}

/// A schema validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Path of the offending field, e.g. `arguments.query`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl SchemaViolation {
    /// Creates a violation for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

impl std::error::Error for SchemaViolation {}

/// The JSON Schema advertised for `A` in `tools/list`.
pub fn input_schema<A: JsonSchema>() -> Value {
    let mut schema = schemars::schema_for!(A).to_value();
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
        map.entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
    }
    schema
}

/// Deserializes and checks call arguments.
///
/// Missing or `null` arguments count as an empty object, and a `null` value
/// for a property counts as absent.
pub fn parse_arguments<A: ToolArguments>(arguments: Option<&Value>) -> Result<A, SchemaViolation> {
    let supplied: Map<String, Value> = match arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Some(_) => return Err(SchemaViolation::new("arguments", "must be an object")),
    };

    let args: A = serde_path_to_error::deserialize(Value::Object(supplied)).map_err(describe)?;
    args.check()?;
    Ok(args)
}

fn describe(err: serde_path_to_error::Error<serde_json::Error>) -> SchemaViolation {
    let path = err.path().to_string();
    let message = err.into_inner().to_string();
    let named = backticked(&message);

    if message.starts_with("missing field") {
        if let Some(name) = named {
            return SchemaViolation::new(format!("arguments.{name}"), "is required");
        }
    }
    if message.starts_with("unknown field") {
        if let Some(name) = named {
            return SchemaViolation::new(format!("arguments.{name}"), "is not a recognised argument");
        }
    }

    let field = if path == "." {
        "arguments".to_string()
    } else {
        format!("arguments.{path}")
    };
    SchemaViolation::new(field, message)
}

/// First name quoted in backticks, as serde writes field names.
fn backticked(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

/// Deserializes any integral JSON number, saturating at the `i64` range.
///
/// Floats without a fractional part count as integers, and values beyond
/// `i64` (large unsigned integers, `1e20`) become `i64::MAX` or `i64::MIN`
/// so callers can clamp them.
pub fn saturating_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Number(number) = Value::deserialize(deserializer)? else {
        return Err(D::Error::custom("must be an integer"));
    };
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    if number.as_u64().is_some() {
        return Ok(i64::MAX);
    }
    match number.as_f64() {
        // `as` saturates at the bounds of i64.
        Some(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(D::Error::custom("must be an integer")),
    }
}
