//! Coercion of user-supplied edit text into a metadata entry's declared type
//!
//! The declared type of an entry never changes through an edit, with one
//! exception: array text that is not a JSON array literal is split on commas
//! and stored as an array of STRING, whatever the original element type was.

use serde_json::Value as JsonValue;

use super::constants::GgufMetadataValueType;
use super::error::GgufError;
use super::types::{MetadataArray, MetadataValue};

/// Coerce `text` into the type of `original`, the value currently stored under `key`
pub fn coerce_value(
    key: &str,
    text: &str,
    original: &MetadataValue,
) -> Result<MetadataValue, GgufError> {
    match original {
        MetadataValue::Array(arr) => coerce_array(key, text, arr).map(MetadataValue::Array),
        other => coerce_scalar(key, text, other.value_type()),
    }
}

/// Parse a scalar of the given type. Integers are base 10 and must fit the
/// declared width; booleans accept only `true`/`false` in any case.
pub fn coerce_scalar(
    key: &str,
    text: &str,
    value_type: GgufMetadataValueType,
) -> Result<MetadataValue, GgufError> {
    Ok(match value_type {
        GgufMetadataValueType::Uint8 => MetadataValue::Uint8(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Int8 => MetadataValue::Int8(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Uint16 => MetadataValue::Uint16(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Int16 => MetadataValue::Int16(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Uint32 => MetadataValue::Uint32(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Int32 => MetadataValue::Int32(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Uint64 => MetadataValue::Uint64(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Int64 => MetadataValue::Int64(parse_int(key, text, value_type)?),
        GgufMetadataValueType::Float32 => {
            MetadataValue::Float32(parse_float(key, text, value_type)?)
        }
        GgufMetadataValueType::Float64 => {
            MetadataValue::Float64(parse_float(key, text, value_type)?)
        }
        GgufMetadataValueType::Bool => MetadataValue::Bool(parse_bool(key, text)?),
        GgufMetadataValueType::String => MetadataValue::String(text.to_string()),
        GgufMetadataValueType::Array => {
            return Err(GgufError::TypeMismatch(format!(
                "{key}: an array needs an array template to coerce into"
            )))
        }
    })
}

fn out_of_range(key: &str, text: &str, value_type: GgufMetadataValueType) -> GgufError {
    GgufError::ValueOutOfRange {
        key: key.to_string(),
        value: text.to_string(),
        value_type,
    }
}

fn not_a(key: &str, text: &str, value_type: GgufMetadataValueType) -> GgufError {
    GgufError::TypeMismatch(format!("{key}: {text:?} is not a valid {value_type}"))
}

fn parse_int<T: TryFrom<i128>>(
    key: &str,
    text: &str,
    value_type: GgufMetadataValueType,
) -> Result<T, GgufError> {
    use std::num::IntErrorKind;

    let wide = text.trim().parse::<i128>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => out_of_range(key, text, value_type),
        _ => not_a(key, text, value_type),
    })?;
    T::try_from(wide).map_err(|_| out_of_range(key, text, value_type))
}

fn parse_float<T>(key: &str, text: &str, value_type: GgufMetadataValueType) -> Result<T, GgufError>
where
    T: std::str::FromStr + Into<f64> + Copy,
{
    let trimmed = text.trim();
    let value = trimmed
        .parse::<T>()
        .map_err(|_| not_a(key, text, value_type))?;
    let widened: f64 = value.into();
    // a finite literal that rounds to infinity does not fit the width
    if widened.is_infinite() && !trimmed.to_ascii_lowercase().contains("inf") {
        return Err(out_of_range(key, text, value_type));
    }
    Ok(value)
}

fn parse_bool(key: &str, text: &str) -> Result<bool, GgufError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(not_a(key, text, GgufMetadataValueType::Bool))
    }
}

/// JSON array literal coerced element-wise, else comma-split STRING array
pub fn coerce_array(
    key: &str,
    text: &str,
    original: &MetadataArray,
) -> Result<MetadataArray, GgufError> {
    if let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(text) {
        return coerce_json_array(key, &items, original);
    }

    if original.element_type != GgufMetadataValueType::String {
        tracing::warn!(
            key,
            from = %original.element_type,
            "array edit is not a JSON literal; storing comma-separated STRING elements"
        );
    }
    let values = text
        .split(',')
        .map(|s| MetadataValue::String(s.trim().to_string()))
        .collect();
    Ok(MetadataArray::new(GgufMetadataValueType::String, values))
}

fn coerce_json_array(
    key: &str,
    items: &[JsonValue],
    template: &MetadataArray,
) -> Result<MetadataArray, GgufError> {
    let element_type = template.element_type;
    let values = items
        .iter()
        .map(|item| coerce_json_element(key, item, template))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MetadataArray::new(element_type, values))
}

fn coerce_json_element(
    key: &str,
    item: &JsonValue,
    template: &MetadataArray,
) -> Result<MetadataValue, GgufError> {
    let element_type = template.element_type;
    match (element_type, item) {
        (GgufMetadataValueType::Array, JsonValue::Array(inner)) => {
            let inner_template = template
                .values
                .first()
                .and_then(MetadataValue::as_array)
                .ok_or_else(|| {
                    GgufError::TypeMismatch(format!(
                        "{key}: nested element type is unknown because the original array is empty"
                    ))
                })?;
            coerce_json_array(key, inner, inner_template).map(MetadataValue::Array)
        }
        (GgufMetadataValueType::String, JsonValue::String(s)) => Ok(MetadataValue::String(s.clone())),
        (GgufMetadataValueType::Bool, JsonValue::Bool(b)) => Ok(MetadataValue::Bool(*b)),
        (
            GgufMetadataValueType::Uint8
            | GgufMetadataValueType::Int8
            | GgufMetadataValueType::Uint16
            | GgufMetadataValueType::Int16
            | GgufMetadataValueType::Uint32
            | GgufMetadataValueType::Int32
            | GgufMetadataValueType::Uint64
            | GgufMetadataValueType::Int64
            | GgufMetadataValueType::Float32
            | GgufMetadataValueType::Float64,
            JsonValue::Number(n),
        ) => coerce_scalar(key, &n.to_string(), element_type),
        (_, other) => Err(GgufError::TypeMismatch(format!(
            "{key}: array element {other} is not a valid {element_type}"
        ))),
    }
}
