//! Value coercion.
//!
//! Conversions are numeric, string, enum and nullable aware:
//!
//! - integral targets accept any integral value in range, floats and decimals (rounded half
//!   to even), booleans and strings holding a whole number; `"2.0"` converts, `"2.5"` fails
//! - a decimal target strips currency symbols, group separators and whitespace from strings
//!   first; an accounting-style `(1.50)` is negative
//! - an enum target parses strings by member name, ignoring case, or accepts a number
//! - a nullable target maps null and empty strings to null and converts anything else to the
//!   inner type
//! - a class target accepts instances of the class and builds one from a dictionary

use std::{collections::BTreeMap, str::FromStr, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal, RoundingStrategy,
};
use tracing::trace;

use crate::{
    facade::{
        object::{ClassType, EnumType, EnumValue, Object, RuntimeType},
        primitives::Primitive,
        value::Value,
    },
    Error, Result,
};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '¢', '₩', '₽', '₺', '₪'];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Convert `value` to `target`.
///
/// # Errors
/// Returns [`crate::Error::TypeConversion`] if the value can not be represented as `target`.
pub fn change_type(value: &Value, target: &RuntimeType) -> Result<Value> {
    if value.is_null() {
        return if target.accepts_null() {
            Ok(Value::Null)
        } else {
            Err(conversion_error(value, target))
        };
    }

    let converted = match target {
        RuntimeType::Nullable(inner) => {
            if value.as_str().is_some_and(|text| text.trim().is_empty()) {
                return Ok(Value::Null);
            }
            return change_type(value, inner);
        }
        RuntimeType::Primitive(primitive) => to_primitive(value, *primitive),
        RuntimeType::Enum(enum_type) => to_enum(value, enum_type),
        RuntimeType::List(inner) => match value {
            Value::List(items) => items
                .iter()
                .map(|item| change_type(item, inner))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
                .ok(),
            _ => None,
        },
        RuntimeType::Class(class) => return to_class(value, class, target),
        RuntimeType::Declared(descriptor) => match value {
            Value::Object(object) if read_lock!(object).class().is_a(descriptor.full_name()) => {
                Some(value.clone())
            }
            _ => None,
        },
    };

    converted.ok_or_else(|| conversion_error(value, target))
}

/// `true` if [`change_type`] would succeed.
#[must_use]
pub fn can_convert(value: &Value, target: &RuntimeType) -> bool {
    change_type(value, target).is_ok()
}

/// Write the entries of `values` into the matching fields of `object`, converting each value
/// to the field type. Field names match exactly first, then ignoring case; unknown keys are
/// skipped. Returns the number of fields written.
///
/// # Errors
/// Returns [`crate::Error::TypeConversion`] if a value does not fit its field.
pub fn populate(object: &mut Object, values: &BTreeMap<String, Value>) -> Result<usize> {
    let class = object.class().clone();
    let mut written = 0;
    for (key, value) in values {
        let Some(field) = class.field(key) else {
            trace!(class = class.name(), key = key.as_str(), "no field for key");
            continue;
        };

        let converted = change_type(value, &field.ty)?;
        if object.set(&field.name, converted) {
            written += 1;
        }
    }
    Ok(written)
}

fn conversion_error(value: &Value, target: &RuntimeType) -> Error {
    Error::TypeConversion {
        value: value.to_string(),
        target: target.name(),
    }
}

fn to_class(value: &Value, class: &Arc<ClassType>, target: &RuntimeType) -> Result<Value> {
    match value {
        Value::Object(object) if read_lock!(object).class().is_a(class.name()) => Ok(value.clone()),
        Value::Map(entries) => {
            let mut object = Object::new(class.clone());
            populate(&mut object, entries)?;
            Ok(Value::object(object))
        }
        _ => Err(conversion_error(value, target)),
    }
}

fn to_enum(value: &Value, enum_type: &Arc<EnumType>) -> Option<Value> {
    let number = match value {
        Value::Enum(existing) if existing.enum_type().name() == enum_type.name() => existing.value(),
        Value::String(text) => enum_type.parse(text)?,
        Value::Bool(_) | Value::Char(_) | Value::Enum(_) => return None,
        other => i64::try_from(integral(other)?).ok()?,
    };
    Some(Value::Enum(EnumValue::new(enum_type.clone(), number)))
}

fn to_primitive(value: &Value, target: Primitive) -> Option<Value> {
    if let Some((min, max)) = target.integer_range() {
        let number = integral(value)?;
        if number < min || number > max {
            return None;
        }
        return Some(integer_value(number, target));
    }

    match target {
        Primitive::Object => Some(value.clone()),
        Primitive::String => Some(Value::String(value.to_string())),
        Primitive::Bool => to_bool(value).map(Value::Bool),
        Primitive::Char => match value {
            Value::Char(c) => Some(Value::Char(*c)),
            Value::String(text) => {
                let mut chars = text.chars();
                let c = chars.next()?;
                chars.next().is_none().then_some(Value::Char(c))
            }
            other => {
                let code = u32::try_from(other.as_i128()?).ok()?;
                char::from_u32(code).map(Value::Char)
            }
        },
        Primitive::F32 => to_f64(value).map(|v| Value::F32(v as f32)),
        Primitive::F64 => to_f64(value).map(Value::F64),
        Primitive::Decimal => to_decimal(value).map(Value::Decimal),
        Primitive::DateTime => match value {
            Value::DateTime(value) => Some(Value::DateTime(*value)),
            Value::String(text) => parse_date_time(text).map(Value::DateTime),
            _ => None,
        },
        _ => None,
    }
}

/// Integral view of a value, rounding floats and decimals half to even. Strings must hold a
/// whole number.
fn integral(value: &Value) -> Option<i128> {
    match value {
        Value::F32(v) => float_integral(f64::from(*v)),
        Value::F64(v) => float_integral(*v),
        Value::Decimal(v) => v
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i128(),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i128>()
                .ok()
                .or_else(|| {
                    Decimal::from_str(text)
                        .ok()
                        .filter(|number| number.fract().is_zero())
                        .and_then(|number| number.to_i128())
                })
        }
        Value::Char(_) => None,
        other => other.as_i128(),
    }
}

fn float_integral(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    (rounded.abs() < 1.7e38).then_some(rounded as i128)
}

fn integer_value(number: i128, target: Primitive) -> Value {
    // Callers checked the range
    match target {
        Primitive::I8 => Value::I8(number as i8),
        Primitive::U8 => Value::U8(number as u8),
        Primitive::I16 => Value::I16(number as i16),
        Primitive::U16 => Value::U16(number as u16),
        Primitive::I32 => Value::I32(number as i32),
        Primitive::U32 => Value::U32(number as u32),
        Primitive::I64 => Value::I64(number as i64),
        _ => Value::U64(number as u64),
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(v) => Some(*v),
        Value::String(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                Some(true)
            } else if text.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        Value::F32(v) => Some(*v != 0.0),
        Value::F64(v) => Some(*v != 0.0),
        Value::Decimal(v) => Some(!v.is_zero()),
        Value::Char(_) | Value::Enum(_) => None,
        other => other.as_i128().map(|v| v != 0),
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::F32(v) => Some(f64::from(*v)),
        Value::F64(v) => Some(*v),
        Value::Decimal(v) => v.to_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Char(_) => None,
        other => other.as_i128().map(|v| v as f64),
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(v) => Some(*v),
        Value::F32(v) => Decimal::from_f32(*v),
        Value::F64(v) => Decimal::from_f64(*v),
        Value::String(text) => parse_decimal(text),
        Value::Char(_) => None,
        other => Decimal::from_i128(other.as_i128()?),
    }
}

/// Parse a decimal after removing currency symbols, group separators and whitespace.
fn parse_decimal(text: &str) -> Option<Decimal> {
    let mut text = text.trim();
    let negative = text.starts_with('(') && text.ends_with(')');
    if negative {
        text = &text[1..text.len() - 1];
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    let number = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;

    Some(if negative { -number } else { number })
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
