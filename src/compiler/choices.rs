//! Choice Building
//!
//! Expands one shorthand comparison `[variable, operator, value]` into typed
//! choice rules.
//!
//! Strict operators name their type (`str=`, `num>=`, `time<`) and yield a
//! single rule. Generic operators (`=`, `==`, `>`, `>=`, `<`, `<=`) yield one
//! rule per type the value could be read as, in the order String, Numeric,
//! Boolean, Timestamp.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{CompileError, Result};
use crate::machine::{ChoiceClause, Comparison, Predicate, TypePrefix};

/// Explicitly typed operators and the predicate each maps to.
const STRICT_TABLE: [(&str, Predicate); 15] = [
    ("str=", Predicate::new(TypePrefix::String, Comparison::Equals)),
    ("num=", Predicate::new(TypePrefix::Numeric, Comparison::Equals)),
    ("time=", Predicate::new(TypePrefix::Timestamp, Comparison::Equals)),
    ("str>", Predicate::new(TypePrefix::String, Comparison::GreaterThan)),
    ("num>", Predicate::new(TypePrefix::Numeric, Comparison::GreaterThan)),
    ("time>", Predicate::new(TypePrefix::Timestamp, Comparison::GreaterThan)),
    ("str>=", Predicate::new(TypePrefix::String, Comparison::GreaterThanEquals)),
    ("num>=", Predicate::new(TypePrefix::Numeric, Comparison::GreaterThanEquals)),
    ("time>=", Predicate::new(TypePrefix::Timestamp, Comparison::GreaterThanEquals)),
    ("str<", Predicate::new(TypePrefix::String, Comparison::LessThan)),
    ("num<", Predicate::new(TypePrefix::Numeric, Comparison::LessThan)),
    ("time<", Predicate::new(TypePrefix::Timestamp, Comparison::LessThan)),
    ("str<=", Predicate::new(TypePrefix::String, Comparison::LessThanEquals)),
    ("num<=", Predicate::new(TypePrefix::Numeric, Comparison::LessThanEquals)),
    ("time<=", Predicate::new(TypePrefix::Timestamp, Comparison::LessThanEquals)),
];

static STRICT_OPERATORS: Lazy<HashMap<&'static str, Predicate>> =
    Lazy::new(|| STRICT_TABLE.into_iter().collect());

fn generic_comparison(operator: &str) -> Option<Comparison> {
    Some(match operator {
        "=" | "==" => Comparison::Equals,
        ">" => Comparison::GreaterThan,
        ">=" => Comparison::GreaterThanEquals,
        "<" => Comparison::LessThan,
        "<=" => Comparison::LessThanEquals,
        _ => return None,
    })
}

/// Builds the choice rules for one comparison.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use statecraft::compiler::choices::build_choices;
///
/// let rules = build_choices(">", "$.count", json!(5), "big").unwrap();
/// let names: Vec<String> = rules.iter().map(|r| r.predicate.to_string()).collect();
/// assert_eq!(names, vec!["StringGreaterThan", "NumericGreaterThan"]);
/// assert_eq!(rules[0].value, json!("5"));
/// ```
pub fn build_choices(
    operator: &str,
    variable: &str,
    value: Value,
    consequent: &str,
) -> Result<Vec<ChoiceClause>> {
    let clause = |predicate: Predicate, value: Value| ChoiceClause {
        variable: variable.to_string(),
        predicate,
        value,
        next: consequent.to_string(),
    };

    if let Some(predicate) = STRICT_OPERATORS.get(operator) {
        return Ok(vec![clause(*predicate, value)]);
    }

    let comparison = generic_comparison(operator)
        .ok_or_else(|| CompileError::syntax(format!("invalid operation '{}'", operator)))?;

    let as_string = render_scalar(&value)?;
    let prefixes = type_prefixes(&value);
    debug!(
        "Comparison '{} {} {}' expands to {:?}",
        variable, operator, as_string, prefixes
    );

    Ok(prefixes
        .into_iter()
        .map(|prefix| {
            let value = match prefix {
                TypePrefix::String => Value::String(as_string.clone()),
                _ => value.clone(),
            };
            clause(Predicate::new(prefix, comparison), value)
        })
        .collect())
}

/// Every type a comparison value could be read as. `String` always applies.
pub fn type_prefixes(value: &Value) -> Vec<TypePrefix> {
    TypePrefix::ALL
        .into_iter()
        .filter(|prefix| match prefix {
            TypePrefix::String => true,
            TypePrefix::Numeric => is_numeric(value),
            TypePrefix::Boolean => is_booleanish(value),
            TypePrefix::Timestamp => is_dateish(value),
        })
        .collect()
}

fn render_scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(CompileError::syntax(format!(
            "comparison value must be a scalar, found {}",
            other
        ))),
    }
}

/// Numbers, and strings that start with an integer and read as a finite number.
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().map_or(false, f64::is_finite),
        Value::String(s) => {
            let trimmed = s.trim();
            let unsigned = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('+'))
                .unwrap_or(trimmed);
            unsigned.starts_with(|c: char| c.is_ascii_digit())
                && trimmed.parse::<f64>().map_or(false, f64::is_finite)
        }
        _ => false,
    }
}

fn is_booleanish(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => s == "true" || s == "false",
        _ => false,
    }
}

fn is_dateish(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || DateTime::parse_from_rfc2822(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
