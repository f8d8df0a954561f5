//! Choice Clauses
//!
//! Typed predicates for `Choice` states. A predicate name such as
//! `NumericGreaterThanEquals` is a [`TypePrefix`] followed by a
//! [`Comparison`]; a clause serializes as
//! `{"Variable": ..., "<Predicate>": value, "Next": ...}`.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value type a predicate compares as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypePrefix {
    String,
    Numeric,
    Boolean,
    Timestamp,
}

impl TypePrefix {
    /// All prefixes, in the order ambiguous comparisons expand to.
    pub const ALL: [TypePrefix; 4] = [
        TypePrefix::String,
        TypePrefix::Numeric,
        TypePrefix::Boolean,
        TypePrefix::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypePrefix::String => "String",
            TypePrefix::Numeric => "Numeric",
            TypePrefix::Boolean => "Boolean",
            TypePrefix::Timestamp => "Timestamp",
        }
    }
}

/// The relation a predicate tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Equals => "Equals",
            Comparison::GreaterThan => "GreaterThan",
            Comparison::GreaterThanEquals => "GreaterThanEquals",
            Comparison::LessThan => "LessThan",
            Comparison::LessThanEquals => "LessThanEquals",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "Equals" => Comparison::Equals,
            "GreaterThan" => Comparison::GreaterThan,
            "GreaterThanEquals" => Comparison::GreaterThanEquals,
            "LessThan" => Comparison::LessThan,
            "LessThanEquals" => Comparison::LessThanEquals,
            _ => return None,
        })
    }
}

/// A canonical typed predicate name, e.g. `StringEquals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub prefix: TypePrefix,
    pub comparison: Comparison,
}

impl Predicate {
    pub const fn new(prefix: TypePrefix, comparison: Comparison) -> Self {
        Self { prefix, comparison }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix.as_str(), self.comparison.as_str())
    }
}

impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypePrefix::ALL
            .iter()
            .find_map(|prefix| {
                s.strip_prefix(prefix.as_str())
                    .and_then(Comparison::parse)
                    .map(|comparison| Predicate::new(*prefix, comparison))
            })
            .ok_or_else(|| format!("unknown choice predicate '{}'", s))
    }
}

/// One rule of a `Choice` state.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceClause {
    pub variable: String,
    pub predicate: Predicate,
    pub value: Value,
    pub next: String,
}

impl Serialize for ChoiceClause {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("Variable", &self.variable)?;
        map.serialize_entry(&self.predicate.to_string(), &self.value)?;
        map.serialize_entry("Next", &self.next)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChoiceClause {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = IndexMap::<String, Value>::deserialize(deserializer)?;

        let variable = take_string::<D::Error>(&mut fields, "Variable")?;
        let next = take_string::<D::Error>(&mut fields, "Next")?;

        if fields.len() != 1 {
            return Err(de::Error::custom(format!(
                "choice rule must have exactly one predicate, found {}",
                fields.len()
            )));
        }
        let (name, value) = fields
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("choice rule has no predicate"))?;
        let predicate = name.parse::<Predicate>().map_err(D::Error::custom)?;

        Ok(ChoiceClause {
            variable,
            predicate,
            value,
            next,
        })
    }
}

fn take_string<E: de::Error>(
    fields: &mut IndexMap<String, Value>,
    key: &'static str,
) -> Result<String, E> {
    match fields.shift_remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(E::custom(format!("'{}' must be a string, found {}", key, other))),
        None => Err(E::missing_field(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predicate_display() {
        let predicate = Predicate::new(TypePrefix::Numeric, Comparison::GreaterThanEquals);
        assert_eq!(predicate.to_string(), "NumericGreaterThanEquals");
    }

    #[test]
    fn test_predicate_parse() {
        let predicate: Predicate = "TimestampLessThan".parse().unwrap();
        assert_eq!(predicate.prefix, TypePrefix::Timestamp);
        assert_eq!(predicate.comparison, Comparison::LessThan);

        assert!("StringMatches".parse::<Predicate>().is_err());
        assert!("Equals".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_clause_serializes_predicate_as_key() {
        let clause = ChoiceClause {
            variable: "$.status".to_string(),
            predicate: Predicate::new(TypePrefix::String, Comparison::Equals),
            value: json!("ok"),
            next: "done".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"Variable": "$.status", "StringEquals": "ok", "Next": "done"})
        );
    }

    #[test]
    fn test_clause_deserialize() {
        let clause: ChoiceClause = serde_json::from_value(
            json!({"Variable": "$.n", "NumericLessThan": 3, "Next": "small"}),
        )
        .unwrap();
        assert_eq!(clause.predicate.to_string(), "NumericLessThan");
        assert_eq!(clause.value, json!(3));
        assert_eq!(clause.next, "small");
    }

    #[test]
    fn test_clause_deserialize_rejects_extra_predicates() {
        let result: Result<ChoiceClause, _> = serde_json::from_value(json!({
            "Variable": "$.n",
            "NumericLessThan": 3,
            "NumericEquals": 3,
            "Next": "small"
        }));
        assert!(result.is_err());
    }
}
