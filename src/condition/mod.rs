//! # Conditions
//!
//! Flag comparisons guarding choices and conditional branches, and their
//! textual form in the script dialect (`$flag`, `not $flag`, `$flag >= 10`,
//! clauses joined with `and`).

mod formatter;
mod parser;

pub use formatter::{format_condition, format_conditions, format_value};
pub use parser::{parse_conditions, parse_conditions_strict, ConditionParser, ParsedConditions};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a game-state flag, written as `$name` in scripts
pub type FlagId = String;

/// Comparison applied to a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    IsSet,
    IsNotSet,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl ConditionOperator {
    /// Symbolic operator used in script text, `None` for the unary operators
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            ConditionOperator::IsSet | ConditionOperator::IsNotSet => None,
            ConditionOperator::Equals => Some("=="),
            ConditionOperator::NotEquals => Some("!="),
            ConditionOperator::GreaterThan => Some(">"),
            ConditionOperator::LessThan => Some("<"),
            ConditionOperator::GreaterEqual => Some(">="),
            ConditionOperator::LessEqual => Some("<="),
        }
    }

    /// Resolve a symbolic operator or one of its Yarn word synonyms
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token.to_ascii_lowercase().as_str() {
            "==" | "is" | "eq" => ConditionOperator::Equals,
            "!=" | "neq" => ConditionOperator::NotEquals,
            ">=" | "gte" => ConditionOperator::GreaterEqual,
            "<=" | "lte" => ConditionOperator::LessEqual,
            ">" | "gt" => ConditionOperator::GreaterThan,
            "<" | "lt" => ConditionOperator::LessThan,
            _ => return None,
        };
        Some(op)
    }

    /// Whether the operator compares against a value
    pub fn takes_value(self) -> bool {
        self.symbol().is_some()
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ConditionOperator::GreaterThan
                | ConditionOperator::LessThan
                | ConditionOperator::GreaterEqual
                | ConditionOperator::LessEqual
        )
    }
}

/// Literal a flag is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl ConditionValue {
    /// Coerce a raw clause operand: finite number, then `true`/`false`, then
    /// a string with one pair of surrounding quotes stripped
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<f64>() {
            if n.is_finite() {
                return ConditionValue::Number(n);
            }
        }
        match raw {
            "true" => return ConditionValue::Bool(true),
            "false" => return ConditionValue::Bool(false),
            _ => {}
        }
        ConditionValue::String(parser::unquote(raw))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionValue::Bool(_) => "boolean",
            ConditionValue::Number(_) => "number",
            ConditionValue::String(_) => "string",
        }
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        ConditionValue::Number(f64::from(value))
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::String(value.to_string())
    }
}

/// A single flag test. Several conditions on one choice or branch are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub flag: FlagId,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
}

impl Condition {
    pub fn is_set(flag: impl Into<FlagId>) -> Self {
        Self {
            flag: flag.into(),
            operator: ConditionOperator::IsSet,
            value: None,
        }
    }

    pub fn is_not_set(flag: impl Into<FlagId>) -> Self {
        Self {
            flag: flag.into(),
            operator: ConditionOperator::IsNotSet,
            value: None,
        }
    }

    pub fn compare(
        flag: impl Into<FlagId>,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            flag: flag.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Value-carrying operators need a value; unary operators must not have one
    pub fn is_well_formed(&self) -> bool {
        self.operator.takes_value() == self.value.is_some()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_condition(self))
    }
}
