//! Condition text formatter. Always writes the canonical symbolic form.

use super::{Condition, ConditionOperator, ConditionValue};

/// Format a condition list as `clause and clause ...`
pub fn format_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(format_condition)
        .collect::<Vec<_>>()
        .join(" and ")
}

pub fn format_condition(condition: &Condition) -> String {
    match condition.operator {
        ConditionOperator::IsSet => format!("${}", condition.flag),
        ConditionOperator::IsNotSet => format!("not ${}", condition.flag),
        op => {
            let symbol = op.symbol().unwrap_or("==");
            let value = condition
                .value
                .as_ref()
                .map(format_value)
                .unwrap_or_else(|| "\"\"".to_string());
            format!("${} {} {}", condition.flag, symbol, value)
        }
    }
}

/// Format a literal; strings are always double-quoted so they never
/// re-parse as numbers or booleans
pub fn format_value(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Bool(b) => b.to_string(),
        ConditionValue::Number(n) => n.to_string(),
        ConditionValue::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    other => out.push(other),
                }
            }
            out.push('"');
            out
        }
    }
}
