//! Condition text parser.
//!
//! Clauses are split on a case-insensitive `and` outside string literals and
//! matched against an ordered list of clause shapes. By default a clause that
//! matches no shape is dropped and logged; [`ConditionParser::strict`] turns
//! that into an error.

use super::{Condition, ConditionOperator, ConditionValue};
use crate::error::ConditionParseError;
use regex::Regex;
use std::sync::LazyLock;

// Clause shapes, tried in this order
static NOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?i:not)\s+|!\s*)\$([A-Za-z_][A-Za-z0-9_.]*)$").expect("valid regex")
});
// `>=`/`<=` are listed before `>`/`<` so the longer operator wins
static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_.]*)\s*(==|!=|>=|<=|>|<)\s*(.+)$").expect("valid regex")
});
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_.]*)\s+((?i:eq|is|neq|gte|lte|gt|lt))\s+(.+)$")
        .expect("valid regex")
});
static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_.]*)$").expect("valid regex"));

static AND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(?i:and)\s+").expect("valid regex"));

/// Result of a lenient parse: the conditions kept and the clauses dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedConditions {
    pub conditions: Vec<Condition>,
    pub dropped: Vec<String>,
}

/// Condition parser with a strictness switch
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionParser {
    strict: bool,
}

impl ConditionParser {
    /// Parser that drops clauses it cannot match
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Parser that rejects clauses it cannot match
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn parse(&self, text: &str) -> Result<ParsedConditions, ConditionParseError> {
        let mut parsed = ParsedConditions::default();

        for clause in split_clauses(text) {
            match parse_clause(&clause) {
                Some(condition) => parsed.conditions.push(condition),
                None if self.strict => {
                    return Err(ConditionParseError {
                        clause,
                        reason: "clause matches no known condition form".to_string(),
                    });
                }
                None => {
                    tracing::warn!("[DGSC] Dropping unparseable condition clause '{}'", clause);
                    parsed.dropped.push(clause);
                }
            }
        }

        Ok(parsed)
    }
}

/// Parse condition text leniently, dropping unmatched clauses
pub fn parse_conditions(text: &str) -> Vec<Condition> {
    ConditionParser::lenient()
        .parse(text)
        .map(|parsed| parsed.conditions)
        .unwrap_or_default()
}

/// Parse condition text, failing on the first unmatched clause
pub fn parse_conditions_strict(text: &str) -> Result<Vec<Condition>, ConditionParseError> {
    ConditionParser::strict()
        .parse(text)
        .map(|parsed| parsed.conditions)
}

fn parse_clause(clause: &str) -> Option<Condition> {
    if let Some(caps) = NOT_RE.captures(clause) {
        return Some(Condition::is_not_set(&caps[1]));
    }

    for re in [&*SYMBOL_RE, &*WORD_RE] {
        if let Some(caps) = re.captures(clause) {
            let operator = ConditionOperator::from_token(&caps[2])?;
            return Some(Condition {
                flag: caps[1].to_string(),
                operator,
                value: Some(ConditionValue::coerce(&caps[3])),
            });
        }
    }

    BARE_RE
        .captures(clause)
        .map(|caps| Condition::is_set(&caps[1]))
}

/// Split on ` and ` (any case) outside quoted strings. Empty clauses are
/// kept so the caller can report them.
fn split_clauses(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut rest = text.char_indices().peekable();

    while let Some((i, ch)) = rest.next() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            current.push(ch);
            continue;
        }

        if ch.is_whitespace() {
            if let Some(m) = AND_RE.find(&text[i..]) {
                clauses.push(current.trim().to_string());
                current.clear();
                let end = i + m.end();
                while rest.peek().is_some_and(|(j, _)| *j < end) {
                    rest.next();
                }
                continue;
            }
        }

        current.push(ch);
    }

    clauses.push(current.trim().to_string());
    clauses
}

/// Strip one pair of matching surrounding quotes and resolve escapes inside
pub(crate) fn unquote(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let quoted = raw.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[raw.len() - 1] == bytes[0];
    if !quoted {
        return raw.to_string();
    }

    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
