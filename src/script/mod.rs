//! # Script Dialect
//!
//! Lexical pieces of the Yarn Spinner subset the compiler reads and writes:
//! identifiers, text escaping, `<<command>>` lines, `-> choice` lines,
//! `Speaker: line` dialogue and `// @name key=value` directives.

mod importer;
mod splitter;

pub use importer::{
    ImportOutcome, ImportWarning, ScriptImporter, DEFAULT_GRAPH_ID, END_DIRECTIVE, GRAPH_DIRECTIVE,
    POSITION_HEADER,
};
pub use splitter::{split_script, ScriptBlock, ScriptLine, SplitScript};

use regex::Regex;
use std::sync::LazyLock;

pub const NODE_START: &str = "---";
pub const NODE_END: &str = "===";

/// Directive keys owned by the storylet directive
pub const STORYLET_KEYS: &[&str] = &["template", "entry", "entry_node", "return", "return_node"];
/// Directive keys owned by the storylet pool directive
pub const POOL_KEYS: &[&str] = &["pool", "selection"];

static NODE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("valid regex"));
static SPEAKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"));
static FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid regex"));
static DIRECTIVE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid regex"));

static DIALOGUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\-]*):(.*)$").expect("valid regex"));
static SET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_.]*)\s*(?:=|(?i:to))\s*(.+)$").expect("valid regex")
});

pub fn is_node_id(s: &str) -> bool {
    NODE_ID_RE.is_match(s)
}

pub fn is_speaker(s: &str) -> bool {
    SPEAKER_RE.is_match(s)
}

pub fn is_flag(s: &str) -> bool {
    FLAG_RE.is_match(s)
}

pub fn is_directive_key(s: &str) -> bool {
    DIRECTIVE_KEY_RE.is_match(s)
}

/// Escape characters the dialect gives meaning to inside a line.
///
/// Lines are trimmed when read back, so leading whitespace is written as
/// `\ ` and trailing whitespace is closed with a lone `\`, which [`unescape`]
/// drops.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for (i, ch) in text.char_indices() {
        if matches!(ch, '\\' | '#' | '<' | '>' | '{' | '}') || (i == 0 && ch.is_whitespace()) {
            out.push('\\');
        }
        out.push(ch);
    }
    if text.ends_with(char::is_whitespace) {
        out.push('\\');
    }
    out
}

/// Escape a speaker-less line so it cannot be read as dialogue, a choice, a
/// comment, a delimiter or a blank line
pub fn escape_narration(line: &str) -> String {
    let escaped = escape_text(line);
    if escaped.is_empty() {
        return "\\".to_string();
    }
    if escaped.starts_with(['-', '/', '=']) {
        return format!("\\{}", escaped);
    }
    if let Some(caps) = DIALOGUE_RE.captures(&escaped) {
        return format!("{}\\:{}", &caps[1], &caps[2]);
    }
    escaped
}

/// Resolve `\X` escapes to `X`; a trailing lone backslash is dropped
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// `Speaker: content` with the content unescaped
pub fn split_dialogue(line: &str) -> Option<(&str, String)> {
    let caps = DIALOGUE_RE.captures(line)?;
    let speaker = caps.get(1)?.as_str();
    let rest = caps.get(2)?.as_str();
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some((speaker, unescape(rest)))
}

pub fn is_comment(line: &str) -> bool {
    line.starts_with("//")
}

/// A `<<...>>` command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Jump(&'a str),
    Set { flag: &'a str, value: &'a str },
    If(&'a str),
    ElseIf(&'a str),
    Else,
    EndIf,
    Other(&'a str),
}

pub fn parse_command(line: &str) -> Option<Command<'_>> {
    let inner = line.strip_prefix("<<")?.strip_suffix(">>")?.trim();
    let (keyword, rest) = match inner.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (inner, ""),
    };

    let command = match keyword {
        "jump" => Command::Jump(rest),
        "if" => Command::If(rest),
        "elseif" => Command::ElseIf(rest),
        "else" if rest.is_empty() => Command::Else,
        "endif" if rest.is_empty() => Command::EndIf,
        "set" => match SET_RE.captures(rest) {
            Some(caps) => Command::Set {
                flag: caps.get(1).map_or("", |m| m.as_str()),
                value: caps.get(2).map_or("", |m| m.as_str().trim()),
            },
            None => Command::Other(inner),
        },
        _ => Command::Other(inner),
    };
    Some(command)
}

pub fn format_jump(target: &str) -> String {
    format!("<<jump {}>>", target)
}

pub fn format_set(flag: &str) -> String {
    format!("<<set ${} = true>>", flag)
}

/// Format a choice line carrying its id as a Yarn line tag
pub fn format_choice(text: &str, id: &str) -> String {
    format!("-> {} #line:{}", escape_text(text), id)
}

/// Split `-> text #tag ...` into unescaped text and the `#line:` id
pub fn parse_choice(line: &str) -> Option<(String, Option<String>)> {
    let rest = line.strip_prefix("->")?;

    let mut text_end = rest.len();
    let mut escaped = false;
    for (i, ch) in rest.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '#' {
            text_end = i;
            break;
        }
    }

    let text = unescape(rest[..text_end].trim());
    let id = rest[text_end..]
        .split_whitespace()
        .filter_map(|tag| tag.strip_prefix("#line:"))
        .find(|id| !id.is_empty())
        .map(str::to_string);
    Some((text, id))
}

/// A `// @name key=value ...` comment directive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directive {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn attr_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes whose keys are not in `known`
    pub fn extra<'a>(&'a self, known: &'a [&str]) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.attributes
            .iter()
            .filter(move |(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("// @{}", self.name);
        for (key, value) in &self.attributes {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&quote_value(value));
        }
        line
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes =
        value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
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

/// Parse a directive line. `None` when the line is not a directive at all,
/// `Some(Err)` when it is one but malformed.
pub fn parse_directive(line: &str) -> Option<Result<Directive, String>> {
    let body = line.strip_prefix("//")?.trim_start().strip_prefix('@')?;
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = &body[..name_end];
    if !is_directive_key(name) {
        return Some(Err(format!("invalid directive name '{}'", name)));
    }

    let mut directive = Directive::new(name);
    let mut chars = body[name_end..].chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') || !is_directive_key(&key) {
            return Some(Err(format!("expected key=value in @{} directive", name)));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => value.push('\n'),
                        Some(other) => value.push(other),
                        None => break,
                    },
                    other => value.push(other),
                }
            }
            if !closed {
                return Some(Err(format!("unterminated quoted value for '{}'", key)));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        directive.attributes.push((key, value));
    }

    Some(Ok(directive))
}
