//! Splits raw script text into node blocks.
//!
//! A node is a run of `key: value` header lines (one of them `title`), a
//! `---` line, body lines, and a closing `===`. Outside nodes only blank
//! lines and `//` comments are allowed; `// @...` directives there are
//! collected as the script preamble.

use super::{is_comment, is_node_id, parse_directive, Directive, NODE_END, NODE_START};
use crate::error::ScriptParseError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):\s*(.*)$").expect("valid regex"));

/// A trimmed, non-blank source line with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub number: usize,
    pub text: String,
}

/// One node's raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    pub title: String,
    pub title_line: usize,
    /// Headers other than `title`, in source order
    pub headers: Vec<(String, String)>,
    pub body: Vec<ScriptLine>,
}

impl ScriptBlock {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Body lines that are not plain `//` comments. Directives are kept.
    pub fn meaningful_lines(&self) -> impl Iterator<Item = &ScriptLine> {
        self.body
            .iter()
            .filter(|line| !is_comment(&line.text) || parse_directive(&line.text).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitScript {
    /// Directives found outside any node, with their line numbers
    pub preamble: Vec<(usize, Directive)>,
    pub blocks: Vec<ScriptBlock>,
}

enum SplitState {
    Outside,
    Header {
        start_line: usize,
        title: Option<(String, usize)>,
        headers: Vec<(String, String)>,
    },
    Body(ScriptBlock),
}

pub fn split_script(text: &str) -> Result<SplitScript, ScriptParseError> {
    let mut script = SplitScript::default();
    let mut titles: HashMap<String, usize> = HashMap::new();
    let mut state = SplitState::Outside;
    let mut last_line = 0;

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        last_line = number;
        let line = raw.trim();

        state = match state {
            SplitState::Outside => {
                if line.is_empty() {
                    SplitState::Outside
                } else if is_comment(line) {
                    if let Some(directive) = parse_directive(line) {
                        let directive =
                            directive.map_err(|reason| ScriptParseError::new(number, reason))?;
                        script.preamble.push((number, directive));
                    }
                    SplitState::Outside
                } else {
                    let mut title = None;
                    let mut headers = Vec::new();
                    push_header(&mut title, &mut headers, line, number, &mut titles)?;
                    SplitState::Header {
                        start_line: number,
                        title,
                        headers,
                    }
                }
            }
            SplitState::Header {
                start_line,
                mut title,
                mut headers,
            } => {
                if line == NODE_START {
                    let (title, title_line) = title.ok_or_else(|| {
                        ScriptParseError::new(start_line, "node has no 'title' header")
                    })?;
                    SplitState::Body(ScriptBlock {
                        title,
                        title_line,
                        headers,
                        body: Vec::new(),
                    })
                } else {
                    if !line.is_empty() && !is_comment(line) {
                        push_header(&mut title, &mut headers, line, number, &mut titles)?;
                    }
                    SplitState::Header {
                        start_line,
                        title,
                        headers,
                    }
                }
            }
            SplitState::Body(mut block) => {
                if line == NODE_END {
                    script.blocks.push(block);
                    SplitState::Outside
                } else {
                    if !line.is_empty() {
                        block.body.push(ScriptLine {
                            number,
                            text: line.to_string(),
                        });
                    }
                    SplitState::Body(block)
                }
            }
        };
    }

    match state {
        SplitState::Outside => Ok(script),
        SplitState::Header { start_line, .. } => Err(ScriptParseError::new(
            start_line,
            format!("node header is not followed by '{}'", NODE_START),
        )),
        SplitState::Body(block) => Err(ScriptParseError::new(
            last_line.max(block.title_line),
            format!("node '{}' is not closed with '{}'", block.title, NODE_END),
        )),
    }
}

fn push_header(
    title: &mut Option<(String, usize)>,
    headers: &mut Vec<(String, String)>,
    line: &str,
    number: usize,
    titles: &mut HashMap<String, usize>,
) -> Result<(), ScriptParseError> {
    let caps = HEADER_RE.captures(line).ok_or_else(|| {
        ScriptParseError::new(number, format!("expected a 'key: value' node header, found '{}'", line))
    })?;
    let key = &caps[1];
    let value = caps[2].trim();

    if key != "title" {
        headers.push((key.to_string(), value.to_string()));
        return Ok(());
    }

    if title.is_some() {
        return Err(ScriptParseError::new(number, "node declares 'title' twice"));
    }
    if !is_node_id(value) {
        return Err(ScriptParseError::new(number, format!("invalid node title '{}'", value)));
    }
    if let Some(first) = titles.insert(value.to_string(), number) {
        return Err(ScriptParseError::new(
            number,
            format!("duplicate node title '{}' (first declared on line {})", value, first),
        ));
    }
    *title = Some((value.to_string(), number));
    Ok(())
}
