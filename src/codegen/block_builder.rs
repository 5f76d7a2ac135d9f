//! # Block Builder
//!
//! Line assembly for one node block: `title:` and other headers, `---`, the
//! indented body, `===`. The builder only joins and indents lines; checking
//! what goes into them is the validator's job.

use crate::condition::{format_conditions, FlagId};
use crate::graph::Choice;
use crate::script::{self, Directive, NODE_END, NODE_START};

const INDENT: &str = "    ";

#[derive(Debug, Clone)]
pub struct BlockBuilder {
    title: String,
    headers: Vec<(String, String)>,
    body: Vec<String>,
    depth: usize,
}

impl BlockBuilder {
    pub fn start_node(id: &str) -> Self {
        Self {
            title: id.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            depth: 0,
        }
    }

    pub fn header(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// Append a raw body line at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.body
            .push(format!("{}{}", INDENT.repeat(self.depth), text.as_ref()));
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self
    }

    /// One line per content line, prefixed with the speaker when there is one
    pub fn dialogue(&mut self, speaker: Option<&str>, content: &str) -> &mut Self {
        match speaker {
            Some(speaker) => {
                for line in content.split('\n') {
                    let text = script::escape_text(line);
                    if text.is_empty() {
                        self.line(format!("{}:", speaker));
                    } else {
                        self.line(format!("{}: {}", speaker, text));
                    }
                }
            }
            None if content.is_empty() => {}
            None => {
                for line in content.split('\n') {
                    self.line(script::escape_narration(line));
                }
            }
        }
        self
    }

    pub fn jump(&mut self, target: Option<&str>) -> &mut Self {
        if let Some(target) = target {
            self.line(script::format_jump(target));
        }
        self
    }

    pub fn set_flags(&mut self, flags: &[FlagId]) -> &mut Self {
        for flag in flags {
            self.line(script::format_set(flag));
        }
        self
    }

    pub fn directive(&mut self, directive: &Directive) -> &mut Self {
        self.line(directive.to_line())
    }

    /// Player options: guarded choices are wrapped in their own
    /// `<<if>>`/`<<endif>>`, and each choice body holds its sets then its jump
    pub fn add_choices(&mut self, choices: &[Choice]) -> &mut Self {
        for choice in choices {
            let guarded = !choice.conditions.is_empty();
            if guarded {
                self.line(format!("<<if {}>>", format_conditions(&choice.conditions)));
                self.indent();
            }

            self.line(script::format_choice(&choice.text, &choice.id));
            self.indent();
            self.set_flags(&choice.set_flags);
            self.jump(choice.next_node_id.as_deref());
            self.dedent();

            if guarded {
                self.dedent();
                self.line("<<endif>>");
            }
        }
        self
    }

    pub fn end_node(self) -> String {
        let mut lines = Vec::with_capacity(self.headers.len() + self.body.len() + 3);
        lines.push(format!("title: {}", self.title));
        for (key, value) in self.headers {
            lines.push(format!("{}: {}", key, value));
        }
        lines.push(NODE_START.to_string());
        lines.extend(self.body);
        lines.push(NODE_END.to_string());
        lines.join("\n")
    }
}
