//! Script → graph.
//!
//! Splits the text into blocks, infers each block's node kind, reads the
//! payload through its handler, then rebuilds edges and start/end markers and
//! validates the result.

use super::{split_script, Directive, ScriptBlock};
use crate::codegen::node_handlers::{self, ImportContext};
use crate::condition::ConditionParser;
use crate::error::{CompileError, NodeImportError, ScriptParseError};
use crate::graph::{DialogueGraph, DialogueNode, EndNode, Position};
use crate::options::CompilerOptions;
use crate::validator::{self, ValidationResult};
use std::collections::HashMap;
use thiserror::Error;

pub const GRAPH_DIRECTIVE: &str = "graph";
pub const END_DIRECTIVE: &str = "end";
pub const POSITION_HEADER: &str = "position";

/// Graph id used when the script carries no `@graph` directive
pub const DEFAULT_GRAPH_ID: &str = "dialogue";

/// Something the importer skipped or simplified without failing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportWarning {
    #[error("node '{node_id}' line {line}: dropped unreadable condition '{clause}'")]
    DroppedCondition {
        node_id: String,
        line: usize,
        clause: String,
    },

    #[error("node '{node_id}': ignored header '{key}'")]
    IgnoredHeader { node_id: String, key: String },

    #[error("line {line}: ignored @{name} directive")]
    IgnoredDirective { line: usize, name: String },
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub graph: DialogueGraph,
    pub warnings: Vec<ImportWarning>,
    pub validation: ValidationResult,
}

#[derive(Default)]
struct Preamble {
    graph: Option<Directive>,
    ends: Vec<EndNode>,
}

pub struct ScriptImporter<'a> {
    options: &'a CompilerOptions,
}

impl<'a> ScriptImporter<'a> {
    pub fn new(options: &'a CompilerOptions) -> Self {
        Self { options }
    }

    pub fn import(&self, text: &str) -> Result<ImportOutcome, CompileError> {
        let mut warnings = Vec::new();

        tracing::info!("[DGSC] Phase 1: Splitting script into node blocks...");
        let script = split_script(text)?;
        tracing::info!(
            "[DGSC] Found {} node blocks, {} preamble directives",
            script.blocks.len(),
            script.preamble.len()
        );
        let preamble = read_preamble(script.preamble, &mut warnings)?;

        tracing::info!("[DGSC] Phase 2: Importing nodes...");
        let mut graph = DialogueGraph::default();
        let mut title_lines = HashMap::new();
        for block in &script.blocks {
            let node = self.import_block(block, &mut warnings)?;
            title_lines.insert(block.title.clone(), block.title_line);
            graph.nodes.insert(node.id.clone(), node);
        }

        tracing::info!("[DGSC] Phase 3: Rebuilding edges and start/end nodes...");
        let first_block = script.blocks.first().map(|block| block.title.clone());
        match &preamble.graph {
            Some(directive) => {
                graph.id = directive.get("id").unwrap_or(DEFAULT_GRAPH_ID).to_string();
                graph.title = directive.get("title").unwrap_or_default().to_string();
                graph.start_node_id = directive
                    .get("start")
                    .map(str::to_string)
                    .or(first_block)
                    .unwrap_or_default();
                graph.end_nodes = preamble.ends;
            }
            None => {
                graph.id = DEFAULT_GRAPH_ID.to_string();
                graph.start_node_id = first_block.unwrap_or_default();
                graph.end_nodes = graph
                    .terminal_node_ids()
                    .into_iter()
                    .map(EndNode::new)
                    .chain(preamble.ends)
                    .collect();
            }
        }
        graph.edges = graph.derive_edges();
        tracing::info!("[DGSC]   - {} edges derived", graph.edges.len());

        tracing::info!("[DGSC] Phase 4: Validating imported graph...");
        let validation = validator::validate(&graph, self.options.flag_schema.as_ref());

        if self.options.strict_references {
            if let Some((from, to)) = validation.dangling_references().next() {
                let line = title_lines.get(from).copied().unwrap_or_default();
                return Err(NodeImportError::new(
                    from,
                    line,
                    format!("jump target '{}' is not a node in this script", to),
                )
                .into());
            }
        }

        Ok(ImportOutcome {
            graph,
            warnings,
            validation,
        })
    }

    fn import_block(
        &self,
        block: &ScriptBlock,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<DialogueNode, CompileError> {
        let kind = node_handlers::detect_kind(block)?;

        let mut position = None;
        for (key, value) in &block.headers {
            if key == POSITION_HEADER {
                position = Some(parse_position(value).ok_or_else(|| {
                    NodeImportError::new(
                        &block.title,
                        block.title_line,
                        format!("malformed position header '{}'", value),
                    )
                })?);
            } else {
                tracing::warn!("[DGSC] Ignoring header '{}' on node '{}'", key, block.title);
                warnings.push(ImportWarning::IgnoredHeader {
                    node_id: block.title.clone(),
                    key: key.clone(),
                });
            }
        }

        let parser = ConditionParser::new(self.options.strict_conditions);
        let mut ctx = ImportContext::new(&block.title, parser, warnings);
        let data = node_handlers::import_node(kind, block, &mut ctx)?;

        Ok(DialogueNode {
            id: block.title.clone(),
            position,
            data,
        })
    }
}

fn read_preamble(
    directives: Vec<(usize, Directive)>,
    warnings: &mut Vec<ImportWarning>,
) -> Result<Preamble, ScriptParseError> {
    let mut preamble = Preamble::default();

    for (line, directive) in directives {
        match directive.name.as_str() {
            GRAPH_DIRECTIVE if preamble.graph.is_some() => {
                return Err(ScriptParseError::new(line, "script declares @graph twice"));
            }
            GRAPH_DIRECTIVE => preamble.graph = Some(directive),
            END_DIRECTIVE => {
                let node = directive
                    .get("node")
                    .filter(|node| super::is_node_id(node))
                    .ok_or_else(|| ScriptParseError::new(line, "@end directive needs a valid node id"))?;
                let mut end = EndNode::new(node);
                end.exit_key = directive.get("exit").map(str::to_string);
                preamble.ends.push(end);
            }
            other => {
                tracing::warn!("[DGSC] Ignoring @{} directive on line {}", other, line);
                warnings.push(ImportWarning::IgnoredDirective {
                    line,
                    name: other.to_string(),
                });
            }
        }
    }
    Ok(preamble)
}

fn parse_position(value: &str) -> Option<Position> {
    let (x, y) = value.split_once(',')?;
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    (x.is_finite() && y.is_finite()).then_some(Position::new(x, y))
}
