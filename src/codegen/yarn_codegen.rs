//! # Script Code Generator
//!
//! Writes a dialogue graph out as Yarn-style script text. Every node in the
//! arena gets a block, in insertion order, whether or not anything jumps to it.

use super::node_handlers;
use super::BlockBuilder;
use crate::error::CompileError;
use crate::graph::{DialogueGraph, DialogueNode};
use crate::options::CompilerOptions;
use crate::script::{Directive, END_DIRECTIVE, GRAPH_DIRECTIVE, POSITION_HEADER};
use crate::validator::{self, ValidationError};

pub const BANNER: &[&str] = &[
    "// Generated by DGSC (Dialogue Graph Script Compiler)",
    "// DO NOT EDIT - Changes will be overwritten on next export",
];

pub struct ScriptCodeGenerator<'a> {
    graph: &'a DialogueGraph,
    options: &'a CompilerOptions,
}

impl<'a> ScriptCodeGenerator<'a> {
    pub fn new(graph: &'a DialogueGraph, options: &'a CompilerOptions) -> Self {
        Self { graph, options }
    }

    /// Generate the complete script for the graph
    pub fn generate_script(&self) -> Result<String, CompileError> {
        self.check_graph()?;

        let mut code = String::new();
        if self.options.emit_banner {
            for line in BANNER {
                code.push_str(line);
                code.push('\n');
            }
        }

        for directive in self.preamble() {
            code.push_str(&directive.to_line());
            code.push('\n');
        }

        for node in self.graph.nodes.values() {
            code.push('\n');
            code.push_str(&self.generate_node(node)?);
            code.push('\n');
        }

        Ok(code)
    }

    /// Abort on errors that would make the script unreadable; tolerate the rest
    fn check_graph(&self) -> Result<(), CompileError> {
        let validation = validator::validate(self.graph, self.options.flag_schema.as_ref());

        let structural = validation.structural_errors();
        if !structural.is_empty() {
            tracing::error!(
                "[DGSC] Graph '{}' has {} structural errors",
                self.graph.id,
                structural.len()
            );
            return Err(CompileError::InvalidGraph { errors: structural });
        }

        for error in validation.errors.iter().filter(|e| !e.is_structural()) {
            match error {
                ValidationError::DanglingReference { from, to } => {
                    tracing::warn!("[DGSC] Node '{}' jumps to missing node '{}'", from, to);
                }
                other => tracing::warn!("[DGSC] {}", other),
            }
        }
        for warning in &validation.warnings {
            tracing::debug!("[DGSC] {}", warning);
        }
        Ok(())
    }

    fn preamble(&self) -> Vec<Directive> {
        let mut directives = vec![Directive::new(GRAPH_DIRECTIVE)
            .attr("id", &self.graph.id)
            .attr("title", &self.graph.title)
            .attr("start", &self.graph.start_node_id)];
        for end in &self.graph.end_nodes {
            directives.push(
                Directive::new(END_DIRECTIVE)
                    .attr("node", &end.node_id)
                    .attr_opt("exit", end.exit_key.as_deref()),
            );
        }
        directives
    }

    fn generate_node(&self, node: &DialogueNode) -> Result<String, CompileError> {
        let mut builder = BlockBuilder::start_node(&node.id);
        if self.options.emit_positions {
            if let Some(position) = node.position {
                builder.header(POSITION_HEADER, format!("{},{}", position.x, position.y));
            }
        }
        node_handlers::export_node(node, &mut builder)?;
        Ok(builder.end_node())
    }
}
