//! # Node-Specific Handlers
//!
//! One handler per node kind, each able to write its payload into a block and
//! read it back. Dispatch is an exhaustive match on the kind, so a new
//! [`NodeKind`] without a handler does not compile.

mod character;
mod conditional;
mod player;
mod storylet;

pub use character::CharacterHandler;
pub use conditional::ConditionalHandler;
pub use player::{ChoiceList, ChoiceState, PlayerEvent, PlayerHandler};
pub use storylet::{StoryletHandler, StoryletPoolHandler};

use super::BlockBuilder;
use crate::condition::{Condition, ConditionParser, FlagId};
use crate::error::{CompileError, NodeImportError};
use crate::graph::{DialogueNode, NodeData, NodeKind};
use crate::script::{self, parse_directive, ImportWarning, ScriptBlock, ScriptLine};

/// Serialization capabilities shared by all node kinds
pub trait NodeHandler {
    type Payload;

    const KIND: NodeKind;

    fn can_handle(kind: NodeKind) -> bool {
        kind == Self::KIND
    }

    /// Write the payload's body lines
    fn export_node(&self, payload: &Self::Payload, builder: &mut BlockBuilder)
        -> Result<(), CompileError>;

    /// Rebuild the payload from a block's body
    fn import_node(
        &self,
        block: &ScriptBlock,
        ctx: &mut ImportContext<'_>,
    ) -> Result<Self::Payload, NodeImportError>;
}

/// Per-block state handed to handlers during import
pub struct ImportContext<'a> {
    pub node_id: &'a str,
    conditions: ConditionParser,
    warnings: &'a mut Vec<ImportWarning>,
}

impl<'a> ImportContext<'a> {
    pub fn new(
        node_id: &'a str,
        conditions: ConditionParser,
        warnings: &'a mut Vec<ImportWarning>,
    ) -> Self {
        Self {
            node_id,
            conditions,
            warnings,
        }
    }

    pub fn error(&self, line: usize, reason: impl Into<String>) -> NodeImportError {
        NodeImportError::new(self.node_id, line, reason)
    }

    /// Parse an `<<if>>` condition; dropped clauses become warnings unless
    /// strict parsing is on
    pub fn parse_conditions(
        &mut self,
        text: &str,
        line: usize,
    ) -> Result<Vec<Condition>, NodeImportError> {
        let parsed = self
            .conditions
            .parse(text)
            .map_err(|e| self.error(line, format!("invalid condition: {}", e)))?;
        for clause in parsed.dropped {
            self.warnings.push(ImportWarning::DroppedCondition {
                node_id: self.node_id.to_string(),
                line,
                clause,
            });
        }
        Ok(parsed.conditions)
    }

    /// A `<<jump>>` target, checked for shape only
    fn jump_target(&self, target: &str, line: usize) -> Result<String, NodeImportError> {
        if script::is_node_id(target) {
            Ok(target.to_string())
        } else {
            Err(self.error(line, format!("malformed jump target '{}'", target)))
        }
    }

    /// A `<<set $flag = true>>` flag; other values cannot be expressed
    fn set_flag(&self, flag: &str, value: &str, line: usize) -> Result<FlagId, NodeImportError> {
        if value != "true" {
            return Err(self.error(
                line,
                format!("unsupported value '{}' for <<set ${}>>, only true is allowed", value, flag),
            ));
        }
        Ok(flag.to_string())
    }
}

/// Write a node's body through its kind's handler
pub fn export_node(node: &DialogueNode, builder: &mut BlockBuilder) -> Result<(), CompileError> {
    tracing::debug!("[DGSC] Exporting {} node '{}'", node.kind(), node.id);
    match &node.data {
        NodeData::Character(payload) => CharacterHandler.export_node(payload, builder),
        NodeData::Player(payload) => PlayerHandler.export_node(payload, builder),
        NodeData::Conditional(payload) => ConditionalHandler.export_node(payload, builder),
        NodeData::Storylet(payload) => StoryletHandler.export_node(payload, builder),
        NodeData::StoryletPool(payload) => StoryletPoolHandler.export_node(payload, builder),
    }
}

/// Read a block back through the handler for `kind`
pub fn import_node(
    kind: NodeKind,
    block: &ScriptBlock,
    ctx: &mut ImportContext<'_>,
) -> Result<NodeData, NodeImportError> {
    tracing::debug!("[DGSC] Importing {} node '{}'", kind, block.title);
    match kind {
        NodeKind::Character => CharacterHandler.import_node(block, ctx).map(NodeData::Character),
        NodeKind::Player => PlayerHandler.import_node(block, ctx).map(NodeData::Player),
        NodeKind::Conditional => ConditionalHandler
            .import_node(block, ctx)
            .map(NodeData::Conditional),
        NodeKind::Storylet => StoryletHandler.import_node(block, ctx).map(NodeData::Storylet),
        NodeKind::StoryletPool => StoryletPoolHandler
            .import_node(block, ctx)
            .map(NodeData::StoryletPool),
    }
}

/// Infer a block's node kind from the markers in its body
pub fn detect_kind(block: &ScriptBlock) -> Result<NodeKind, NodeImportError> {
    let mut first: Option<&ScriptLine> = None;

    for line in block.meaningful_lines() {
        if let Some(Ok(directive)) = parse_directive(&line.text) {
            match directive.name.as_str() {
                storylet::POOL_DIRECTIVE => return Ok(NodeKind::StoryletPool),
                storylet::STORYLET_DIRECTIVE => return Ok(NodeKind::Storylet),
                _ => continue,
            }
        }
        first.get_or_insert(line);
    }

    let Some(first) = first else {
        return Err(NodeImportError::new(
            &block.title,
            block.title_line,
            "node body is empty",
        ));
    };

    let kind = if block.body.iter().any(|line| line.text.starts_with("->")) {
        Some(NodeKind::Player)
    } else if first.text.starts_with("<<if") {
        Some(NodeKind::Conditional)
    } else if script::split_dialogue(&first.text).is_some() {
        Some(NodeKind::Character)
    } else {
        None
    };

    kind.ok_or_else(|| {
        NodeImportError::new(
            &block.title,
            first.number,
            format!("cannot infer node kind from '{}'", first.text),
        )
    })
}
