//! # Graph Validator
//!
//! Checks a dialogue graph before export and after import. Errors describe
//! graphs that are broken (missing nodes, dangling ids, payloads the dialect
//! cannot express); warnings describe graphs that are merely suspicious
//! (flags missing from a partial schema, unreachable nodes).

use crate::condition::{Condition, ConditionValue, FlagId};
use crate::graph::{
    BlockKind, DialogueGraph, DialogueNode, EntryPolicy, NodeData, ReturnPolicy, SelectionMode,
};
use crate::script;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Value type of a game-state flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Boolean,
    Number,
    String,
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagType::Boolean => f.write_str("boolean"),
            FlagType::Number => f.write_str("number"),
            FlagType::String => f.write_str("string"),
        }
    }
}

/// Known flags and their types. May be partial while authoring.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSchema {
    flags: BTreeMap<FlagId, FlagType>,
}

impl FlagSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, flag: impl Into<FlagId>, flag_type: FlagType) -> Self {
        self.flags.insert(flag.into(), flag_type);
        self
    }

    pub fn get(&self, flag: &str) -> Option<FlagType> {
        self.flags.get(flag).copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("start node '{node_id}' does not exist")]
    MissingStartNode { node_id: String },

    #[error("end node '{node_id}' does not exist")]
    MissingEndNode { node_id: String },

    #[error("edge '{edge_id}' references missing node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("node '{from}' references missing node '{to}'")]
    DanglingReference { from: String, to: String },

    #[error("duplicate node id '{node_id}'")]
    DuplicateNode { node_id: String },

    #[error("node '{node_id}' has invalid {what} '{value}'")]
    InvalidIdentifier {
        node_id: String,
        what: &'static str,
        value: String,
    },

    #[error("node '{node_id}': {reason}")]
    Structural { node_id: String, reason: String },
}

impl ValidationError {
    /// Errors that make a graph impossible to write as a parseable script
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ValidationError::DuplicateNode { .. }
                | ValidationError::InvalidIdentifier { .. }
                | ValidationError::Structural { .. }
        )
    }

    fn structural(node_id: &str, reason: impl Into<String>) -> Self {
        ValidationError::Structural {
            node_id: node_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("node '{node_id}' uses flag '${flag}' which is not in the flag schema")]
    UnknownFlag { node_id: String, flag: String },

    #[error("node '{node_id}' uses flag '${flag}' as {found}, but the schema declares {expected}")]
    FlagTypeMismatch {
        node_id: String,
        flag: String,
        expected: FlagType,
        found: &'static str,
    },

    #[error("node '{node_id}' is not reachable from the start node")]
    UnreachableNode { node_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn structural_errors(&self) -> Vec<ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.is_structural())
            .cloned()
            .collect()
    }

    pub fn dangling_references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().filter_map(|e| match e {
            ValidationError::DanglingReference { from, to } => Some((from.as_str(), to.as_str())),
            _ => None,
        })
    }
}

/// Validate a graph, optionally checking condition flags against a schema
pub fn validate(graph: &DialogueGraph, schema: Option<&FlagSchema>) -> ValidationResult {
    let mut validator = GraphValidator {
        graph,
        schema,
        result: ValidationResult::default(),
    };
    validator.run();

    tracing::debug!(
        "[DGSC] Validated graph '{}': {} errors, {} warnings",
        graph.id,
        validator.result.errors.len(),
        validator.result.warnings.len()
    );
    validator.result
}

struct GraphValidator<'a> {
    graph: &'a DialogueGraph,
    schema: Option<&'a FlagSchema>,
    result: ValidationResult,
}

impl<'a> GraphValidator<'a> {
    fn run(&mut self) {
        let graph = self.graph;
        let start_exists = graph.nodes.contains_key(&graph.start_node_id);
        if !graph.start_node_id.is_empty() && !script::is_node_id(&graph.start_node_id) {
            self.invalid(&graph.start_node_id, "start node id", &graph.start_node_id);
        } else if !start_exists {
            self.error(ValidationError::MissingStartNode {
                node_id: graph.start_node_id.clone(),
            });
        }

        for end in &graph.end_nodes {
            if !script::is_node_id(&end.node_id) {
                self.invalid(&end.node_id, "end node id", &end.node_id);
            } else if !graph.nodes.contains_key(&end.node_id) {
                self.error(ValidationError::MissingEndNode {
                    node_id: end.node_id.clone(),
                });
            }
        }

        for edge in &graph.edges {
            // an edge mirroring a payload jump is reported once, as a DanglingReference
            let mirrored = graph.nodes.get(&edge.source).is_some_and(|source| {
                source
                    .references()
                    .iter()
                    .any(|r| r.target == edge.target.as_str())
            });
            for endpoint in [&edge.source, &edge.target] {
                if endpoint == &edge.target && mirrored {
                    continue;
                }
                if !graph.nodes.contains_key(endpoint) {
                    self.error(ValidationError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
        }

        for (key, node) in &graph.nodes {
            if key != &node.id {
                self.error(ValidationError::structural(
                    key,
                    format!("stored under key '{}' but has id '{}'", key, node.id),
                ));
            }
            if !script::is_node_id(&node.id) {
                self.invalid(&node.id, "node id", &node.id);
            }

            for reference in node.references() {
                if !script::is_node_id(reference.target) {
                    self.invalid(&node.id, "jump target", reference.target);
                } else if !graph.nodes.contains_key(reference.target) {
                    self.error(ValidationError::DanglingReference {
                        from: node.id.clone(),
                        to: reference.target.to_string(),
                    });
                }
            }

            self.check_payload(node);
        }

        if start_exists {
            let reachable = graph.reachable_from_start();
            for id in graph.nodes.keys() {
                if !reachable.contains(id.as_str()) {
                    self.result.warnings.push(ValidationWarning::UnreachableNode {
                        node_id: id.clone(),
                    });
                }
            }
        }
    }

    fn check_payload(&mut self, node: &DialogueNode) {
        let id = node.id.as_str();
        match &node.data {
            NodeData::Character(c) => {
                if !script::is_speaker(&c.speaker) {
                    self.invalid(id, "speaker", &c.speaker);
                }
                self.check_set_flags(id, &c.set_flags);
            }
            NodeData::Player(p) => {
                if p.choices.is_empty() {
                    self.error(ValidationError::structural(id, "player node has no choices"));
                }
                let mut seen = HashSet::new();
                for choice in &p.choices {
                    if !script::is_node_id(&choice.id) {
                        self.invalid(id, "choice id", &choice.id);
                    } else if !seen.insert(choice.id.as_str()) {
                        self.error(ValidationError::structural(
                            id,
                            format!("duplicate choice id '{}'", choice.id),
                        ));
                    }
                    if choice.text.trim().is_empty() {
                        self.error(ValidationError::structural(
                            id,
                            format!("choice '{}' has no text", choice.id),
                        ));
                    } else if choice.text.contains('\n') {
                        self.error(ValidationError::structural(
                            id,
                            format!("choice '{}' text spans several lines", choice.id),
                        ));
                    }
                    self.check_conditions(id, &choice.conditions);
                    self.check_set_flags(id, &choice.set_flags);
                }
            }
            NodeData::Conditional(c) => {
                if c.blocks.is_empty() {
                    self.error(ValidationError::structural(id, "conditional node has no blocks"));
                }
                let mut seen = HashSet::new();
                let last = c.blocks.len().saturating_sub(1);
                for (index, block) in c.blocks.iter().enumerate() {
                    if !script::is_node_id(&block.id) {
                        self.invalid(id, "block id", &block.id);
                    } else if !seen.insert(block.id.as_str()) {
                        self.error(ValidationError::structural(
                            id,
                            format!("duplicate block id '{}'", block.id),
                        ));
                    }
                    match (index, block.kind) {
                        (0, BlockKind::If) => {}
                        (0, kind) => self.error(ValidationError::structural(
                            id,
                            format!("first block must be 'if', found '{}'", kind.keyword()),
                        )),
                        (_, BlockKind::If) => self.error(ValidationError::structural(
                            id,
                            format!("block '{}' opens a second 'if'", block.id),
                        )),
                        (i, BlockKind::Else) if i != last => {
                            self.error(ValidationError::structural(
                                id,
                                format!("else block '{}' must be last", block.id),
                            ))
                        }
                        _ => {}
                    }
                    match (block.kind, &block.condition) {
                        (BlockKind::Else, Some(_)) => self.error(ValidationError::structural(
                            id,
                            format!("else block '{}' carries a condition", block.id),
                        )),
                        (BlockKind::If | BlockKind::ElseIf, None) => {
                            self.error(ValidationError::structural(
                                id,
                                format!("block '{}' has no condition", block.id),
                            ))
                        }
                        (BlockKind::If | BlockKind::ElseIf, Some(c)) if c.is_empty() => {
                            self.error(ValidationError::structural(
                                id,
                                format!("block '{}' has an empty condition", block.id),
                            ))
                        }
                        _ => {}
                    }
                    if let Some(speaker) = &block.speaker {
                        if !script::is_speaker(speaker) {
                            self.invalid(id, "speaker", speaker);
                        }
                    }
                    self.check_conditions(id, block.conditions());
                }
            }
            NodeData::Storylet(s) => {
                if s.template_id.trim().is_empty() {
                    self.error(ValidationError::structural(id, "storylet has no template id"));
                }
                if s.entry_policy == EntryPolicy::Node && s.entry_node_id.is_none() {
                    self.error(ValidationError::structural(
                        id,
                        "entry policy 'node' needs an entry node id",
                    ));
                }
                if let Some(entry) = &s.entry_node_id {
                    if !script::is_node_id(entry) {
                        self.invalid(id, "entry node id", entry);
                    }
                }
                if s.return_policy == ReturnPolicy::Node && s.return_node_id.is_none() {
                    self.error(ValidationError::structural(
                        id,
                        "return policy 'node' needs a return node id",
                    ));
                }
                self.check_attributes(id, &s.attributes, script::STORYLET_KEYS);
            }
            NodeData::StoryletPool(p) => {
                if p.pool_id.trim().is_empty() {
                    self.error(ValidationError::structural(id, "storylet pool has no pool id"));
                }
                if p.members.is_empty() {
                    self.error(ValidationError::structural(id, "storylet pool has no members"));
                }
                for member in &p.members {
                    if member.template_id.trim().is_empty() {
                        self.error(ValidationError::structural(id, "pool member has no template id"));
                    }
                    if p.selection_mode == SelectionMode::Weighted && member.weight == 0 {
                        self.error(ValidationError::structural(
                            id,
                            format!("pool member '{}' has zero weight", member.template_id),
                        ));
                    }
                }
                self.check_attributes(id, &p.attributes, script::POOL_KEYS);
            }
        }
    }

    fn check_attributes(&mut self, id: &str, attributes: &BTreeMap<String, String>, reserved: &[&str]) {
        for key in attributes.keys() {
            if !script::is_directive_key(key) || reserved.contains(&key.as_str()) {
                self.invalid(id, "directive attribute", key);
            }
        }
    }

    fn check_conditions(&mut self, id: &str, conditions: &[Condition]) {
        for condition in conditions {
            if !script::is_flag(&condition.flag) {
                self.invalid(id, "flag", &condition.flag);
                continue;
            }
            if !condition.is_well_formed() {
                self.error(ValidationError::structural(
                    id,
                    format!("condition on '${}' does not match its operator", condition.flag),
                ));
            }
            self.check_flag_type(id, condition);
        }
    }

    fn check_set_flags(&mut self, id: &str, flags: &[FlagId]) {
        for flag in flags {
            if !script::is_flag(flag) {
                self.invalid(id, "flag", flag);
                continue;
            }
            match self.schema.map(|s| s.get(flag)) {
                Some(None) => self.unknown_flag(id, flag),
                Some(Some(FlagType::Boolean)) | None => {}
                Some(Some(expected)) => self.result.warnings.push(ValidationWarning::FlagTypeMismatch {
                    node_id: id.to_string(),
                    flag: flag.clone(),
                    expected,
                    found: "boolean",
                }),
            }
        }
    }

    fn check_flag_type(&mut self, id: &str, condition: &Condition) {
        let Some(schema) = self.schema else {
            return;
        };
        let Some(expected) = schema.get(&condition.flag) else {
            self.unknown_flag(id, &condition.flag);
            return;
        };

        let found = match (&condition.value, condition.operator) {
            (_, op) if op.is_ordering() => "number",
            (Some(ConditionValue::Number(_)), _) => "number",
            (Some(ConditionValue::String(_)), _) => "string",
            (Some(ConditionValue::Bool(_)), _) => "boolean",
            // set / not set applies to any flag type
            (None, _) => return,
        };
        if found != expected.to_string() {
            self.result.warnings.push(ValidationWarning::FlagTypeMismatch {
                node_id: id.to_string(),
                flag: condition.flag.clone(),
                expected,
                found,
            });
        }
    }

    fn unknown_flag(&mut self, id: &str, flag: &str) {
        self.result.warnings.push(ValidationWarning::UnknownFlag {
            node_id: id.to_string(),
            flag: flag.to_string(),
        });
    }

    fn invalid(&mut self, id: &str, what: &'static str, value: &str) {
        self.error(ValidationError::InvalidIdentifier {
            node_id: id.to_string(),
            what,
            value: value.to_string(),
        });
    }

    fn error(&mut self, error: ValidationError) {
        self.result.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use crate::graph::{
        CharacterNode, Choice, ConditionalBlock, ConditionalNode, Edge, EndNode, PlayerNode,
    };
    use pretty_assertions::assert_eq;

    fn npc(id: &str, next: Option<&str>) -> DialogueNode {
        DialogueNode::new(
            id,
            NodeData::Character(CharacterNode {
                speaker: "alice".to_string(),
                content: "Hello".to_string(),
                next_node_id: next.map(str::to_string),
                set_flags: vec!["greeted".to_string()],
            }),
        )
    }

    fn menu(choices: Vec<Choice>) -> DialogueNode {
        DialogueNode::new("menu", NodeData::Player(PlayerNode { choices }))
    }

    #[test]
    fn valid_graph_has_no_errors() {
        let graph = DialogueGraph::new("g", "G")
            .with_node(npc("a", Some("b")))
            .with_node(npc("b", None))
            .with_end(EndNode::new("b"))
            .with_derived_edges();
        let result = validate(&graph, None);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn dangling_choice_target_is_an_error() {
        let graph = DialogueGraph::new("g", "G")
            .with_node(menu(vec![Choice::new("c1", "Go").with_next("nowhere")]))
            .with_derived_edges();
        let result = validate(&graph, None);
        assert_eq!(
            result.errors,
            vec![ValidationError::DanglingReference {
                from: "menu".to_string(),
                to: "nowhere".to_string(),
            }]
        );
        assert!(!result.errors[0].is_structural());
    }

    #[test]
    fn missing_start_end_and_edge_endpoints() {
        let mut graph = DialogueGraph::new("g", "G")
            .with_node(npc("a", None))
            .with_start("ghost")
            .with_end(EndNode::new("gone"));
        graph.edges.push(Edge::new("e1", "a", "void"));
        let result = validate(&graph, None);
        assert_eq!(
            result.errors,
            vec![
                ValidationError::MissingStartNode { node_id: "ghost".into() },
                ValidationError::MissingEndNode { node_id: "gone".into() },
                ValidationError::DanglingEdge { edge_id: "e1".into(), node_id: "void".into() },
            ]
        );
    }

    #[test]
    fn malformed_start_and_end_ids_are_structural() {
        let graph = DialogueGraph::new("g", "G")
            .with_node(npc("a", None))
            .with_start("the start")
            .with_end(EndNode::new("bad id"));
        let result = validate(&graph, None);
        assert_eq!(
            result.errors,
            vec![
                ValidationError::InvalidIdentifier {
                    node_id: "the start".into(),
                    what: "start node id",
                    value: "the start".into(),
                },
                ValidationError::InvalidIdentifier {
                    node_id: "bad id".into(),
                    what: "end node id",
                    value: "bad id".into(),
                },
            ]
        );
        assert!(result.errors.iter().all(ValidationError::is_structural));
    }

    #[test]
    fn structural_player_errors() {
        let graph = DialogueGraph::new("g", "G").with_node(menu(vec![
            Choice::new("c1", "  "),
            Choice::new("c1", "Again"),
        ]));
        let result = validate(&graph, None);
        let reasons: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            reasons,
            vec![
                "node 'menu': choice 'c1' has no text".to_string(),
                "node 'menu': duplicate choice id 'c1'".to_string(),
            ]
        );
        assert!(result.errors.iter().all(ValidationError::is_structural));
    }

    #[test]
    fn conditional_ordering_is_checked() {
        let else_block = ConditionalBlock::new("b1", BlockKind::Else, None, "Meh").unwrap();
        let if_block =
            ConditionalBlock::new("b2", BlockKind::If, Some(vec![Condition::is_set("x")]), "Yes")
                .unwrap();
        let graph = DialogueGraph::new("g", "G").with_node(DialogueNode::new(
            "branch",
            NodeData::Conditional(ConditionalNode {
                blocks: vec![else_block, if_block],
            }),
        ));
        let result = validate(&graph, None);
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
        assert!(result.errors[0].to_string().contains("first block must be 'if'"));
    }

    #[test]
    fn schema_produces_warnings_not_errors() {
        let schema = FlagSchema::new()
            .with_flag("reputation", FlagType::Number)
            .with_flag("greeted", FlagType::Boolean);
        let graph = DialogueGraph::new("g", "G").with_node(menu(vec![
            Choice::new("c1", "Bribe")
                .with_condition(Condition::compare(
                    "reputation",
                    ConditionOperator::Equals,
                    "high",
                ))
                .with_condition(Condition::is_set("mystery"))
                .with_set_flag("greeted"),
        ]));
        let result = validate(&graph, Some(&schema));
        assert!(result.is_valid());
        assert_eq!(
            result.warnings,
            vec![
                ValidationWarning::FlagTypeMismatch {
                    node_id: "menu".into(),
                    flag: "reputation".into(),
                    expected: FlagType::Number,
                    found: "string",
                },
                ValidationWarning::UnknownFlag {
                    node_id: "menu".into(),
                    flag: "mystery".into(),
                },
            ]
        );
    }

    #[test]
    fn unreferenced_nodes_warn_as_unreachable() {
        let graph = DialogueGraph::new("g", "G")
            .with_node(npc("a", None))
            .with_node(npc("island", None));
        let result = validate(&graph, None);
        assert_eq!(
            result.warnings,
            vec![ValidationWarning::UnreachableNode { node_id: "island".into() }]
        );
    }

    #[test]
    fn schema_deserializes_from_a_flat_map() {
        let schema: FlagSchema =
            serde_json::from_str(r#"{"gold": "number", "met": "boolean"}"#).unwrap();
        assert_eq!(schema.get("gold"), Some(FlagType::Number));
        assert_eq!(schema.len(), 2);
    }
}
