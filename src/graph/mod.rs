//! # Dialogue Graph Model
//!
//! Immutable value types for a branching dialogue: an insertion-ordered arena
//! of nodes keyed by id, plus edges and start/end markers. Nodes never point
//! at each other directly; every relationship is an id resolved on demand.

mod document;

pub use document::{EndNodeRef, FlowEdge, FlowNode, FlowPayload, GraphDocument};

use crate::condition::{Condition, FlagId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub type NodeId = String;

/// Editor canvas position, preserved through the script as a node header
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Discriminant of [`NodeData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "npc", alias = "character")]
    Character,
    #[serde(rename = "player")]
    Player,
    #[serde(rename = "conditional")]
    Conditional,
    #[serde(rename = "storylet")]
    Storylet,
    #[serde(rename = "storyletPool")]
    StoryletPool,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Character => "npc",
            NodeKind::Player => "player",
            NodeKind::Conditional => "conditional",
            NodeKind::Storylet => "storylet",
            NodeKind::StoryletPool => "storyletPool",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npc" | "character" => Ok(NodeKind::Character),
            "player" => Ok(NodeKind::Player),
            "conditional" => Ok(NodeKind::Conditional),
            "storylet" => Ok(NodeKind::Storylet),
            "storyletPool" => Ok(NodeKind::StoryletPool),
            other => Err(other.to_string()),
        }
    }
}

/// A line spoken by a character, optionally continuing to another node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterNode {
    pub speaker: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_flags: Vec<FlagId>,
}

/// One player option. No `next_node_id` ends the branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_flags: Vec<FlagId>,
}

impl Choice {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            next_node_id: None,
            conditions: Vec::new(),
            set_flags: Vec::new(),
        }
    }

    pub fn with_next(mut self, next: impl Into<NodeId>) -> Self {
        self.next_node_id = Some(next.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_set_flag(mut self, flag: impl Into<FlagId>) -> Self {
        self.set_flags.push(flag.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerNode {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    If,
    ElseIf,
    Else,
}

impl BlockKind {
    /// Dialect keyword opening a branch of this kind
    pub fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::ElseIf => "elseif",
            BlockKind::Else => "else",
        }
    }
}

/// One branch of a conditional node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<NodeId>,
}

impl ConditionalBlock {
    /// `If`/`ElseIf` branches need a non-empty condition; `Else` never has one
    pub fn new(
        id: impl Into<String>,
        kind: BlockKind,
        condition: Option<Vec<Condition>>,
        content: impl Into<String>,
    ) -> Result<Self, String> {
        let id = id.into();
        let condition = match (kind, condition) {
            (BlockKind::Else, Some(_)) => {
                return Err(format!("else block '{}' cannot carry a condition", id));
            }
            (BlockKind::Else, None) => None,
            (_, Some(c)) if !c.is_empty() => Some(c),
            (_, _) => {
                return Err(format!("{} block '{}' needs a condition", kind.keyword(), id));
            }
        };
        Ok(Self {
            id,
            kind,
            condition,
            content: content.into(),
            speaker: None,
            next_node_id: None,
        })
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_next(mut self, next: impl Into<NodeId>) -> Self {
        self.next_node_id = Some(next.into());
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        self.condition.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalNode {
    pub blocks: Vec<ConditionalBlock>,
}

/// Where a called storylet starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicy {
    /// The template's own start node
    #[default]
    Start,
    /// An explicit `entry_node_id` inside the template
    Node,
}

/// What happens once a called storylet finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    /// Continue at `return_node_id` in the calling graph
    #[default]
    Node,
    /// The dialogue ends with the storylet
    End,
}

macro_rules! policy_text {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

policy_text!(EntryPolicy { Start => "start", Node => "node" });
policy_text!(ReturnPolicy { Node => "node", End => "end" });
policy_text!(SelectionMode {
    Random => "random",
    Weighted => "weighted",
    Sequential => "sequential",
    FirstAvailable => "first_available",
});

/// Call into a reusable storylet template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryletNode {
    pub template_id: String,
    #[serde(default)]
    pub entry_policy: EntryPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_node_id: Option<NodeId>,
    #[serde(default)]
    pub return_policy: ReturnPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_node_id: Option<NodeId>,
    /// Opaque directive keys carried through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Random,
    Weighted,
    Sequential,
    FirstAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMember {
    pub template_id: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Picks one storylet out of a weighted member list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryletPoolNode {
    pub pool_id: String,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub members: Vec<PoolMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Node payload, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeData {
    #[serde(rename = "npc", alias = "character")]
    Character(CharacterNode),
    #[serde(rename = "player")]
    Player(PlayerNode),
    #[serde(rename = "conditional")]
    Conditional(ConditionalNode),
    #[serde(rename = "storylet")]
    Storylet(StoryletNode),
    #[serde(rename = "storyletPool")]
    StoryletPool(StoryletPoolNode),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Character(_) => NodeKind::Character,
            NodeData::Player(_) => NodeKind::Player,
            NodeData::Conditional(_) => NodeKind::Conditional,
            NodeData::Storylet(_) => NodeKind::Storylet,
            NodeData::StoryletPool(_) => NodeKind::StoryletPool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub data: NodeData,
}

impl DialogueNode {
    pub fn new(id: impl Into<NodeId>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            position: None,
            data,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Every outgoing id reference of this node, in script order
    pub fn references(&self) -> Vec<NodeReference<'_>> {
        let mut refs = Vec::new();
        match &self.data {
            NodeData::Character(c) => {
                if let Some(next) = &c.next_node_id {
                    refs.push(NodeReference::new(EdgeKind::Next, "next", next, None));
                }
            }
            NodeData::Player(p) => {
                for choice in &p.choices {
                    if let Some(next) = &choice.next_node_id {
                        refs.push(NodeReference::new(
                            EdgeKind::Choice,
                            &choice.id,
                            next,
                            Some(&choice.text),
                        ));
                    }
                }
            }
            NodeData::Conditional(c) => {
                for block in &c.blocks {
                    if let Some(next) = &block.next_node_id {
                        refs.push(NodeReference::new(
                            EdgeKind::Branch,
                            &block.id,
                            next,
                            Some(block.kind.keyword()),
                        ));
                    }
                }
            }
            NodeData::Storylet(s) => {
                if s.return_policy == ReturnPolicy::Node {
                    if let Some(next) = &s.return_node_id {
                        refs.push(NodeReference::new(EdgeKind::Return, "return", next, None));
                    }
                }
            }
            NodeData::StoryletPool(p) => {
                if let Some(next) = &p.next_node_id {
                    refs.push(NodeReference::new(EdgeKind::Next, "next", next, None));
                }
            }
        }
        refs
    }
}

/// An outgoing reference discovered in a node payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReference<'a> {
    pub kind: EdgeKind,
    /// `next`, `return`, or the choice/block id the reference hangs off
    pub handle: &'a str,
    pub target: &'a str,
    pub label: Option<&'a str>,
}

impl<'a> NodeReference<'a> {
    fn new(kind: EdgeKind, handle: &'a str, target: &'a str, label: Option<&'a str>) -> Self {
        Self {
            kind,
            handle,
            target,
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    Next,
    Choice,
    Branch,
    Return,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Next,
            label: None,
            data: None,
        }
    }
}

/// A node the dialogue may finish on, with an optional exit key for the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndNode {
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_key: Option<String>,
}

impl EndNode {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            exit_key: None,
        }
    }

    pub fn with_exit(mut self, exit_key: impl Into<String>) -> Self {
        self.exit_key = Some(exit_key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueGraph {
    pub id: String,
    pub title: String,
    pub start_node_id: NodeId,
    pub nodes: IndexMap<NodeId, DialogueNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub end_nodes: Vec<EndNode>,
}

impl DialogueGraph {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Insert a node; the first inserted node becomes the start node unless
    /// one was already set
    pub fn add_node(&mut self, node: DialogueNode) {
        if self.start_node_id.is_empty() {
            self.start_node_id = node.id.clone();
        }
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn with_node(mut self, node: DialogueNode) -> Self {
        self.add_node(node);
        self
    }

    pub fn with_start(mut self, start: impl Into<NodeId>) -> Self {
        self.start_node_id = start.into();
        self
    }

    pub fn with_end(mut self, end: EndNode) -> Self {
        self.end_nodes.push(end);
        self
    }

    /// Replace `edges` with one edge per payload reference
    pub fn with_derived_edges(mut self) -> Self {
        self.edges = self.derive_edges();
        self
    }

    pub fn node(&self, id: &str) -> Option<&DialogueNode> {
        self.nodes.get(id)
    }

    pub fn end_node_ids(&self) -> impl Iterator<Item = &str> {
        self.end_nodes.iter().map(|e| e.node_id.as_str())
    }

    /// Synthesize one edge per jump/choice/branch/return reference
    pub fn derive_edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for node in self.nodes.values() {
            for reference in node.references() {
                let data = match reference.kind {
                    EdgeKind::Choice => Some(serde_json::json!({ "choiceId": reference.handle })),
                    EdgeKind::Branch => Some(serde_json::json!({ "blockId": reference.handle })),
                    EdgeKind::Next | EdgeKind::Return => None,
                };
                edges.push(Edge {
                    id: format!("e-{}-{}-{}", node.id, reference.handle, reference.target),
                    source: node.id.clone(),
                    target: reference.target.to_string(),
                    kind: reference.kind,
                    label: reference.label.map(str::to_string),
                    data,
                });
            }
        }
        edges
    }

    /// Nodes without any outgoing reference, in node order
    pub fn terminal_node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.references().is_empty())
            .map(|node| node.id.clone())
            .collect()
    }

    /// Ids reachable from the start node by following references
    pub fn reachable_from_start(&self) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.start_node_id.as_str()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !seen.insert(node.id.as_str()) {
                continue;
            }
            for reference in node.references() {
                stack.push(reference.target);
            }
        }
        seen
    }
}
