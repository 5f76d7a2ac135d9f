//! JSON document boundary shared with editors and persistence layers.
//!
//! The document nests nodes and edges under `flow` the way the visual editor
//! stores them; node payloads stay raw JSON until their `type` is checked so
//! an unknown kind surfaces as [`CompileError::UnknownNodeKind`].

use super::{DialogueGraph, DialogueNode, Edge, EdgeKind, EndNode, NodeData, NodeKind, Position};
use crate::error::CompileError;
use crate::validator::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Alias kept for the `endNodeIds` entries of the document
pub type EndNodeRef = EndNode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start_node_id: String,
    #[serde(default)]
    pub end_node_ids: Vec<EndNodeRef>,
    #[serde(default)]
    pub flow: FlowPayload,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowPayload {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    /// Editor node type; the dialogue kind lives in `data.type`
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CompileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl DialogueGraph {
    /// Build the value model from an editor document
    pub fn from_document(doc: &GraphDocument) -> Result<Self, CompileError> {
        let mut nodes = IndexMap::with_capacity(doc.flow.nodes.len());

        for flow_node in &doc.flow.nodes {
            let kind = flow_node
                .data
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if kind.parse::<NodeKind>().is_err() {
                return Err(CompileError::UnknownNodeKind {
                    node_id: flow_node.id.clone(),
                    kind: kind.to_string(),
                });
            }

            let data: NodeData = serde_json::from_value(flow_node.data.clone())?;
            let node = DialogueNode {
                id: flow_node.id.clone(),
                position: Some(flow_node.position),
                data,
            };
            if nodes.insert(flow_node.id.clone(), node).is_some() {
                return Err(CompileError::InvalidGraph {
                    errors: vec![ValidationError::DuplicateNode {
                        node_id: flow_node.id.clone(),
                    }],
                });
            }
        }

        let edges = doc
            .flow
            .edges
            .iter()
            .map(|e| Edge {
                id: e.id.clone(),
                source: e.source.clone(),
                target: e.target.clone(),
                kind: edge_kind(e.edge_type.as_deref()),
                label: e.label.clone(),
                data: e.data.clone(),
            })
            .collect();

        Ok(Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            start_node_id: doc.start_node_id.clone(),
            nodes,
            edges,
            end_nodes: doc.end_node_ids.clone(),
        })
    }

    /// Produce the editor document for this graph
    pub fn to_document(&self) -> Result<GraphDocument, CompileError> {
        let mut flow = FlowPayload::default();

        for node in self.nodes.values() {
            flow.nodes.push(FlowNode {
                id: node.id.clone(),
                node_type: node.kind().as_str().to_string(),
                position: node.position.unwrap_or_default(),
                data: serde_json::to_value(&node.data)?,
            });
        }

        for edge in &self.edges {
            let edge_type = serde_json::to_value(edge.kind)?
                .as_str()
                .map(str::to_string);
            flow.edges.push(FlowEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                edge_type,
                label: edge.label.clone(),
                data: edge.data.clone(),
            });
        }

        Ok(GraphDocument {
            id: self.id.clone(),
            title: self.title.clone(),
            start_node_id: self.start_node_id.clone(),
            end_node_ids: self.end_nodes.clone(),
            flow,
        })
    }
}

/// Editor edge types other than the dialogue ones render as plain `next` edges
fn edge_kind(edge_type: Option<&str>) -> EdgeKind {
    match edge_type {
        Some("choice") => EdgeKind::Choice,
        Some("branch") => EdgeKind::Branch,
        Some("return") => EdgeKind::Return,
        _ => EdgeKind::Next,
    }
}
