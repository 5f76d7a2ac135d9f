//! # Dialogue Graph Script Compiler
//!
//! Main entry points for exporting dialogue graphs to script text and
//! importing script text back into graphs.

use crate::codegen::ScriptCodeGenerator;
use crate::error::CompileError;
use crate::graph::{DialogueGraph, GraphDocument};
use crate::options::CompilerOptions;
use crate::script::{ImportOutcome, ScriptImporter};
use crate::validator::{self, FlagSchema, ValidationResult};

/// Export a dialogue graph to script text
///
/// This is the main export entry point. Every node in the graph is written as
/// one script block, in insertion order, preceded by the `@graph` and `@end`
/// directives that carry the graph's identity and start/end nodes.
///
/// # Arguments
///
/// * `graph` - The dialogue graph to export
///
/// # Returns
///
/// * `Ok(String)` - The generated script
/// * `Err(CompileError)` - `InvalidGraph` when the validator finds structural
///   errors, or `InvalidIdentifier` for a value the dialect cannot carry
///
/// # Examples
///
/// ```rust,no_run
/// use dgsc::{export_graph, CharacterNode, DialogueGraph, DialogueNode, NodeData};
///
/// let graph = DialogueGraph::new("tavern", "The Tavern").with_node(DialogueNode::new(
///     "greet",
///     NodeData::Character(CharacterNode {
///         speaker: "Barkeep".to_string(),
///         content: "Welcome.".to_string(),
///         next_node_id: None,
///         set_flags: Vec::new(),
///     }),
/// ));
/// match export_graph(&graph) {
///     Ok(script) => println!("Generated:\n{}", script),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn export_graph(graph: &DialogueGraph) -> Result<String, CompileError> {
    export_graph_with_options(graph, &CompilerOptions::default())
}

/// Export a dialogue graph with explicit options
///
/// # Arguments
///
/// * `graph` - The dialogue graph to export
/// * `options` - Banner, position headers and the flag schema used for
///   validation
pub fn export_graph_with_options(
    graph: &DialogueGraph,
    options: &CompilerOptions,
) -> Result<String, CompileError> {
    tracing::info!("[DGSC] Starting script export");
    tracing::info!(
        "[DGSC] Graph: {} ({} nodes, {} edges, {} end nodes)",
        graph.id,
        graph.nodes.len(),
        graph.edges.len(),
        graph.end_nodes.len()
    );

    let generator = ScriptCodeGenerator::new(graph, options);
    let script = generator.generate_script()?;

    tracing::info!("[DGSC] Script generation complete ({} bytes)", script.len());
    tracing::info!("[DGSC] Export successful!");

    Ok(script)
}

/// Export a graph stored in the editor's JSON document shape
///
/// Node payloads are checked for a known kind before anything is written, so
/// an unknown `data.type` fails with `UnknownNodeKind` and produces no text.
pub fn export_document(document: &GraphDocument) -> Result<String, CompileError> {
    tracing::info!("[DGSC] Converting graph document '{}'", document.id);
    let graph = DialogueGraph::from_document(document)?;
    export_graph(&graph)
}

/// Import script text into a dialogue graph
///
/// Validation problems that do not stop the import (dangling jumps, unknown
/// flags) are logged; use [`import_script_with_options`] to inspect them.
///
/// # Returns
///
/// * `Ok(DialogueGraph)` - The rebuilt graph, edges included
/// * `Err(CompileError)` - `ScriptParse` for broken block structure,
///   `NodeImport` for a block whose body cannot be read
pub fn import_script(text: &str) -> Result<DialogueGraph, CompileError> {
    let outcome = import_script_with_options(text, &CompilerOptions::default())?;
    for error in &outcome.validation.errors {
        tracing::warn!("[DGSC] {}", error);
    }
    Ok(outcome.graph)
}

/// Import script text with explicit options, returning warnings and the
/// validation result alongside the graph
pub fn import_script_with_options(
    text: &str,
    options: &CompilerOptions,
) -> Result<ImportOutcome, CompileError> {
    tracing::info!("[DGSC] Starting script import ({} bytes)", text.len());

    let outcome = ScriptImporter::new(options).import(text)?;

    tracing::info!(
        "[DGSC] Import complete: {} nodes, {} edges, {} warnings, {} validation errors",
        outcome.graph.nodes.len(),
        outcome.graph.edges.len(),
        outcome.warnings.len(),
        outcome.validation.errors.len()
    );

    Ok(outcome)
}

/// Validate a graph without exporting it
pub fn validate_graph(graph: &DialogueGraph, schema: Option<&FlagSchema>) -> ValidationResult {
    validator::validate(graph, schema)
}
