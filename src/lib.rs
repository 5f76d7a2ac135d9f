//! # Dialogue Graph Script Compiler (DGSC)
//!
//! Compiler between visual dialogue graphs and Yarn Spinner style scripts,
//! in both directions.
//!
//! DGSC turns a graph of dialogue nodes into script text a writer can read
//! and edit, and reads edited text back into the same graph:
//! - Character lines, player choices and conditional branches map onto the
//!   native dialect
//! - Storylet calls and pools travel as `// @...` directives
//! - Node ids, choice ids, positions and start/end nodes survive the round
//!   trip
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dgsc::{export_graph, import_script};
//!
//! let script = std::fs::read_to_string("tavern.yarn")?;
//! let graph = import_script(&script)?;
//! // ... edit the graph
//!
//! std::fs::write("tavern.yarn", export_graph(&graph)?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Export:
//!
//! 1. **Validation** - Structural errors abort, dangling jumps are logged
//! 2. **Preamble** - `@graph` and `@end` directives
//! 3. **Node Blocks** - One block per node through its kind's handler
//!
//! Import:
//!
//! 1. **Splitting** - Script text into headers and bodies per node
//! 2. **Kind Inference** - Body markers select the node handler
//! 3. **Node Import** - Handlers rebuild payloads
//! 4. **Linking** - Edges, start and end nodes, then validation

pub mod codegen;
pub mod compiler;
pub mod condition;
pub mod error;
pub mod graph;
pub mod options;
pub mod script;
pub mod validator;

// Re-export the main compilation API
pub use compiler::{
    export_document, export_graph, export_graph_with_options, import_script,
    import_script_with_options, validate_graph,
};

pub use condition::{
    format_conditions, parse_conditions, parse_conditions_strict, Condition, ConditionOperator,
    ConditionParser, ConditionValue, FlagId,
};
pub use error::{CompileError, ConditionParseError, NodeImportError, Result, ScriptParseError};
pub use graph::{
    BlockKind, CharacterNode, Choice, ConditionalBlock, ConditionalNode, DialogueGraph,
    DialogueNode, Edge, EdgeKind, EndNode, EntryPolicy, GraphDocument, NodeData, NodeId, NodeKind,
    PlayerNode, PoolMember, Position, ReturnPolicy, SelectionMode, StoryletNode, StoryletPoolNode,
};
pub use options::CompilerOptions;
pub use script::{ImportOutcome, ImportWarning};
pub use validator::{FlagSchema, FlagType, ValidationError, ValidationResult, ValidationWarning};
