//! # Script Code Generation
//!
//! Graph → script text, plus the per-kind node handlers the importer reuses
//! to read blocks back.

mod block_builder;
pub mod node_handlers;
mod yarn_codegen;

pub use block_builder::BlockBuilder;
pub use yarn_codegen::{ScriptCodeGenerator, BANNER};
