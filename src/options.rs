//! # Compiler Options
//!
//! Knobs shared by export and import. Deserializes from camelCase JSON with
//! every field optional.

use crate::validator::FlagSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Fail on condition clauses the parser cannot read instead of dropping
    /// them with a warning
    pub strict_conditions: bool,
    /// Fail an import whose jumps point at nodes the script does not define
    pub strict_references: bool,
    /// Write `position: x,y` node headers
    pub emit_positions: bool,
    /// Write the generated-file banner
    pub emit_banner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_schema: Option<FlagSchema>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            strict_conditions: false,
            strict_references: false,
            emit_positions: true,
            emit_banner: true,
            flag_schema: None,
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_conditions(mut self, strict: bool) -> Self {
        self.strict_conditions = strict;
        self
    }

    pub fn with_strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    pub fn with_positions(mut self, emit: bool) -> Self {
        self.emit_positions = emit;
        self
    }

    pub fn with_banner(mut self, emit: bool) -> Self {
        self.emit_banner = emit;
        self
    }

    pub fn with_flag_schema(mut self, schema: FlagSchema) -> Self {
        self.flag_schema = Some(schema);
        self
    }
}
