//! Basic blocks: maximal straight-line instruction runs with a single entry point.

use crate::instruction::Instruction;
use crate::types::Type;

/// Blocks live in an arena owned by the graph and refer to each other by label.
pub type Label = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// The distinguished entry block; never the target of an edge.
    Entry,
    Normal,
    /// The shared terminal block return instructions flow into. Carries the returned value type,
    /// `None` for `void`.
    Return(Option<Type>),
    /// The shared terminal block `athrow` flows into.
    Rethrow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: Label,
    pub kind: BlockKind,
    /// `(bytecode offset, instruction)` pairs; empty for the terminal blocks.
    pub instructions: Vec<(u32, Instruction)>,
}

impl Block {
    pub fn new(label: Label, kind: BlockKind) -> Self {
        Block {
            label,
            kind,
            instructions: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, BlockKind::Return(_) | BlockKind::Rethrow)
    }

    /// The bytecode offset this block starts at.
    pub fn start_offset(&self) -> Option<u32> {
        self.instructions.first().map(|(offset, _)| *offset)
    }

    /// The last instruction, which decides how the block exits.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().map(|(_, instruction)| instruction)
    }
}
