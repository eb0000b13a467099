//! Typed edges between blocks.

use std::fmt::{self, Display, Formatter};

use crate::analysis::block::Label;
use crate::instruction::Instruction;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    /// Implicit continuation into the next block.
    Fallthrough,
    /// An explicit jump; conditional jumps pair with exactly one fallthrough edge out of the
    /// same block.
    Jump(Instruction),
    /// The subroutine call of a `jsr`.
    JsrJump(Instruction),
    /// The return site of a `jsr`, reached when the subroutine `ret`s back.
    JsrFallthrough(Instruction),
    /// Return from a subroutine. The target is unknown until the trace engine reads the return
    /// address out of the named local.
    Ret { local: u16 },
    /// One case of a switch; `None` is the default branch, otherwise the match value (lookup) or
    /// table index (table).
    Switch { value: Option<i32> },
    /// Flow into an exception handler. `priority` is the handler's position in the original
    /// exception table; lower is tried first. `inline_coverage` marks protection that extends
    /// through subroutine inlining.
    Exception {
        priority: u16,
        throwable: Type,
        inline_coverage: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: Label,
    /// `None` only for a `Ret` edge whose target has not been resolved yet.
    pub to: Option<Label>,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: Label, to: Label, kind: EdgeKind) -> Self {
        Edge {
            from,
            to: Some(to),
            kind,
        }
    }

    pub fn unresolved_ret(from: Label, local: u16) -> Self {
        Edge {
            from,
            to: None,
            kind: EdgeKind::Ret { local },
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.kind, EdgeKind::Exception { .. })
    }

    /// Whether this edge transfers normal (non-exceptional) control flow.
    pub fn is_flow(&self) -> bool {
        !self.is_exception()
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let to = match self.to {
            Some(label) => label.to_string(),
            None => "unknown".to_owned(),
        };

        match &self.kind {
            EdgeKind::Fallthrough => write!(f, "fallthrough {} -> {}", self.from, to),
            EdgeKind::Jump(instruction) => {
                write!(f, "{} {} -> {}", instruction.mnemonic(), self.from, to)
            }
            EdgeKind::JsrJump(instruction) => {
                write!(f, "{} {} -> {}", instruction.mnemonic(), self.from, to)
            }
            EdgeKind::JsrFallthrough(instruction) => {
                write!(f, "fallthrough {} {} (-> {})", instruction.mnemonic(), self.from, to)
            }
            EdgeKind::Ret { local } => write!(f, "ret local {} {} -> {}", local, self.from, to),
            EdgeKind::Switch { value: Some(value) } => {
                write!(f, "switch value {} {} -> {}", value, self.from, to)
            }
            EdgeKind::Switch { value: None } => {
                write!(f, "switch default {} -> {}", self.from, to)
            }
            EdgeKind::Exception {
                priority,
                throwable,
                inline_coverage,
            } => {
                if *inline_coverage {
                    write!(
                        f,
                        "catch {} priority {} {} (+inlined) -> {}",
                        throwable, priority, self.from, to
                    )
                } else {
                    write!(
                        f,
                        "catch {} priority {} {} -> {}",
                        throwable, priority, self.from, to
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let fallthrough = Edge::new(1, 2, EdgeKind::Fallthrough);
        assert_eq!(fallthrough.to_string(), "fallthrough 1 -> 2");

        let jump = Edge::new(1, 4, EdgeKind::Jump(Instruction::goto(12)));
        assert_eq!(jump.to_string(), "goto 1 -> 4");

        let unresolved = Edge::unresolved_ret(5, 1);
        assert_eq!(unresolved.to_string(), "ret local 1 5 -> unknown");

        let case = Edge::new(2, 6, EdgeKind::Switch { value: Some(3) });
        assert_eq!(case.to_string(), "switch value 3 2 -> 6");

        let handler = Edge::new(
            2,
            7,
            EdgeKind::Exception {
                priority: 0,
                throwable: Type::class("java/lang/Throwable"),
                inline_coverage: false,
            },
        );
        assert_eq!(
            handler.to_string(),
            "catch java/lang/Throwable priority 0 2 -> 7"
        );
    }
}
