//! Basic blocks (spec §3, §4.3).

use std::fmt;

use crate::ir::instr::Instruction;

/// A basic block: a label, a straight-line instruction list, and at most one
/// terminator.
///
/// A block with neither instructions nor a terminator is a dead placeholder
/// (opened after `break`/`continue`/`return` to keep subsequent statements
/// well-formed, spec §4.6.4) and is dropped silently at emission time,
/// matching the source's `BasicBlock::operator<<`.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instruction>,
    pub term: Option<Instruction>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> BasicBlock {
        BasicBlock {
            label: label.into(),
            instrs: Vec::new(),
            term: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.term.is_some()
    }

    /// A block is emitted iff it has accumulated either instructions or a
    /// terminator; an entirely untouched block is dead code and is omitted.
    pub fn is_emittable(&self) -> bool {
        !self.instrs.is_empty() || self.term.is_some()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_emittable() {
            return Ok(());
        }
        debug_assert!(
            self.term.is_some(),
            "basic block {} has instructions but no terminator",
            self.label
        );
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instrs {
            writeln!(f, "{instr}")?;
        }
        if let Some(term) = &self.term {
            writeln!(f, "{term}")?;
        }
        Ok(())
    }
}
