//! Instruction model and textual emission (spec §3, §4.2).

use std::fmt;

use derive_more::Display;

use crate::common::Id;
use crate::ir::types::Operand;

/// Binary and comparison operators. Printed in lowercase, matching the
/// Koopa IR mnemonics exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum BinOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("mod")]
    Mod,
    #[display("eq")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("gt")]
    Gt,
    #[display("ge")]
    Ge,
    #[display("lt")]
    Lt,
    #[display("le")]
    Le,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("xor")]
    Xor,
}

/// A single Koopa IR instruction.
///
/// Variants carry exactly the operands they need; only the ones that can
/// produce a result (e.g. `call`) carry an optional destination, matching
/// the source's `std::optional<Operand>` fields folded into the type.
#[derive(Clone, Debug)]
pub enum Instruction {
    Alloc {
        dst: Operand,
    },
    Load {
        dst: Operand,
        src: Operand,
    },
    Store {
        value: Operand,
        addr: Operand,
    },
    GetElemPtr {
        dst: Operand,
        base: Operand,
        index: Operand,
    },
    GetPtr {
        dst: Operand,
        base: Operand,
        index: Operand,
    },
    Binary {
        op: BinOp,
        dst: Operand,
        lhs: Operand,
        rhs: Operand,
    },
    Branch {
        cond: Operand,
        tt: Operand,
        ff: Operand,
    },
    Jump {
        target: Operand,
    },
    Ret {
        value: Option<Operand>,
    },
    Call {
        dst: Option<Operand>,
        callee: Id,
        args: Vec<Operand>,
    },
}

impl Instruction {
    /// Is this one of the three terminator opcodes (`br`/`jump`/`ret`)?
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. } | Instruction::Jump { .. } | Instruction::Ret { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        match self {
            Instruction::Alloc { dst } => {
                write!(f, "{dst} = alloc {}", dst.ty.pointee())
            }
            Instruction::Load { dst, src } => write!(f, "{dst} = load {src}"),
            Instruction::Store { value, addr } => write!(f, "store {value}, {addr}"),
            Instruction::GetElemPtr { dst, base, index } => {
                write!(f, "{dst} = getelemptr {base}, {index}")
            }
            Instruction::GetPtr { dst, base, index } => {
                write!(f, "{dst} = getptr {base}, {index}")
            }
            Instruction::Binary { op, dst, lhs, rhs } => {
                write!(f, "{dst} = {op} {lhs}, {rhs}")
            }
            Instruction::Branch { cond, tt, ff } => write!(f, "br {cond}, {tt}, {ff}"),
            Instruction::Jump { target } => write!(f, "jump {target}"),
            Instruction::Ret { value } => match value {
                Some(v) => write!(f, "ret {v}"),
                None => write!(f, "ret"),
            },
            Instruction::Call { dst, callee, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = call @{callee}(")?;
                } else {
                    write!(f, "call @{callee}(")?;
                }
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;
    use crate::ir::types::Type;

    #[test]
    fn alloc_prints_pointed_type() {
        let dst = Operand::address("@x", Type::I32);
        let instr = Instruction::Alloc { dst };
        assert_eq!(instr.to_string(), "  @x = alloc i32");
    }

    #[test]
    fn call_without_result_omits_assignment() {
        let instr = Instruction::Call {
            dst: None,
            callee: id("putint"),
            args: vec![Operand::imm(1)],
        };
        assert_eq!(instr.to_string(), "  call @putint(1)");
    }

    #[test]
    fn call_with_result_assigns_destination() {
        let instr = Instruction::Call {
            dst: Some(Operand::named("%0", Type::I32)),
            callee: id("getint"),
            args: vec![],
        };
        assert_eq!(instr.to_string(), "  %0 = call @getint()");
    }

    #[test]
    fn branch_operand_order() {
        let instr = Instruction::Branch {
            cond: Operand::named("%0", Type::I32),
            tt: Operand::block("%then_0"),
            ff: Operand::block("%else_0"),
        };
        assert_eq!(instr.to_string(), "  br %0, %then_0, %else_0");
    }
}
