//! The 32-bit RISC-V (RV32) backend's instruction model.
//!
//! There is no register allocator: every Koopa value that is read more than
//! once lives on the stack, and `t0`-`t2` are reused as pure scratch space
//! within a single instruction's lowering (spec §4.7). The instruction set
//! below is only as wide as the patterns [`crate::back::codegen`] actually
//! emits — a stack machine's worth of loads, stores, and arithmetic, plus
//! the control-flow and call instructions Koopa IR lowers to directly.
//!
//! # Calling convention
//!
//! This is the standard RV32 integer calling convention, simplified to the
//! part SysY actually exercises: no floating point, no aggregates passed or
//! returned by value.
//!
//! 1. The first 8 integer arguments go in `a0`-`a7`; the rest are pushed to
//!    the stack, above the callee's own frame, in left-to-right order.
//! 2. `call` saves the return address in `ra` and jumps.
//! 3. The callee's prologue (spec §4.7.3) decrements `sp` by its frame size
//!    and, unless it is a leaf function (makes no calls), saves `ra` at the
//!    top of that frame.
//! 4. The callee's epilogue reverses this: restore `ra` if saved, then
//!    restore `sp`, then `ret`.
//! 5. The return value, if any, comes back in `a0`.
//!
//! ```txt
//!   High memory addresses
//!   +-------------------------+
//!   | Caller's frame          |
//!   +-------------------------+
//!   | Stack-passed args (>8)  |
//!   +-------------------------+ <- sp (callee's frame starts here)
//!   | Saved ra (if not leaf)  |
//!   +-------------------------+
//!   | Local variable slots    |
//!   +-------------------------+
//!   Low memory addresses
//! ```
//!
//! Every local variable and temporary lives at a fixed `sp`-relative offset
//! for the whole function; there is no frame pointer (`fp`/`s0` is unused,
//! matching the fact that `sp` is callee-saved across the call and nothing
//! ever needs an address computed before the final frame size is known,
//! since that size is computed in one pass before any code is emitted).

use derive_more::Display;

/// Registers of the RV32 integer register file, named as the ABI spells
/// them rather than by number.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Register {
    #[display("zero")]
    Zero,
    #[display("ra")]
    Ra,
    #[display("sp")]
    Sp,
    #[display("t0")]
    T0,
    #[display("t1")]
    T1,
    #[display("t2")]
    T2,
    #[display("a0")]
    A0,
    #[display("a1")]
    A1,
    #[display("a2")]
    A2,
    #[display("a3")]
    A3,
    #[display("a4")]
    A4,
    #[display("a5")]
    A5,
    #[display("a6")]
    A6,
    #[display("a7")]
    A7,
}

/// Registers used to pass the first 8 integer arguments, in order.
pub static ARG_REGISTERS: [Register; 8] = [
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
];

/// An immediate that doesn't fit `addi`/`lw`/`sw`'s 12-bit signed range
/// (spec §4.7.4) must be materialized into a scratch register first.
pub fn within_i12(imm: i32) -> bool {
    (-(1 << 11)..(1 << 11)).contains(&imm)
}

#[derive(Clone, Copy, Debug, Display)]
pub enum ArithOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("rem")]
    Rem,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("xor")]
    Xor,
    #[display("slt")]
    Slt,
}

/// One emitted line of RISC-V assembly. Deliberately flat (no basic-block
/// wrapper): a whole program is just a `Vec<Instruction>` printed in order,
/// since RISC-V text has no nesting of its own.
#[derive(Clone, Debug)]
pub enum Instruction {
    Directive(String),
    Label(String),
    Li { dst: Register, imm: i32 },
    La { dst: Register, symbol: String },
    Lw { dst: Register, base: Register, offset: i32 },
    Sw { src: Register, base: Register, offset: i32 },
    Addi { dst: Register, src: Register, imm: i32 },
    Mv { dst: Register, src: Register },
    Arith { op: ArithOp, dst: Register, lhs: Register, rhs: Register },
    Seqz { dst: Register, src: Register },
    Snez { dst: Register, src: Register },
    Bnez { cond: Register, label: String },
    Jump { label: String },
    Call { callee: String },
    Ret,
    /// A one-word data item inside a `.data` block.
    Word(i32),
    /// `n` zero bytes inside a `.data` block.
    Zero(i32),
    Comment(String),
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Directive(d) => write!(f, "  {d}"),
            Label(l) => write!(f, "{l}:"),
            Li { dst, imm } => write!(f, "  li    {dst}, {imm}"),
            La { dst, symbol } => write!(f, "  la    {dst}, {symbol}"),
            Lw { dst, base, offset } => write!(f, "  lw    {dst}, {offset}({base})"),
            Sw { src, base, offset } => write!(f, "  sw    {src}, {offset}({base})"),
            Addi { dst, src, imm } => write!(f, "  addi  {dst}, {src}, {imm}"),
            Mv { dst, src } => write!(f, "  mv    {dst}, {src}"),
            Arith { op, dst, lhs, rhs } => write!(f, "  {op:<5} {dst}, {lhs}, {rhs}"),
            Seqz { dst, src } => write!(f, "  seqz  {dst}, {src}"),
            Snez { dst, src } => write!(f, "  snez  {dst}, {src}"),
            Bnez { cond, label } => write!(f, "  bnez  {cond}, {label}"),
            Jump { label } => write!(f, "  j     {label}"),
            Call { callee } => write!(f, "  call  {callee}"),
            Ret => write!(f, "  ret"),
            Word(v) => write!(f, "  .word {v}"),
            Zero(n) => write!(f, "  .zero {n}"),
            Comment(c) => write!(f, "  # {c}"),
        }
    }
}

/// A whole assembled program: a flat instruction stream, printed verbatim.
#[derive(Default)]
pub struct Program {
    pub lines: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    pub fn push(&mut self, instr: Instruction) {
        self.lines.push(instr);
    }

    pub fn asm_code(&self) -> String {
        let mut out = String::new();
        for instr in &self.lines {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.asm_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addi_prints_in_at_and_t_syntax() {
        let instr = Instruction::Addi { dst: Register::Sp, src: Register::Sp, imm: -16 };
        assert_eq!(instr.to_string(), "  addi  sp, sp, -16");
    }

    #[test]
    fn twelve_bit_immediate_boundary() {
        assert!(within_i12(2047));
        assert!(!within_i12(2048));
        assert!(within_i12(-2048));
        assert!(!within_i12(-2049));
    }

    #[test]
    fn program_joins_lines_with_newlines() {
        let mut prog = Program::new();
        prog.push(Instruction::Label("main".into()));
        prog.push(Instruction::Ret);
        assert_eq!(prog.asm_code(), "main:\n  ret\n");
    }
}
