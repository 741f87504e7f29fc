//! The crate's own Koopa IR model: built up during AST lowering and printed
//! to text, never walked directly by the back end (spec §3, §9).

pub mod block;
pub mod function;
pub mod instr;
pub mod program;
pub mod types;

pub use block::BasicBlock;
pub use function::{Function, LoopInfo, Param};
pub use instr::{BinOp, Instruction};
pub use program::{Global, GlobalInit, Item, Program, STDLIB_DECLS};
pub use types::{AssocValue, Operand, Type};
