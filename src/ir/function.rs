//! Functions (spec §3, §4.3).

use std::fmt;

use crate::common::{Id, Map};
use crate::error::CompileError;
use crate::ir::block::BasicBlock;
use crate::ir::instr::Instruction;
use crate::ir::types::{Operand, Type};

/// A formal parameter: the operand it is initially bound to (`%k`, via the
/// process-wide temp counter) and the source identifier it is later
/// re-registered under once [`crate::front::scope::Scope::alloc_and_store_for_params`]
/// gives it memory-backed storage.
#[derive(Clone, Debug)]
pub struct Param {
    pub ident: Id,
    pub operand: Operand,
}

#[derive(Clone, Debug)]
pub struct LoopInfo {
    pub entry_label: String,
    pub after_label: String,
}

/// A function under construction. Mutated throughout AST lowering and
/// frozen (via [`Function::finalize`]) before emission.
pub struct Function {
    pub ident: Id,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub entry: BasicBlock,
    /// Ordinary blocks in insertion order; the last one is always "current".
    pub blocks: Vec<BasicBlock>,
    pub end: BasicBlock,
    /// The return-value slot, allocated in the entry block for `i32`
    /// functions only.
    pub ret_slot: Option<Operand>,
    name_counter: Map<String, u32>,
    loop_stack: Vec<LoopInfo>,
}

impl Function {
    pub fn new(ident: Id, return_type: Type) -> Function {
        let mut name_counter = Map::new();
        let entry_label = gen_name(&mut name_counter, "%entry");
        let end_label = gen_name(&mut name_counter, "%end");
        let first_block_label = gen_name(&mut name_counter, "%basic_block");

        let mut func = Function {
            ident,
            return_type: return_type.clone(),
            params: Vec::new(),
            entry: BasicBlock::new(entry_label),
            blocks: vec![BasicBlock::new(first_block_label)],
            end: BasicBlock::new(end_label),
            ret_slot: None,
            name_counter,
            loop_stack: Vec::new(),
        };

        if return_type == Type::I32 {
            let ret_name = func.get_koopa_var_name("%ret");
            let ret_op = Operand::address(ret_name, Type::I32);
            func.entry.instrs.push(Instruction::Alloc {
                dst: ret_op.clone(),
            });
            func.ret_slot = Some(ret_op);
        }

        func
    }

    /// Seeds the name counter with an identifier that is already taken at
    /// the program level (a global variable or a function signature), so
    /// that a same-named local never collides with it (spec §4.4).
    pub fn reserve_name_stem(&mut self, stem: &str) {
        self.name_counter.entry(stem.to_string()).or_insert(0);
    }

    /// Returns a process-unique (well, function-unique) name built from
    /// `stem`: the first request for a stem returns `{stem}_0`, the next
    /// `{stem}_1`, and so on.
    pub fn get_koopa_var_name(&mut self, stem: &str) -> String {
        let counter = self.name_counter.entry(stem.to_string()).or_insert(0);
        let name = format!("{stem}_{counter}");
        *counter += 1;
        name
    }

    pub fn current_block(&self) -> &BasicBlock {
        self.blocks
            .last()
            .expect("a function always has a current block")
    }

    pub fn current_block_mut(&mut self) -> &mut BasicBlock {
        self.blocks
            .last_mut()
            .expect("a function always has a current block")
    }

    pub fn append_instr_to_current_block(&mut self, instr: Instruction) {
        self.current_block_mut().instrs.push(instr);
    }

    /// Every `alloc` is hoisted into the entry block regardless of where it
    /// is syntactically declared (spec §4.3).
    pub fn append_alloc_to_entry_block(&mut self, instr: Instruction) {
        debug_assert!(matches!(instr, Instruction::Alloc { .. }));
        self.entry.instrs.push(instr);
    }

    /// Terminates the current block with `term`. If `create_new` is set, a
    /// fresh block (named `new_name`, or a fresh `%basic_block` stem) becomes
    /// current.
    pub fn end_current_block_by_instr(
        &mut self,
        term: Instruction,
        create_new: bool,
        new_name: Option<String>,
    ) -> Result<(), CompileError> {
        {
            let cur = self.current_block_mut();
            if cur.term.is_some() {
                return Err(CompileError::BlockTerminationError(format!(
                    "block {} is already terminated",
                    cur.label
                )));
            }
            cur.term = Some(term);
        }
        if create_new {
            let name = new_name.unwrap_or_else(|| self.get_koopa_var_name("%basic_block"));
            self.blocks.push(BasicBlock::new(name));
        }
        Ok(())
    }

    pub fn enter_loop(&mut self, entry_label: String, after_label: String) {
        self.loop_stack.push(LoopInfo {
            entry_label,
            after_label,
        });
    }

    pub fn exit_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub fn current_loop_info(&self) -> Option<&LoopInfo> {
        self.loop_stack.last()
    }

    /// Closes out the function: hoists the entry-block jump to the first
    /// ordinary block, closes a dangling current block with a fallthrough
    /// jump to `%end` (for functions whose control flow can fall off the
    /// end, e.g. a `void` function without a trailing `return;`), and
    /// builds the end-block epilogue.
    pub fn finalize(&mut self, mut new_temp: impl FnMut() -> Operand) {
        if !self.current_block().is_terminated() {
            let end_label = self.end.label.clone();
            self.current_block_mut().term = Some(Instruction::Jump {
                target: Operand::block(end_label),
            });
        }

        let first_label = self.blocks[0].label.clone();
        self.entry.term = Some(Instruction::Jump {
            target: Operand::block(first_label),
        });

        if self.return_type == Type::I32 {
            let ret_slot = self
                .ret_slot
                .clone()
                .expect("i32 function must have a return slot");
            let tmp = new_temp();
            self.end.instrs.push(Instruction::Load {
                dst: tmp.clone(),
                src: ret_slot,
            });
            self.end.term = Some(Instruction::Ret { value: Some(tmp) });
        } else {
            self.end.term = Some(Instruction::Ret { value: None });
        }
    }
}

fn gen_name(counter: &mut Map<String, u32>, stem: &str) -> String {
    let c = counter.entry(stem.to_string()).or_insert(0);
    let name = format!("{stem}_{c}");
    *c += 1;
    name
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fun @{}(", self.ident)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", p.operand, p.operand.ty)?;
        }
        write!(f, ")")?;
        if self.return_type == Type::I32 {
            write!(f, ": i32")?;
        }
        writeln!(f, " {{")?;
        write!(f, "{}", self.entry)?;
        for b in &self.blocks {
            write!(f, "{b}")?;
        }
        write!(f, "{}", self.end)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;

    #[test]
    fn new_i32_function_has_ret_slot_in_entry() {
        let func = Function::new(id("main"), Type::I32);
        assert_eq!(func.entry.label, "%entry_0");
        assert_eq!(func.end.label, "%end_0");
        assert_eq!(func.blocks[0].label, "%basic_block_0");
        assert!(func.ret_slot.is_some());
        assert_eq!(func.entry.instrs.len(), 1);
    }

    #[test]
    fn void_function_has_no_ret_slot() {
        let func = Function::new(id("work"), Type::Unit);
        assert!(func.ret_slot.is_none());
        assert!(func.entry.instrs.is_empty());
    }

    #[test]
    fn get_koopa_var_name_is_monotone_per_stem() {
        let mut func = Function::new(id("f"), Type::Unit);
        assert_eq!(func.get_koopa_var_name("x"), "x_0");
        assert_eq!(func.get_koopa_var_name("x"), "x_1");
        assert_eq!(func.get_koopa_var_name("y"), "y_0");
    }

    #[test]
    fn double_termination_is_an_error() {
        let mut func = Function::new(id("f"), Type::Unit);
        func.end_current_block_by_instr(Instruction::Ret { value: None }, false, None)
            .unwrap();
        let err = func.end_current_block_by_instr(Instruction::Ret { value: None }, false, None);
        assert!(err.is_err());
    }
}
