//! AST lowering: SysY source to a [`Program`] of Koopa IR (spec §4.6).
//!
//! Two name supplies are in play and must not be confused: each
//! [`crate::ir::Function`] has its own monotone counter for block labels and
//! named locals (`%entry_0`, `%if_body_3`, `@x_1`), reserved up front for
//! every identifier already visible at `enter_func` time so a local can never
//! collide with a global or a sibling function. Every compiler-synthesized
//! SSA temporary (`%0`, `%1`, ...), by contrast, is drawn from one counter
//! shared across the whole program, matching the way parameter bindings and
//! expression results are numbered in the textual form.

use crate::common::Id;
use crate::error::CompileError;
use crate::front::array::{reshape_for_type, Array, RawInit};
use crate::front::ast::{
    BinaryOp, Block, BlockItem, CompUnit, Decl, Def, Exp, FuncDef, FuncRetType, InitVal, Item,
    LVal, Stmt, UnaryOp,
};
use crate::front::scope::{Scope, Signature, Variable};
use crate::ir::function::Param;
use crate::ir::instr::{BinOp, Instruction};
use crate::ir::program::{Global, GlobalInit, Program};
use crate::ir::types::{Operand, Type};
use crate::Result;

pub fn lower(unit: &CompUnit) -> Result<Program> {
    let mut lowerer = Lowerer::new();
    lowerer.lower_comp_unit(unit)?;
    Ok(lowerer.program)
}

struct Lowerer {
    scope: Scope,
    /// The process-wide `%k` counter, independent of any function's own
    /// named-stem counter.
    next_temp: u32,
    program: Program,
}

impl Lowerer {
    fn new() -> Lowerer {
        Lowerer {
            scope: Scope::new(),
            next_temp: 0,
            program: Program::new(),
        }
    }

    fn alloc_temp_num(&mut self) -> u32 {
        let n = self.next_temp;
        self.next_temp += 1;
        n
    }

    fn new_temp(&mut self, ty: Type) -> Operand {
        let n = self.alloc_temp_num();
        Operand::named(format!("%{n}"), ty)
    }

    fn new_temp_addr(&mut self, pointee: Type) -> Operand {
        let n = self.alloc_temp_num();
        Operand::address(format!("%{n}"), pointee)
    }

    fn new_temp_load(&mut self, addr: Operand) -> Operand {
        let dst = self.new_temp(Type::I32);
        self.append_instr(Instruction::Load {
            dst: dst.clone(),
            src: addr,
        });
        dst
    }

    fn append_instr(&mut self, instr: Instruction) {
        self.scope.current_func_mut().append_instr_to_current_block(instr);
    }

    fn lower_comp_unit(&mut self, unit: &CompUnit) -> Result<()> {
        for item in &unit.items {
            match item {
                Item::Decl(decl) => self.lower_global_decl(decl)?,
                Item::FuncDef(f) => self.lower_func_def(f)?,
            }
        }
        Ok(())
    }

    // ---- constant folding (spec §4.6.2) ----------------------------------

    fn compute_const_val(&self, exp: &Exp) -> Result<i32> {
        match exp {
            Exp::Number(n) => Ok(*n),
            Exp::LVal(lval) => self.compute_const_lval(lval),
            Exp::Call { ident, .. } => Err(CompileError::TypeMismatch(format!(
                "call to '{ident}' is not a constant expression"
            ))),
            Exp::Unary { op, operand } => {
                let v = self.compute_const_val(operand)?;
                Ok(match op {
                    UnaryOp::Plus => v,
                    UnaryOp::Minus => 0i32.wrapping_sub(v),
                    UnaryOp::Not => (v == 0) as i32,
                })
            }
            Exp::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let l = self.compute_const_val(lhs)?;
                if l == 0 {
                    return Ok(0);
                }
                Ok((self.compute_const_val(rhs)? != 0) as i32)
            }
            Exp::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                let l = self.compute_const_val(lhs)?;
                if l != 0 {
                    return Ok(1);
                }
                Ok((self.compute_const_val(rhs)? != 0) as i32)
            }
            Exp::Binary { op, lhs, rhs } => {
                let l = self.compute_const_val(lhs)?;
                let r = self.compute_const_val(rhs)?;
                Ok(match op {
                    BinaryOp::Add => l.wrapping_add(r),
                    BinaryOp::Sub => l.wrapping_sub(r),
                    BinaryOp::Mul => l.wrapping_mul(r),
                    BinaryOp::Div => l.wrapping_div(r),
                    BinaryOp::Mod => l.wrapping_rem(r),
                    BinaryOp::Lt => (l < r) as i32,
                    BinaryOp::Le => (l <= r) as i32,
                    BinaryOp::Gt => (l > r) as i32,
                    BinaryOp::Ge => (l >= r) as i32,
                    BinaryOp::Eq => (l == r) as i32,
                    BinaryOp::Ne => (l != r) as i32,
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                })
            }
        }
    }

    fn compute_const_lval(&self, lval: &LVal) -> Result<i32> {
        if !lval.indices.is_empty() {
            return Err(CompileError::TypeMismatch(format!(
                "'{}': an indexed array read is not a constant expression",
                lval.ident
            )));
        }
        let var = self.scope.get_var_by_ident(lval.ident)?;
        var.const_val
            .ok_or_else(|| CompileError::TypeMismatch(format!("'{}' is not a constant", lval.ident)))
    }

    fn init_val_to_raw_const(&self, init: &InitVal) -> Result<RawInit<i32>> {
        match init {
            InitVal::Exp(e) => Ok(RawInit::Leaf(self.compute_const_val(e)?)),
            InitVal::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.init_val_to_raw_const(item)?);
                }
                Ok(RawInit::Nested(out))
            }
        }
    }

    fn build_array_type(&self, dims: &[Exp]) -> Result<Type> {
        let mut sizes = Vec::with_capacity(dims.len());
        for d in dims {
            sizes.push(self.compute_const_val(d)? as usize);
        }
        let mut ty = Type::I32;
        for &size in sizes.iter().rev() {
            ty = Type::array(ty, size);
        }
        Ok(ty)
    }

    // ---- declarations ------------------------------------------------------

    fn lower_global_decl(&mut self, decl: &Decl) -> Result<()> {
        for def in &decl.defs {
            if def.dims.is_empty() {
                self.lower_global_scalar(decl.is_const, def)?;
            } else {
                self.lower_global_array(decl.is_const, def)?;
            }
        }
        Ok(())
    }

    fn lower_global_scalar(&mut self, is_const: bool, def: &Def) -> Result<()> {
        let value = match &def.init {
            Some(InitVal::Exp(e)) => self.compute_const_val(e)?,
            Some(InitVal::List(_)) => {
                return Err(CompileError::TypeMismatch(format!(
                    "'{}': a scalar cannot be initialized with a brace list",
                    def.ident
                )))
            }
            None => 0,
        };
        if is_const {
            self.scope
                .insert_var(def.ident, Variable::const_scalar(def.ident.to_string(), value))?;
            return Ok(());
        }
        let init = if def.init.is_some() {
            GlobalInit::Int(value)
        } else {
            GlobalInit::Zero
        };
        self.program.push_global(Global {
            ident: def.ident,
            ty: Type::I32,
            init,
        });
        self.scope
            .insert_var(def.ident, Variable::scalar(Type::I32, format!("@{}", def.ident)))?;
        Ok(())
    }

    fn lower_global_array(&mut self, is_const: bool, def: &Def) -> Result<()> {
        let ty = self.build_array_type(&def.dims)?;
        let array = match &def.init {
            Some(init) => reshape_for_type(self.init_val_to_raw_const(init)?, &ty, &0),
            None => reshape_for_type(RawInit::Nested(vec![]), &ty, &0),
        };
        let global_init = if def.init.is_some() {
            array.clone().into_global_init()
        } else {
            GlobalInit::Zero
        };
        self.program.push_global(Global {
            ident: def.ident,
            ty: ty.clone(),
            init: global_init,
        });
        let const_array = if is_const { Some(array) } else { None };
        self.scope.insert_var(
            def.ident,
            Variable {
                ty,
                is_const,
                emitted_name: format!("@{}", def.ident),
                const_val: None,
                const_array,
            },
        )?;
        Ok(())
    }

    fn lower_local_decl(&mut self, decl: &Decl) -> Result<()> {
        for def in &decl.defs {
            if def.dims.is_empty() {
                self.lower_local_scalar(decl.is_const, def)?;
            } else {
                self.lower_local_array(decl.is_const, def)?;
            }
        }
        Ok(())
    }

    fn lower_local_scalar(&mut self, is_const: bool, def: &Def) -> Result<()> {
        if is_const {
            let Some(InitVal::Exp(e)) = &def.init else {
                return Err(CompileError::TypeMismatch(format!(
                    "'{}': a const must be initialized with a constant expression",
                    def.ident
                )));
            };
            let value = self.compute_const_val(e)?;
            self.scope
                .insert_var(def.ident, Variable::const_scalar(def.ident.to_string(), value))?;
            return Ok(());
        }
        let base = format!(
            "@{}",
            self.scope.current_func_mut().get_koopa_var_name(&def.ident.to_string())
        );
        let addr = Operand::address(base.clone(), Type::I32);
        self.scope
            .current_func_mut()
            .append_alloc_to_entry_block(Instruction::Alloc { dst: addr.clone() });
        if let Some(InitVal::Exp(e)) = &def.init {
            let value = self.lower_exp(e)?;
            self.append_instr(Instruction::Store { value, addr });
        }
        self.scope.insert_var(def.ident, Variable::scalar(Type::I32, base))?;
        Ok(())
    }

    /// Local array initializers, const or not, must be all-constant: Koopa
    /// has no aggregate-literal form for a stack slot, only element-by-element
    /// stores, so there would be nothing to gain from allowing a runtime
    /// expression here and the language surface never requires it.
    fn lower_local_array(&mut self, is_const: bool, def: &Def) -> Result<()> {
        let ty = self.build_array_type(&def.dims)?;
        let base = format!(
            "@{}",
            self.scope.current_func_mut().get_koopa_var_name(&def.ident.to_string())
        );
        let addr = Operand::address(base.clone(), ty.clone());
        self.scope
            .current_func_mut()
            .append_alloc_to_entry_block(Instruction::Alloc { dst: addr.clone() });

        let array = match &def.init {
            Some(init) => Some(reshape_for_type(self.init_val_to_raw_const(init)?, &ty, &0)),
            None => None,
        };
        if let Some(arr) = &array {
            self.emit_array_store(addr, &ty, arr);
        }
        self.scope.insert_var(
            def.ident,
            Variable {
                ty,
                is_const,
                emitted_name: base,
                const_val: None,
                const_array: array,
            },
        )?;
        Ok(())
    }

    fn emit_array_store(&mut self, base: Operand, ty: &Type, arr: &Array<i32>) {
        let dims = ty.array_dims();
        for (flat_idx, value) in arr.clone().flatten().into_iter().enumerate() {
            let mut cur = base.clone();
            let mut pointee = ty.clone();
            for idx in unflatten_index(flat_idx, &dims) {
                pointee = pointee.pointee().clone();
                let next = self.new_temp_addr(pointee.clone());
                self.append_instr(Instruction::GetElemPtr {
                    dst: next.clone(),
                    base: cur,
                    index: Operand::imm(idx as i32),
                });
                cur = next;
            }
            self.append_instr(Instruction::Store {
                value: Operand::imm(value),
                addr: cur,
            });
        }
    }

    // ---- function definitions and blocks -----------------------------------

    fn lower_func_def(&mut self, f: &FuncDef) -> Result<()> {
        log::trace!("lowering function '{}'", f.ident);
        let return_type = match f.ret_type {
            FuncRetType::Int => Type::I32,
            FuncRetType::Void => Type::Unit,
        };
        self.scope.enter_func(return_type.clone(), f.ident);

        let mut params = Vec::with_capacity(f.params.len());
        for ident in &f.params {
            let operand = self.new_temp(Type::I32);
            params.push(Param { ident: *ident, operand });
        }
        self.scope.current_func_mut().params = params;

        self.scope.register_signature(Signature {
            return_type,
            ident: f.ident,
            params: vec![Type::I32; f.params.len()],
        });
        self.scope.alloc_and_store_for_params()?;

        self.lower_block(&f.body)?;

        {
            let next_temp = &mut self.next_temp;
            let func = self.scope.current_func_mut();
            func.finalize(|| {
                let t = *next_temp;
                *next_temp += 1;
                Operand::named(format!("%{t}"), Type::I32)
            });
        }

        let func = self.scope.exit_func();
        self.program.push_function(func);
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> Result<()> {
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.lower_local_decl(decl)?,
                BlockItem::Stmt(stmt) => self.lower_stmt(stmt)?,
            }
        }
        Ok(())
    }

    // ---- statements (spec §4.6.4) -------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { lval, exp } => {
                let addr = self.lower_lval_addr(lval)?;
                let value = self.lower_exp(exp)?;
                self.append_instr(Instruction::Store { value, addr });
                Ok(())
            }
            Stmt::Exp(Some(e)) => {
                self.lower_exp(e)?;
                Ok(())
            }
            Stmt::Exp(None) => Ok(()),
            Stmt::Block(block) => {
                self.scope.push_scope();
                let result = self.lower_block(block);
                self.scope.pop_scope();
                result
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body } => self.lower_while(cond, body),
            Stmt::Break => self.lower_break(),
            Stmt::Continue => self.lower_continue(),
            Stmt::Return(exp) => self.lower_return(exp.as_ref()),
        }
    }

    fn lower_if(&mut self, cond: &Exp, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Result<()> {
        let cond_val = self.lower_exp(cond)?;
        let true_label = self.scope.current_func_mut().get_koopa_var_name("%true_block");
        let end_label = self.scope.current_func_mut().get_koopa_var_name("%end_if");

        if let Some(else_stmt) = else_branch {
            let else_label = self.scope.current_func_mut().get_koopa_var_name("%else_block");
            self.scope.current_func_mut().end_current_block_by_instr(
                Instruction::Branch {
                    cond: cond_val,
                    tt: Operand::block(true_label.clone()),
                    ff: Operand::block(else_label.clone()),
                },
                true,
                Some(true_label),
            )?;

            self.scope.push_scope();
            self.lower_stmt(then_branch)?;
            self.scope.pop_scope();
            self.scope.current_func_mut().end_current_block_by_instr(
                Instruction::Jump {
                    target: Operand::block(end_label.clone()),
                },
                true,
                Some(else_label),
            )?;

            self.scope.push_scope();
            self.lower_stmt(else_stmt)?;
            self.scope.pop_scope();
            self.scope.current_func_mut().end_current_block_by_instr(
                Instruction::Jump {
                    target: Operand::block(end_label.clone()),
                },
                true,
                Some(end_label),
            )?;
        } else {
            self.scope.current_func_mut().end_current_block_by_instr(
                Instruction::Branch {
                    cond: cond_val,
                    tt: Operand::block(true_label.clone()),
                    ff: Operand::block(end_label.clone()),
                },
                true,
                Some(true_label),
            )?;

            self.scope.push_scope();
            self.lower_stmt(then_branch)?;
            self.scope.pop_scope();
            self.scope.current_func_mut().end_current_block_by_instr(
                Instruction::Jump {
                    target: Operand::block(end_label.clone()),
                },
                true,
                Some(end_label),
            )?;
        }
        Ok(())
    }

    fn lower_while(&mut self, cond: &Exp, body: &Stmt) -> Result<()> {
        let entry_label = self.scope.current_func_mut().get_koopa_var_name("%while_entry");
        let body_label = self.scope.current_func_mut().get_koopa_var_name("%while_body");
        let after_label = self.scope.current_func_mut().get_koopa_var_name("%end_while");

        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(entry_label.clone()),
            },
            true,
            Some(entry_label.clone()),
        )?;

        let cond_val = self.lower_exp(cond)?;
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Branch {
                cond: cond_val,
                tt: Operand::block(body_label.clone()),
                ff: Operand::block(after_label.clone()),
            },
            true,
            Some(body_label),
        )?;

        self.scope
            .current_func_mut()
            .enter_loop(entry_label.clone(), after_label.clone());
        self.scope.push_scope();
        let result = self.lower_stmt(body);
        self.scope.pop_scope();
        self.scope.current_func_mut().exit_loop();
        result?;

        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(entry_label),
            },
            true,
            Some(after_label),
        )?;
        Ok(())
    }

    fn lower_break(&mut self) -> Result<()> {
        let after_label = self
            .scope
            .current_func_mut()
            .current_loop_info()
            .map(|l| l.after_label.clone())
            .ok_or(CompileError::LoopContextError("break"))?;
        let new_body_label = self.scope.current_func_mut().get_koopa_var_name("%while_body");
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(after_label),
            },
            true,
            Some(new_body_label),
        )?;
        Ok(())
    }

    fn lower_continue(&mut self) -> Result<()> {
        let entry_label = self
            .scope
            .current_func_mut()
            .current_loop_info()
            .map(|l| l.entry_label.clone())
            .ok_or(CompileError::LoopContextError("continue"))?;
        let new_body_label = self.scope.current_func_mut().get_koopa_var_name("%while_body");
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(entry_label),
            },
            true,
            Some(new_body_label),
        )?;
        Ok(())
    }

    fn lower_return(&mut self, exp: Option<&Exp>) -> Result<()> {
        if let Some(e) = exp {
            let val = self.lower_exp(e)?;
            let ret_slot = self
                .scope
                .current_func_mut()
                .ret_slot
                .clone()
                .expect("return with a value requires an i32 return slot");
            self.append_instr(Instruction::Store {
                value: val,
                addr: ret_slot,
            });
        }
        let end_label = self.scope.current_func_mut().end.label.clone();
        let after_ret_label = self.scope.current_func_mut().get_koopa_var_name("%after_ret");
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(end_label),
            },
            true,
            Some(after_ret_label),
        )?;
        Ok(())
    }

    // ---- expressions (spec §4.6.3) ------------------------------------------

    fn lower_exp(&mut self, exp: &Exp) -> Result<Operand> {
        match exp {
            Exp::Number(n) => Ok(Operand::imm(*n)),
            Exp::LVal(lval) => self.lower_lval_rvalue(lval),
            Exp::Call { ident, args } => self.lower_call(*ident, args),
            Exp::Unary { op, operand } => self.lower_unary(*op, operand),
            Exp::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => self.lower_short_circuit(true, lhs, rhs),
            Exp::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => self.lower_short_circuit(false, lhs, rhs),
            Exp::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Exp) -> Result<Operand> {
        let val = self.lower_exp(operand)?;
        match op {
            UnaryOp::Plus => Ok(val),
            UnaryOp::Minus => self.emit_binary(BinOp::Sub, Operand::imm(0), val),
            UnaryOp::Not => self.emit_binary(BinOp::Eq, val, Operand::imm(0)),
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Exp, rhs: &Exp) -> Result<Operand> {
        let l = self.lower_exp(lhs)?;
        let r = self.lower_exp(rhs)?;
        let bop = match op {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::Div,
            BinaryOp::Mod => BinOp::Mod,
            BinaryOp::Lt => BinOp::Lt,
            BinaryOp::Le => BinOp::Le,
            BinaryOp::Gt => BinOp::Gt,
            BinaryOp::Ge => BinOp::Ge,
            BinaryOp::Eq => BinOp::Eq,
            BinaryOp::Ne => BinOp::Ne,
            BinaryOp::And | BinaryOp::Or => unreachable!("handled by lower_short_circuit"),
        };
        self.emit_binary(bop, l, r)
    }

    fn emit_binary(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> Result<Operand> {
        let dst = self.new_temp(Type::I32);
        self.append_instr(Instruction::Binary {
            op,
            dst: dst.clone(),
            lhs,
            rhs,
        });
        Ok(dst)
    }

    /// `&&`/`||` short-circuit through explicit control flow rather than a
    /// plain `and`/`or` instruction: a result slot is allocated in the entry
    /// block, the left operand is always evaluated, and the right operand is
    /// evaluated only on the branch where it is needed. The slot's name is
    /// drawn from the shared temp counter (`%and_7`, `%or_12`, ...), not from
    /// the function's own named-stem counter, since it is an anonymous
    /// compiler temporary, not a source-named local.
    fn lower_short_circuit(&mut self, is_and: bool, lhs: &Exp, rhs: &Exp) -> Result<Operand> {
        let end_label = self
            .scope
            .current_func_mut()
            .get_koopa_var_name(if is_and { "%end_and_block" } else { "%end_or_block" });
        let branch_label = self
            .scope
            .current_func_mut()
            .get_koopa_var_name(if is_and { "%and_true_block" } else { "%or_false_block" });

        let n = self.alloc_temp_num();
        let result_slot = Operand::address(format!("%{}_{n}", if is_and { "and" } else { "or" }), Type::I32);
        self.scope
            .current_func_mut()
            .append_alloc_to_entry_block(Instruction::Alloc {
                dst: result_slot.clone(),
            });

        let lhs_val = self.lower_exp(lhs)?;
        let lhs_bool = self.emit_binary(BinOp::Ne, lhs_val, Operand::imm(0))?;
        self.append_instr(Instruction::Store {
            value: lhs_bool.clone(),
            addr: result_slot.clone(),
        });
        let (tt, ff) = if is_and {
            (Operand::block(branch_label.clone()), Operand::block(end_label.clone()))
        } else {
            (Operand::block(end_label.clone()), Operand::block(branch_label.clone()))
        };
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Branch {
                cond: lhs_bool,
                tt,
                ff,
            },
            true,
            Some(branch_label),
        )?;

        let rhs_val = self.lower_exp(rhs)?;
        let rhs_bool = self.emit_binary(BinOp::Ne, rhs_val, Operand::imm(0))?;
        self.append_instr(Instruction::Store {
            value: rhs_bool,
            addr: result_slot.clone(),
        });
        self.scope.current_func_mut().end_current_block_by_instr(
            Instruction::Jump {
                target: Operand::block(end_label.clone()),
            },
            true,
            Some(end_label),
        )?;

        Ok(self.new_temp_load(result_slot))
    }

    fn lower_call(&mut self, ident: Id, args: &[Exp]) -> Result<Operand> {
        let mut arg_ops = Vec::with_capacity(args.len());
        for a in args {
            arg_ops.push(self.lower_exp(a)?);
        }
        let ret_type = self.scope.get_func_type_by_ident(ident)?;
        if ret_type == Type::I32 {
            let dst = self.new_temp(Type::I32);
            self.append_instr(Instruction::Call {
                dst: Some(dst.clone()),
                callee: ident,
                args: arg_ops,
            });
            Ok(dst)
        } else {
            self.append_instr(Instruction::Call {
                dst: None,
                callee: ident,
                args: arg_ops,
            });
            // a void call's result is never read by a well-formed caller
            Ok(Operand::imm(0))
        }
    }

    fn lower_lval_addr(&mut self, lval: &LVal) -> Result<Operand> {
        let var = self.scope.get_var_by_ident(lval.ident)?.clone();
        if var.is_const && var.ty == Type::I32 {
            let v = var
                .const_val
                .expect("a const scalar always has a computed value");
            return Ok(Operand::imm(v));
        }
        if !var.ty.is_array() {
            return Ok(Operand::address(var.emitted_name, Type::I32));
        }
        if lval.indices.is_empty() {
            return Err(CompileError::TypeMismatch(format!(
                "'{}' is an array and must be indexed",
                lval.ident
            )));
        }
        let base = Operand::address(var.emitted_name, var.ty.clone());
        let mut pointee = var.ty.pointee().clone();
        let idx0 = self.lower_exp(&lval.indices[0])?;
        let mut cur = self.new_temp_addr(pointee.clone());
        self.append_instr(Instruction::GetElemPtr {
            dst: cur.clone(),
            base,
            index: idx0,
        });
        for idx_exp in &lval.indices[1..] {
            pointee = pointee.pointee().clone();
            let idx = self.lower_exp(idx_exp)?;
            let next = self.new_temp_addr(pointee.clone());
            self.append_instr(Instruction::GetElemPtr {
                dst: next.clone(),
                base: cur,
                index: idx,
            });
            cur = next;
        }
        Ok(cur)
    }

    fn lower_lval_rvalue(&mut self, lval: &LVal) -> Result<Operand> {
        let addr = self.lower_lval_addr(lval)?;
        if addr.is_i32() {
            Ok(addr)
        } else {
            Ok(self.new_temp_load(addr))
        }
    }
}

fn unflatten_index(mut flat: usize, dims_outermost_first: &[usize]) -> Vec<usize> {
    let mut out = vec![0; dims_outermost_first.len()];
    for i in (0..dims_outermost_first.len()).rev() {
        out[i] = flat % dims_outermost_first[i];
        flat /= dims_outermost_first[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;

    fn lower_src(src: &str) -> Result<Program> {
        let unit = parse(src).expect("test input must parse");
        lower(&unit)
    }

    #[test]
    fn minimal_main_returns_a_constant() {
        let prog = lower_src("int main() { return 0; }").unwrap();
        let text = prog.to_string();
        assert!(text.contains("fun @main(): i32 {"));
        assert!(text.contains("ret %"));
    }

    #[test]
    fn global_array_initializer_reshapes_and_zero_fills() {
        let prog = lower_src("int a[2][2] = {1, 2};").unwrap();
        let text = prog.to_string();
        assert!(text.contains("global @a = alloc [[i32, 2], 2], {{1, 2}, {0, 0}}"));
    }

    #[test]
    fn constant_folding_sizes_an_array() {
        let prog = lower_src("const int N = 2 + 3; int a[N];").unwrap();
        let text = prog.to_string();
        assert!(text.contains("global @a = alloc [i32, 5], zeroinit"));
        // the const itself is inlined, never emitted as a global
        assert!(!text.contains("@N"));
    }

    #[test]
    fn short_circuit_and_allocates_a_result_slot() {
        let prog = lower_src(
            "int main() { int a; int b; a = 1; b = 0; if (a && b) { return 1; } return 0; }",
        )
        .unwrap();
        let text = prog.to_string();
        assert!(text.contains("%and_true_block_0"));
        assert!(text.contains("%end_and_block_0"));
        assert!(text.contains("= alloc i32"));
    }

    #[test]
    fn break_outside_a_loop_is_an_error() {
        let err = lower_src("int main() { break; return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn void_call_discards_its_result() {
        let prog = lower_src("int main() { putint(1); return 0; }").unwrap();
        assert!(prog.to_string().contains("call @putint(1)"));
    }

    #[test]
    fn recursive_call_resolves_against_its_own_signature() {
        let prog = lower_src("int fib(int n) { return fib(n); }").unwrap();
        assert!(prog.to_string().contains("call @fib("));
    }

    #[test]
    fn while_loop_emits_entry_body_and_after_labels() {
        let prog = lower_src("int main() { int i; i = 0; while (i) { i = i - 1; } return 0; }").unwrap();
        let text = prog.to_string();
        assert!(text.contains("%while_entry_0"));
        assert!(text.contains("%while_body_0"));
        assert!(text.contains("%end_while_0"));
    }

    #[test]
    fn or_short_circuits_and_calls_its_right_side_at_most_once() {
        let prog = lower_src(
            "int f() { return 1; } int g() { return 1; } \
             int main() { if (f() || g()) { return 1; } return 0; }",
        )
        .unwrap();
        let text = prog.to_string();
        assert_eq!(text.matches("call @f(").count(), 1);
        assert_eq!(text.matches("call @g(").count(), 1);
        assert!(text.contains("%or_false_block_0"));
    }
}
