//! Scope and symbol resolution (spec §3, §4.4).

use crate::common::{id, Id, Map};
use crate::error::CompileError;
use crate::front::array::Array;
use crate::ir::function::Function;
use crate::ir::instr::Instruction;
use crate::ir::program::STDLIB_DECLS;
use crate::ir::types::{Operand, Type};
use crate::Result;

/// A function signature: return type, name, and ordered parameter types.
/// Standard-library signatures are pre-registered at [`Scope::new`].
#[derive(Clone, Debug)]
pub struct Signature {
    pub return_type: Type,
    pub ident: Id,
    pub params: Vec<Type>,
}

/// A resolved symbol: either a scalar/array local or a global, const or not.
///
/// For a const scalar, `const_val` holds the value used to inline every
/// read. For a const or non-const array, reads always go through
/// `emitted_name` (arrays are never inlined, even when const).
#[derive(Clone, Debug)]
pub struct Variable {
    pub ty: Type,
    pub is_const: bool,
    pub emitted_name: String,
    pub const_val: Option<i32>,
    pub const_array: Option<Array<i32>>,
}

impl Variable {
    pub fn scalar(ty: Type, emitted_name: impl Into<String>) -> Variable {
        Variable {
            ty,
            is_const: false,
            emitted_name: emitted_name.into(),
            const_val: None,
            const_array: None,
        }
    }

    pub fn const_scalar(emitted_name: impl Into<String>, value: i32) -> Variable {
        Variable {
            ty: Type::I32,
            is_const: true,
            emitted_name: emitted_name.into(),
            const_val: Some(value),
            const_array: None,
        }
    }

    pub fn array(ty: Type, emitted_name: impl Into<String>, is_const: bool) -> Variable {
        Variable {
            ty,
            is_const,
            emitted_name: emitted_name.into(),
            const_val: None,
            const_array: None,
        }
    }
}

/// A stack of `{ident -> Variable}` tables. The bottommost table is the
/// global scope; entering a function pushes a function-level table, and
/// blocks push further tables of their own.
pub struct Scope {
    tables: Vec<Map<Id, Variable>>,
    pub signatures: Vec<Signature>,
    pub current_func: Option<Function>,
}

impl Scope {
    pub fn new() -> Scope {
        let mut scope = Scope {
            tables: vec![Map::new()],
            signatures: Vec::new(),
            current_func: None,
        };
        for (name, params, ret) in STDLIB_DECLS {
            let return_type = if ret.is_empty() { Type::Unit } else { Type::I32 };
            let params = params
                .iter()
                .map(|p| if *p == "*i32" { Type::ptr(Type::I32) } else { Type::I32 })
                .collect();
            scope.signatures.push(Signature {
                return_type,
                ident: id(*name),
                params,
            });
        }
        scope
    }

    pub fn register_signature(&mut self, sig: Signature) {
        self.signatures.push(sig);
    }

    pub fn get_func_type_by_ident(&self, ident: Id) -> Result<Type> {
        self.signatures
            .iter()
            .find(|s| s.ident == ident)
            .map(|s| s.return_type.clone())
            .ok_or_else(|| CompileError::UnknownIdent(ident.to_string()))
    }

    pub fn get_var_by_ident(&self, ident: Id) -> Result<&Variable> {
        for table in self.tables.iter().rev() {
            if let Some(var) = table.get(&ident) {
                return Ok(var);
            }
        }
        Err(CompileError::UnknownIdent(ident.to_string()))
    }

    /// Inserts into the innermost table. Shadowing across scopes is
    /// allowed; redeclaring the same ident within one scope is rejected
    /// (spec.md §9's recommended resolution for this open question, see
    /// `DESIGN.md`).
    pub fn insert_var(&mut self, ident: Id, var: Variable) -> Result<()> {
        let table = self.tables.last_mut().expect("scope stack is never empty");
        if table.contains_key(&ident) {
            return Err(CompileError::Redeclaration(ident.to_string()));
        }
        table.insert(ident, var);
        Ok(())
    }

    pub fn push_scope(&mut self) {
        self.tables.push(Map::new());
    }

    pub fn pop_scope(&mut self) {
        self.tables.pop();
    }

    /// Allocates a fresh [`Function`] and pushes its scope. Every
    /// already-known global identifier and function signature identifier
    /// is pre-registered into the function's name counter, so an emitted
    /// local can never collide with a global or a callee name.
    pub fn enter_func(&mut self, return_type: Type, ident: Id) {
        let mut func = Function::new(ident, return_type);
        for global_ident in self.tables[0].keys() {
            func.reserve_name_stem(&global_ident.to_string());
        }
        for sig in &self.signatures {
            func.reserve_name_stem(&sig.ident.to_string());
        }
        self.current_func = Some(func);
        self.push_scope();
    }

    pub fn exit_func(&mut self) -> Function {
        self.pop_scope();
        self.current_func
            .take()
            .expect("exit_func called without a matching enter_func")
    }

    pub fn current_func_mut(&mut self) -> &mut Function {
        self.current_func
            .as_mut()
            .expect("no function is currently being lowered")
    }

    /// For each formal parameter, synthesizes an `alloc` in the entry
    /// block plus a `store` of the incoming parameter operand, then
    /// registers the local under its source identifier. This gives
    /// parameters the same memory-backed semantics as other locals.
    pub fn alloc_and_store_for_params(&mut self) -> Result<()> {
        let func = self.current_func_mut();
        let params = func.params.clone();
        let mut inserts = Vec::with_capacity(params.len());
        for param in &params {
            let slot_name = format!("@{}", func.get_koopa_var_name(&param.ident.to_string()));
            let slot = Operand::address(slot_name.clone(), Type::I32);
            func.append_alloc_to_entry_block(Instruction::Alloc { dst: slot.clone() });
            func.append_instr_to_current_block(Instruction::Store {
                value: param.operand.clone(),
                addr: slot,
            });
            inserts.push((param.ident, Variable::scalar(Type::I32, slot_name)));
        }
        for (ident, var) in inserts {
            self.insert_var(ident, var)?;
        }
        Ok(())
    }
}

impl Default for Scope {
    fn default() -> Scope {
        Scope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_signatures_are_preregistered() {
        let scope = Scope::new();
        assert_eq!(scope.get_func_type_by_ident(id("getint")).unwrap(), Type::I32);
        assert_eq!(scope.get_func_type_by_ident(id("putint")).unwrap(), Type::Unit);
        assert!(scope.get_func_type_by_ident(id("nope")).is_err());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut scope = Scope::new();
        scope.insert_var(id("x"), Variable::const_scalar("1", 1)).unwrap();
        scope.push_scope();
        scope.insert_var(id("x"), Variable::const_scalar("2", 2)).unwrap();
        assert_eq!(scope.get_var_by_ident(id("x")).unwrap().const_val, Some(2));
        scope.pop_scope();
        assert_eq!(scope.get_var_by_ident(id("x")).unwrap().const_val, Some(1));
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_rejected() {
        let mut scope = Scope::new();
        scope.insert_var(id("x"), Variable::const_scalar("1", 1)).unwrap();
        let err = scope.insert_var(id("x"), Variable::const_scalar("2", 2)).unwrap_err();
        assert!(matches!(err, CompileError::Redeclaration(_)));
    }

    #[test]
    fn unknown_ident_is_an_error() {
        let scope = Scope::new();
        assert!(scope.get_var_by_ident(id("missing")).is_err());
    }
}
