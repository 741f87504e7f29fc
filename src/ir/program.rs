//! Whole-program assembly: standard-library declarations, globals, and user
//! functions, in source order (spec §3, §4.4, §4.6.6).

use std::fmt;

use crate::common::Id;
use crate::ir::function::Function;
use crate::ir::types::Type;

/// A reshaped initializer tree, the output of array reshaping (spec §4.5)
/// and the direct input to both global and local initializer emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlobalInit {
    Zero,
    Int(i32),
    Aggregate(Vec<GlobalInit>),
}

impl fmt::Display for GlobalInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalInit::Zero => write!(f, "zeroinit"),
            GlobalInit::Int(v) => write!(f, "{v}"),
            GlobalInit::Aggregate(children) => {
                write!(f, "{{")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Global {
    pub ident: Id,
    pub ty: Type,
    pub init: GlobalInit,
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global @{} = alloc {}, {}", self.ident, self.ty, self.init)
    }
}

/// A top-level compilation unit item, in the order it appeared in the
/// source file.
pub enum Item {
    Global(Global),
    Function(Function),
}

/// The whole program: the fixed standard-library declarations followed by
/// every top-level item in source order.
#[derive(Default)]
pub struct Program {
    pub items: Vec<Item>,
}

/// The eight bit-exact standard library signatures (spec §6), always
/// emitted as `decl` lines ahead of user code regardless of whether a
/// given program actually calls them.
pub const STDLIB_DECLS: &[(&str, &[&str], &str)] = &[
    ("getint", &[], "i32"),
    ("getch", &[], "i32"),
    ("getarray", &["*i32"], "i32"),
    ("putint", &["i32"], ""),
    ("putch", &["i32"], ""),
    ("putarray", &["i32", "*i32"], ""),
    ("starttime", &[], ""),
    ("stoptime", &[], ""),
];

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    pub fn push_global(&mut self, global: Global) {
        self.items.push(Item::Global(global));
    }

    pub fn push_function(&mut self, func: Function) {
        self.items.push(Item::Function(func));
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, params, ret) in STDLIB_DECLS {
            write!(f, "decl @{name}(")?;
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")?;
            if !ret.is_empty() {
                write!(f, ": {ret}")?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;
        for item in &self.items {
            match item {
                Item::Global(g) => writeln!(f, "{g}")?,
                Item::Function(func) => write!(f, "{func}")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::id;

    #[test]
    fn stdlib_decls_precede_user_items() {
        let prog = Program::new();
        let text = prog.to_string();
        assert!(text.starts_with("decl @getint(): i32"));
        assert!(text.contains("decl @putarray(i32, *i32)\n"));
        assert!(text.contains("decl @starttime()\n"));
    }

    #[test]
    fn global_init_printing() {
        let g = Global {
            ident: id("x"),
            ty: Type::I32,
            init: GlobalInit::Int(7),
        };
        assert_eq!(g.to_string(), "global @x = alloc i32, 7");

        let arr = Global {
            ident: id("a"),
            ty: Type::array(Type::I32, 2),
            init: GlobalInit::Aggregate(vec![GlobalInit::Int(1), GlobalInit::Int(2)]),
        };
        assert_eq!(arr.to_string(), "global @a = alloc [i32, 2], {1, 2}");
    }

    #[test]
    fn uninitialized_global_is_zeroinit() {
        let g = Global {
            ident: id("y"),
            ty: Type::I32,
            init: GlobalInit::Zero,
        };
        assert_eq!(g.to_string(), "global @y = alloc i32, zeroinit");
    }
}
