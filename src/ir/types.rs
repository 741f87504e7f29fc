//! The Koopa IR type algebra and operand model (spec §3, §4.1).

use std::fmt;
use std::rc::Rc;

/// A Koopa IR type.
///
/// Printing is bit-exact with the textual grammar: `i32`, `*T`, `[T, N]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    I32,
    Pointer(Rc<Type>),
    Array(Rc<Type>, usize),
    /// The type of a basic block label, used only internally to tag
    /// [`Operand`]s that name a block; never printed on its own.
    BlockLabel,
    Unit,
}

impl Type {
    pub fn ptr(base: Type) -> Type {
        Type::Pointer(Rc::new(base))
    }

    pub fn array(element: Type, len: usize) -> Type {
        Type::Array(Rc::new(element), len)
    }

    /// The type pointed to by a pointer, or the element type of an array.
    pub fn pointee(&self) -> &Type {
        match self {
            Type::Pointer(t) => t,
            Type::Array(t, _) => t,
            _ => panic!("pointee() called on a type with no element type: {self:?}"),
        }
    }

    /// Outermost-first array dimensions, e.g. `[[[i32, 4], 3], 2]` -> `[2, 3, 4]`.
    pub fn array_dims(&self) -> Vec<usize> {
        let mut dims = Vec::new();
        let mut cur = self;
        while let Type::Array(inner, len) = cur {
            dims.push(*len);
            cur = inner;
        }
        dims
    }

    /// The scalar element type at the bottom of a (possibly nested) array type.
    pub fn array_base(&self) -> &Type {
        let mut cur = self;
        while let Type::Array(inner, _) = cur {
            cur = inner;
        }
        cur
    }

    /// Size in bytes, used by the back end for stack slot sizing and
    /// `.zero`/array-walking in global emission.
    pub fn size_of(&self) -> usize {
        match self {
            Type::I32 | Type::Pointer(_) => 4,
            Type::Array(elem, len) => len * elem.size_of(),
            Type::BlockLabel | Type::Unit => 0,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I32 => write!(f, "i32"),
            Type::Pointer(t) => write!(f, "*{t}"),
            Type::Array(t, n) => write!(f, "[{t}, {n}]"),
            Type::BlockLabel => write!(f, "<label>"),
            Type::Unit => Ok(()),
        }
    }
}

/// The value a symbolic [`Operand`] carries: either an immediate or a
/// verbatim textual name (`%0`, `@x_1`, `@x`, `%end_0`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssocValue {
    Imm(i32),
    Name(String),
}

/// An operand: an associated value paired with its type.
///
/// Operands are cheap and copied by value, matching the source's
/// `std::variant<int, std::string>` plus `OperandType` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    pub value: AssocValue,
    pub ty: Type,
}

impl Operand {
    pub fn imm(v: i32) -> Operand {
        Operand {
            value: AssocValue::Imm(v),
            ty: Type::I32,
        }
    }

    /// A plain named operand of type `ty` (an already-loaded i32 temp, a
    /// block label, ...).
    pub fn named(name: impl Into<String>, ty: Type) -> Operand {
        Operand {
            value: AssocValue::Name(name.into()),
            ty,
        }
    }

    /// An operand naming an address: the operand's type is `*pointee`.
    pub fn address(name: impl Into<String>, pointee: Type) -> Operand {
        Operand {
            value: AssocValue::Name(name.into()),
            ty: Type::ptr(pointee),
        }
    }

    pub fn block(label: impl Into<String>) -> Operand {
        Operand {
            value: AssocValue::Name(label.into()),
            ty: Type::BlockLabel,
        }
    }

    pub fn is_i32(&self) -> bool {
        self.ty == Type::I32
    }

    pub fn name(&self) -> &str {
        match &self.value {
            AssocValue::Name(s) => s,
            AssocValue::Imm(_) => panic!("Operand::name() called on an immediate"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            AssocValue::Imm(v) => write!(f, "{v}"),
            AssocValue::Name(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_printing_is_bit_exact() {
        assert_eq!(Type::I32.to_string(), "i32");
        assert_eq!(Type::ptr(Type::I32).to_string(), "*i32");
        assert_eq!(Type::array(Type::I32, 4).to_string(), "[i32, 4]");
        let nested = Type::array(Type::array(Type::array(Type::I32, 4), 3), 2);
        assert_eq!(nested.to_string(), "[[[i32, 4], 3], 2]");
    }

    #[test]
    fn array_dims_are_outermost_first() {
        let nested = Type::array(Type::array(Type::array(Type::I32, 4), 3), 2);
        assert_eq!(nested.array_dims(), vec![2, 3, 4]);
    }

    #[test]
    fn size_of_arrays_multiplies_dims() {
        let nested = Type::array(Type::array(Type::I32, 4), 3);
        assert_eq!(nested.size_of(), 3 * 4 * 4);
    }
}
