//! Bridges the crate's own Koopa IR text (spec §3's front-end output) into
//! the read-only "raw program" view the real `koopa` crate hands to
//! backends (spec §4.7.1). The back end never walks `crate::ir` directly:
//! it reparses the emitted text through `koopa::front`, exactly the way a
//! separately invoked RISC-V backend would consume someone else's `.koopa`
//! file.

use koopa::front::Driver;
use koopa::ir::Program as KoopaProgram;

pub use koopa::ir::raw::{
    BasicBlock as RawBasicBlock, Function as RawFunction, Program as RawProgram,
    Type as RawType, TypeKind as RawTypeKind, Value as RawValue, ValueKind,
};
pub use koopa::ir::BinaryOp;

use crate::error::{CompileError, Result};

/// Parses Koopa IR text into the crate's in-memory `koopa::ir::Program`.
/// Kept as a distinct step from [`to_raw`] because the raw view borrows
/// from this program's arena and must not outlive it.
pub fn parse(koopa_text: &str) -> Result<KoopaProgram> {
    Driver::from(koopa_text.to_string())
        .generate_program()
        .map_err(|e| CompileError::Koopa(format!("{e:?}")))
}

/// The read-only, pointer-based view the backend walks: one slice of
/// global values and one slice of functions, matching libkoopa's
/// `koopa_raw_program_t` one-to-one.
pub fn to_raw(program: &KoopaProgram) -> RawProgram<'_> {
    program.generate_raw_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_koopa_text() {
        let text = "decl @getint(): i32\n\nfun @main(): i32 {\n%entry:\n  ret 0\n}\n";
        let program = parse(text).expect("valid koopa text must parse");
        let raw = to_raw(&program);
        assert_eq!(raw.funcs().len(), 1);
    }
}
