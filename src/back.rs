//! The back-end of the compiler: Koopa IR text to RISC-V (RV32) assembly
//! (spec §4.7). Never walks the front end's own [`crate::ir`] model —
//! Koopa IR text is the sole interface between the two stages, so the back
//! end reparses it through the real `koopa` crate and walks the resulting
//! read-only raw program, exactly like an independently invoked backend
//! would.

pub mod asm;
pub mod codegen;
pub mod frame;
pub mod raw;

use crate::error::Result;

/// Compiles Koopa IR text all the way to RISC-V assembly text.
pub fn generate_riscv(koopa_text: &str) -> Result<String> {
    log::debug!("reparsing Koopa IR through the external parser");
    let program = raw::parse(koopa_text)?;
    let raw_program = raw::to_raw(&program);
    log::debug!("walking raw program ({} function(s))", raw_program.funcs().len());
    let asm = codegen::generate(&raw_program)?;
    Ok(asm.asm_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_constant_return() {
        let text = "decl @getint(): i32\n\nfun @main(): i32 {\n%entry:\n  ret 0\n}\n";
        let asm = generate_riscv(text).expect("must compile");
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("main:"));
    }
}
