//! `sysyc`: the compiler's command-line entry point.
//!
//! ```text
//! sysyc -koopa input.c -o output.koopa
//! sysyc -riscv input.c -o output.s
//! sysyc -debug input.c -o output.txt
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sysyc::front;
use sysyc::{back, Result};

#[derive(Parser)]
#[command(name = "sysyc", about = "A SysY to RISC-V compiler")]
struct Args {
    /// Compilation mode: `-debug` (dump the AST), `-koopa` (emit Koopa IR
    /// text), or `-riscv` (emit RISC-V assembly).
    #[arg(allow_hyphen_values = true)]
    mode: String,

    /// The SysY source file to compile.
    input: PathBuf,

    #[arg(short = 'o')]
    output: PathBuf,
}

fn run(args: Args) -> Result<()> {
    log::debug!("reading {}", args.input.display());
    let source = fs::read_to_string(&args.input)?;

    log::debug!("parsing {}", args.input.display());
    let ast = front::parse(&source)?;

    let rendered = match args.mode.as_str() {
        "-debug" => format!("{ast:#?}\n"),
        "-koopa" => {
            log::debug!("lowering AST to Koopa IR");
            let program = front::lower(&ast)?;
            program.to_string()
        }
        "-riscv" => {
            log::debug!("lowering AST to Koopa IR");
            let program = front::lower(&ast)?;
            log::debug!("generating RISC-V assembly");
            back::generate_riscv(&program.to_string())?
        }
        other => {
            return Err(sysyc::CompileError::InvalidOperator(format!(
                "unknown mode '{other}', expected -debug, -koopa, or -riscv"
            )))
        }
    };

    log::debug!("writing {}", args.output.display());
    fs::write(&args.output, rendered)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
