//! Crate-wide error taxonomy.
//!
//! Every failure here is fatal: the compiler accepts a well-defined input
//! subset, so there is no recovery story, only a single diagnostic message
//! on the way out (see `bin/sysyc.rs`).

use thiserror::Error;

use crate::front::lex::LexError;
use crate::front::parse::ParseError;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown identifier: {0}")]
    UnknownIdent(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("block termination error: {0}")]
    BlockTerminationError(String),

    #[error("'{0}' outside of any loop")]
    LoopContextError(&'static str),

    #[error("array initializer shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("redeclaration of '{0}' in the same scope")]
    Redeclaration(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("koopa IR error: {0}")]
    Koopa(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
