// Error taxonomy for the code generator.
//
// Grounded on `lua_vm/lua_error.rs`'s two-layer design: a small `Copy` kind
// enum (cheap to pass around, cheap to match on) plus a richer struct that
// carries the message and source position. Display is implemented by hand,
// matching the teacher's convention of not pulling in `thiserror` for this
// layer.

use std::fmt;

/// A position in the original source, as handed down by the lexer/parser.
/// The generator never computes these itself; it only threads them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
}

impl SourcePos {
    pub const fn new(line: u32) -> Self {
        SourcePos { line }
    }
}

/// The kind of failure, independent of where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// Attempted to use a `nil` value as a table key.
    IndexIsNil,
    /// Attempted to use a NaN value as a table key.
    IndexIsNaN,
    /// The constant table would exceed the 18-bit `Bx` index space.
    ConstantOverflow,
    /// More than 200 active locals in one function.
    TooManyLocals,
    /// An assignment names more variables than the register file can track.
    TooManyVariablesInAssignment,
    /// The function's register watermark would exceed the 250-register limit.
    StackOverflow,
    /// Generic code-generation failure with no more specific kind.
    CompileError,
}

impl fmt::Display for CodegenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CodegenErrorKind::IndexIsNil => "table index is nil",
            CodegenErrorKind::IndexIsNaN => "table index is NaN",
            CodegenErrorKind::ConstantOverflow => "too many constants in function",
            CodegenErrorKind::TooManyLocals => "too many local variables",
            CodegenErrorKind::TooManyVariablesInAssignment => {
                "too many variables in assignment"
            }
            CodegenErrorKind::StackOverflow => "function or expression too complex",
            CodegenErrorKind::CompileError => "compile error",
        };
        write!(f, "{s}")
    }
}

impl std::error::Error for CodegenErrorKind {}

/// A code-generation failure: its kind, a human message and the source
/// position it originated at. The driver surfaces this directly; there is
/// no recovery path inside the generator (§7 — all errors abort the current
/// compilation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub message: String,
    pub pos: SourcePos,
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, pos: SourcePos, message: impl Into<String>) -> Self {
        CodegenError {
            kind,
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.pos.line, self.kind, self.message)
    }
}

impl std::error::Error for CodegenError {}

pub type CodegenResult<T> = Result<T, CodegenError>;
