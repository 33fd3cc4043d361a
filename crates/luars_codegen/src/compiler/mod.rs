//! The single-pass code generator: walks an already-parsed [`crate::ast`]
//! tree and emits Lua 5.1 bytecode for it, register-watermark style —
//! `FuncState` tracks the live register frontier as each statement and
//! expression is visited exactly once (§1, §4 design note). No separate
//! optimization pass exists; the only non-trivial rewrites are constant
//! folding (§4.3) and the `return f(...)` → `TAILCALL` rule (§4.4), both
//! applied inline as each node is visited.

pub mod code;
pub mod discharge;
pub mod expdesc;
pub mod expr;
pub mod fold;
pub mod func_state;
pub mod stmt;

use smol_str::SmolStr;

use crate::ast::Chunk;
use crate::error::{CodegenResult, SourcePos};
use crate::value::Constant;

use func_state::FuncState;

/// Driver-facing compile settings (§A.2 of the ambient surface this crate
/// adds around the core generator).
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Name recorded in the resulting prototype's debug info (`@chunkname`
    /// in the reference compiler); `None` falls back to `"?"`, matching
    /// `luaO_chunkid`'s behavior for an unnamed chunk.
    pub source_name: Option<String>,
    /// Whether the chunk is compiled as Lua's implicit top-level vararg
    /// function (`is_main` functions are always vararg in the reference
    /// compiler, regardless of how this generator's caller constructed the
    /// AST it's handed).
    pub is_main: bool,
}

/// A local variable's liveness range in the emitted bytecode, one entry per
/// declared local (ported from `Proto`'s parallel `locvars` array).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalVarRecord {
    pub name: SmolStr,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// The compiled output: one function prototype, ready to be serialized into
/// a `luac`-compatible chunk or fed straight to a VM that shares this
/// crate's [`crate::instruction::Instruction`] layout (§A.5).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionProto {
    pub code: Vec<u32>,
    pub constants: Vec<Constant>,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    pub locals: Vec<LocalVarRecord>,
    pub line_info: Vec<u32>,
    pub source_name: String,
}

/// Compile a chunk into a single top-level function prototype. The input
/// AST's shape (§6) rules out nested function literals, so this never
/// recurses into child `FuncState`s the way the reference compiler's
/// `funcstat`/`body` do — there is exactly one `FuncState` for the whole
/// compile.
pub fn compile(chunk: &Chunk, options: CompileOptions) -> CodegenResult<FunctionProto> {
    // The input AST (§6) never carries a nested function literal, so the
    // one `FuncState` built here always represents the chunk's implicit
    // top-level function, which Lua 5.1 always treats as vararg — `is_main`
    // is accepted for API completeness (callers that assemble this crate's
    // output into a bigger multi-chunk build may still want to record it)
    // but doesn't change anything generated here.
    let _ = options.is_main;
    let mut fs = FuncState::new(true);

    for stat in &chunk.body.stats {
        stmt::compile_stat(&mut fs, stat)?;
    }

    let last_line = fs.lines.last().copied().unwrap_or(0);
    code::emit_return(&mut fs, 0, 0, SourcePos { line: last_line });

    fs.finish_locals();

    Ok(FunctionProto {
        code: fs.code,
        constants: fs.constants().to_vec(),
        num_params: 0,
        is_vararg: true,
        max_stack_size: fs.max_stack_size.max(2),
        locals: fs.locals_done,
        line_info: fs.lines,
        source_name: options.source_name.unwrap_or_else(|| "?".to_string()),
    })
}
