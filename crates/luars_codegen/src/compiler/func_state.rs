// Port of FuncState from lparser.h, pared down to what a single-pass
// generator over a flat, control-flow-free chunk needs (§1 excludes nested
// function literals, so there is no `prev`/upvalue-chain bookkeeping here,
// and §9 leaves loops/branches out of scope, so there is no block/label
// machinery either — compare the teacher's much larger `FuncState`, which
// carries both).

use ahash::AHashMap;
use smol_str::SmolStr;

use crate::error::{CodegenError, CodegenErrorKind, CodegenResult, SourcePos};
use crate::value::Constant;

/// Largest constant-table index `LOADK`'s 18-bit `Bx` can address (§3, §4.1).
pub const MAX_CONSTANTS: usize = 1 << 18;
/// Largest register index the 8-bit `A`/`B`/`C` fields can name (§3).
pub const MAX_STACK: u8 = 250;
/// Ceiling on simultaneously active locals, independent of the register
/// file limit above (§4.3 — matches `lparser.c`'s `LUAI_MAXVARS`).
pub const MAX_LOCALS: usize = 200;

pub struct ActiveLocal {
    pub name: SmolStr,
    pub reg: u8,
    pub start_pc: u32,
}

pub struct FuncState {
    pub code: Vec<u32>,
    pub lines: Vec<u32>,
    constants: Vec<Constant>,
    constant_index: AHashMap<Constant, u32>,
    pub actvar: Vec<ActiveLocal>,
    pub nactvar: u8,
    pub freereg: u8,
    pub max_stack_size: u8,
    pub is_vararg: bool,
    pub locals_done: Vec<super::LocalVarRecord>,
}

impl FuncState {
    pub fn new(is_vararg: bool) -> Self {
        FuncState {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
            constant_index: AHashMap::new(),
            actvar: Vec::new(),
            nactvar: 0,
            freereg: 0,
            max_stack_size: 0,
            is_vararg,
            locals_done: Vec::new(),
        }
    }

    pub fn pc(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, instr: u32, line: u32) -> usize {
        let pc = self.code.len();
        self.code.push(instr);
        self.lines.push(line);
        pc
    }

    /// `luaK_stringK`/`luaK_numberK`/the `OP_LOADBOOL`-constant path rolled
    /// into one: dedupe-or-insert a constant, enforcing the `Bx` index
    /// ceiling (§3's "Constants-table deduplication").
    pub fn intern(&mut self, c: Constant, pos: SourcePos) -> CodegenResult<u32> {
        if let Some(&idx) = self.constant_index.get(&c) {
            return Ok(idx);
        }
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CodegenError::new(
                CodegenErrorKind::ConstantOverflow,
                pos,
                "too many constants in function",
            ));
        }
        let idx = self.constants.len() as u32;
        self.constants.push(c.clone());
        self.constant_index.insert(c, idx);
        Ok(idx)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// `luaK_reserveregs` / `luaK_checkstack`: bump the watermark and fail
    /// if it would overrun the register file (§4.2, §7).
    pub fn reserve_regs(&mut self, n: u8, pos: SourcePos) -> CodegenResult<()> {
        let needed = self.freereg as u16 + n as u16;
        if needed > MAX_STACK as u16 {
            return Err(CodegenError::new(
                CodegenErrorKind::StackOverflow,
                pos,
                "function or expression needs too many registers",
            ));
        }
        self.freereg = needed as u8;
        if self.freereg > self.max_stack_size {
            self.max_stack_size = self.freereg;
        }
        Ok(())
    }

    /// `luaK_freereg`/`freeexp`: give a register back to the free pool if it
    /// was the topmost temporary (freeing a local, or a register that isn't
    /// on top, is a no-op — exactly mirrors the teacher's `free_reg`).
    pub fn free_reg(&mut self, reg: u8) {
        if reg >= self.nactvar && reg == self.freereg.wrapping_sub(1) {
            self.freereg -= 1;
        }
    }

    /// `new_localvar`: declare a not-yet-active local, pinned to `reg` (the
    /// register its value was actually placed in by the caller — e.g.
    /// `base + i` for the i-th name in a `local` statement, captured
    /// *before* `adjust_assign` advances `freereg` past the whole group, not
    /// read back from `freereg` afterward). Returns its slot index in
    /// `actvar`; it becomes visible to name lookups only once
    /// [`Self::adjust_local_vars`] activates it.
    pub fn new_localvar(&mut self, name: SmolStr, reg: u8, pos: SourcePos) -> CodegenResult<usize> {
        if self.actvar.len() >= MAX_LOCALS {
            return Err(CodegenError::new(
                CodegenErrorKind::TooManyLocals,
                pos,
                "too many local variables",
            ));
        }
        self.actvar.push(ActiveLocal {
            name,
            reg,
            start_pc: self.pc() as u32,
        });
        Ok(self.actvar.len() - 1)
    }

    /// `adjustlocalvars`: activate the last `nvars` declared locals,
    /// pinning each to the register it was declared in.
    pub fn adjust_local_vars(&mut self, nvars: u8) {
        self.nactvar += nvars;
    }

    pub fn search_var(&self, name: &str) -> Option<u8> {
        self.actvar[..self.nactvar as usize]
            .iter()
            .rev()
            .find(|v| v.name.as_str() == name)
            .map(|v| v.reg)
    }

    pub fn finish_locals(&mut self) {
        let end_pc = self.pc() as u32;
        for v in &self.actvar[..self.nactvar as usize] {
            self.locals_done.push(super::LocalVarRecord {
                name: v.name.clone(),
                start_pc: v.start_pc,
                end_pc,
            });
        }
    }
}
