// Expression descriptor — the unit of handoff between sub-expression
// codegen steps (§4, §9's design note). `lparser.h`'s `expdesc` is a flat
// struct with a `kind` tag and a union of payload fields accessed through
// `unsafe` (see the teacher's `compiler/expdesc.rs`); the spec's own design
// note asks for this to be reified as a sum type instead, so each variant
// below carries only the payload it actually needs.

/// A patch-list position. Lua threads a singly-linked list of pending jump
/// instructions through the jumps' own (otherwise-unused) offset fields;
/// here the list is just a chain of `pc` values, walked through
/// [`super::code::get_jump`]/[`super::code::fix_jump`].
pub const NO_JUMP: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpKind {
    /// No value yet (§4 — the initial state before a sub-expression is
    /// generated).
    Void,
    Nil,
    True,
    False,
    /// An already-interned constant-table entry.
    Constant(u32),
    /// A numeric literal not yet interned — constant folding (§4.3) works
    /// directly on this payload without touching the constant table, since
    /// most literals used in arithmetic never need to be interned at all
    /// (they fold away).
    Number(f64),
    /// A global name, not yet interned as a constant (interned lazily, the
    /// same way a numeric literal is).
    Global(SmolStrPayload),
    /// Value already sitting in a fixed, already-reserved register.
    NonReloc(u8),
    /// The instruction at `pc` is relocatable: its destination register
    /// (field `A`) hasn't been chosen yet, and can be patched in place once
    /// it is (avoids an extra `MOVE`).
    Reloc(usize),
    /// Like `Reloc`, but the instruction is an `OP_CALL`: discharging it
    /// also gets to choose how many results it keeps.
    Call(usize),
    /// Like `Reloc`, but the instruction is `OP_VARARG`.
    Vararg(usize),
    /// A local variable, held in a fixed register for the variable's whole
    /// lifetime.
    Local(u8),
    /// `t[k]`: `t` and `k` are each either a register or an RK-encoded
    /// constant (§3's RK operand encoding).
    Indexed { table: Rk, key: Rk },
    /// The result of a relational/logical test: the instruction at `pc` is
    /// a conditional `JMP` whose truth polarity still needs to be finalized
    /// by the caller (§B.1's completed jump machinery).
    Jmp(usize),
}

/// An RK-encoded operand: a register, or a constant-table index that fits
/// in the 9-bit RK field (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rk {
    Reg(u8),
    Const(u32),
}

impl Rk {
    /// Pack into the 9-bit B/C operand `GETTABLE`/arithmetic opcodes read
    /// directly (high bit set means "constant", per §3).
    pub fn encode(self) -> u32 {
        match self {
            Rk::Reg(r) => r as u32,
            Rk::Const(k) => crate::instruction::Instruction::rk_const(k),
        }
    }
}

use smol_str::SmolStr;
pub type SmolStrPayload = SmolStr;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpDesc {
    pub kind: ExpKind,
    /// Patch list of jumps to here-if-true, pending from this expression
    /// having already been partly evaluated as a boolean test.
    pub t: i32,
    /// Patch list of jumps to here-if-false.
    pub f: i32,
}

impl ExpDesc {
    pub fn new(kind: ExpKind) -> Self {
        ExpDesc {
            kind,
            t: NO_JUMP,
            f: NO_JUMP,
        }
    }

    pub fn void() -> Self {
        ExpDesc::new(ExpKind::Void)
    }

    /// Does this expression carry any not-yet-patched test jumps?
    /// (`hasjumps` in `lcode.c`: true whenever `t` and `f` differ.)
    pub fn has_jumps(&self) -> bool {
        self.t != self.f
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, ExpKind::Void)
    }

    /// A literal, constant-foldable number — used by the folder (§4.3) to
    /// recognize operands it's allowed to fold without side effects.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            ExpKind::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl ExpKind {
    /// Does this, left alone, still spread to however many values a call or
    /// `...` actually produces? Only true right after `compile_expr` builds
    /// a `Call`/`Vararg` and before anything forces it down to one value.
    pub fn is_multret(&self) -> bool {
        matches!(self, ExpKind::Call(_) | ExpKind::Vararg(_))
    }
}
