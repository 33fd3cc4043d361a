// Discharge operations: the machinery that takes an `ExpDesc` wherever it
// currently is (a pending test jump, a local, a global, an indexed load, a
// bare literal) and gets its value into a register, emitting whatever
// instruction that requires. Port of the `luaK_discharge*`/`luaK_exp2*`
// family in `lcode.c` (see also the teacher's `compiler/code.rs`, whose own
// `exp2reg` leaves the jump-patching half as a `TODO` this version
// completes — §B.1).
//
// One simplification from the reference compiler: materializing a pending
// boolean test into a register always emits the explicit two-`LOADBOOL`
// idiom, rather than reusing `TESTSET`'s side effect when every jump in the
// list already set the right value (`need_value` in `lcode.c`). That's a
// peephole case this generator doesn't chase (§C, Non-goals) — it costs one
// extra instruction in that narrow case, never incorrect output.

use crate::error::{CodegenResult, SourcePos};
use crate::instruction::OpCode;
use crate::value::Constant;

use super::code::{self, concat, fix_jump, get_label, jump, patch_list, patch_to_here};
use super::expdesc::{ExpDesc, ExpKind, Rk, NO_JUMP};
use super::func_state::FuncState;

/// `luaK_dischargevars`.
pub fn discharge_vars(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<()> {
    match e.kind {
        ExpKind::Local(reg) => {
            e.kind = ExpKind::NonReloc(reg);
        }
        ExpKind::Global(ref name) => {
            let k = fs.intern(Constant::string(name.clone()), pos)?;
            let pc = code::code_abx(fs, OpCode::GetGlobal, 0, k, pos);
            e.kind = ExpKind::Reloc(pc);
        }
        ExpKind::Indexed { table, key } => {
            if let Rk::Reg(r) = key {
                fs.free_reg(r);
            }
            if let Rk::Reg(r) = table {
                fs.free_reg(r);
            }
            let pc = code::code_abc(fs, OpCode::GetTable, 0, table.encode(), key.encode(), pos);
            e.kind = ExpKind::Reloc(pc);
        }
        _ => {}
    }
    Ok(())
}

/// `freeexp`: give back the register an already-placed value occupies, if
/// it's the topmost temporary.
pub fn free_exp(fs: &mut FuncState, e: &ExpDesc) {
    if let ExpKind::NonReloc(r) = e.kind {
        fs.free_reg(r);
    }
}

/// `luaK_setoneret`/`luaK_setreturns(..., 1)`: a call or `...` used where
/// exactly one value is wanted.
pub fn set_one_ret(fs: &mut FuncState, e: &mut ExpDesc) {
    match e.kind {
        ExpKind::Call(pc) => {
            crate::instruction::Instruction::set_c(&mut fs.code[pc], 2);
            let a = crate::instruction::Instruction::get_a(fs.code[pc]);
            e.kind = ExpKind::NonReloc(a as u8);
        }
        ExpKind::Vararg(pc) => {
            crate::instruction::Instruction::set_b(&mut fs.code[pc], 2);
            e.kind = ExpKind::Reloc(pc);
        }
        _ => {}
    }
}

/// `luaK_setmultret`/`luaK_setreturns(..., LUA_MULTRET)`: keep a call or
/// `...` expression open so it spreads every value it produces — used for
/// the last element of an argument or return list.
pub fn set_multret(fs: &mut FuncState, e: &mut ExpDesc) {
    match e.kind {
        ExpKind::Call(pc) => {
            crate::instruction::Instruction::set_c(&mut fs.code[pc], 0);
        }
        ExpKind::Vararg(pc) => {
            crate::instruction::Instruction::set_b(&mut fs.code[pc], 0);
        }
        _ => {}
    }
}

fn code_loadbool(fs: &mut FuncState, a: u8, b: bool, skip_next: bool, pos: SourcePos) -> usize {
    get_label(fs);
    code::code_abc(fs, OpCode::LoadBool, a as u32, b as u32, skip_next as u32, pos)
}

/// `discharge2reg`.
fn discharge2reg(fs: &mut FuncState, e: &mut ExpDesc, reg: u8, pos: SourcePos) -> CodegenResult<()> {
    discharge_vars(fs, e, pos)?;
    match e.kind {
        ExpKind::Nil => {
            code::code_abc(fs, OpCode::LoadNil, reg as u32, reg as u32, 0, pos);
        }
        ExpKind::True | ExpKind::False => {
            let b = matches!(e.kind, ExpKind::True);
            code::code_abc(fs, OpCode::LoadBool, reg as u32, b as u32, 0, pos);
        }
        ExpKind::Constant(k) => {
            code::code_abx(fs, OpCode::LoadK, reg as u32, k, pos);
        }
        ExpKind::Number(n) => {
            let k = fs.intern(Constant::number(n), pos)?;
            code::code_abx(fs, OpCode::LoadK, reg as u32, k, pos);
        }
        ExpKind::NonReloc(r) => {
            if r != reg {
                code::code_abc(fs, OpCode::Move, reg as u32, r as u32, 0, pos);
            }
        }
        ExpKind::Reloc(pc) => {
            crate::instruction::Instruction::set_a(&mut fs.code[pc], reg as u32);
        }
        ExpKind::Void | ExpKind::Jmp(_) => return Ok(()),
        ExpKind::Call(_) | ExpKind::Vararg(_) | ExpKind::Local(_) | ExpKind::Indexed { .. } | ExpKind::Global(_) => {
            unreachable!("discharge_vars above always removes these kinds first")
        }
    }
    e.kind = ExpKind::NonReloc(reg);
    Ok(())
}

/// `exp2reg`: place `e`'s value into `reg`, resolving any pending test
/// jumps against it on the way (§B.1).
pub fn exp2reg(fs: &mut FuncState, e: &mut ExpDesc, reg: u8, pos: SourcePos) -> CodegenResult<()> {
    discharge2reg(fs, e, reg, pos)?;
    if let ExpKind::Jmp(pc) = e.kind {
        e.t = concat(fs, e.t, pc as i32);
    }
    if e.has_jumps() {
        let fj = if matches!(e.kind, ExpKind::Jmp(_)) {
            NO_JUMP
        } else {
            jump(fs, pos) as i32
        };
        let p_f = code_loadbool(fs, reg, false, true, pos) as i32;
        let p_t = code_loadbool(fs, reg, true, false, pos) as i32;
        patch_to_here(fs, fj);
        let final_label = get_label(fs);
        patch_list(fs, e.f, final_label);
        fix_jump(fs, p_f as usize, final_label);
        patch_list(fs, e.t, final_label);
        fix_jump(fs, p_t as usize, final_label);
    }
    e.t = NO_JUMP;
    e.f = NO_JUMP;
    e.kind = ExpKind::NonReloc(reg);
    Ok(())
}

/// `luaK_exp2nextreg`.
pub fn exp2nextreg(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<u8> {
    discharge_vars(fs, e, pos)?;
    free_exp(fs, e);
    fs.reserve_regs(1, pos)?;
    let reg = fs.freereg - 1;
    exp2reg(fs, e, reg, pos)?;
    Ok(reg)
}

/// `luaK_exp2anyreg`.
pub fn exp2anyreg(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<u8> {
    discharge_vars(fs, e, pos)?;
    if let ExpKind::NonReloc(r) = e.kind {
        if !e.has_jumps() {
            return Ok(r);
        }
        if r >= fs.nactvar {
            exp2reg(fs, e, r, pos)?;
            return Ok(r);
        }
    }
    exp2nextreg(fs, e, pos)
}

/// `luaK_exp2val`.
pub fn exp2val(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<()> {
    if e.has_jumps() {
        exp2anyreg(fs, e, pos)?;
    } else {
        discharge_vars(fs, e, pos)?;
    }
    Ok(())
}

/// `luaK_exp2RK`: an operand usable directly as an RK-encoded instruction
/// field, interning a literal as a constant if needed and falling back to a
/// register when the constant index doesn't fit in 9 bits (§3, §4.1).
///
/// The reference compiler checks whether the *next* constant index would
/// still fit the RK range (`fs->nk <= MAXINDEXRK`) before interning a
/// not-yet-interned literal, so that once the table is within `MAX_INDEX_RK`
/// of the `2^18` ceiling, such a literal goes straight to a register instead
/// of appended to the constant table only to be rejected a moment later —
/// interning it first and checking afterward would grow the table with an
/// entry the reference compiler never inserts, breaking exact constant-table
/// parity (§3, §8 property 4).
pub fn exp2rk(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<Rk> {
    exp2val(fs, e, pos)?;
    let fits_rk = fs.constants().len() <= crate::instruction::Instruction::MAX_INDEX_RK as usize;
    let k = match e.kind {
        ExpKind::True if fits_rk => Some(fs.intern(Constant::Boolean(true), pos)?),
        ExpKind::False if fits_rk => Some(fs.intern(Constant::Boolean(false), pos)?),
        ExpKind::Nil if fits_rk => Some(fs.intern(Constant::Nil, pos)?),
        ExpKind::Number(n) if fits_rk => Some(fs.intern(Constant::number(n), pos)?),
        ExpKind::Constant(k) if k <= crate::instruction::Instruction::MAX_INDEX_RK => Some(k),
        _ => None,
    };
    if let Some(k) = k {
        return Ok(Rk::Const(k));
    }
    Ok(Rk::Reg(exp2anyreg(fs, e, pos)?))
}
