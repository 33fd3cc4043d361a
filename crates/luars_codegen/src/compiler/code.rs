// Instruction emission and the jump patch-list primitives. Port of the
// corresponding functions in `lcode.c`/the teacher's `compiler/code.rs` —
// unlike the teacher's copy, `exp2reg`'s jump-patching is completed here
// rather than left as a `TODO`, since comparisons and `and`/`or` (§B.1) need
// it to work end to end.

use crate::error::SourcePos;
use crate::instruction::{Instruction, OpCode};

use super::expdesc::NO_JUMP;
use super::func_state::FuncState;

pub fn code_abc(fs: &mut FuncState, op: OpCode, a: u32, b: u32, c: u32, pos: SourcePos) -> usize {
    fs.emit(Instruction::create_abc(op, a, b, c), pos.line)
}

pub fn code_abx(fs: &mut FuncState, op: OpCode, a: u32, bx: u32, pos: SourcePos) -> usize {
    fs.emit(Instruction::create_abx(op, a, bx), pos.line)
}

pub fn code_asbx(fs: &mut FuncState, op: OpCode, a: u32, sbx: i32, pos: SourcePos) -> usize {
    fs.emit(Instruction::create_asbx(op, a, sbx), pos.line)
}

/// `luaK_ret`.
pub fn emit_return(fs: &mut FuncState, first: u8, nret: i32, pos: SourcePos) -> usize {
    // nret == -1 means "all results from here to the top" (B field 0);
    // otherwise B is nret + 1 (§4.4's multi-value convention).
    let b = if nret < 0 { 0 } else { (nret + 1) as u32 };
    code_abc(fs, OpCode::Return, first as u32, b, 0, pos)
}

/// `luaK_jump`: emit an unconditional jump with an unpatched offset,
/// returning its `pc` so it can be threaded into a patch list.
pub fn jump(fs: &mut FuncState, pos: SourcePos) -> usize {
    code_asbx(fs, OpCode::Jmp, 0, -1, pos)
}

/// `luaK_getlabel`: the pc a jump targeting "right here" should patch to.
pub fn get_label(fs: &FuncState) -> usize {
    fs.pc()
}

/// Read the jump chained from the `JMP` at `pc`, or `NO_JUMP` if it isn't
/// chained to anything yet.
fn get_jump(fs: &FuncState, pc: usize) -> i32 {
    let instr = fs.code[pc];
    let offset = Instruction::get_sbx(instr);
    if offset == -1 {
        NO_JUMP
    } else {
        (pc as i32) + 1 + offset
    }
}

/// `luaK_fixjump`: point the `JMP` at `pc` at `target`.
pub fn fix_jump(fs: &mut FuncState, pc: usize, target: usize) {
    let offset = target as i32 - (pc as i32 + 1);
    Instruction::set_sbx(&mut fs.code[pc], offset);
}

/// `luaK_patchlist`: patch every jump in `list` to land at `target`.
pub fn patch_list(fs: &mut FuncState, list: i32, target: usize) {
    let mut list = list;
    while list != NO_JUMP {
        let next = get_jump(fs, list as usize);
        fix_jump(fs, list as usize, target);
        list = next;
    }
}

/// `luaK_patchtohere`: patch every jump in `list` to land right here.
pub fn patch_to_here(fs: &mut FuncState, list: i32) {
    let here = get_label(fs);
    patch_list(fs, list, here);
}

/// `luaK_concat`: splice `l2` onto the end of `l1`, returning the new head.
pub fn concat(fs: &mut FuncState, l1: i32, l2: i32) -> i32 {
    if l2 == NO_JUMP {
        return l1;
    }
    if l1 == NO_JUMP {
        return l2;
    }
    let mut list = l1;
    loop {
        let next = get_jump(fs, list as usize);
        if next == NO_JUMP {
            break;
        }
        list = next;
    }
    fix_jump(fs, list as usize, l2 as usize);
    l1
}
