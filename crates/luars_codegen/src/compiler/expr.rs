// Expression codegen: literals, names, indexing, calls, table constructors,
// arithmetic (with folding), comparisons and `and`/`or` short-circuiting.
// Port of the expression half of `lparser.c`'s `subexpr`/`simpleexp`/
// `suffixedexp`/`funcargs`, generalized from the teacher's Lua 5.4-shaped
// `compiler/binop.rs` (metamethod-tag opcodes, `_ENV`-indexed globals) back
// down to the simpler Lua 5.1 dialect this crate targets (`GETGLOBAL`/
// `SETGLOBAL`, no upvalue-based globals).
//
// Two deliberate simplifications relative to the reference compiler, both
// within §C's "optimization beyond the single peephole class" Non-goal:
// `a and b`/`a or b`'s boolean materialization always emits the explicit
// two-`LOADBOOL` idiom rather than reusing a `TESTSET`'s side effect, and a
// chain of `..` concatenations emits one `CONCAT` per operator rather than
// batching the whole right-associative run into a single `CONCAT`.

use smol_str::SmolStr;

use crate::ast::{BinOp, Expr, TableField, UnOp};
use crate::error::{CodegenError, CodegenErrorKind, CodegenResult, SourcePos};
use crate::instruction::{Instruction, OpCode};
use crate::value::Constant;

use super::code::{code_abc, concat, jump, patch_to_here};
use super::discharge::{discharge_vars, exp2anyreg, exp2nextreg, exp2rk, free_exp, set_multret};
use super::expdesc::{ExpDesc, ExpKind, Rk, NO_JUMP};
use super::fold::{fold_binary, fold_unary};
use super::func_state::FuncState;

const LFIELDS_PER_FLUSH: u32 = 50;

pub fn compile_expr(fs: &mut FuncState, e: &Expr) -> CodegenResult<ExpDesc> {
    match e {
        Expr::Nil(_) => Ok(ExpDesc::new(ExpKind::Nil)),
        Expr::True(_) => Ok(ExpDesc::new(ExpKind::True)),
        Expr::False(_) => Ok(ExpDesc::new(ExpKind::False)),
        Expr::Number(n, _) => Ok(ExpDesc::new(ExpKind::Number(*n))),
        Expr::Str(s, pos) => {
            let k = fs.intern(Constant::string(s.clone()), *pos)?;
            Ok(ExpDesc::new(ExpKind::Constant(k)))
        }
        Expr::Vararg(pos) => {
            if !fs.is_vararg {
                return Err(CodegenError::new(
                    CodegenErrorKind::CompileError,
                    *pos,
                    "cannot use '...' outside a vararg function",
                ));
            }
            let pc = code_abc(fs, OpCode::Vararg, 0, 0, 0, *pos);
            Ok(ExpDesc::new(ExpKind::Vararg(pc)))
        }
        Expr::Name(name, pos) => Ok(compile_name(fs, name, *pos)),
        Expr::Paren(inner, pos) => {
            let mut ed = compile_expr(fs, inner)?;
            super::discharge::set_one_ret(fs, &mut ed);
            discharge_vars(fs, &mut ed, *pos)?;
            Ok(ed)
        }
        Expr::Binary { op, lhs, rhs, pos } => compile_binary(fs, *op, lhs, rhs, *pos),
        Expr::Unary { op, operand, pos } => compile_unary(fs, *op, operand, *pos),
        Expr::Index { table, key, pos } => compile_index(fs, table, key, *pos),
        Expr::Field { table, name, pos } => {
            let key = Expr::string(name.clone(), *pos);
            compile_index(fs, table, &key, *pos)
        }
        Expr::Call { func, args, pos } => {
            let mut fe = compile_expr(fs, func)?;
            let base = exp2nextreg(fs, &mut fe, *pos)?;
            compile_funcargs(fs, base, args, *pos)
        }
        Expr::MethodCall {
            object,
            method,
            args,
            pos,
        } => {
            let mut oe = compile_expr(fs, object)?;
            let obj_reg = exp2anyreg(fs, &mut oe, *pos)?;
            free_exp(fs, &oe);
            let func_reg = fs.freereg;
            fs.reserve_regs(2, *pos)?;
            let k = fs.intern(Constant::string(method.clone()), *pos)?;
            let key_rk = if k <= Instruction::MAX_INDEX_RK {
                Rk::Const(k)
            } else {
                return Err(CodegenError::new(
                    CodegenErrorKind::ConstantOverflow,
                    *pos,
                    "method name constant index out of RK range",
                ));
            };
            code_abc(fs, OpCode::Self_, func_reg as u32, obj_reg as u32, key_rk.encode(), *pos);
            compile_funcargs(fs, func_reg, args, *pos)
        }
        Expr::Table { fields, pos } => compile_table(fs, fields, *pos),
    }
}

fn compile_name(fs: &mut FuncState, name: &SmolStr, pos: SourcePos) -> ExpDesc {
    if let Some(reg) = fs.search_var(name.as_str()) {
        let mut e = ExpDesc::new(ExpKind::Local(reg));
        e.t = NO_JUMP;
        e.f = NO_JUMP;
        e
    } else {
        let _ = pos;
        ExpDesc::new(ExpKind::Global(name.clone()))
    }
}

fn compile_index(fs: &mut FuncState, table: &Expr, key: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut te = compile_expr(fs, table)?;
    let table_reg = exp2anyreg(fs, &mut te, pos)?;
    let mut ke = compile_expr(fs, key)?;
    let key_rk = exp2rk(fs, &mut ke, pos)?;
    Ok(ExpDesc::new(ExpKind::Indexed {
        table: Rk::Reg(table_reg),
        key: key_rk,
    }))
}

/// A comma-separated expression list: every element but the last is
/// discharged into the next free register; the last is returned open (it
/// may still be a pending multi-value call/vararg).
pub fn compile_exprlist(fs: &mut FuncState, exprs: &[Expr]) -> CodegenResult<ExpDesc> {
    if exprs.is_empty() {
        return Ok(ExpDesc::void());
    }
    for e in &exprs[..exprs.len() - 1] {
        let mut ed = compile_expr(fs, e)?;
        exp2nextreg(fs, &mut ed, e.pos())?;
    }
    compile_expr(fs, exprs.last().unwrap())
}

fn compile_funcargs(fs: &mut FuncState, base: u8, args: &[Expr], pos: SourcePos) -> CodegenResult<ExpDesc> {
    let nparams: i32 = if args.is_empty() {
        0
    } else {
        let mut last = compile_exprlist(fs, args)?;
        if last.kind.is_multret() {
            set_multret(fs, &mut last);
            -1
        } else {
            exp2nextreg(fs, &mut last, args.last().unwrap().pos())?;
            fs.freereg as i32 - (base as i32 + 1)
        }
    };
    let b = if nparams < 0 { 0 } else { (nparams + 1) as u32 };
    let pc = code_abc(fs, OpCode::Call, base as u32, b, 2, pos);
    fs.freereg = base + 1;
    Ok(ExpDesc::new(ExpKind::Call(pc)))
}

/// `luaO_int2fb`: pack a size hint into the 8-bit "floating byte" format
/// `NEWTABLE`'s B/C fields use (3-bit mantissa, 5-bit exponent) — values
/// under 8 are exact, larger ones are rounded up to the nearest
/// representable size. Ported from `lobject.c`; needed because the spec's
/// "patch NEWTABLE's array-size and hash-size hints" (§4.5 step 5) means
/// this encoded byte, not the raw count.
fn int2fb(mut x: u32) -> u32 {
    let mut e = 0u32;
    while x >= 16 {
        x = (x + 1) >> 1;
        e += 1;
    }
    if x < 8 {
        x
    } else {
        ((e + 1) << 3) | (x - 8)
    }
}

/// `luaK_setlist`: emit `SETLIST`, overflowing the batch index into a
/// trailing raw code word when it doesn't fit the 9-bit `C` field (§4.5
/// step 6) rather than truncating it.
fn emit_setlist(fs: &mut FuncState, table_reg: u8, b: u32, batch: u32, pos: SourcePos) {
    if batch <= crate::instruction::Instruction::MAX_C {
        code_abc(fs, OpCode::SetList, table_reg as u32, b, batch, pos);
    } else {
        code_abc(fs, OpCode::SetList, table_reg as u32, b, 0, pos);
        fs.emit(batch, pos.line);
    }
}

fn compile_table(fs: &mut FuncState, fields: &[TableField], pos: SourcePos) -> CodegenResult<ExpDesc> {
    let table_reg = fs.freereg;
    fs.reserve_regs(1, pos)?;
    let newtable_pc = code_abc(fs, OpCode::NewTable, table_reg as u32, 0, 0, pos);

    let mut total_array = 0u32;
    let mut array_size_hint = 0u32;
    let mut hash_size_hint = 0u32;
    let mut pending = 0u32;
    let n = fields.len();

    for (i, field) in fields.iter().enumerate() {
        match field {
            TableField::Keyed(k, v) => {
                let mut ke = compile_expr(fs, k)?;
                let key_rk = exp2rk(fs, &mut ke, k.pos())?;
                let mut ve = compile_expr(fs, v)?;
                let val_rk = exp2rk(fs, &mut ve, v.pos())?;
                code_abc(fs, OpCode::SetTable, table_reg as u32, key_rk.encode(), val_rk.encode(), v.pos());
                if let Rk::Reg(r) = val_rk {
                    fs.free_reg(r);
                }
                if let Rk::Reg(r) = key_rk {
                    fs.free_reg(r);
                }
                hash_size_hint += 1;
            }
            TableField::Positional(v) => {
                let is_last = i + 1 == n;
                let mut ve = compile_expr(fs, v)?;
                if is_last && ve.kind.is_multret() {
                    set_multret(fs, &mut ve);
                    total_array += 1;
                    let batch = (total_array - 1) / LFIELDS_PER_FLUSH + 1;
                    emit_setlist(fs, table_reg, 0, batch, v.pos());
                    fs.freereg = table_reg + 1;
                    pending = 0;
                    // the trailing multret field's count is unknown at
                    // compile time, so it isn't counted toward the array
                    // size hint (§4.5 step 4/step 5).
                } else {
                    exp2nextreg(fs, &mut ve, v.pos())?;
                    total_array += 1;
                    array_size_hint += 1;
                    pending += 1;
                    if pending == LFIELDS_PER_FLUSH {
                        let batch = (total_array - 1) / LFIELDS_PER_FLUSH + 1;
                        emit_setlist(fs, table_reg, pending, batch, v.pos());
                        fs.freereg = table_reg + 1;
                        pending = 0;
                    }
                }
            }
        }
    }
    if pending > 0 {
        let batch = (total_array - 1) / LFIELDS_PER_FLUSH + 1;
        emit_setlist(fs, table_reg, pending, batch, pos);
        fs.freereg = table_reg + 1;
    }

    Instruction::set_b(&mut fs.code[newtable_pc], int2fb(array_size_hint));
    Instruction::set_c(&mut fs.code[newtable_pc], int2fb(hash_size_hint));

    Ok(ExpDesc::new(ExpKind::NonReloc(table_reg)))
}

fn free_rk(fs: &mut FuncState, rk: Rk) {
    if let Rk::Reg(r) = rk {
        fs.free_reg(r);
    }
}

fn compile_binary(fs: &mut FuncState, op: BinOp, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    match op {
        BinOp::And => compile_and(fs, lhs, rhs, pos),
        BinOp::Or => compile_or(fs, lhs, rhs, pos),
        BinOp::Concat => compile_concat(fs, lhs, rhs, pos),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            compile_compare(fs, op, lhs, rhs, pos)
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
            compile_arith(fs, op, lhs, rhs, pos)
        }
    }
}

fn compile_arith(fs: &mut FuncState, op: BinOp, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let le = compile_expr(fs, lhs)?;
    let re = compile_expr(fs, rhs)?;
    if let (Some(a), Some(b)) = (le.as_number(), re.as_number()) {
        if let Some(r) = fold_binary(op, a, b) {
            return Ok(ExpDesc::new(ExpKind::Number(r)));
        }
    }
    let mut le = le;
    let mut re = re;
    let r2 = exp2rk(fs, &mut re, pos)?;
    let r1 = exp2rk(fs, &mut le, pos)?;
    match (r1, r2) {
        (Rk::Reg(a), Rk::Reg(b)) if a > b => {
            free_rk(fs, r1);
            free_rk(fs, r2);
        }
        _ => {
            free_rk(fs, r2);
            free_rk(fs, r1);
        }
    }
    let opcode = match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::Mod => OpCode::Mod,
        BinOp::Pow => OpCode::Pow,
        _ => unreachable!(),
    };
    let pc = code_abc(fs, opcode, 0, r1.encode(), r2.encode(), pos);
    Ok(ExpDesc::new(ExpKind::Reloc(pc)))
}

fn compile_compare(fs: &mut FuncState, op: BinOp, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut le = compile_expr(fs, lhs)?;
    let mut re = compile_expr(fs, rhs)?;
    let o1 = exp2rk(fs, &mut le, pos)?;
    let o2 = exp2rk(fs, &mut re, pos)?;
    free_rk(fs, o2);
    free_rk(fs, o1);

    let (opcode, cond, swap) = match op {
        BinOp::Eq => (OpCode::Eq, true, false),
        BinOp::Ne => (OpCode::Eq, false, false),
        BinOp::Lt => (OpCode::Lt, true, false),
        BinOp::Le => (OpCode::Le, true, false),
        BinOp::Gt => (OpCode::Lt, true, true),
        BinOp::Ge => (OpCode::Le, true, true),
        _ => unreachable!(),
    };
    let (a, b) = if swap { (o2, o1) } else { (o1, o2) };
    code_abc(fs, opcode, cond as u32, a.encode(), b.encode(), pos);
    let jpc = jump(fs, pos);
    Ok(ExpDesc::new(ExpKind::Jmp(jpc)))
}

/// Flip the test preceding the jump at `jmp_pc` so the jump fires on the
/// opposite condition. `EQ`/`LT`/`LE` carry their polarity in `A`; `TEST`
/// carries it in `C` — a generalization of `negatecondition` in `lcode.c`,
/// which only has the former to worry about since 5.1's `TEST` doesn't
/// appear as a jump control from this path in the reference compiler.
fn negate_condition(fs: &mut FuncState, jmp_pc: usize) {
    let test_pc = jmp_pc - 1;
    match Instruction::get_opcode(fs.code[test_pc]) {
        OpCode::Eq | OpCode::Lt | OpCode::Le => {
            let a = Instruction::get_a(fs.code[test_pc]);
            Instruction::set_a(&mut fs.code[test_pc], (a == 0) as u32);
        }
        OpCode::Test => {
            let c = Instruction::get_c(fs.code[test_pc]);
            Instruction::set_c(&mut fs.code[test_pc], (c == 0) as u32);
        }
        _ => {}
    }
}

fn jump_on_cond(fs: &mut FuncState, e: &mut ExpDesc, cond: bool, pos: SourcePos) -> CodegenResult<i32> {
    if let ExpKind::Reloc(pc) = e.kind {
        if Instruction::get_opcode(fs.code[pc]) == OpCode::Not {
            let b = Instruction::get_b(fs.code[pc]);
            fs.code.pop();
            fs.lines.pop();
            code_abc(fs, OpCode::Test, b, 0, (!cond) as u32, pos);
            return Ok(jump(fs, pos) as i32);
        }
    }
    let reg = exp2anyreg(fs, e, pos)?;
    fs.free_reg(reg);
    code_abc(fs, OpCode::Test, reg as u32, 0, cond as u32, pos);
    Ok(jump(fs, pos) as i32)
}

/// `luaK_goiftrue`.
fn go_if_true(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<()> {
    discharge_vars(fs, e, pos)?;
    let pc = match e.kind {
        ExpKind::Jmp(jpc) => {
            negate_condition(fs, jpc);
            jpc as i32
        }
        ExpKind::Constant(_) | ExpKind::Number(_) | ExpKind::True => NO_JUMP,
        _ => jump_on_cond(fs, e, false, pos)?,
    };
    e.f = concat(fs, e.f, pc);
    patch_to_here(fs, e.t);
    e.t = NO_JUMP;
    Ok(())
}

/// `luaK_goiffalse`.
fn go_if_false(fs: &mut FuncState, e: &mut ExpDesc, pos: SourcePos) -> CodegenResult<()> {
    discharge_vars(fs, e, pos)?;
    let pc = match e.kind {
        ExpKind::Jmp(jpc) => jpc as i32,
        ExpKind::Nil | ExpKind::False => NO_JUMP,
        _ => jump_on_cond(fs, e, true, pos)?,
    };
    e.t = concat(fs, e.t, pc);
    patch_to_here(fs, e.f);
    e.f = NO_JUMP;
    Ok(())
}

fn compile_and(fs: &mut FuncState, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut e1 = compile_expr(fs, lhs)?;
    go_if_true(fs, &mut e1, pos)?;
    let mut e2 = compile_expr(fs, rhs)?;
    discharge_vars(fs, &mut e2, pos)?;
    e2.f = concat(fs, e2.f, e1.f);
    Ok(e2)
}

fn compile_or(fs: &mut FuncState, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut e1 = compile_expr(fs, lhs)?;
    go_if_false(fs, &mut e1, pos)?;
    let mut e2 = compile_expr(fs, rhs)?;
    discharge_vars(fs, &mut e2, pos)?;
    e2.t = concat(fs, e2.t, e1.t);
    Ok(e2)
}

fn compile_concat(fs: &mut FuncState, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut e1 = compile_expr(fs, lhs)?;
    let r1 = exp2nextreg(fs, &mut e1, lhs.pos())?;
    let mut e2 = compile_expr(fs, rhs)?;
    let r2 = exp2nextreg(fs, &mut e2, rhs.pos())?;
    fs.free_reg(r2);
    fs.free_reg(r1);
    let pc = code_abc(fs, OpCode::Concat, 0, r1 as u32, r2 as u32, pos);
    Ok(ExpDesc::new(ExpKind::Reloc(pc)))
}

fn compile_unary(fs: &mut FuncState, op: UnOp, operand: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    match op {
        UnOp::Not => compile_not(fs, operand, pos),
        UnOp::Neg | UnOp::Len => {
            let mut e = compile_expr(fs, operand)?;
            if op == UnOp::Neg {
                if let Some(n) = e.as_number() {
                    if let Some(r) = fold_unary(op, n) {
                        return Ok(ExpDesc::new(ExpKind::Number(r)));
                    }
                }
            }
            let reg = exp2anyreg(fs, &mut e, pos)?;
            fs.free_reg(reg);
            let opcode = if op == UnOp::Neg { OpCode::Unm } else { OpCode::Len };
            let pc = code_abc(fs, opcode, 0, reg as u32, 0, pos);
            Ok(ExpDesc::new(ExpKind::Reloc(pc)))
        }
    }
}

fn compile_not(fs: &mut FuncState, operand: &Expr, pos: SourcePos) -> CodegenResult<ExpDesc> {
    let mut e = compile_expr(fs, operand)?;
    discharge_vars(fs, &mut e, pos)?;
    match e.kind {
        ExpKind::Nil | ExpKind::False => e.kind = ExpKind::True,
        ExpKind::Constant(_) | ExpKind::Number(_) | ExpKind::True => e.kind = ExpKind::False,
        ExpKind::Jmp(jpc) => negate_condition(fs, jpc),
        _ => {
            let reg = exp2anyreg(fs, &mut e, pos)?;
            fs.free_reg(reg);
            let pc = code_abc(fs, OpCode::Not, 0, reg as u32, 0, pos);
            e.kind = ExpKind::Reloc(pc);
        }
    }
    std::mem::swap(&mut e.t, &mut e.f);
    Ok(e)
}
