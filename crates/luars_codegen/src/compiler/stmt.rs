// Statement codegen: locals, assignment, `return`, and calls used as
// statements. Port of the statement half of `lparser.c`'s `statement`
// dispatch, narrowed to the four statement shapes this generator's input
// AST carries (§6 — no control flow, no nested function declarations).

use smol_str::SmolStr;

use crate::ast::{Expr, Stat};
use crate::error::{CodegenError, CodegenErrorKind, CodegenResult, SourcePos};
use crate::instruction::{Instruction, OpCode};
use crate::value::Constant;

use super::code::{code_abc, code_abx, emit_return};
use super::discharge::{exp2anyreg, exp2nextreg, exp2rk, set_multret};
use super::expdesc::{ExpDesc, ExpKind, Rk};
use super::expr::{compile_expr, compile_exprlist};
use super::func_state::FuncState;

/// Ceiling on the number of targets in a single multiple assignment,
/// independent of the register file (mirrors `lparser.c`'s `checklimit`
/// call in `assignment`).
const MAX_ASSIGN_TARGETS: usize = 200;

pub fn compile_stat(fs: &mut FuncState, stat: &Stat) -> CodegenResult<()> {
    match stat {
        Stat::Local { names, exprs, pos } => compile_local(fs, names, exprs, *pos),
        Stat::Assign { targets, exprs, pos } => compile_assign(fs, targets, exprs, *pos),
        Stat::Return { exprs, pos } => compile_return(fs, exprs, *pos),
        Stat::ExprStat { expr, pos } => compile_expr_stat(fs, expr, *pos),
    }
}

/// `local a, b, c = e1, e2, ...`: evaluate the expression list into fresh
/// registers (padding with `nil` if there are fewer exprs than names,
/// discarding extras if there are more — §4.2's adjustment rule), then bind
/// each name to the register it landed in.
fn compile_local(fs: &mut FuncState, names: &[SmolStr], exprs: &[Expr], pos: SourcePos) -> CodegenResult<()> {
    let base = fs.freereg;
    adjust_assign(fs, names.len(), exprs, pos)?;
    debug_assert_eq!(fs.freereg, base + names.len() as u8);
    for (i, name) in names.iter().enumerate() {
        fs.new_localvar(name.clone(), base + i as u8, pos)?;
    }
    fs.adjust_local_vars(names.len() as u8);
    Ok(())
}

/// `adjust_assign`: evaluate `exprs` so that exactly `nvars` values end up
/// in the `nvars` registers starting at the pre-call `freereg` — nil-padding
/// a short list, truncating a long one, and spreading or capping a trailing
/// multret (call/`...`) expression to make up the difference.
fn adjust_assign(fs: &mut FuncState, nvars: usize, exprs: &[Expr], pos: SourcePos) -> CodegenResult<()> {
    let nexps = exprs.len();
    if nexps == 0 {
        if nvars > 0 {
            let reg = fs.freereg;
            fs.reserve_regs(nvars as u8, pos)?;
            code_abc(fs, OpCode::LoadNil, reg as u32, reg as u32 + nvars as u32 - 1, 0, pos);
        }
        return Ok(());
    }

    let mut e = compile_exprlist(fs, exprs)?;
    let mut extra: i32 = nvars as i32 - nexps as i32;

    if e.kind.is_multret() {
        extra += 1;
        if extra < 0 {
            extra = 0;
        }
        reserve_for_multret(fs, &mut e, extra as u8, pos)?;
    } else {
        if !e.is_void() {
            exp2nextreg(fs, &mut e, exprs.last().unwrap().pos())?;
        }
        if extra > 0 {
            let reg = fs.freereg;
            fs.reserve_regs(extra as u8, pos)?;
            code_abc(fs, OpCode::LoadNil, reg as u32, reg as u32 + extra as u32 - 1, 0, pos);
        }
    }
    if nexps > nvars {
        fs.freereg -= (nexps - nvars) as u8;
    }
    Ok(())
}

/// `luaK_setreturns(e, want)` + the caller's own `luaK_reserveregs`: fix an
/// open call/vararg's result count to exactly `want`, accounting for the
/// register its own instruction already occupies (a `CALL`'s `A` register
/// was reserved when its function expression was placed; a `VARARG`'s
/// wasn't, so it additionally claims one here before the rest).
fn reserve_for_multret(fs: &mut FuncState, e: &mut ExpDesc, want: u8, pos: SourcePos) -> CodegenResult<()> {
    match e.kind {
        ExpKind::Call(pc) => {
            Instruction::set_c(&mut fs.code[pc], want as u32 + 1);
            if want > 1 {
                fs.reserve_regs(want - 1, pos)?;
            }
        }
        ExpKind::Vararg(pc) => {
            Instruction::set_b(&mut fs.code[pc], want as u32 + 1);
            Instruction::set_a(&mut fs.code[pc], fs.freereg as u32);
            fs.reserve_regs(1, pos)?;
            if want > 1 {
                fs.reserve_regs(want - 1, pos)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Where a single assignment target stores its value — resolved before the
/// right-hand side is evaluated, so `t[k]`'s `t` and `k` (and a local's
/// identity) are fixed by the program's left-to-right evaluation order
/// rather than by whatever order the stores happen to run in.
enum Target {
    Local(u8),
    Global(SmolStr),
    Indexed { table: u8, key: Rk },
}

fn resolve_target(fs: &mut FuncState, target: &Expr) -> CodegenResult<Target> {
    match target {
        Expr::Name(name, _) => {
            if let Some(reg) = fs.search_var(name.as_str()) {
                Ok(Target::Local(reg))
            } else {
                Ok(Target::Global(name.clone()))
            }
        }
        Expr::Index { table, key, pos } => {
            let mut te = compile_expr(fs, table)?;
            let table_reg = exp2anyreg(fs, &mut te, *pos)?;
            let mut ke = compile_expr(fs, key)?;
            let key_rk = exp2rk(fs, &mut ke, *pos)?;
            Ok(Target::Indexed {
                table: table_reg,
                key: key_rk,
            })
        }
        Expr::Field { table, name, pos } => {
            let mut te = compile_expr(fs, table)?;
            let table_reg = exp2anyreg(fs, &mut te, *pos)?;
            let k = fs.intern(Constant::string(name.clone()), *pos)?;
            if k > Instruction::MAX_INDEX_RK {
                return Err(CodegenError::new(
                    CodegenErrorKind::ConstantOverflow,
                    *pos,
                    "field name constant index out of RK range",
                ));
            }
            Ok(Target::Indexed {
                table: table_reg,
                key: Rk::Const(k),
            })
        }
        _ => Err(CodegenError::new(
            CodegenErrorKind::CompileError,
            target.pos(),
            "cannot assign to this expression",
        )),
    }
}

fn store_var(fs: &mut FuncState, target: &Target, val_reg: u8, pos: SourcePos) -> CodegenResult<()> {
    match target {
        Target::Local(reg) => {
            if *reg != val_reg {
                code_abc(fs, OpCode::Move, *reg as u32, val_reg as u32, 0, pos);
            }
        }
        Target::Global(name) => {
            let k = fs.intern(Constant::string(name.clone()), pos)?;
            code_abx(fs, OpCode::SetGlobal, val_reg as u32, k, pos);
        }
        Target::Indexed { table, key } => {
            code_abc(fs, OpCode::SetTable, *table as u32, key.encode(), Rk::Reg(val_reg).encode(), pos);
        }
    }
    Ok(())
}

/// `a, t[k], t.f = e1, e2, ...`. Every target's own subexpressions (`t[k]`'s
/// table and key) are resolved left to right before the right-hand side
/// runs, matching source evaluation order; the adjusted right-hand side
/// then lands in one contiguous register block. Targets are then stored
/// back in *reverse* source order (§4.5 step 4 — the reference compiler's
/// recursive descent over the target list unwinds last-target-first),
/// consuming the same contiguous block front-to-back by index. This settles
/// for resetting `freereg` back to its pre-statement watermark in one step
/// at the end rather than threading `freeexp` calls through the store loop
/// — equivalent for a generator with no statements after this one depending
/// on incremental register reuse within the same expression.
fn compile_assign(fs: &mut FuncState, targets: &[Expr], exprs: &[Expr], pos: SourcePos) -> CodegenResult<()> {
    if targets.len() > MAX_ASSIGN_TARGETS {
        return Err(CodegenError::new(
            CodegenErrorKind::TooManyVariablesInAssignment,
            pos,
            "too many variables in assignment",
        ));
    }

    let saved_freereg = fs.freereg;
    let mut resolved = Vec::with_capacity(targets.len());
    for t in targets {
        resolved.push(resolve_target(fs, t)?);
    }

    let rhs_base = fs.freereg;
    adjust_assign(fs, targets.len(), exprs, pos)?;

    // §4.5 step 4: store back in reverse source order (the reference
    // compiler's recursive `assignment` unwinds last-target-first), not the
    // order the targets were written in.
    for (i, target) in resolved.iter().enumerate().rev() {
        store_var(fs, target, rhs_base + i as u8, pos)?;
    }

    fs.freereg = saved_freereg;
    Ok(())
}

fn compile_return(fs: &mut FuncState, exprs: &[Expr], pos: SourcePos) -> CodegenResult<()> {
    let base = fs.freereg;

    if exprs.len() == 1 && compile_tailcall(fs, &exprs[0], pos)?.is_some() {
        return Ok(());
    }

    if exprs.is_empty() {
        emit_return(fs, base, 0, pos);
        return Ok(());
    }

    let mut ed = compile_exprlist(fs, exprs)?;
    let nret: i32 = if ed.kind.is_multret() {
        set_multret(fs, &mut ed);
        -1
    } else {
        exp2nextreg(fs, &mut ed, exprs.last().unwrap().pos())?;
        (fs.freereg - base) as i32
    };
    emit_return(fs, base, nret, pos);
    Ok(())
}

/// `return f(...)` / `return obj:m(...)`: rewrite the trailing call into a
/// `TAILCALL` (§4.4) instead of an ordinary `CALL` + `RETURN` pair. Returns
/// `Some(())` having already emitted `TAILCALL` + `RETURN` if `expr` is a
/// bare call in tail position; `None` if the caller should fall back to
/// ordinary expression-list codegen.
fn compile_tailcall(fs: &mut FuncState, expr: &Expr, pos: SourcePos) -> CodegenResult<Option<()>> {
    let base = fs.freereg;
    let args: &[Expr] = match expr {
        Expr::Call { func, args, .. } => {
            let mut fe = compile_expr(fs, func)?;
            exp2nextreg(fs, &mut fe, pos)?;
            args
        }
        Expr::MethodCall {
            object, method, args, ..
        } => {
            let mut oe = compile_expr(fs, object)?;
            let obj_reg = exp2anyreg(fs, &mut oe, pos)?;
            super::discharge::free_exp(fs, &oe);
            let func_reg = fs.freereg;
            fs.reserve_regs(2, pos)?;
            let k = fs.intern(Constant::string(method.clone()), pos)?;
            if k > Instruction::MAX_INDEX_RK {
                return Err(CodegenError::new(
                    CodegenErrorKind::ConstantOverflow,
                    pos,
                    "method name constant index out of RK range",
                ));
            }
            code_abc(fs, OpCode::Self_, func_reg as u32, obj_reg as u32, Rk::Const(k).encode(), pos);
            args
        }
        _ => return Ok(None),
    };

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
    code_abc(fs, OpCode::TailCall, base as u32, b, 0, pos);
    fs.freereg = base + 1;
    emit_return(fs, base, -1, pos);
    Ok(Some(()))
}

/// A call used as a statement: evaluate it for effect, keep none of its
/// results, and give its registers back.
fn compile_expr_stat(fs: &mut FuncState, expr: &Expr, pos: SourcePos) -> CodegenResult<()> {
    match expr {
        Expr::Call { .. } | Expr::MethodCall { .. } => {
            let saved = fs.freereg;
            let ed = compile_expr(fs, expr)?;
            if let ExpKind::Call(pc) = ed.kind {
                Instruction::set_c(&mut fs.code[pc], 1);
            }
            fs.freereg = saved;
            Ok(())
        }
        _ => Err(CodegenError::new(
            CodegenErrorKind::CompileError,
            pos,
            "syntax error: expression used as a statement must be a function call",
        )),
    }
}
