// Constant folding — port of `luaK_fixline`-adjacent `constfolding` from
// `lcode.c`. Restricted, per §4.3, to unary `-`/`#` and the six binary
// arithmetic operators on two literal-number operands; comparisons,
// concatenation and logical operators are never folded (Lua itself doesn't
// fold `..` because of potential metamethod/tostring effects, and folding a
// comparison or logical op would require deciding truthiness at compile
// time for operands that already reduced to booleans, which brings no
// benefit here).

use crate::ast::{BinOp, UnOp};

/// Fold a binary arithmetic operator over two literal numbers, or return
/// `None` if the operator isn't foldable or the operands would make the
/// reference VM raise at runtime (division/modulo by exactly zero, per
/// §4.3's edge case list).
pub fn fold_binary(op: BinOp, a: f64, b: f64) -> Option<f64> {
    match op {
        BinOp::Add => Some(a + b),
        BinOp::Sub => Some(a - b),
        BinOp::Mul => Some(a * b),
        BinOp::Div => {
            if b == 0.0 {
                None
            } else {
                Some(a / b)
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                None
            } else {
                let r = a - (a / b).floor() * b;
                Some(r)
            }
        }
        BinOp::Pow => Some(a.powf(b)),
        _ => None,
    }
}

/// Fold a unary operator over a literal number. `#` on a number is never
/// foldable (§4.3 — `#` is only ever a table/string-length operator, never
/// meaningfully applicable to a number literal, so the generator always
/// emits `OP_LEN` instead of attempting this).
pub fn fold_unary(op: UnOp, a: f64) -> Option<f64> {
    match op {
        UnOp::Neg => Some(-a),
        _ => None,
    }
}
