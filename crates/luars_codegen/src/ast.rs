// Input AST contract (§6). The generator is handed an already-parsed tree;
// lexing and parsing are external collaborators. These node types exist so
// the generator (and its tests) have something concrete to walk — callers
// building a real front end construct the same shapes, typically straight
// out of their own parser's node types via a thin adapter.
//
// Every node carries a `SourcePos` so the generator can stamp it onto any
// `CodegenError` it raises without having to recompute it.

use smol_str::SmolStr;

use crate::error::SourcePos;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    /// `local a, b = 1, 2`
    Local {
        names: Vec<SmolStr>,
        exprs: Vec<Expr>,
        pos: SourcePos,
    },
    /// `a, t.x = 1, 2` — targets are restricted to the lvalue-shaped
    /// expressions (`Name`, `Index`, `Field`); anything else is a
    /// driver-level error rather than a parse-time one (§6 leaves that
    /// check to the generator).
    Assign {
        targets: Vec<Expr>,
        exprs: Vec<Expr>,
        pos: SourcePos,
    },
    /// `return e1, e2, ...`
    Return { exprs: Vec<Expr>, pos: SourcePos },
    /// A call used as a statement: `f(1, 2)`.
    ExprStat { expr: Expr, pos: SourcePos },
}

impl Stat {
    pub fn pos(&self) -> SourcePos {
        match self {
            Stat::Local { pos, .. }
            | Stat::Assign { pos, .. }
            | Stat::Return { pos, .. }
            | Stat::ExprStat { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// `{1, 2, 3}` entries — collected positionally for `SETLIST` (§4.5).
    Positional(Expr),
    /// `{x = 1}` / `{[k] = v}` entries.
    Keyed(Expr, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil(SourcePos),
    True(SourcePos),
    False(SourcePos),
    Number(f64, SourcePos),
    Str(SmolStr, SourcePos),
    Vararg(SourcePos),
    Name(SmolStr, SourcePos),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: SourcePos,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        pos: SourcePos,
    },
    /// `(e)` — suppresses multi-value spreading of a trailing call/vararg.
    Paren(Box<Expr>, SourcePos),
    /// `t[k]`
    Index {
        table: Box<Expr>,
        key: Box<Expr>,
        pos: SourcePos,
    },
    /// `t.name`
    Field {
        table: Box<Expr>,
        name: SmolStr,
        pos: SourcePos,
    },
    /// `f(a, b, ...)`
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        pos: SourcePos,
    },
    /// `obj:method(a, b, ...)` — `obj` is evaluated once and implicitly
    /// passed as the first argument (§4.5, `SELF`).
    MethodCall {
        object: Box<Expr>,
        method: SmolStr,
        args: Vec<Expr>,
        pos: SourcePos,
    },
    Table {
        fields: Vec<TableField>,
        pos: SourcePos,
    },
}

impl Expr {
    pub fn pos(&self) -> SourcePos {
        match self {
            Expr::Nil(p)
            | Expr::True(p)
            | Expr::False(p)
            | Expr::Number(_, p)
            | Expr::Str(_, p)
            | Expr::Vararg(p)
            | Expr::Name(_, p)
            | Expr::Paren(_, p) => *p,
            Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Field { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::MethodCall { pos, .. }
            | Expr::Table { pos, .. } => *pos,
        }
    }

    /// Does this expression, evaluated in a multi-value context, potentially
    /// produce more than one value? Only calls and `...` do (§4.4); every
    /// other expression always yields exactly one.
    pub fn is_multret(&self) -> bool {
        matches!(self, Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Vararg(_))
    }

    pub fn name(s: impl Into<SmolStr>, pos: SourcePos) -> Expr {
        Expr::Name(s.into(), pos)
    }

    pub fn string(s: impl Into<SmolStr>, pos: SourcePos) -> Expr {
        Expr::Str(s.into(), pos)
    }
}
