// The literal-value domain the generator manipulates.
//
// `Constant` is the four variants that can live in a function's constant
// table (§3). `Value` is the superset used by the compile-time `Table`
// (§4.6): it adds the runtime-only variants that can appear as table keys
// but never as constants — table/function/userdata/thread/light-userdata.
// Those are represented as opaque identities here, since the generator
// never inspects their contents, only their equality.
//
// Strings use `SmolStr` (ported from the teacher's `smol_str` dependency):
// short strings are stored inline, long ones behind a refcount, so cloning
// an already-interned constant is cheap either way.

use std::hash::{Hash, Hasher};

use smol_str::SmolStr;

/// A number compared and hashed bit-for-bit, per §3: "Constants are equal
/// iff their tags and payloads are equal (... bit-exact for doubles)".
#[derive(Debug, Clone, Copy)]
pub struct ExactFloat(pub f64);

impl PartialEq for ExactFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for ExactFloat {}

impl Hash for ExactFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl ExactFloat {
    pub fn is_nan(&self) -> bool {
        self.0.is_nan()
    }

    /// `k` is a positive integer representable exactly as a double — the
    /// condition the table's array part uses to decide array- vs.
    /// hash-eligibility (§3, §4.6).
    pub fn as_array_index(&self) -> Option<u64> {
        if self.0.is_finite() && self.0 >= 1.0 && self.0.fract() == 0.0 {
            let i = self.0 as u64;
            if i as f64 == self.0 { Some(i) } else { None }
        } else {
            None
        }
    }
}

/// An opaque runtime identity: distinct values compare unequal to each
/// other and to themselves only by identity, as real GC-object pointers
/// would. Compile-time code never needs to look inside one — it only ever
/// compares and hashes it as a table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

/// A literal value the generator can intern into a function's constant
/// table (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Number(ExactFloat),
    Str(SmolStr),
}

impl Constant {
    pub fn number(n: f64) -> Self {
        Constant::Number(ExactFloat(n))
    }

    pub fn string(s: impl Into<SmolStr>) -> Self {
        Constant::Str(s.into())
    }
}

/// The full value domain, used by the compile-time [`crate::table::Table`].
/// A superset of [`Constant`]: adds the variants that can only ever be a
/// table key at compile time (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(ExactFloat),
    Str(SmolStr),
    Table(ObjectId),
    Function(ObjectId),
    UserData(ObjectId),
    Thread(ObjectId),
    LightUserData(usize),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn number(n: f64) -> Self {
        Value::Number(ExactFloat(n))
    }

    pub fn string(s: impl Into<SmolStr>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_array_index(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_array_index(),
            _ => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        match c {
            Constant::Nil => Value::Nil,
            Constant::Boolean(b) => Value::Boolean(b),
            Constant::Number(n) => Value::Number(n),
            Constant::Str(s) => Value::Str(s),
        }
    }
}
