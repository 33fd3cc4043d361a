// Port of lopcodes.h's bit layout and opcode table — the Lua 5.1 dialect,
// not the 5.4 layout the teacher crate's own `lua_vm/opcode/instruction.rs`
// implements (7-bit op, 8/8/8 ABC). Lua 5.1 packs a 32-bit instruction as:
//
//   iABC:  [B(9) | C(9) | A(8) | Op(6)]
//   iABx:  [Bx(18)      | A(8) | Op(6)]
//   iAsBx: [sBx(18)     | A(8) | Op(6)]   (sBx = Bx - MAXARG_SBX)
//
// A register operand in B or C can alternatively carry a constant index
// when its high bit is set ("RK" encoding, §3); the constant in that case
// is at most `MAXARG_C >> 1` (255).

/// A single 32-bit bytecode word, viewed and built through the bit-twiddling
/// helpers below. Kept as a bare `u32` rather than a newtype so arrays of
/// them are passed around exactly like the final on-wire representation.
pub struct Instruction;

impl Instruction {
    pub const SIZE_OP: u32 = 6;
    pub const SIZE_A: u32 = 8;
    pub const SIZE_B: u32 = 9;
    pub const SIZE_C: u32 = 9;
    pub const SIZE_BX: u32 = Self::SIZE_B + Self::SIZE_C; // 18

    pub const POS_OP: u32 = 0;
    pub const POS_A: u32 = Self::POS_OP + Self::SIZE_OP; // 6
    pub const POS_C: u32 = Self::POS_A + Self::SIZE_A; // 14
    pub const POS_B: u32 = Self::POS_C + Self::SIZE_C; // 23
    pub const POS_BX: u32 = Self::POS_C; // 14

    pub const MAX_A: u32 = (1 << Self::SIZE_A) - 1;
    pub const MAX_B: u32 = (1 << Self::SIZE_B) - 1;
    pub const MAX_C: u32 = (1 << Self::SIZE_C) - 1;
    pub const MAX_BX: u32 = (1 << Self::SIZE_BX) - 1;
    pub const OFFSET_SBX: i32 = (Self::MAX_BX >> 1) as i32;

    /// High bit of a 9-bit RK operand: set when the operand is a constant
    /// index rather than a register index.
    pub const BIT_RK: u32 = 1 << (Self::SIZE_B - 1); // 256
    /// Largest constant index directly encodable in an RK operand (§3, §4.1).
    pub const MAX_INDEX_RK: u32 = Self::BIT_RK - 1; // 255

    fn mask1(n: u32, p: u32) -> u32 {
        (!(!0u32 << n)) << p
    }
    fn mask0(n: u32, p: u32) -> u32 {
        !Self::mask1(n, p)
    }
    fn get_arg(i: u32, pos: u32, size: u32) -> u32 {
        (i >> pos) & Self::mask1(size, 0)
    }
    fn set_arg(i: &mut u32, v: u32, pos: u32, size: u32) {
        debug_assert!(v <= Self::mask1(size, 0), "operand out of range");
        *i = (*i & Self::mask0(size, pos)) | ((v << pos) & Self::mask1(size, pos));
    }

    pub fn get_opcode(i: u32) -> OpCode {
        OpCode::from_u8(Self::get_arg(i, Self::POS_OP, Self::SIZE_OP) as u8)
    }
    pub fn set_opcode(i: &mut u32, op: OpCode) {
        Self::set_arg(i, op as u32, Self::POS_OP, Self::SIZE_OP);
    }

    pub fn get_a(i: u32) -> u32 {
        Self::get_arg(i, Self::POS_A, Self::SIZE_A)
    }
    pub fn set_a(i: &mut u32, v: u32) {
        Self::set_arg(i, v, Self::POS_A, Self::SIZE_A);
    }

    pub fn get_b(i: u32) -> u32 {
        Self::get_arg(i, Self::POS_B, Self::SIZE_B)
    }
    pub fn set_b(i: &mut u32, v: u32) {
        Self::set_arg(i, v, Self::POS_B, Self::SIZE_B);
    }

    pub fn get_c(i: u32) -> u32 {
        Self::get_arg(i, Self::POS_C, Self::SIZE_C)
    }
    pub fn set_c(i: &mut u32, v: u32) {
        Self::set_arg(i, v, Self::POS_C, Self::SIZE_C);
    }

    pub fn get_bx(i: u32) -> u32 {
        Self::get_arg(i, Self::POS_BX, Self::SIZE_BX)
    }
    pub fn set_bx(i: &mut u32, v: u32) {
        Self::set_arg(i, v, Self::POS_BX, Self::SIZE_BX);
    }

    pub fn get_sbx(i: u32) -> i32 {
        Self::get_bx(i) as i32 - Self::OFFSET_SBX
    }
    pub fn set_sbx(i: &mut u32, v: i32) {
        Self::set_bx(i, (v + Self::OFFSET_SBX) as u32);
    }

    pub fn create_abc(op: OpCode, a: u32, b: u32, c: u32) -> u32 {
        let mut i = 0u32;
        Self::set_opcode(&mut i, op);
        Self::set_a(&mut i, a);
        Self::set_b(&mut i, b);
        Self::set_c(&mut i, c);
        i
    }

    pub fn create_abx(op: OpCode, a: u32, bx: u32) -> u32 {
        let mut i = 0u32;
        Self::set_opcode(&mut i, op);
        Self::set_a(&mut i, a);
        Self::set_bx(&mut i, bx);
        i
    }

    pub fn create_asbx(op: OpCode, a: u32, sbx: i32) -> u32 {
        let mut i = 0u32;
        Self::set_opcode(&mut i, op);
        Self::set_a(&mut i, a);
        Self::set_sbx(&mut i, sbx);
        i
    }

    /// Is this RK-encoded 9-bit operand a constant index rather than a
    /// register index?
    pub fn is_k(x: u32) -> bool {
        x & Self::BIT_RK != 0
    }

    /// The constant-table index carried by an RK operand whose `is_k` bit
    /// is set.
    pub fn rk_index(x: u32) -> u32 {
        x & !Self::BIT_RK
    }

    /// Build the 9-bit RK operand for a constant at `k`.
    pub fn rk_const(k: u32) -> u32 {
        debug_assert!(k <= Self::MAX_INDEX_RK);
        k | Self::BIT_RK
    }
}

/// One operand's shape, purely documentary/diagnostic here (the encoders
/// above are generic over the layout and do not consult this), but useful
/// for debug-printing instructions and for the test suite's shape
/// assertions — ported in spirit from the teacher's `OpMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    IABC,
    IABx,
    IAsBx,
}

macro_rules! opcodes {
    ($($name:ident = $val:expr => $mode:ident),* $(,)?) => {
        /// The Lua 5.1 opcode set, in the reference compiler's numeric
        /// order (ported from `lopcodes.h`'s `OP_*` enum) — the numeric
        /// value is part of the on-wire format, so it must not be
        /// reordered.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum OpCode {
            $($name = $val),*
        }

        impl OpCode {
            pub fn from_u8(b: u8) -> OpCode {
                match b {
                    $($val => OpCode::$name,)*
                    _ => panic!("invalid opcode byte {b}"),
                }
            }

            pub fn get_mode(self) -> OpMode {
                match self {
                    $(OpCode::$name => OpMode::$mode),*
                }
            }
        }
    };
}

opcodes! {
    Move       = 0  => IABC,
    LoadK      = 1  => IABx,
    LoadBool   = 2  => IABC,
    LoadNil    = 3  => IABC,
    GetUpval   = 4  => IABC,
    GetGlobal  = 5  => IABx,
    GetTable   = 6  => IABC,
    SetGlobal  = 7  => IABx,
    SetUpval   = 8  => IABC,
    SetTable   = 9  => IABC,
    NewTable   = 10 => IABC,
    Self_      = 11 => IABC,
    Add        = 12 => IABC,
    Sub        = 13 => IABC,
    Mul        = 14 => IABC,
    Div        = 15 => IABC,
    Mod        = 16 => IABC,
    Pow        = 17 => IABC,
    Unm        = 18 => IABC,
    Not        = 19 => IABC,
    Len        = 20 => IABC,
    Concat     = 21 => IABC,
    Jmp        = 22 => IAsBx,
    Eq         = 23 => IABC,
    Lt         = 24 => IABC,
    Le         = 25 => IABC,
    Test       = 26 => IABC,
    TestSet    = 27 => IABC,
    Call       = 28 => IABC,
    TailCall   = 29 => IABC,
    Return     = 30 => IABC,
    ForLoop    = 31 => IAsBx,
    ForPrep    = 32 => IAsBx,
    TForLoop   = 33 => IABC,
    SetList    = 34 => IABC,
    Close      = 35 => IABC,
    Closure    = 36 => IABx,
    Vararg     = 37 => IABC,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abc_roundtrip() {
        let i = Instruction::create_abc(OpCode::Move, 1, 2, 3);
        assert_eq!(Instruction::get_opcode(i), OpCode::Move);
        assert_eq!(Instruction::get_a(i), 1);
        assert_eq!(Instruction::get_b(i), 2);
        assert_eq!(Instruction::get_c(i), 3);
    }

    #[test]
    fn abx_roundtrip() {
        let i = Instruction::create_abx(OpCode::LoadK, 4, 200_000);
        assert_eq!(Instruction::get_opcode(i), OpCode::LoadK);
        assert_eq!(Instruction::get_a(i), 4);
        assert_eq!(Instruction::get_bx(i), 200_000);
    }

    #[test]
    fn asbx_roundtrip_negative() {
        let i = Instruction::create_asbx(OpCode::Jmp, 0, -17);
        assert_eq!(Instruction::get_sbx(i), -17);
    }

    #[test]
    fn rk_encoding() {
        assert!(!Instruction::is_k(5));
        let k = Instruction::rk_const(5);
        assert!(Instruction::is_k(k));
        assert_eq!(Instruction::rk_index(k), 5);
        assert_eq!(Instruction::MAX_INDEX_RK, 255);
    }

    #[test]
    fn field_positions_match_lua51() {
        assert_eq!(Instruction::POS_OP, 0);
        assert_eq!(Instruction::POS_A, 6);
        assert_eq!(Instruction::POS_C, 14);
        assert_eq!(Instruction::POS_B, 23);
        assert_eq!(Instruction::SIZE_BX, 18);
    }
}
