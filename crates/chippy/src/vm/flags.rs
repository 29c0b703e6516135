use std::cmp::Ordering;
use std::fmt;

use crate::isa::Opcode;

/// The flag register.
///
/// Bits 0-1 hold the condition code of the last comparison: `01` equal,
/// `10` less, `00` greater. Bits 2-4 are the arithmetic status bits.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u8);

impl Flags {
    pub const EQUAL: u8 = 0b01;
    pub const LESS: u8 = 0b10;
    pub const GREATER: u8 = 0b00;
    pub const CONDITION_MASK: u8 = 0b11;

    pub const DIVIDE_BY_ZERO: u8 = 1 << 2;
    pub const OVERFLOW: u8 = 1 << 3;
    pub const UNDERFLOW: u8 = 1 << 4;
    const ARITHMETIC_MASK: u8 = Self::DIVIDE_BY_ZERO | Self::OVERFLOW | Self::UNDERFLOW;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn condition(self) -> u8 {
        self.0 & Self::CONDITION_MASK
    }

    #[must_use]
    pub const fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    pub fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }

    pub fn clear_arithmetic(&mut self) {
        self.0 &= !Self::ARITHMETIC_MASK;
    }

    /// Records `lhs.cmp(rhs)` in the condition bits.
    pub fn compare(&mut self, ordering: Ordering) {
        self.0 &= !Self::CONDITION_MASK;
        self.0 |= match ordering {
            Ordering::Equal => Self::EQUAL,
            Ordering::Less => Self::LESS,
            Ordering::Greater => Self::GREATER,
        };
    }

    /// Whether the jump `opcode` is taken under the current condition code.
    /// Non-jump opcodes never jump.
    #[must_use]
    pub const fn jump_taken(self, opcode: Opcode) -> bool {
        let condition = self.condition();
        match opcode {
            Opcode::Jmp => true,
            Opcode::Jmpe => condition == Self::EQUAL,
            Opcode::Jmpne => condition != Self::EQUAL,
            Opcode::Jmpl => condition == Self::LESS,
            Opcode::Jmpg => condition == Self::GREATER,
            Opcode::Jmple => condition == Self::EQUAL || condition == Self::LESS,
            Opcode::Jmpge => condition == Self::GREATER || condition == Self::EQUAL,
            _ => false,
        }
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#07b})", self.0)
    }
}
