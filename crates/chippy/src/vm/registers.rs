use crate::isa::{REGISTER_COUNT, Register};

/// Sixteen 8-bit registers. The zero register always reads 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Registers([u8; REGISTER_COUNT]);

impl Registers {
    #[must_use]
    pub fn get(&self, register: Register) -> u8 {
        self.0[usize::from(register.index())]
    }

    /// Writes to the zero register are discarded.
    pub fn set(&mut self, register: Register, value: u8) {
        if register != Register::ZERO {
            self.0[usize::from(register.index())] = value;
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}
