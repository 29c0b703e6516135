// Word packing narrows masked u32 fields into u8/u16 operands.
#![allow(clippy::cast_possible_truncation)]

mod mode;
mod opcode;
mod operand;
mod register;
mod word;

pub use mode::{AddressingMode, ModeSet};
pub use opcode::{Opcode, OpcodeEntry, OpcodeTable};
pub use operand::{Address, Operand};
pub use register::{REGISTER_COUNT, Register};
pub use word::{HEADER_BITS, Instruction, WORD_BITS, WORD_SIZE, WordError, decode, layout_bits};

/// Size of VM memory in bytes.
pub const MEMORY_SIZE: usize = 4096;

/// Address a ROM is loaded at, and the default base address for relocation.
pub const LOAD_ADDRESS: u16 = 0x200;
