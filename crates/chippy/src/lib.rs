#![allow(
    clippy::cast_possible_truncation, // intentional: registers are 8-bit, wire fields are masked before narrowing
    clippy::cast_sign_loss, // intentional: ALU results are computed signed and stored as bytes
    clippy::module_name_repetitions,
    clippy::missing_errors_doc // error variants are documented on `Error`
)]

pub mod asm;
pub mod disassembler;
pub mod error;
pub mod isa;
pub mod vm;

/// Test harness module for writing unit and integration tests.
///
/// This module is only available when running tests or when the
/// `test-harness` feature is enabled.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use asm::{Assembler, AssemblerOptions, Program, assemble};
pub use disassembler::disassemble;
pub use error::{Error, Location, Result};
pub use isa::{AddressingMode, Instruction, ModeSet, Opcode, OpcodeTable, Operand, Register};
pub use vm::{State, Vm};
