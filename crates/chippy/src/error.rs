use std::fmt;

use crate::isa::AddressingMode;

/// Position of a token in assembly source: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{location}: unexpected end of input, `{mnemonic}` expects {expected} operand(s)")]
    UnexpectedEndOfInput {
        location: Location,
        mnemonic: String,
        expected: usize,
    },

    #[error("{location}: invalid operand `{token}`")]
    InvalidOperand { location: Location, token: String },

    #[error("{location}: unexpected identifier `{token}`")]
    UnexpectedIdentifier { location: Location, token: String },

    #[error("{location}: `{mnemonic}` expects {expected} operand(s), found {found}")]
    ArityMismatch {
        location: Location,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "{location}: {mode} operand `{token}` is not allowed as operand {position} of `{mnemonic}`"
    )]
    InvalidAddressingMode {
        location: Location,
        mnemonic: String,
        token: String,
        position: usize,
        mode: AddressingMode,
    },

    #[error(
        "{location}: operands of `{mnemonic}` must share one addressing mode, `{token}` is {found} but expected {expected}"
    )]
    InconsistentAddressingModes {
        location: Location,
        mnemonic: String,
        token: String,
        expected: AddressingMode,
        found: AddressingMode,
    },

    #[error("{location}: duplicate definition of label `{label}`")]
    DuplicateLabel { location: Location, label: String },

    #[error("{location}: undefined label `{label}`")]
    UndefinedLabel { location: Location, label: String },

    #[error("{location}: `{mnemonic}` needs {bits} bits, an instruction word holds 32")]
    InstructionOverflow {
        location: Location,
        mnemonic: String,
        bits: u32,
    },

    #[error("{location}: register `{token}` is out of range")]
    RegisterOutOfRange { location: Location, token: String },

    #[error("{location}: `{token}` does not fit in the 16-bit address space")]
    ProgramTooLarge { location: Location, token: String },

    #[error("instruction at {pc:#06x} is cut off by the end of the ROM")]
    TruncatedInstruction { pc: u16 },

    #[error("pc {pc:#06x} is outside the loaded ROM")]
    PcOutsideRom { pc: u16 },

    #[error("address {address:#06x} is out of bounds (pc {pc:#06x})")]
    AddressOutOfBounds { pc: u16, address: u32 },

    #[error("malformed instruction {word:#010x} at {pc:#06x}")]
    MalformedInstruction { pc: u16, word: u32 },

    #[error("ROM of {size} bytes does not fit in memory ({capacity} bytes available)")]
    RomTooLarge { size: usize, capacity: usize },

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Source location for assembler errors, `None` for VM errors.
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::UnexpectedEndOfInput { location, .. }
            | Self::InvalidOperand { location, .. }
            | Self::UnexpectedIdentifier { location, .. }
            | Self::ArityMismatch { location, .. }
            | Self::InvalidAddressingMode { location, .. }
            | Self::InconsistentAddressingModes { location, .. }
            | Self::DuplicateLabel { location, .. }
            | Self::UndefinedLabel { location, .. }
            | Self::InstructionOverflow { location, .. }
            | Self::RegisterOutOfRange { location, .. }
            | Self::ProgramTooLarge { location, .. } => Some(*location),
            Self::TruncatedInstruction { .. }
            | Self::PcOutsideRom { .. }
            | Self::AddressOutOfBounds { .. }
            | Self::MalformedInstruction { .. }
            | Self::RomTooLarge { .. }
            | Self::Output(_)
            | Self::Internal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
