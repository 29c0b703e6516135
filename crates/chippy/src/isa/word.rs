//! Bit layout of a 32-bit instruction word.
//!
//! ```text
//! [opcode:5][mode tag:3][operand fields, most significant first ......]
//! ```
//!
//! Field widths come from [`AddressingMode::operand_bits`]. The assembler's
//! encoder and the VM's decoder both go through this module, so the two
//! sides can only disagree if this module disagrees with itself.

use std::fmt;

use super::{Address, AddressingMode, Opcode, OpcodeEntry, OpcodeTable, Operand, Register};

pub const WORD_SIZE: u16 = 4;
pub const WORD_BITS: u32 = 32;
const TAG_BITS: u32 = 3;
pub const HEADER_BITS: u32 = Opcode::BITS + TAG_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WordError {
    #[error("operands need {bits} bits, a word holds 32")]
    Overflow { bits: u32 },
    #[error("expected {expected} operand(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("label operands must be relocated before encoding")]
    UnresolvedLabel,
    #[error("undefined opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("mode tag {tag} is not valid for operand {position}")]
    IllegalMode { tag: u8, position: usize },
    #[error("free operands must share one addressing mode")]
    MixedModes,
}

/// Total bits used by the header plus the given operands.
#[must_use]
pub fn layout_bits<'a>(modes: impl IntoIterator<Item = &'a AddressingMode>) -> u32 {
    HEADER_BITS
        + modes
            .into_iter()
            .map(|mode| mode.operand_bits())
            .sum::<u32>()
}

/// A decoded (or label-free, ready to encode) instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    #[must_use]
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands }
    }

    /// Packs the instruction into a word using `entry`'s operand layout.
    pub fn encode(&self, entry: &OpcodeEntry) -> Result<u32, WordError> {
        if self.operands.len() != entry.arity() {
            return Err(WordError::ArityMismatch {
                expected: entry.arity(),
                found: self.operands.len(),
            });
        }

        let modes: Vec<AddressingMode> = self.operands.iter().map(Operand::mode).collect();
        for (position, (mode, set)) in modes.iter().zip(entry.operands).enumerate() {
            if !set.admits_decoded(*mode) {
                return Err(WordError::IllegalMode {
                    tag: mode.tag(),
                    position,
                });
            }
        }
        let mut free = entry.free_positions().map(|position| modes[position].tag());
        if free
            .next()
            .is_some_and(|tag| free.any(|other| other != tag))
        {
            return Err(WordError::MixedModes);
        }

        let bits = layout_bits(&modes);
        if bits > WORD_BITS {
            return Err(WordError::Overflow { bits });
        }

        let mut fields = FieldWriter::default();
        fields.push(u32::from(self.opcode as u8), Opcode::BITS);
        fields.push(u32::from(entry.mode_tag(&modes)), TAG_BITS);
        for operand in &self.operands {
            fields.operand(operand)?;
        }
        Ok(fields.word)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}

/// Unpacks a word. Fixed operand positions take their only mode, free
/// positions take the mode named by the word's tag.
pub fn decode(table: &OpcodeTable, word: u32) -> Result<Instruction, WordError> {
    let mut fields = FieldReader::new(word);
    let raw = fields.take(Opcode::BITS) as u8;
    let opcode = Opcode::from_u8(raw).ok_or(WordError::UnknownOpcode(raw))?;
    let entry = table
        .by_opcode(opcode)
        .ok_or(WordError::UnknownOpcode(raw))?;
    let tag = fields.take(TAG_BITS) as u8;

    let mut operands = Vec::with_capacity(entry.arity());
    for (position, set) in entry.operands.iter().enumerate() {
        let mode = match set.single() {
            Some(AddressingMode::Label) => AddressingMode::Direct,
            Some(mode) => mode,
            None => AddressingMode::from_tag(tag)
                .filter(|mode| set.admits_decoded(*mode))
                .ok_or(WordError::IllegalMode { tag, position })?,
        };
        operands.push(fields.operand(mode)?);
    }

    Ok(Instruction { opcode, operands })
}

#[derive(Default)]
struct FieldWriter {
    word: u32,
    used: u32,
}

impl FieldWriter {
    fn push(&mut self, value: u32, width: u32) {
        debug_assert!(self.used + width <= WORD_BITS);
        let mask = (1u32 << width) - 1;
        self.word |= (value & mask) << (WORD_BITS - self.used - width);
        self.used += width;
    }

    fn operand(&mut self, operand: &Operand) -> Result<(), WordError> {
        match operand {
            Operand::Immediate(value)
            | Operand::Direct(value)
            | Operand::PcRelative(value)
            | Operand::Indirect(Address::Absolute(value)) => self.push(u32::from(*value), 16),
            Operand::Register(register) | Operand::RegisterIndirect(register) => {
                self.push(u32::from(register.index()), 4);
            }
            Operand::RegisterRelative { offset, register } => {
                self.push(u32::from(register.index()), 4);
                self.push(u32::from(*offset), 16);
            }
            Operand::IndexedScaled {
                base,
                scale,
                register,
            } => {
                self.push(u32::from(register.index()), 4);
                self.push(u32::from(*scale), 4);
                self.push(u32::from(*base), 12);
            }
            Operand::Label(_) | Operand::Indirect(Address::Label(_)) => {
                return Err(WordError::UnresolvedLabel);
            }
        }
        Ok(())
    }
}

struct FieldReader {
    word: u32,
    used: u32,
}

impl FieldReader {
    fn new(word: u32) -> Self {
        Self { word, used: 0 }
    }

    fn take(&mut self, width: u32) -> u32 {
        let mask = (1u32 << width) - 1;
        let value = (self.word >> (WORD_BITS - self.used - width)) & mask;
        self.used += width;
        value
    }

    fn register(&mut self) -> Register {
        // A 4-bit field always names a register.
        Register::from_index(self.take(4) as u8).unwrap_or(Register::ZERO)
    }

    fn operand(&mut self, mode: AddressingMode) -> Result<Operand, WordError> {
        let bits = self.used + mode.operand_bits();
        if bits > WORD_BITS {
            return Err(WordError::Overflow { bits });
        }

        Ok(match mode {
            AddressingMode::Immediate => Operand::Immediate(self.take(16) as u16),
            AddressingMode::Direct | AddressingMode::Label => Operand::Direct(self.take(16) as u16),
            AddressingMode::Indirect => {
                Operand::Indirect(Address::Absolute(self.take(16) as u16))
            }
            AddressingMode::PcRelative => Operand::PcRelative(self.take(16) as u16),
            AddressingMode::RegisterDirect => Operand::Register(self.register()),
            AddressingMode::RegisterIndirect => Operand::RegisterIndirect(self.register()),
            AddressingMode::RegisterRelative => {
                let register = self.register();
                let offset = self.take(16) as u16;
                Operand::RegisterRelative { offset, register }
            }
            AddressingMode::IndexedScaled => {
                let register = self.register();
                let scale = self.take(4) as u8;
                let base = self.take(12) as u16;
                Operand::IndexedScaled {
                    base,
                    scale,
                    register,
                }
            }
        })
    }
}
