//! ROM listings, decoded through the same word codec the VM uses.

use std::fmt;

use crate::isa::{Instruction, LOAD_ADDRESS, OpcodeTable, WORD_SIZE, decode};

/// One listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Instruction {
        address: u16,
        word: u32,
        instruction: Instruction,
    },
    /// A word that does not decode under the table.
    Word { address: u16, word: u32 },
    /// Bytes after the last whole word.
    Trailing { address: u16, bytes: Vec<u8> },
}

impl Line {
    #[must_use]
    pub fn address(&self) -> u16 {
        match self {
            Self::Instruction { address, .. }
            | Self::Word { address, .. }
            | Self::Trailing { address, .. } => *address,
        }
    }

    #[must_use]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            Self::Instruction { instruction, .. } => Some(instruction),
            _ => None,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}: ", self.address())?;
        match self {
            Self::Instruction { instruction, .. } => write!(f, "{instruction}"),
            Self::Word { word, .. } => write!(f, ".word {word:#010x}"),
            Self::Trailing { bytes, .. } => {
                f.write_str(".byte")?;
                for (i, byte) in bytes.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{byte:#04x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Decodes `rom` as loaded at the load address.
#[must_use]
pub fn listing(table: &OpcodeTable, rom: &[u8]) -> Vec<Line> {
    let chunks = rom.chunks_exact(usize::from(WORD_SIZE));
    let trailing = chunks.remainder();
    let mut address = LOAD_ADDRESS;
    let mut lines = Vec::with_capacity(rom.len() / usize::from(WORD_SIZE) + 1);

    for chunk in chunks {
        let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        lines.push(match decode(table, word) {
            Ok(instruction) => Line::Instruction {
                address,
                word,
                instruction,
            },
            Err(_) => Line::Word { address, word },
        });
        address = address.wrapping_add(WORD_SIZE);
    }
    if !trailing.is_empty() {
        lines.push(Line::Trailing {
            address,
            bytes: trailing.to_vec(),
        });
    }
    lines
}

/// Listing of `rom` under the standard table, one line per word.
#[must_use]
pub fn disassemble(rom: &[u8]) -> String {
    listing(OpcodeTable::standard(), rom)
        .iter()
        .map(|line| format!("{line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_listing_round_trips_source() {
        let rom = assemble("LDR $r1, 3+r2\nSTR r1, 16+2*r3\n.end\nJMPNE .end").unwrap();
        assert_eq!(
            disassemble(&rom),
            "0x0200: LDR $r1, 3+$r2\n0x0204: STR $r1, 16+2*$r3\n0x0208: JMPNE 520\n"
        );
    }

    #[test]
    fn test_undefined_words_and_trailing_bytes() {
        let rom = [0xF8, 0, 0, 1, 0x00, 0, 0, 0, 0xAB];
        let lines = listing(OpcodeTable::standard(), &rom);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].to_string(), "0x0200: .word 0xf8000001");
        assert_eq!(lines[1].to_string(), "0x0204: HLT");
        assert_eq!(lines[2].to_string(), "0x0208: .byte 0xab");
        assert!(lines[1].instruction().is_some());
    }
}
