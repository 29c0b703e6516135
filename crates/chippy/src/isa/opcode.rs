use std::borrow::Cow;

use super::{AddressingMode, ModeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Hlt = 0x00,
    Mov = 0x01,
    Ldr = 0x02,
    Print = 0x03,
    Cmp = 0x04,
    Jmpl = 0x05,
    Jmpg = 0x06,
    Jmp = 0x07,
    // Arithmetic and logic (register, immediate or register)
    Add = 0x08,
    Sub = 0x09,
    Mul = 0x0A,
    Div = 0x0B,
    Xor = 0x0C,
    And = 0x0D,
    Or = 0x0E,
    Not = 0x0F,
    Jmple = 0x10,
    Jmpge = 0x11,
    Str = 0x12,
    Jmpe = 0x13,
    Jmpne = 0x14,
}

impl Opcode {
    /// Opcodes occupy the top 5 bits of a word.
    pub const BITS: u32 = 5;

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Hlt,
            0x01 => Self::Mov,
            0x02 => Self::Ldr,
            0x03 => Self::Print,
            0x04 => Self::Cmp,
            0x05 => Self::Jmpl,
            0x06 => Self::Jmpg,
            0x07 => Self::Jmp,
            0x08 => Self::Add,
            0x09 => Self::Sub,
            0x0A => Self::Mul,
            0x0B => Self::Div,
            0x0C => Self::Xor,
            0x0D => Self::And,
            0x0E => Self::Or,
            0x0F => Self::Not,
            0x10 => Self::Jmple,
            0x11 => Self::Jmpge,
            0x12 => Self::Str,
            0x13 => Self::Jmpe,
            0x14 => Self::Jmpne,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Hlt => "HLT",
            Self::Mov => "MOV",
            Self::Ldr => "LDR",
            Self::Print => "PRINT",
            Self::Cmp => "CMP",
            Self::Jmpl => "JMPL",
            Self::Jmpg => "JMPG",
            Self::Jmp => "JMP",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Xor => "XOR",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Jmple => "JMPLE",
            Self::Jmpge => "JMPGE",
            Self::Str => "STR",
            Self::Jmpe => "JMPE",
            Self::Jmpne => "JMPNE",
        }
    }

    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Self::Jmp
                | Self::Jmpe
                | Self::Jmpne
                | Self::Jmpl
                | Self::Jmpg
                | Self::Jmple
                | Self::Jmpge
        )
    }

    #[must_use]
    pub const fn is_alu(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
                | Self::Xor
                | Self::And
                | Self::Or
                | Self::Not
        )
    }
}

/// One row of the opcode table: mnemonic, opcode and the addressing modes
/// each operand position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub opcode: Opcode,
    pub operands: &'static [ModeSet],
}

impl OpcodeEntry {
    #[must_use]
    pub const fn new(mnemonic: &'static str, opcode: Opcode, operands: &'static [ModeSet]) -> Self {
        Self {
            mnemonic,
            opcode,
            operands,
        }
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.operands.len()
    }

    /// Positions that accept more than one mode. Their resolved mode is
    /// what the word's mode tag records.
    pub fn free_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.operands
            .iter()
            .enumerate()
            .filter(|(_, set)| set.single().is_none())
            .map(|(position, _)| position)
    }

    /// The tag written for operands in these modes.
    ///
    /// Free operands share the tag. With no free position the first operand's
    /// mode is recorded, and an operand-less instruction writes 0.
    #[must_use]
    pub fn mode_tag(&self, modes: &[AddressingMode]) -> u8 {
        let position = self.free_positions().next().unwrap_or(0);
        modes.get(position).map_or(0, |mode| mode.tag())
    }
}

const REG: ModeSet = ModeSet::REGISTER_DIRECT;
const VALUE: ModeSet = ModeSet::IMMEDIATE.union(ModeSet::REGISTER_DIRECT);
const MEMORY: ModeSet = ModeSet::DIRECT
    .union(ModeSet::INDIRECT)
    .union(ModeSet::REGISTER_INDIRECT)
    .union(ModeSet::REGISTER_RELATIVE)
    .union(ModeSet::INDEXED_SCALED)
    .union(ModeSet::LABEL);
const LOAD: ModeSet = MEMORY.union(VALUE);
const TARGET: ModeSet = ModeSet::DIRECT
    .union(ModeSet::INDIRECT)
    .union(ModeSet::REGISTER_INDIRECT)
    .union(ModeSet::REGISTER_RELATIVE)
    .union(ModeSet::PC_RELATIVE)
    .union(ModeSet::LABEL);

static STANDARD_ENTRIES: &[OpcodeEntry] = &[
    OpcodeEntry::new("HLT", Opcode::Hlt, &[]),
    OpcodeEntry::new("MOV", Opcode::Mov, &[REG, VALUE]),
    OpcodeEntry::new("LDR", Opcode::Ldr, &[REG, LOAD]),
    OpcodeEntry::new("STR", Opcode::Str, &[REG, MEMORY]),
    OpcodeEntry::new("PRINT", Opcode::Print, &[REG]),
    OpcodeEntry::new("CMP", Opcode::Cmp, &[REG, VALUE]),
    OpcodeEntry::new("ADD", Opcode::Add, &[REG, VALUE]),
    OpcodeEntry::new("SUB", Opcode::Sub, &[REG, VALUE]),
    OpcodeEntry::new("MUL", Opcode::Mul, &[REG, VALUE]),
    OpcodeEntry::new("DIV", Opcode::Div, &[REG, VALUE]),
    OpcodeEntry::new("XOR", Opcode::Xor, &[REG, VALUE]),
    OpcodeEntry::new("AND", Opcode::And, &[REG, VALUE]),
    OpcodeEntry::new("OR", Opcode::Or, &[REG, VALUE]),
    OpcodeEntry::new("NOT", Opcode::Not, &[REG, VALUE]),
    OpcodeEntry::new("JMP", Opcode::Jmp, &[TARGET]),
    OpcodeEntry::new("JMPE", Opcode::Jmpe, &[TARGET]),
    OpcodeEntry::new("JMPNE", Opcode::Jmpne, &[TARGET]),
    OpcodeEntry::new("JMPL", Opcode::Jmpl, &[TARGET]),
    OpcodeEntry::new("JMPG", Opcode::Jmpg, &[TARGET]),
    OpcodeEntry::new("JMPLE", Opcode::Jmple, &[TARGET]),
    OpcodeEntry::new("JMPGE", Opcode::Jmpge, &[TARGET]),
];

static STANDARD: OpcodeTable = OpcodeTable {
    entries: Cow::Borrowed(STANDARD_ENTRIES),
};

/// Mnemonic registry shared by the assembler and the VM.
///
/// The table is read-only configuration: components borrow it at
/// construction and never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeTable {
    entries: Cow<'static, [OpcodeEntry]>,
}

impl OpcodeTable {
    #[must_use]
    pub fn new(entries: Vec<OpcodeEntry>) -> Self {
        Self {
            entries: Cow::Owned(entries),
        }
    }

    /// The table both the assembler and the VM use by default.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Case-insensitive mnemonic lookup.
    #[must_use]
    pub fn lookup(&self, mnemonic: &str) -> Option<&OpcodeEntry> {
        self.entries
            .iter()
            .find(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
    }

    #[must_use]
    pub fn by_opcode(&self, opcode: Opcode) -> Option<&OpcodeEntry> {
        self.entries.iter().find(|entry| entry.opcode == opcode)
    }

    #[must_use]
    pub fn entries(&self) -> &[OpcodeEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_fit_five_bits() {
        for entry in OpcodeTable::standard().entries() {
            assert!(
                (entry.opcode as u8) < (1 << Opcode::BITS),
                "{} does not fit",
                entry.mnemonic
            );
        }
    }

    #[test]
    fn test_from_u8_round_trip() {
        for entry in OpcodeTable::standard().entries() {
            assert_eq!(Opcode::from_u8(entry.opcode as u8), Some(entry.opcode));
            assert_eq!(entry.opcode.mnemonic(), entry.mnemonic);
        }
        assert_eq!(Opcode::from_u8(0x1F), None);
    }

    #[test]
    fn test_every_opcode_has_one_entry() {
        let table = OpcodeTable::standard();
        for value in 0..32u8 {
            if let Some(opcode) = Opcode::from_u8(value) {
                let count = table
                    .entries()
                    .iter()
                    .filter(|entry| entry.opcode == opcode)
                    .count();
                assert_eq!(count, 1, "{opcode:?}");
            }
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = OpcodeTable::standard();
        assert_eq!(table.lookup("add").map(|e| e.opcode), Some(Opcode::Add));
        assert_eq!(table.lookup("PrInT").map(|e| e.opcode), Some(Opcode::Print));
        assert!(table.lookup("nop").is_none());
    }

    #[test]
    fn test_two_operand_forms_fix_the_register() {
        for entry in OpcodeTable::standard().entries() {
            if entry.arity() == 2 {
                assert_eq!(entry.operands[0], ModeSet::REGISTER_DIRECT, "{}", entry.mnemonic);
                assert_eq!(entry.free_positions().collect::<Vec<_>>(), vec![1]);
            }
        }
    }

    #[test]
    fn test_mode_tag_uses_free_position() {
        let table = OpcodeTable::standard();
        let add = table.lookup("ADD").unwrap();
        assert_eq!(
            add.mode_tag(&[AddressingMode::RegisterDirect, AddressingMode::Immediate]),
            0
        );
        assert_eq!(
            add.mode_tag(&[
                AddressingMode::RegisterDirect,
                AddressingMode::RegisterDirect
            ]),
            1
        );
        let print = table.lookup("PRINT").unwrap();
        assert_eq!(print.mode_tag(&[AddressingMode::RegisterDirect]), 1);
        let hlt = table.lookup("HLT").unwrap();
        assert_eq!(hlt.mode_tag(&[]), 0);
    }
}
