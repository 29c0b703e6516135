use std::fmt;

use super::{AddressingMode, Register};

/// Target of an indirect operand: a literal address or a label that is
/// relocated at encode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Absolute(u16),
    Label(String),
}

/// A typed operand. Each variant is one addressing mode together with the
/// values captured from its source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Immediate(u16),
    Direct(u16),
    Indirect(Address),
    Register(Register),
    RegisterIndirect(Register),
    RegisterRelative {
        offset: u16,
        register: Register,
    },
    IndexedScaled {
        base: u16,
        scale: u8,
        register: Register,
    },
    PcRelative(u16),
    Label(String),
}

impl Operand {
    #[must_use]
    pub const fn mode(&self) -> AddressingMode {
        match self {
            Self::Immediate(_) => AddressingMode::Immediate,
            Self::Direct(_) => AddressingMode::Direct,
            Self::Indirect(_) => AddressingMode::Indirect,
            Self::Register(_) => AddressingMode::RegisterDirect,
            Self::RegisterIndirect(_) => AddressingMode::RegisterIndirect,
            Self::RegisterRelative { .. } => AddressingMode::RegisterRelative,
            Self::IndexedScaled { .. } => AddressingMode::IndexedScaled,
            Self::PcRelative(_) => AddressingMode::PcRelative,
            Self::Label(_) => AddressingMode::Label,
        }
    }

    /// The label this operand refers to, bare or through an indirection.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Label(name) | Self::Indirect(Address::Label(name)) => Some(name),
            _ => None,
        }
    }

    /// Replaces label references with their addresses.
    ///
    /// A bare label becomes a direct address; an indirect label keeps its
    /// indirection. Returns `None` when `lookup` does not know the label.
    pub fn relocate(&self, lookup: impl Fn(&str) -> Option<u16>) -> Option<Self> {
        match self {
            Self::Label(name) => lookup(name).map(Self::Direct),
            Self::Indirect(Address::Label(name)) => {
                lookup(name).map(|address| Self::Indirect(Address::Absolute(address)))
            }
            other => Some(other.clone()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(address) => write!(f, "{address}"),
            Self::Label(name) => write!(f, ".{name}"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "#{value}"),
            Self::Direct(address) => write!(f, "{address}"),
            Self::Indirect(address) => write!(f, "({address})"),
            Self::Register(register) => write!(f, "{register}"),
            Self::RegisterIndirect(register) => write!(f, "({register})"),
            Self::RegisterRelative { offset, register } => write!(f, "{offset}+{register}"),
            Self::IndexedScaled {
                base,
                scale,
                register,
            } => write!(f, "{base}+{scale}*{register}"),
            Self::PcRelative(offset) => write!(f, "#({offset})"),
            Self::Label(name) => write!(f, ".{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocate_bare_label_becomes_direct() {
        let operand = Operand::Label("loop".to_string());
        let relocated = operand.relocate(|name| (name == "loop").then_some(0x204));
        assert_eq!(relocated, Some(Operand::Direct(0x204)));
    }

    #[test]
    fn test_relocate_keeps_indirection() {
        let operand = Operand::Indirect(Address::Label("table".to_string()));
        let relocated = operand.relocate(|_| Some(0x300));
        assert_eq!(
            relocated,
            Some(Operand::Indirect(Address::Absolute(0x300)))
        );
    }

    #[test]
    fn test_relocate_unknown_label() {
        let operand = Operand::Label("missing".to_string());
        assert_eq!(operand.relocate(|_| None), None);
    }

    #[test]
    fn test_label_reference() {
        assert_eq!(Operand::Label("a".to_string()).label(), Some("a"));
        assert_eq!(
            Operand::Indirect(Address::Label("b".to_string())).label(),
            Some("b")
        );
        assert_eq!(Operand::Immediate(1).label(), None);
    }

    #[test]
    fn test_display_matches_source_syntax() {
        let r3 = Register::general(3).unwrap();
        assert_eq!(Operand::Immediate(10).to_string(), "#10");
        assert_eq!(
            Operand::RegisterRelative {
                offset: 4,
                register: r3
            }
            .to_string(),
            "4+$r3"
        );
        assert_eq!(
            Operand::IndexedScaled {
                base: 16,
                scale: 2,
                register: r3
            }
            .to_string(),
            "16+2*$r3"
        );
        assert_eq!(Operand::PcRelative(8).to_string(), "#(8)");
    }
}
