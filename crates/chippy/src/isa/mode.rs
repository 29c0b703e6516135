use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Immediate,
    Direct,
    Indirect,
    RegisterDirect,
    RegisterIndirect,
    RegisterRelative,
    IndexedScaled,
    PcRelative,
    Label,
}

impl AddressingMode {
    pub const ALL: [Self; 9] = [
        Self::Immediate,
        Self::Direct,
        Self::Indirect,
        Self::RegisterDirect,
        Self::RegisterIndirect,
        Self::RegisterRelative,
        Self::IndexedScaled,
        Self::PcRelative,
        Self::Label,
    ];

    /// The 3-bit tag written after the opcode.
    ///
    /// A label is an absolute address once relocated, so it shares the
    /// direct tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Immediate => 0,
            Self::RegisterDirect => 1,
            Self::RegisterRelative => 2,
            Self::PcRelative => 3,
            Self::Direct | Self::Label => 4,
            Self::Indirect => 5,
            Self::RegisterIndirect => 6,
            Self::IndexedScaled => 7,
        }
    }

    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Immediate),
            1 => Some(Self::RegisterDirect),
            2 => Some(Self::RegisterRelative),
            3 => Some(Self::PcRelative),
            4 => Some(Self::Direct),
            5 => Some(Self::Indirect),
            6 => Some(Self::RegisterIndirect),
            7 => Some(Self::IndexedScaled),
            _ => None,
        }
    }

    /// Number of word bits an operand in this mode occupies.
    ///
    /// Register fields are 4 bits, values and addresses 16. Register-relative
    /// is register + 16-bit offset; indexed-scaled is register + 4-bit scale +
    /// 12-bit base.
    #[must_use]
    pub const fn operand_bits(self) -> u32 {
        match self {
            Self::RegisterDirect | Self::RegisterIndirect => 4,
            Self::Immediate | Self::Direct | Self::Indirect | Self::PcRelative | Self::Label => {
                16
            }
            Self::RegisterRelative | Self::IndexedScaled => 20,
        }
    }

    #[must_use]
    pub const fn flag(self) -> ModeSet {
        match self {
            Self::Immediate => ModeSet::IMMEDIATE,
            Self::Direct => ModeSet::DIRECT,
            Self::Indirect => ModeSet::INDIRECT,
            Self::RegisterDirect => ModeSet::REGISTER_DIRECT,
            Self::RegisterIndirect => ModeSet::REGISTER_INDIRECT,
            Self::RegisterRelative => ModeSet::REGISTER_RELATIVE,
            Self::IndexedScaled => ModeSet::INDEXED_SCALED,
            Self::PcRelative => ModeSet::PC_RELATIVE,
            Self::Label => ModeSet::LABEL,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Direct => "direct",
            Self::Indirect => "indirect",
            Self::RegisterDirect => "register",
            Self::RegisterIndirect => "register-indirect",
            Self::RegisterRelative => "register-relative",
            Self::IndexedScaled => "indexed-scaled",
            Self::PcRelative => "pc-relative",
            Self::Label => "label",
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of addressing modes, one bit per mode.
///
/// Bit positions are part of the opcode table contract and never change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModeSet(u16);

impl ModeSet {
    pub const EMPTY: Self = Self(0);
    pub const IMMEDIATE: Self = Self(0x001);
    pub const DIRECT: Self = Self(0x002);
    pub const INDIRECT: Self = Self(0x004);
    pub const REGISTER_DIRECT: Self = Self(0x008);
    pub const REGISTER_INDIRECT: Self = Self(0x010);
    pub const REGISTER_RELATIVE: Self = Self(0x020);
    pub const INDEXED_SCALED: Self = Self(0x040);
    pub const PC_RELATIVE: Self = Self(0x080);
    pub const LABEL: Self = Self(0x100);
    pub const ALL: Self = Self(0x1FF);

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, mode: AddressingMode) -> bool {
        self.0 & mode.flag().0 != 0
    }

    /// Whether a mode read back from a word tag is legal for this position.
    ///
    /// Labels are encoded with the direct tag, so a direct tag is legal
    /// wherever labels are.
    #[must_use]
    pub const fn admits_decoded(self, mode: AddressingMode) -> bool {
        self.contains(mode)
            || (matches!(mode, AddressingMode::Direct) && self.contains(AddressingMode::Label))
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// The only mode in the set, if it holds exactly one.
    #[must_use]
    pub fn single(self) -> Option<AddressingMode> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }

    pub fn iter(self) -> impl Iterator<Item = AddressingMode> {
        AddressingMode::ALL
            .into_iter()
            .filter(move |mode| self.contains(*mode))
    }
}

impl BitOr for ModeSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ModeSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl From<AddressingMode> for ModeSet {
    fn from(mode: AddressingMode) -> Self {
        mode.flag()
    }
}

impl FromIterator<AddressingMode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = AddressingMode>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |set, mode| set | mode.flag())
    }
}

impl fmt::Debug for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for mode in AddressingMode::ALL {
            let decoded = AddressingMode::from_tag(mode.tag()).unwrap();
            if mode == AddressingMode::Label {
                assert_eq!(decoded, AddressingMode::Direct);
            } else {
                assert_eq!(decoded, mode);
            }
        }
        assert_eq!(AddressingMode::from_tag(8), None);
    }

    #[test]
    fn test_conventional_tags() {
        assert_eq!(AddressingMode::Immediate.tag(), 0);
        assert_eq!(AddressingMode::RegisterDirect.tag(), 1);
        assert_eq!(AddressingMode::RegisterRelative.tag(), 2);
        assert_eq!(AddressingMode::PcRelative.tag(), 3);
    }

    #[test]
    fn test_flags_are_distinct_bits() {
        let all: ModeSet = AddressingMode::ALL.into_iter().collect();
        assert_eq!(all, ModeSet::ALL);
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn test_union_and_membership() {
        let set = ModeSet::IMMEDIATE | ModeSet::REGISTER_DIRECT;
        assert!(set.contains(AddressingMode::Immediate));
        assert!(set.contains(AddressingMode::RegisterDirect));
        assert!(!set.contains(AddressingMode::Direct));
        assert_eq!(set.bits(), 0x009);
        assert_eq!(set.single(), None);
        assert_eq!(
            ModeSet::REGISTER_DIRECT.single(),
            Some(AddressingMode::RegisterDirect)
        );
    }

    #[test]
    fn test_direct_tag_admitted_where_labels_are() {
        assert!(ModeSet::LABEL.admits_decoded(AddressingMode::Direct));
        assert!(!ModeSet::IMMEDIATE.admits_decoded(AddressingMode::Direct));
    }
}
