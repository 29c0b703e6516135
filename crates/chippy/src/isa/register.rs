use std::fmt;

pub const REGISTER_COUNT: usize = 16;

/// A register index as it appears in a 4-bit operand field.
///
/// Index 0 is the constant-zero register, 1..=13 are general purpose
/// (`r1`..`r13`), 14 is the stack pointer and 15 receives comparison results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Self = Self(0);
    pub const SP: Self = Self(14);
    pub const CMP: Self = Self(15);

    pub const FIRST_GENERAL: u8 = 1;
    pub const LAST_GENERAL: u8 = 13;

    /// General-purpose register `r{n}`.
    #[must_use]
    pub const fn general(n: u8) -> Option<Self> {
        if matches!(n, Self::FIRST_GENERAL..=Self::LAST_GENERAL) {
            Some(Self(n))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Reserved register names, without the `$` sigil.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("zero") {
            Some(Self::ZERO)
        } else if name.eq_ignore_ascii_case("sp") {
            Some(Self::SP)
        } else if name.eq_ignore_ascii_case("cmp") {
            Some(Self::CMP)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ZERO => f.write_str("$zero"),
            Self::SP => f.write_str("$sp"),
            Self::CMP => f.write_str("$cmp"),
            Self(n) => write!(f, "$r{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_register_range() {
        assert_eq!(Register::general(0), None);
        assert_eq!(Register::general(1).map(Register::index), Some(1));
        assert_eq!(Register::general(13).map(Register::index), Some(13));
        assert_eq!(Register::general(14), None);
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(Register::from_name("sp"), Some(Register::SP));
        assert_eq!(Register::from_name("CMP"), Some(Register::CMP));
        assert_eq!(Register::from_name("zero"), Some(Register::ZERO));
        assert_eq!(Register::from_name("pc"), None);
    }

    #[test]
    fn test_every_index_fits_a_nibble() {
        for index in 0..16u8 {
            assert!(Register::from_index(index).is_some());
        }
        assert_eq!(Register::from_index(16), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Register::general(7).unwrap().to_string(), "$r7");
        assert_eq!(Register::SP.to_string(), "$sp");
    }
}
