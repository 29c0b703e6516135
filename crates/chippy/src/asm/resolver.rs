//! Operand text to typed operands.
//!
//! Each addressing mode has a small grammar. Grammars are tried in a fixed
//! order and the first one that matches decides the mode; they are written
//! so that at most one can match any text.

use crate::isa::{Address, Operand, Register};

/// Largest base of an indexed-scaled operand (12-bit field).
pub const MAX_SCALED_BASE: u32 = 0xFFF;
/// Largest scale of an indexed-scaled operand (4-bit field).
pub const MAX_SCALE: u32 = 0xF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// No grammar matches the text.
    Unrecognized,
    /// The text has the right shape but a value does not fit its field.
    ValueOutOfRange,
    /// `r<N>` with N outside the general-purpose range.
    RegisterOutOfRange,
}

/// Outcome of one grammar: `None` when the text does not have its shape.
type Match<T> = Option<Result<T, ResolveError>>;

const GRAMMARS: [fn(&str) -> Match<Operand>; 9] = [
    immediate,
    direct,
    indirect,
    register_direct,
    register_indirect,
    register_relative,
    indexed_scaled,
    pc_relative,
    label,
];

/// Resolves operand text to an [`Operand`], first matching grammar wins.
pub fn resolve_operand(text: &str) -> Result<Operand, ResolveError> {
    GRAMMARS
        .iter()
        .find_map(|grammar| grammar(text))
        .unwrap_or(Err(ResolveError::Unrecognized))
}

/// `name` in `.name`: letters, digits and underscores, not starting with a digit.
#[must_use]
pub fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// `#10`, `#0x0a`
fn immediate(text: &str) -> Match<Operand> {
    let value = text.strip_prefix('#')?;
    number16(value).map(|result| result.map(Operand::Immediate))
}

/// `10`, `[10]`
fn direct(text: &str) -> Match<Operand> {
    let value = enclosed(text, '[', ']').unwrap_or(text);
    number16(value).map(|result| result.map(Operand::Direct))
}

/// `(10)`, `(.table)`
fn indirect(text: &str) -> Match<Operand> {
    let inner = enclosed(text, '(', ')')?;
    if let Some(result) = number16(inner) {
        return Some(result.map(|address| Operand::Indirect(Address::Absolute(address))));
    }
    let name = inner.strip_prefix('.').filter(|name| is_label_name(name))?;
    Some(Ok(Operand::Indirect(Address::Label(name.to_string()))))
}

/// `$r1`, `r1`, `sp`, `$cmp`, `zero`
fn register_direct(text: &str) -> Match<Operand> {
    register(text).map(|result| result.map(Operand::Register))
}

/// `($r1)`
fn register_indirect(text: &str) -> Match<Operand> {
    let inner = enclosed(text, '(', ')')?;
    register(inner).map(|result| result.map(Operand::RegisterIndirect))
}

/// `4+$r1`
fn register_relative(text: &str) -> Match<Operand> {
    let (offset, register_text) = text.split_once('+')?;
    let offset = number16(offset)?;
    let register = register(register_text)?;
    Some(offset.and_then(|offset| {
        register.map(|register| Operand::RegisterRelative { offset, register })
    }))
}

/// `16+2*$r3`
fn indexed_scaled(text: &str) -> Match<Operand> {
    let (base, rest) = text.split_once('+')?;
    let (scale, register_text) = rest.split_once('*')?;
    let base = number(base)?;
    let scale = number(scale)?;
    let register = register(register_text)?;
    Some(scaled(base, scale, register))
}

fn scaled(
    base: Result<u32, ResolveError>,
    scale: Result<u32, ResolveError>,
    register: Result<Register, ResolveError>,
) -> Result<Operand, ResolveError> {
    Ok(Operand::IndexedScaled {
        base: bounded(base?, MAX_SCALED_BASE)? as u16,
        scale: bounded(scale?, MAX_SCALE)? as u8,
        register: register?,
    })
}

/// `#(8)`
fn pc_relative(text: &str) -> Match<Operand> {
    let inner = text.strip_prefix('#').and_then(|rest| enclosed(rest, '(', ')'))?;
    number16(inner).map(|result| result.map(Operand::PcRelative))
}

/// `.name`
fn label(text: &str) -> Match<Operand> {
    let name = text.strip_prefix('.').filter(|name| is_label_name(name))?;
    Some(Ok(Operand::Label(name.to_string())))
}

fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    text.strip_prefix(open)?.strip_suffix(close)
}

/// Decimal or `0x` hexadecimal integer.
fn number(text: &str) -> Match<u32> {
    let (digits, radix) = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    Some(u32::from_str_radix(digits, radix).map_err(|_| ResolveError::ValueOutOfRange))
}

fn number16(text: &str) -> Match<u16> {
    number(text).map(|result| {
        result.and_then(|value| u16::try_from(value).map_err(|_| ResolveError::ValueOutOfRange))
    })
}

fn bounded(value: u32, max: u32) -> Result<u32, ResolveError> {
    if value <= max {
        Ok(value)
    } else {
        Err(ResolveError::ValueOutOfRange)
    }
}

fn register(text: &str) -> Match<Register> {
    let name = text.strip_prefix('$').unwrap_or(text);
    if let Some(register) = Register::from_name(name) {
        return Some(Ok(register));
    }

    let digits = name.strip_prefix(['r', 'R'])?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(
        digits
            .parse::<u8>()
            .ok()
            .and_then(Register::general)
            .ok_or(ResolveError::RegisterOutOfRange),
    )
}
