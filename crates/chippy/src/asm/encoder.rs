use std::io;
use std::iter::FusedIterator;
use std::slice;

use crate::error::{Error, Result};
use crate::isa::{Instruction, WordError};

use super::parser::{InstructionNode, Node};
use super::relocation::RelocationTable;

const WORD_BYTES: usize = 4;

/// Encodes one instruction node into its big-endian word value.
pub fn encode_node(instruction: &InstructionNode, relocations: &RelocationTable) -> Result<u32> {
    let operands = instruction
        .operands
        .iter()
        .map(|node| {
            node.operand
                .relocate(|label| relocations.address_of(label))
                .ok_or_else(|| Error::UndefinedLabel {
                    location: node.location,
                    label: node.operand.label().unwrap_or_default().to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Instruction::new(instruction.entry.opcode, operands)
        .encode(&instruction.entry)
        .map_err(|err| match err {
            WordError::Overflow { bits } => Error::InstructionOverflow {
                location: instruction.location,
                mnemonic: instruction.mnemonic().to_string(),
                bits,
            },
            other => Error::Internal(format!(
                "cannot encode `{}` at {}: {other}",
                instruction.mnemonic(),
                instruction.location
            )),
        })
}

/// Lazy byte stream over a parsed program.
///
/// Each pull past the buffered word encodes the next instruction. The
/// stream ends after the last instruction or after the first error, and
/// cannot be restarted.
pub struct Encoder<'p> {
    nodes: slice::Iter<'p, Node>,
    relocations: &'p RelocationTable,
    buffer: [u8; WORD_BYTES],
    position: usize,
    failed: bool,
    /// Error held back by `io::Read` until the bytes before it are consumed.
    pending: Option<Error>,
}

impl<'p> Encoder<'p> {
    #[must_use]
    pub fn new(nodes: &'p [Node], relocations: &'p RelocationTable) -> Self {
        Self {
            nodes: nodes.iter(),
            relocations,
            buffer: [0; WORD_BYTES],
            position: WORD_BYTES,
            failed: false,
            pending: None,
        }
    }

    fn refill(&mut self) -> Option<Result<()>> {
        if self.failed {
            return None;
        }
        let instruction = self.nodes.by_ref().find_map(Node::as_instruction)?;
        match encode_node(instruction, self.relocations) {
            Ok(word) => {
                tracing::trace!(
                    word = format_args!("{word:#010x}"),
                    "encoded {}",
                    instruction.mnemonic()
                );
                self.buffer = word.to_be_bytes();
                self.position = 0;
                Some(Ok(()))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl Iterator for Encoder<'_> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position == WORD_BYTES {
            let refilled = self.refill()?;
            if let Err(err) = refilled {
                return Some(Err(err));
            }
        }
        let byte = self.buffer[self.position];
        self.position += 1;
        Some(Ok(byte))
    }
}

impl FusedIterator for Encoder<'_> {}

impl io::Read for Encoder<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.pending.take() {
            return Err(io::Error::other(err));
        }
        let mut written = 0;
        for slot in buf.iter_mut() {
            match self.next() {
                Some(Ok(byte)) => {
                    *slot = byte;
                    written += 1;
                }
                Some(Err(err)) if written == 0 => return Err(io::Error::other(err)),
                Some(Err(err)) => {
                    self.pending = Some(err);
                    break;
                }
                None => break,
            }
        }
        Ok(written)
    }
}
