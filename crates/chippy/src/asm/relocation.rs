use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::{Error, Result};
use crate::isa::{WORD_BITS, WORD_SIZE};

use super::parser::Node;

/// One past the highest byte address a program may occupy.
const ADDRESS_SPACE: u32 = 1 << 16;

/// Label name to byte address.
///
/// Labels take the address of the instruction that follows them, so a
/// label's address is `base + 4 * (instructions before it)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationTable {
    base: u16,
    labels: HashMap<String, u16>,
}

impl RelocationTable {
    /// Assigns addresses to every label, then checks every label reference
    /// and every instruction's word layout.
    pub fn build(nodes: &[Node], base: u16) -> Result<Self> {
        let mut labels = HashMap::new();
        let mut address = u32::from(base);

        for node in nodes {
            match node {
                Node::Label(label) => {
                    let Ok(at) = u16::try_from(address) else {
                        return Err(Error::ProgramTooLarge {
                            location: label.location,
                            token: format!(".{}", label.name),
                        });
                    };
                    match labels.entry(label.name.clone()) {
                        Entry::Occupied(_) => {
                            return Err(Error::DuplicateLabel {
                                location: label.location,
                                label: label.name.clone(),
                            });
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(at);
                        }
                    }
                }
                Node::Instruction(instruction) => {
                    let bits = instruction.layout_bits();
                    if bits > WORD_BITS {
                        return Err(Error::InstructionOverflow {
                            location: instruction.location,
                            mnemonic: instruction.mnemonic().to_string(),
                            bits,
                        });
                    }
                    address += u32::from(WORD_SIZE);
                    if address > ADDRESS_SPACE {
                        return Err(Error::ProgramTooLarge {
                            location: instruction.location,
                            token: instruction.mnemonic().to_string(),
                        });
                    }
                }
            }
        }

        let table = Self { base, labels };
        table.check_references(nodes)?;
        tracing::debug!(labels = table.len(), base, "relocation table built");
        Ok(table)
    }

    fn check_references(&self, nodes: &[Node]) -> Result<()> {
        let operands = nodes
            .iter()
            .filter_map(Node::as_instruction)
            .flat_map(|instruction| &instruction.operands);
        for node in operands {
            let Some(label) = node.operand.label() else {
                continue;
            };
            if !self.labels.contains_key(label) {
                return Err(Error::UndefinedLabel {
                    location: node.location,
                    label: label.to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn address_of(&self, label: &str) -> Option<u16> {
        self.labels.get(label).copied()
    }

    /// Labels in address order; labels sharing an address are ordered by name.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, u16)> {
        let mut entries: Vec<(&str, u16)> = self
            .labels
            .iter()
            .map(|(name, address)| (name.as_str(), *address))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    #[must_use]
    pub fn base(&self) -> u16 {
        self.base
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
