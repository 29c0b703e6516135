//! Two-pass assembler.
//!
//! Source flows through [`lexer`], [`parser`] (which resolves each operand
//! with [`resolver`]), [`relocation`] and finally the lazy [`encoder`].
//! Every check runs before the first byte is produced, so a failing
//! compile never yields partial output.

pub mod encoder;
pub mod lexer;
pub mod parser;
pub mod relocation;
pub mod resolver;

pub use encoder::{Encoder, encode_node};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::{InstructionNode, LabelNode, Node, OperandNode, Parser};
pub use relocation::RelocationTable;
pub use resolver::resolve_operand;

use crate::error::Result;
use crate::isa::{LOAD_ADDRESS, OpcodeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Address of the first instruction; labels are relocated against it.
    pub base_address: u16,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            base_address: LOAD_ADDRESS,
        }
    }
}

/// A parsed and relocated program, ready to be encoded.
#[derive(Debug, Clone)]
pub struct Program {
    nodes: Vec<Node>,
    relocations: RelocationTable,
}

impl Program {
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn relocations(&self) -> &RelocationTable {
        &self.relocations
    }

    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.as_instruction().is_some())
            .count()
    }

    /// Lazy byte stream of the machine code.
    #[must_use]
    pub fn encoder(&self) -> Encoder<'_> {
        Encoder::new(&self.nodes, &self.relocations)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.encoder().collect()
    }
}

pub struct Assembler<'t> {
    table: &'t OpcodeTable,
    options: AssemblerOptions,
}

impl Default for Assembler<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler<'static> {
    /// Assembler over the standard opcode table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(OpcodeTable::standard())
    }
}

impl<'t> Assembler<'t> {
    #[must_use]
    pub fn with_table(table: &'t OpcodeTable) -> Self {
        Self {
            table,
            options: AssemblerOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: AssemblerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        Lexer::new(source, self.table).tokenize()
    }

    pub fn parse(&self, source: &str) -> Result<Vec<Node>> {
        let tokens = self.tokenize(source);
        tracing::debug!(tokens = tokens.len(), "tokenized");
        let nodes = Parser::new(self.table).parse(&tokens)?;
        tracing::debug!(nodes = nodes.len(), "parsed");
        Ok(nodes)
    }

    /// Parses and relocates `source`. Encoding happens lazily through
    /// [`Program::encoder`] and cannot fail for a program built here.
    pub fn assemble(&self, source: &str) -> Result<Program> {
        let nodes = self.parse(source)?;
        let relocations = RelocationTable::build(&nodes, self.options.base_address)?;
        let program = Program { nodes, relocations };
        tracing::debug!(
            instructions = program.instruction_count(),
            labels = program.relocations.len(),
            "assembled"
        );
        Ok(program)
    }
}

/// Assembles `source` with the standard table and default options.
pub fn assemble(source: &str) -> Result<Vec<u8>> {
    Assembler::new().assemble(source)?.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_assemble_end_to_end() {
        let bytes = assemble("LDR $r1, #10\nADD $r1, #5\nPRINT $r1\nHLT").unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &[0x40, 0x10, 0x00, 0x50]);
    }

    #[test]
    fn test_program_accessors() {
        let program = Assembler::new()
            .assemble(".top\nPRINT r1\nJMP .top")
            .unwrap();
        assert_eq!(program.instruction_count(), 2);
        assert_eq!(program.nodes().len(), 3);
        assert_eq!(program.relocations().address_of("top"), Some(LOAD_ADDRESS));
    }

    #[test]
    fn test_base_address_option() {
        let program = Assembler::new()
            .with_options(AssemblerOptions { base_address: 0x100 })
            .assemble("HLT\n.end\nJMP .end")
            .unwrap();
        assert_eq!(program.relocations().address_of("end"), Some(0x104));
        let bytes = program.to_bytes().unwrap();
        assert_eq!(&bytes[4..8], &[0x3C, 0x01, 0x04, 0x00]);
    }

    #[test]
    fn test_error_leaves_no_output() {
        let err = assemble("PRINT r1\nJMP .missing").unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { .. }));
    }

    #[test]
    fn test_deterministic() {
        let source = ".loop\nSUB r2, #1\nCMP r2, #0\nJMPG .loop\nHLT";
        assert_eq!(assemble(source).unwrap(), assemble(source).unwrap());
    }
}
