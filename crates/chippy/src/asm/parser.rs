use std::fmt;

use crate::error::{Error, Location, Result};
use crate::isa::{AddressingMode, OpcodeEntry, OpcodeTable, Operand, layout_bits};

use super::lexer::{Token, TokenKind};
use super::resolver::{self, ResolveError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelNode {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandNode {
    pub operand: Operand,
    /// Source text, kept for diagnostics.
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionNode {
    pub entry: OpcodeEntry,
    pub operands: Vec<OperandNode>,
    pub location: Location,
}

impl InstructionNode {
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.entry.mnemonic
    }

    #[must_use]
    pub fn modes(&self) -> Vec<AddressingMode> {
        self.operands.iter().map(|node| node.operand.mode()).collect()
    }

    /// Bits the encoded word needs, header included.
    #[must_use]
    pub fn layout_bits(&self) -> u32 {
        layout_bits(&self.modes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Label(LabelNode),
    Instruction(InstructionNode),
}

impl Node {
    #[must_use]
    pub fn as_instruction(&self) -> Option<&InstructionNode> {
        match self {
            Self::Instruction(instruction) => Some(instruction),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, ".{}", label.name),
            Self::Instruction(instruction) => {
                f.write_str(instruction.mnemonic())?;
                for (i, node) in instruction.operands.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{}", node.operand)?;
                }
                Ok(())
            }
        }
    }
}

/// Turns a token stream into validated label and instruction nodes.
pub struct Parser<'t> {
    table: &'t OpcodeTable,
}

impl<'t> Parser<'t> {
    #[must_use]
    pub fn new(table: &'t OpcodeTable) -> Self {
        Self { table }
    }

    pub fn parse(&self, tokens: &[Token]) -> Result<Vec<Node>> {
        let tokens: Vec<&Token> = tokens.iter().filter(|token| token.is_significant()).collect();
        let mut nodes = Vec::new();
        let mut index = 0;

        while let Some(token) = tokens.get(index) {
            index += 1;
            match token.kind {
                TokenKind::Label => nodes.push(label_node(token, &token.text)?),
                TokenKind::Value => {
                    let name = token.text.strip_prefix('.').ok_or_else(|| unexpected(token))?;
                    nodes.push(label_node(token, name)?);
                }
                TokenKind::Instruction => {
                    let count = tokens[index..]
                        .iter()
                        .take_while(|operand| {
                            operand.kind == TokenKind::Value
                                && operand.location.line == token.location.line
                        })
                        .count();
                    let operands = &tokens[index..index + count];
                    index += count;
                    let at_end = index == tokens.len();
                    nodes.push(Node::Instruction(self.instruction(token, operands, at_end)?));
                }
                TokenKind::Comma | TokenKind::Newline | TokenKind::Comment => {}
            }
        }

        Ok(nodes)
    }

    fn instruction(
        &self,
        token: &Token,
        operand_tokens: &[&Token],
        at_end: bool,
    ) -> Result<InstructionNode> {
        let entry = *self.table.lookup(&token.text).ok_or_else(|| unexpected(token))?;

        let found = operand_tokens.len();
        if found < entry.arity() && at_end {
            return Err(Error::UnexpectedEndOfInput {
                location: token.location,
                mnemonic: entry.mnemonic.to_string(),
                expected: entry.arity(),
            });
        }
        if found != entry.arity() {
            return Err(Error::ArityMismatch {
                location: token.location,
                mnemonic: entry.mnemonic.to_string(),
                expected: entry.arity(),
                found,
            });
        }

        let operands = operand_tokens
            .iter()
            .map(|&token| resolve(token))
            .collect::<Result<Vec<_>>>()?;

        for (position, (node, set)) in operands.iter().zip(entry.operands).enumerate() {
            let mode = node.operand.mode();
            if !set.contains(mode) {
                return Err(Error::InvalidAddressingMode {
                    location: node.location,
                    mnemonic: entry.mnemonic.to_string(),
                    token: node.text.clone(),
                    // 1-based for messages
                    position: position + 1,
                    mode,
                });
            }
        }

        let mut free = entry.free_positions().map(|position| &operands[position]);
        if let Some(first) = free.next() {
            let expected = first.operand.mode();
            if let Some(other) = free.find(|node| node.operand.mode().tag() != expected.tag()) {
                return Err(Error::InconsistentAddressingModes {
                    location: other.location,
                    mnemonic: entry.mnemonic.to_string(),
                    token: other.text.clone(),
                    expected,
                    found: other.operand.mode(),
                });
            }
        }

        Ok(InstructionNode {
            entry,
            operands,
            location: token.location,
        })
    }
}

fn resolve(token: &Token) -> Result<OperandNode> {
    match resolver::resolve_operand(&token.text) {
        Ok(operand) => Ok(OperandNode {
            operand,
            text: token.text.clone(),
            location: token.location,
        }),
        Err(ResolveError::RegisterOutOfRange) => Err(Error::RegisterOutOfRange {
            location: token.location,
            token: token.text.clone(),
        }),
        Err(ResolveError::Unrecognized | ResolveError::ValueOutOfRange) => {
            Err(Error::InvalidOperand {
                location: token.location,
                token: token.text.clone(),
            })
        }
    }
}

fn label_node(token: &Token, name: &str) -> Result<Node> {
    if !resolver::is_label_name(name) {
        return Err(unexpected(token));
    }
    Ok(Node::Label(LabelNode {
        name: name.to_string(),
        location: token.location,
    }))
}

fn unexpected(token: &Token) -> Error {
    let text = match token.kind {
        TokenKind::Label => format!(".{}", token.text),
        _ => token.text.clone(),
    };
    Error::UnexpectedIdentifier {
        location: token.location,
        token: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::lexer::tokenize;
    use crate::isa::{ModeSet, Opcode, Register};

    fn parse(source: &str) -> Result<Vec<Node>> {
        let table = OpcodeTable::standard();
        Parser::new(table).parse(&tokenize(source, table))
    }

    fn instructions(nodes: &[Node]) -> Vec<&InstructionNode> {
        nodes.iter().filter_map(Node::as_instruction).collect()
    }

    #[test]
    fn test_parse_program() {
        let nodes = parse("// setup\nLDR $r1, #10\n.loop\nADD $r1, $r2\nJMP .loop\nHLT").unwrap();
        assert_eq!(nodes.len(), 5);
        assert!(matches!(&nodes[1], Node::Label(label) if label.name == "loop"));
        let instructions = instructions(&nodes);
        assert_eq!(instructions[0].entry.opcode, Opcode::Ldr);
        assert_eq!(
            instructions[0].operands[1].operand,
            Operand::Immediate(10)
        );
        assert_eq!(
            instructions[1].operands[1].operand,
            Operand::Register(Register::general(2).unwrap())
        );
        assert_eq!(
            instructions[2].operands[0].operand,
            Operand::Label("loop".to_string())
        );
        assert_eq!(nodes[4].to_string(), "HLT");
    }

    #[test]
    fn test_mnemonics_are_case_insensitive() {
        let nodes = parse("print r1\nhlt").unwrap();
        assert_eq!(instructions(&nodes)[0].mnemonic(), "PRINT");
    }

    #[test]
    fn test_too_few_operands_at_end_of_input() {
        let err = parse("HLT\nADD $r1").unwrap_err();
        assert!(
            matches!(
                &err,
                Error::UnexpectedEndOfInput { location, mnemonic, expected: 2 }
                    if location.line == 2 && mnemonic == "ADD"
            ),
            "{err:?}"
        );
    }

    #[test]
    fn test_too_few_operands_mid_program() {
        let err = parse("ADD $r1\nHLT").unwrap_err();
        assert!(
            matches!(err, Error::ArityMismatch { expected: 2, found: 1, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn test_too_many_operands() {
        let err = parse("PRINT r1, r2").unwrap_err();
        assert!(
            matches!(err, Error::ArityMismatch { expected: 1, found: 2, .. }),
            "{err:?}"
        );
        let err = parse("HLT r1").unwrap_err();
        assert!(
            matches!(err, Error::ArityMismatch { expected: 0, found: 1, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn test_invalid_operand() {
        let err = parse("ADD $r1, @5").unwrap_err();
        assert!(
            matches!(&err, Error::InvalidOperand { token, location } if token == "@5" && location.column == 9),
            "{err:?}"
        );
    }

    #[test]
    fn test_register_out_of_range() {
        let err = parse("PRINT $r14").unwrap_err();
        assert!(
            matches!(&err, Error::RegisterOutOfRange { token, .. } if token == "$r14"),
            "{err:?}"
        );
    }

    #[test]
    fn test_mode_gating() {
        // ADD's second operand is immediate or register only.
        let err = parse("ADD $r1, (300)").unwrap_err();
        assert!(
            matches!(
                &err,
                Error::InvalidAddressingMode { position: 2, mode: AddressingMode::Indirect, token, .. }
                    if token == "(300)"
            ),
            "{err:?}"
        );
        // STR cannot store into an immediate.
        assert!(matches!(
            parse("STR r1, #4"),
            Err(Error::InvalidAddressingMode { .. })
        ));
        // The first operand of a two-operand form is always a register.
        assert!(matches!(
            parse("MOV #1, r1"),
            Err(Error::InvalidAddressingMode { position: 1, .. })
        ));
    }

    #[test]
    fn test_free_operands_must_share_a_mode() {
        static PAIR: &[ModeSet] = &[
            ModeSet::IMMEDIATE.union(ModeSet::REGISTER_DIRECT),
            ModeSet::IMMEDIATE.union(ModeSet::REGISTER_DIRECT),
        ];
        let table = OpcodeTable::new(vec![OpcodeEntry::new("PAIR", Opcode::Mov, PAIR)]);
        let parser = Parser::new(&table);

        assert!(parser.parse(&tokenize("PAIR #1, #2", &table)).is_ok());
        let err = parser.parse(&tokenize("PAIR #1, r2", &table)).unwrap_err();
        assert!(
            matches!(
                &err,
                Error::InconsistentAddressingModes {
                    expected: AddressingMode::Immediate,
                    found: AddressingMode::RegisterDirect,
                    token,
                    ..
                } if token == "r2"
            ),
            "{err:?}"
        );
    }

    #[test]
    fn test_unexpected_identifier() {
        let err = parse("HLT\nFOO r1").unwrap_err();
        assert!(
            matches!(&err, Error::UnexpectedIdentifier { token, location } if token == "FOO" && location.line == 2),
            "{err:?}"
        );
        let err = parse(".9lives\nHLT").unwrap_err();
        assert!(
            matches!(&err, Error::UnexpectedIdentifier { token, .. } if token == ".9lives"),
            "{err:?}"
        );
    }

    #[test]
    fn test_comments_never_reach_the_parser() {
        let nodes = parse("HLT // FOO r1, #(3)\n// .label").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_layout_bits() {
        let nodes = parse("LDR r1, 3+r2").unwrap();
        assert_eq!(instructions(&nodes)[0].layout_bits(), 8 + 4 + 20);
    }
}
