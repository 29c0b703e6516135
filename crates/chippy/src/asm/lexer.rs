//! Source text to tokens.
//!
//! Fields are separated by whitespace, commas and newlines. The first field of
//! a line decides how the rest of the line is read: `.name` is a label, a
//! known mnemonic is an instruction followed by operand values, anything
//! else makes the whole line values. `//` comments run to the end of the
//! line. The lexer accepts any input; validation happens in the parser.

use crate::error::Location;
use crate::isa::OpcodeTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Instruction,
    Value,
    Label,
    Comma,
    Newline,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Field text. Labels hold the name without the leading dot, comments
    /// the text after `//`.
    pub text: String,
    pub location: Location,
}

impl Token {
    fn new(kind: TokenKind, text: &str, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            location: Location::new(line, column),
        }
    }

    /// Tokens the parser consumes; commas, newlines and comments are layout.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Instruction | TokenKind::Value | TokenKind::Label
        )
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    table: &'a OpcodeTable,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str, table: &'a OpcodeTable) -> Self {
        Self { source, table }
    }

    #[must_use]
    pub fn tokenize(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut lines = self.source.split('\n').enumerate().peekable();

        while let Some((index, text)) = lines.next() {
            let line = index + 1;
            let (code, comment) = match text.find("//") {
                Some(start) => (&text[..start], Some(start)),
                None => (text, None),
            };

            self.tokenize_line(code, line, &mut tokens);

            if let Some(start) = comment {
                let body = text[start + 2..].trim_end_matches('\r');
                tokens.push(Token::new(TokenKind::Comment, body, line, start));
            }
            if lines.peek().is_some() {
                tokens.push(Token::new(TokenKind::Newline, "\n", line, text.len()));
            }
        }

        tokens
    }

    fn tokenize_line(&self, code: &str, line: usize, tokens: &mut Vec<Token>) {
        let mut first_field = true;
        let mut field_start: Option<usize> = None;

        for (column, ch) in code.char_indices().chain(std::iter::once((code.len(), ' '))) {
            let separator = ch.is_whitespace() || ch == ',';
            if !separator {
                field_start.get_or_insert(column);
                continue;
            }

            if let Some(start) = field_start.take() {
                let field = &code[start..column];
                tokens.push(self.classify(field, first_field, line, start));
                first_field = false;
            }
            if ch == ',' {
                tokens.push(Token::new(TokenKind::Comma, ",", line, column));
            }
        }
    }

    fn classify(&self, field: &str, first_field: bool, line: usize, column: usize) -> Token {
        if first_field {
            if let Some(name) = field.strip_prefix('.') {
                return Token::new(TokenKind::Label, name, line, column);
            }
            if self.table.lookup(field).is_some() {
                return Token::new(TokenKind::Instruction, field, line, column);
            }
        }
        Token::new(TokenKind::Value, field, line, column)
    }
}

/// Tokenizes `source` with the given opcode table.
#[must_use]
pub fn tokenize(source: &str, table: &OpcodeTable) -> Vec<Token> {
    Lexer::new(source, table).tokenize()
}
