//! Sub-lexers used by [`crate::parser::parse`].
//!
//! Each scanner starts at the current cursor position and consumes exactly the
//! characters of one node, leaving the cursor on the first character it did not use.

use crate::parser::{Node, ParseError};

/// Character cursor over one input line.
pub(crate) struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub(crate) fn new(line: &str) -> Self {
        Lexer {
            input: line.chars().collect(),
            pos: 0,
        }
    }

    pub(crate) fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    pub(crate) fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Lex the node starting at the cursor, dispatching on its first character.
    ///
    /// The cursor must not be on whitespace.
    pub(crate) fn next_node(&mut self) -> Result<Node, ParseError> {
        match self.peek_char() {
            Some('$') => {
                self.read_char();
                Ok(Node::variable(self.identifier()?))
            }
            Some('\'') => self.single_quote(),
            Some('"') => self.double_quote(),
            _ => Ok(self.word()),
        }
    }

    /// Scan a variable name: one or more alphabetic characters or `_`.
    fn identifier(&mut self) -> Result<String, ParseError> {
        let mut identifier = String::new();
        while let Some(c) = self.peek_char() {
            if !c.is_alphabetic() && c != '_' {
                break;
            }
            identifier.push(c);
            self.read_char();
        }

        if identifier.is_empty() {
            return Err(ParseError::InvalidIdentifier {
                identifier: self.peek_char().map(String::from).unwrap_or_default(),
            });
        }

        Ok(identifier)
    }

    /// Scan a bareword up to unescaped whitespace or a quote.
    ///
    /// Backslash sequences are copied raw; [`crate::expand`] resolves them.
    fn word(&mut self) -> Node {
        let mut word = String::new();
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.read_char();
                    word.push(c);
                    if let Some(escaped) = self.read_char() {
                        word.push(escaped);
                    }
                }
                '\'' | '"' => break,
                c if c.is_whitespace() => break,
                c => {
                    self.read_char();
                    word.push(c);
                }
            }
        }

        Node::word(word)
    }

    /// Scan `'...'`. Only `\'` is an escape; any other backslash is kept.
    fn single_quote(&mut self) -> Result<Node, ParseError> {
        self.read_char();

        let mut contents = String::new();
        while let Some(c) = self.read_char() {
            match c {
                '\\' => {
                    let escaped = self
                        .read_char()
                        .ok_or_else(|| ParseError::unterminated('\''))?;
                    if escaped != '\'' {
                        contents.push('\\');
                    }
                    contents.push(escaped);
                }
                '\'' => return Ok(Node::single_quote(contents)),
                c => contents.push(c),
            }
        }

        Err(ParseError::unterminated('\''))
    }

    /// Scan `"..."` into quoted words interleaved with variable expansions.
    fn double_quote(&mut self) -> Result<Node, ParseError> {
        self.read_char();

        let mut children = Vec::new();
        while let Some(c) = self.peek_char() {
            match c {
                '"' => {
                    self.read_char();
                    return Ok(Node::double_quote(children));
                }
                '$' => {
                    self.read_char();
                    children.push(Node::variable(self.identifier()?));
                }
                _ => children.push(self.quoted_word()?),
            }
        }

        Err(ParseError::unterminated('"'))
    }

    /// Scan the literal run inside a double quote, stopping before `"` or `$`.
    /// `\"` is unescaped; every other backslash is kept.
    fn quoted_word(&mut self) -> Result<Node, ParseError> {
        let mut word = String::new();
        while let Some(c) = self.peek_char() {
            match c {
                '"' | '$' => break,
                '\\' => {
                    self.read_char();
                    let escaped = self
                        .read_char()
                        .ok_or_else(|| ParseError::unterminated('"'))?;
                    if escaped != '"' {
                        word.push('\\');
                    }
                    word.push(escaped);
                }
                c => {
                    self.read_char();
                    word.push(c);
                }
            }
        }

        Ok(Node::quoted_word(word))
    }
}
