//! Command-line data model and the top-level parse loop.
//!
//! A raw input line is turned into a [`Command`]: an ordered list of [`Arg`]s, each
//! of which is a non-empty run of [`Node`]s written without intervening whitespace.
//! Parsing is a pure function of the input; nothing here touches the filesystem or
//! the environment. See [`crate::expand`] for turning the tree into an argument vector.

use crate::lexer::Lexer;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One lexical unit of an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A bareword, or a literal run lexed inside a double-quoted span.
    ///
    /// Barewords keep their backslash escapes raw; they are interpreted during
    /// expansion so escaped glob metacharacters can be told apart from live ones.
    Word {
        /// Raw text of the word.
        value: String,
        /// Set only for words synthesized inside a [`Node::DoubleQuote`]. Quoted words
        /// are never glob-expanded.
        is_quoted: bool,
    },

    /// Verbatim text captured between single quotes, with `\'` already unescaped.
    SingleQuote {
        /// Text between the quotes.
        value: String,
    },

    /// A double-quoted span made of quoted words and variable expansions.
    DoubleQuote {
        /// Children in encounter order.
        children: Vec<Node>,
    },

    /// A `$NAME` reference.
    VariableExpansion {
        /// Name of the referenced variable, without the leading `$`.
        name: String,
    },
}

impl Node {
    /// Unquoted bareword.
    pub fn word(value: impl Into<String>) -> Self {
        Node::Word {
            value: value.into(),
            is_quoted: false,
        }
    }

    /// Word lexed inside a double-quoted span.
    pub fn quoted_word(value: impl Into<String>) -> Self {
        Node::Word {
            value: value.into(),
            is_quoted: true,
        }
    }

    pub fn single_quote(value: impl Into<String>) -> Self {
        Node::SingleQuote {
            value: value.into(),
        }
    }

    pub fn double_quote(children: Vec<Node>) -> Self {
        Node::DoubleQuote { children }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Node::VariableExpansion { name: name.into() }
    }
}

/// One whitespace-delimited token of the input, possibly made of several glued nodes
/// (e.g. `g'h'j`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    nodes: Vec<Node>,
}

impl Arg {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Nodes of this argument in source order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

impl From<Node> for Arg {
    fn from(node: Node) -> Self {
        Arg::new(vec![node])
    }
}

/// A fully parsed input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    args: Vec<Arg>,
}

impl Command {
    pub fn new(args: Vec<Arg>) -> Self {
        Self { args }
    }

    /// Arguments of the line in source order.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl From<Vec<Arg>> for Command {
    fn from(args: Vec<Arg>) -> Self {
        Command::new(args)
    }
}

/// Delimiter pair of a quoted construct that was never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnterminatedSequence {
    /// Opening delimiter.
    pub start: char,
    /// Expected closing delimiter.
    pub end: char,
}

impl UnterminatedSequence {
    pub(crate) fn quoted(delimiter: char) -> Self {
        Self {
            start: delimiter,
            end: delimiter,
        }
    }
}

impl Display for UnterminatedSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unterminated sequence: {} ... {}", self.start, self.end)
    }
}

impl Error for UnterminatedSequence {}

/// Errors that make a line impossible to tokenize. All of them are terminal: no
/// partial [`Command`] is ever produced alongside an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended inside an unterminated quoted construct.
    UnexpectedEof {
        /// The construct that was left open, if known.
        cause: Option<UnterminatedSequence>,
    },

    /// A `$` was not followed by at least one identifier character.
    InvalidIdentifier {
        /// Text found after the `$` (empty at end of input).
        identifier: String,
    },

    /// A malformed escape sequence. The current grammar is permissive and does not
    /// raise it.
    InvalidEscape {
        /// Escaped text, without the backslash.
        value: String,
    },

    /// A token other than the expected one(s). Not raised by the current grammar.
    UnexpectedToken {
        /// Acceptable tokens; may be empty.
        expected: Vec<String>,
        /// The token actually found.
        found: String,
    },
}

impl ParseError {
    pub(crate) fn unterminated(delimiter: char) -> Self {
        ParseError::UnexpectedEof {
            cause: Some(UnterminatedSequence::quoted(delimiter)),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedEof { cause: Some(cause) } => {
                write!(f, "unexpected EOF: {}", cause)
            }
            ParseError::UnexpectedEof { cause: None } => write!(f, "unexpected EOF"),
            ParseError::InvalidIdentifier { identifier } => {
                write!(f, "invalid identifier: '{}'", identifier)
            }
            ParseError::InvalidEscape { value } => write!(f, "invalid escape: \\{}", value),
            ParseError::UnexpectedToken { expected, found } => match expected.as_slice() {
                [] => write!(f, "unexpected token: {}", found),
                [one] => write!(f, "unexpected token: expected {} but found {}", one, found),
                many => write!(
                    f,
                    "unexpected token: expected one of [{}] but found {}",
                    many.join(", "),
                    found
                ),
            },
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::UnexpectedEof { cause: Some(cause) } => Some(cause),
            _ => None,
        }
    }
}

/// Parse a raw input line into a [`Command`].
///
/// The line is scanned left to right. Whitespace separates arguments; every other
/// position starts a node chosen by its first character (`$`, `'`, `"` or anything
/// else). Nodes written back to back are glued into the same [`Arg`].
///
/// # Errors
///
/// Returns a [`ParseError`] for unterminated quotes or a `$` without a name.
///
/// ```
/// let cmd = wrash::parse("add -A 'my file'").unwrap();
/// assert_eq!(cmd.len(), 3);
/// ```
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut lexer = Lexer::new(line);
    let mut args = Vec::new();
    let mut nodes = Vec::new();

    while let Some(ch) = lexer.peek_char() {
        if ch.is_whitespace() {
            lexer.read_char();
            if !nodes.is_empty() {
                args.push(Arg::new(std::mem::take(&mut nodes)));
            }
            continue;
        }

        nodes.push(lexer.next_node()?);
    }

    if !nodes.is_empty() {
        args.push(Arg::new(nodes));
    }

    Ok(Command::new(args))
}
