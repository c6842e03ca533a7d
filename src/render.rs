//! Canonical textual form of parsed arguments.
//!
//! Rendering reproduces the lexical shape of the input (quotes, `$`, escapes), not the
//! expanded value. It is meant for display and completion, never for execution.

use crate::parser::{Arg, Command, Node};
use std::fmt::{Display, Formatter, Write};

impl Node {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Word {
                value,
                is_quoted: false,
            } => f.write_str(value),
            Node::Word {
                value,
                is_quoted: true,
            } => write_escaped(f, value, '"'),
            Node::SingleQuote { value } => {
                f.write_char('\'')?;
                write_escaped(f, value, '\'')?;
                f.write_char('\'')
            }
            Node::DoubleQuote { children } => {
                f.write_char('"')?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_char('"')
            }
            Node::VariableExpansion { name } => write!(f, "${}", name),
        }
    }
}

/// Write `value`, putting back the backslash the lexer removed in front of `delimiter`.
fn write_escaped(f: &mut Formatter<'_>, value: &str, delimiter: char) -> std::fmt::Result {
    for c in value.chars() {
        if c == delimiter {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

impl Arg {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for Arg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for node in self.nodes() {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl Command {
    /// Raw, unexpanded text of every argument.
    pub fn render_args(&self) -> Vec<String> {
        self.args().iter().map(Arg::render).collect()
    }

    /// All arguments rendered and joined by a single space.
    pub fn render(&self) -> String {
        self.render_args().join(" ")
    }
}
