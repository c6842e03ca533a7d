//! A minimal interactive wrapper shell around a single base command.
//!
//! Every line typed into a session is parsed into a [`Command`], expanded against the
//! session variables and the file system, and then appended to the base command
//! (`add -A` in a `git` session runs `git add -A`). Lines starting with `!!` run
//! builtins such as `!!cd` or `!!history` instead.
//!
//! The parsing and expansion core ([`parse`], [`Command::expand`], [`Command::render`])
//! is pure and usable on its own. [`Session`] ties it to builtins, process execution,
//! history and line editing.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod env;
mod expand;
mod external;
pub mod history;
pub mod io_adapters;
mod lexer;
pub mod logging;
mod parser;
mod render;
mod session;

pub use builtin::{BUILTIN_PREFIX, is_builtin};
pub use config::Config;
pub use env::Environment;
pub use expand::{ExpandError, GLOB_METACHARACTERS};
pub use external::find_command_path;
pub use history::History;
pub use parser::{Arg, Command, Node, ParseError, UnterminatedSequence, parse};
pub use session::Session;
