//! Line completion for the interactive session.
//!
//! Completion knows about three sources: builtin names (for lines starting with the
//! builtin marker), an optional suggestion tree describing the wrapped command, and
//! file paths when no tree is available.

use crate::builtin::{self, BUILTIN_PREFIX};
use crate::parser;
use anyhow::{Context as _, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command as Process, Stdio};

/// A single completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Suggestion {
    pub text: String,
    pub description: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: description.into(),
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self::new(text, "")
    }
}

/// How the value of a flag or positional argument is completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// Takes a value only when `choices` or `cmd` is given.
    #[default]
    Default,
    /// Takes a free-form value.
    Value,
    /// Takes a file system path.
    Path,
    /// Takes no value.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArgSuggestion {
    pub kind: ArgKind,
    /// Fixed set of accepted values.
    pub choices: Vec<String>,
    /// Program (and arguments) whose output lines are the accepted values.
    pub cmd: Vec<String>,
}

impl ArgSuggestion {
    /// Values starting with `prefix`.
    ///
    /// `cmd` wins over `choices`, which win over path globbing for [`ArgKind::Path`].
    pub fn suggest(&self, prefix: &str) -> Vec<Suggestion> {
        if let Some((program, args)) = self.cmd.split_first() {
            return command_output_lines(program, args)
                .into_iter()
                .filter(|line| line.starts_with(prefix))
                .map(Suggestion::plain)
                .collect();
        }

        if !self.choices.is_empty() {
            return self
                .choices
                .iter()
                .filter(|choice| choice.starts_with(prefix))
                .map(Suggestion::plain)
                .collect();
        }

        match self.kind {
            ArgKind::Path => glob_files(prefix),
            ArgKind::Default | ArgKind::Value | ArgKind::None => Vec::new(),
        }
    }

    /// Whether a flag carrying this argument consumes the next word.
    pub fn expects_value(&self) -> bool {
        match self.kind {
            ArgKind::Default => !self.choices.is_empty() || !self.cmd.is_empty(),
            ArgKind::None => false,
            ArgKind::Value | ArgKind::Path => true,
        }
    }
}

fn command_output_lines(program: &str, args: &[String]) -> Vec<String> {
    let output = Process::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(err) => {
            log::warn!("could not run suggestion command '{}': {}", program, err);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlagSuggestion {
    pub description: String,
    pub args: ArgSuggestion,
}

/// Suggestion tree for a command and its sub-commands.
///
/// ```yaml
/// description: the stupid content tracker
/// subcommands:
///   checkout:
///     description: switch branches
///     args:
///       kind: default
///       cmd: [git, branch, "--format=%(refname:short)"]
///     flags:
///       "-b":
///         description: create a new branch
///         args:
///           kind: value
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandSuggestion {
    pub description: String,
    pub subcommands: BTreeMap<String, CommandSuggestion>,
    /// Consulted to know whether a flag takes a value, or when the completed word
    /// starts with a dash.
    pub flags: BTreeMap<String, FlagSuggestion>,
    pub args: ArgSuggestion,
}

impl CommandSuggestion {
    /// Read a suggestion tree from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read file '{}'", path.display()))?;
        serde_yaml::from_str(&data)
            .with_context(|| format!("failed to parse suggestions in '{}'", path.display()))
    }

    /// Suggestions for the rendered `args` typed after the base command.
    ///
    /// With `complete_last` the final argument is a partial word to complete;
    /// otherwise the next word is being started.
    pub fn suggest(&self, args: &[String], complete_last: bool) -> Vec<Suggestion> {
        let (walked, last) = match args.split_last() {
            Some((last, walked)) if complete_last => (walked, Some(last.as_str())),
            _ => (args, None),
        };

        let mut current = self;
        let mut pending_flag: Option<&FlagSuggestion> = None;
        for arg in walked {
            if let Some(sub) = current.subcommands.get(arg) {
                current = sub;
                pending_flag = None;
            } else if let Some(flag) = current.flags.get(arg) {
                pending_flag = flag.args.expects_value().then_some(flag);
            } else {
                pending_flag = None;
            }
        }

        let mut suggestions = match (last, pending_flag) {
            (Some(word), _) if word.starts_with('-') => current
                .flags
                .iter()
                .filter(|(name, _)| name.starts_with(word))
                .map(|(name, flag)| Suggestion::new(name.as_str(), flag.description.as_str()))
                .collect(),
            (Some(word), Some(flag)) => flag.args.suggest(word),
            (Some(word), None) if !current.subcommands.is_empty() => current.subcommand_suggestions(word),
            (Some(word), None) => current.args.suggest(word),
            (None, Some(flag)) => flag.args.suggest(""),
            (None, None) if !current.subcommands.is_empty() => current.subcommand_suggestions(""),
            (None, None) => current.args.suggest(""),
        };

        suggestions.sort();
        suggestions
    }

    fn subcommand_suggestions(&self, prefix: &str) -> Vec<Suggestion> {
        self.subcommands
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, sub)| Suggestion::new(name.as_str(), sub.description.as_str()))
            .collect()
    }
}

/// Paths starting with `prefix`; directories carry a trailing `/`.
fn glob_files(prefix: &str) -> Vec<Suggestion> {
    let pattern = format!("{}*", glob::Pattern::escape(prefix));
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(err) => {
            log::debug!("could not complete '{}': {}", prefix, err);
            return Vec::new();
        }
    };

    paths
        .filter_map(Result::ok)
        .map(|path| {
            let mut text = path.to_string_lossy().into_owned();
            if path.is_dir() {
                text.push('/');
            }
            Suggestion::plain(text)
        })
        .collect()
}

/// File completion for the word under the cursor. An empty word completes to nothing.
pub fn files_with_prefix(prefix: &str) -> Vec<Suggestion> {
    if prefix.is_empty() {
        return Vec::new();
    }
    glob_files(prefix)
}

/// [`rustyline`] helper driving completion for a session.
#[derive(Default)]
pub struct WrashHelper {
    suggestions: Option<CommandSuggestion>,
}

impl WrashHelper {
    pub fn new(suggestions: Option<CommandSuggestion>) -> Self {
        Self { suggestions }
    }

    /// Completion for the text before the cursor: the byte offset where the
    /// replaced word starts and the candidates for it.
    pub fn complete_line(&self, before: &str) -> (usize, Vec<Suggestion>) {
        let word_start = before
            .rfind(char::is_whitespace)
            .map(|i| i + before[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let word = &before[word_start..];

        if let Some(name) = before.strip_prefix(BUILTIN_PREFIX) {
            if word_start != 0 {
                return (word_start, Vec::new());
            }
            let suggestions = builtin::summaries()
                .into_iter()
                .filter(|(builtin, _)| builtin.starts_with(name))
                .map(|(builtin, description)| {
                    Suggestion::new(format!("{}{}", BUILTIN_PREFIX, builtin), description)
                })
                .collect();
            return (0, suggestions);
        }

        let Some(tree) = &self.suggestions else {
            return (word_start, files_with_prefix(word));
        };

        let command = match parser::parse(before) {
            Ok(command) => command,
            Err(err) => {
                log::debug!("no completion for unparseable line: {}", err);
                return (word_start, Vec::new());
            }
        };

        let args = command.render_args();
        (word_start, tree.suggest(&args, !word.is_empty()))
    }
}

impl Completer for WrashHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, suggestions) = self.complete_line(&line[..pos]);
        let candidates = suggestions
            .into_iter()
            .map(|s| Pair {
                display: if s.description.is_empty() {
                    s.text.clone()
                } else {
                    format!("{}  ({})", s.text, s.description)
                },
                replacement: s.text,
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for WrashHelper {
    type Hint = String;
}

impl Highlighter for WrashHelper {}

impl Validator for WrashHelper {}

impl Helper for WrashHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::fs::File;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const EXAMPLE: &str = r#"
description: an example suggestion for wrash
flags:
  "--help":
    description: show help for example
    args:
      kind: none
subcommands:
  foo:
    description: foo subcommand
    args:
      choices: [first, second, third]
    flags:
      "--foo":
        description: takes some value
        args:
          kind: default
          choices: [abc, def]
      "--bar":
        description: takes a path value
        args:
          kind: path
      "--flag":
        description: takes no value
        args:
          kind: none
"#;

    fn example() -> CommandSuggestion {
        serde_yaml::from_str(EXAMPLE).expect("example parses")
    }

    fn texts(suggestions: &[Suggestion]) -> Vec<String> {
        suggestions.iter().map(|s| s.text.clone()).collect()
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = stdenv::temp_dir().join(format!("wrash_complete_{}_{}_{}", tag, std::process::id(), nanos));
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn test_load_example() {
        let tree = example();
        assert_eq!(tree.description, "an example suggestion for wrash");
        assert_eq!(tree.flags["--help"].args.kind, ArgKind::None);

        let foo = &tree.subcommands["foo"];
        assert_eq!(foo.args.kind, ArgKind::Default);
        assert_eq!(foo.args.choices, vec!["first", "second", "third"]);
        assert_eq!(foo.flags["--bar"].args.kind, ArgKind::Path);
    }

    #[test]
    fn test_load_from_file() {
        let dir = make_unique_temp_dir("load");
        let path = dir.join("example.yaml");
        fs::write(&path, EXAMPLE).unwrap();

        assert_eq!(CommandSuggestion::load(&path).unwrap(), example());
        assert!(CommandSuggestion::load(&dir.join("missing.yaml")).is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_suggest_walk() {
        let tree = example();

        let s = tree.suggest(&[], false);
        assert_eq!(s, vec![Suggestion::new("foo", "foo subcommand")]);

        let s = tree.suggest(&args(&["foo"]), false);
        assert_eq!(texts(&s), vec!["first", "second", "third"]);

        let s = tree.suggest(&args(&["fo"]), true);
        assert_eq!(s, vec![Suggestion::new("foo", "foo subcommand")]);

        let s = tree.suggest(&args(&["foo"]), true);
        assert_eq!(texts(&s), vec!["foo"]);

        let s = tree.suggest(&args(&["foo", "--foo"]), false);
        assert_eq!(texts(&s), vec!["abc", "def"]);

        let s = tree.suggest(&args(&["foo", "--foo", "abc"]), false);
        assert_eq!(texts(&s), vec!["first", "second", "third"]);

        let s = tree.suggest(&args(&["foo", "--flag"]), false);
        assert_eq!(texts(&s), vec!["first", "second", "third"]);

        let s = tree.suggest(&args(&["foo", "s"]), true);
        assert_eq!(texts(&s), vec!["second"]);
    }

    #[test]
    fn test_suggest_flags() {
        let tree = example();

        let s = tree.suggest(&args(&["foo", "--f"]), true);
        assert_eq!(
            s,
            vec![
                Suggestion::new("--flag", "takes no value"),
                Suggestion::new("--foo", "takes some value"),
            ]
        );

        let s = tree.suggest(&args(&["foo", "--foo", "d"]), true);
        assert_eq!(texts(&s), vec!["def"]);
    }

    #[test]
    fn test_expects_value() {
        let mut arg = ArgSuggestion::default();
        assert!(!arg.expects_value());

        arg.choices.push("a".to_string());
        assert!(arg.expects_value());

        arg.kind = ArgKind::None;
        assert!(!arg.expects_value());

        assert!(ArgSuggestion { kind: ArgKind::Value, ..Default::default() }.expects_value());
        assert!(ArgSuggestion { kind: ArgKind::Path, ..Default::default() }.expects_value());
    }

    #[test]
    #[cfg(unix)]
    fn test_arg_from_command_output() {
        let arg = ArgSuggestion {
            cmd: args(&["printf", "main\\nfeature\\nfix\\n"]),
            choices: args(&["ignored"]),
            ..Default::default()
        };

        assert_eq!(texts(&arg.suggest("f")), vec!["feature", "fix"]);
        assert_eq!(texts(&arg.suggest("")), vec!["main", "feature", "fix"]);
    }

    #[test]
    fn test_arg_missing_command() {
        let arg = ArgSuggestion {
            cmd: args(&["wrash-command-that-does-not-exist"]),
            ..Default::default()
        };
        assert!(arg.suggest("").is_empty());
    }

    #[test]
    fn test_files_with_prefix() {
        let dir = make_unique_temp_dir("files");
        fs::create_dir_all(dir.join("a_directory").join("directory")).unwrap();
        File::create(dir.join("a_directory").join("a_file")).unwrap();
        File::create(dir.join("a_directory").join("another_file")).unwrap();
        File::create(dir.join("a_directory").join("some_other_file")).unwrap();

        let base = format!("{}/", dir.join("a_directory").display());
        let all = files_with_prefix(&base);
        assert_eq!(
            texts(&all),
            vec![
                format!("{}a_file", base),
                format!("{}another_file", base),
                format!("{}directory/", base),
                format!("{}some_other_file", base),
            ]
        );

        let some = files_with_prefix(&format!("{}a", base));
        assert_eq!(some.len(), 2);

        assert!(files_with_prefix(&format!("{}nomatch", base)).is_empty());
        assert!(files_with_prefix("").is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_complete_builtins() {
        let helper = WrashHelper::default();

        let (start, s) = helper.complete_line("!!h");
        assert_eq!(start, 0);
        assert_eq!(texts(&s), vec!["!!help", "!!history"]);

        let (_, s) = helper.complete_line("!!");
        assert_eq!(s.len(), builtin::summaries().len());

        let (_, s) = helper.complete_line("!!cd sr");
        assert!(s.is_empty());
    }

    #[test]
    fn test_complete_with_tree() {
        let helper = WrashHelper::new(Some(example()));

        let (start, s) = helper.complete_line("foo --f");
        assert_eq!(start, 4);
        assert_eq!(texts(&s), vec!["--flag", "--foo"]);

        let (start, s) = helper.complete_line("foo ");
        assert_eq!(start, 4);
        assert_eq!(texts(&s), vec!["first", "second", "third"]);

        let (_, s) = helper.complete_line("foo 'unterminated");
        assert!(s.is_empty());
    }

    #[test]
    fn test_complete_files_without_tree() {
        let dir = make_unique_temp_dir("line");
        File::create(dir.join("notes.txt")).unwrap();

        let helper = WrashHelper::default();
        let line = format!("add {}/no", dir.display());
        let (start, s) = helper.complete_line(&line);

        assert_eq!(start, 4);
        assert_eq!(texts(&s), vec![format!("{}/notes.txt", dir.display())]);

        let _ = fs::remove_dir_all(dir);
    }
}
