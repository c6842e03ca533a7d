//! Expansion of parsed lines into the literal argument vector.
//!
//! Variables are resolved through a caller-supplied lookup function and unquoted
//! barewords holding live glob metacharacters are matched against the filesystem.
//! Nothing else in the grammar introduces multiplicity, so a line without globs yields
//! exactly one string per node.

use crate::parser::{Arg, Command, Node};
use glob::PatternError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;

/// Characters that turn an unescaped bareword into a glob pattern.
pub const GLOB_METACHARACTERS: [char; 4] = ['*', '+', '?', '['];

/// Errors raised while resolving a line that tokenized correctly.
#[derive(Debug)]
pub enum ExpandError {
    /// A glob pattern matched nothing.
    NoMatches {
        /// The raw word, escapes included.
        pattern: String,
    },

    /// The word is not a valid glob pattern (e.g. an unclosed `[`).
    InvalidPattern {
        /// The raw word, escapes included.
        pattern: String,
        source: PatternError,
    },
}

impl Display for ExpandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpandError::NoMatches { pattern } => {
                write!(f, "word expanded to empty value: no matches for '{}'", pattern)
            }
            ExpandError::InvalidPattern { pattern, source } => {
                write!(f, "failed to expand glob '{}': {}", pattern, source)
            }
        }
    }
}

impl Clone for ExpandError {
    fn clone(&self) -> Self {
        match self {
            ExpandError::NoMatches { pattern } => ExpandError::NoMatches {
                pattern: pattern.clone(),
            },
            ExpandError::InvalidPattern { pattern, source } => ExpandError::InvalidPattern {
                pattern: pattern.clone(),
                source: PatternError {
                    pos: source.pos,
                    msg: source.msg,
                },
            },
        }
    }
}

impl PartialEq for ExpandError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExpandError::NoMatches { pattern: a }, ExpandError::NoMatches { pattern: b }) => a == b,
            (
                ExpandError::InvalidPattern { pattern: a, source: x },
                ExpandError::InvalidPattern { pattern: b, source: y },
            ) => a == b && x.pos == y.pos && x.msg == y.msg,
            _ => false,
        }
    }
}

impl Error for ExpandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExpandError::InvalidPattern { source, .. } => Some(source),
            ExpandError::NoMatches { .. } => None,
        }
    }
}

impl Node {
    /// Expand this node into one or more strings.
    ///
    /// Only an unquoted [`Node::Word`] can fail or produce more than one string.
    pub fn expand(&self, env: &dyn Fn(&str) -> String) -> Result<Vec<String>, ExpandError> {
        match self {
            Node::Word {
                value,
                is_quoted: true,
            } => Ok(vec![value.clone()]),
            Node::Word {
                value,
                is_quoted: false,
            } => match strip_escapes(value) {
                Some(stripped) => Ok(vec![stripped]),
                None => expand_glob(value),
            },
            Node::SingleQuote { value } => Ok(vec![value.clone()]),
            Node::DoubleQuote { children } => {
                let mut joined = String::new();
                for child in children {
                    let expanded = child.expand(env)?;
                    if let Some(first) = expanded.first() {
                        joined.push_str(first);
                    }
                }
                Ok(vec![joined])
            }
            Node::VariableExpansion { name } => Ok(vec![env(name)]),
        }
    }
}

impl Arg {
    /// Expand every node in order and concatenate their result lists.
    ///
    /// Glued nodes are not joined into one string: `g'h'j` expands to
    /// `["g", "h", "j"]`.
    pub fn expand(&self, env: &dyn Fn(&str) -> String) -> Result<Vec<String>, ExpandError> {
        let mut expanded = Vec::with_capacity(self.nodes().len());
        for node in self.nodes() {
            expanded.extend(node.expand(env)?);
        }
        Ok(expanded)
    }
}

impl Command {
    /// Expand the whole line into the argument vector handed to a builtin or process.
    ///
    /// `env` maps a variable name to its value and must return an empty string for
    /// unset variables. The first failing argument aborts the expansion.
    ///
    /// ```
    /// let cmd = wrash::parse("commit -m \"fix $ISSUE\"").unwrap();
    /// let argv = cmd
    ///     .expand(|name| if name == "ISSUE" { "#42".to_string() } else { String::new() })
    ///     .unwrap();
    /// assert_eq!(argv, vec!["commit", "-m", "fix #42"]);
    /// ```
    pub fn expand<F>(&self, env: F) -> Result<Vec<String>, ExpandError>
    where
        F: Fn(&str) -> String,
    {
        let mut expanded = Vec::with_capacity(self.len());
        for arg in self.args() {
            expanded.extend(arg.expand(&env)?);
        }
        Ok(expanded)
    }
}

/// Resolve the backslash escapes of an unquoted word.
///
/// Returns `None` as soon as an unescaped glob metacharacter is found, in which case
/// the raw word has to be treated as a pattern.
fn strip_escapes(value: &str) -> Option<String> {
    let mut stripped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => stripped.push(chars.next().unwrap_or('\\')),
            c if GLOB_METACHARACTERS.contains(&c) => return None,
            c => stripped.push(c),
        }
    }
    Some(stripped)
}

/// Translate a raw word into a [`glob`] pattern.
///
/// The glob crate has no backslash escapes, so escaped metacharacters become
/// single-character classes (`\*` -> `[*]`) and other escapes drop the backslash.
/// Runs of `*` collapse into one, since `**` is a plain star in POSIX globs.
fn glob_pattern(value: &str) -> Result<String, PatternError> {
    let mut pattern = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('*' | '?' | '[' | ']')) => {
                    pattern.push('[');
                    pattern.push(escaped);
                    pattern.push(']');
                }
                Some(escaped) => pattern.push(escaped),
                None => pattern.push('\\'),
            },
            '*' => {
                pattern.push('*');
                while chars.next_if_eq(&'*').is_some() {}
            }
            '[' => push_class(&mut chars, &mut pattern)?,
            c => pattern.push(c),
        }
    }
    Ok(pattern)
}

/// Translate a bracket expression whose `[` was just consumed.
///
/// Escaped members are moved to where the glob crate reads them literally: `]` goes
/// first, `!` and `-` go last. A leading `^` negates like `!`.
fn push_class(chars: &mut Peekable<Chars<'_>>, pattern: &mut String) -> Result<(), PatternError> {
    let pos = pattern.len();
    let negated = chars.next_if(|c| *c == '!' || *c == '^').is_some();
    let mut body = String::new();
    let (mut close, mut bang, mut dash) = (false, false, false);

    loop {
        match chars.next() {
            Some(']') => break,
            Some('\\') => match chars.next() {
                Some(']') => close = true,
                Some('-') => dash = true,
                Some('!') if body.is_empty() => bang = true,
                Some(escaped) => body.push(escaped),
                None => return Err(unterminated(pos)),
            },
            Some(c) => body.push(c),
            None => return Err(unterminated(pos)),
        }
    }

    if body.is_empty() && !(close || bang || dash) {
        return Err(PatternError {
            pos,
            msg: "empty character class",
        });
    }

    let leading_bang = bang && !negated && !close && body.is_empty();
    if leading_bang && !dash {
        pattern.push('!');
        return Ok(());
    }

    pattern.push('[');
    if negated {
        pattern.push('!');
    }
    if close {
        pattern.push(']');
    }
    pattern.push_str(&body);
    if leading_bang {
        pattern.push_str("-!");
    } else {
        if bang {
            pattern.push('!');
        }
        if dash {
            pattern.push('-');
        }
    }
    pattern.push(']');
    Ok(())
}

fn unterminated(pos: usize) -> PatternError {
    PatternError {
        pos,
        msg: "unterminated character class",
    }
}

fn expand_glob(value: &str) -> Result<Vec<String>, ExpandError> {
    let invalid = |source: PatternError| ExpandError::InvalidPattern {
        pattern: value.to_string(),
        source,
    };
    let pattern = glob_pattern(value).map_err(invalid)?;
    log::trace!("matching glob '{}'", pattern);

    let paths = glob::glob(&pattern).map_err(invalid)?;

    let matches: Vec<String> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                log::debug!("skipping unreadable glob entry: {}", err);
                None
            }
        })
        .map(|path| {
            let path = path.to_string_lossy().into_owned();
            if path.contains(' ') {
                format!("'{}'", path)
            } else {
                path
            }
        })
        .collect();

    if matches.is_empty() {
        return Err(ExpandError::NoMatches {
            pattern: value.to_string(),
        });
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::env as stdenv;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_env(name: &str) -> String {
        match name {
            "SOMETHING" => "something".to_string(),
            "SOME_VAR" => "some value".to_string(),
            "X" => "Y".to_string(),
            _ => String::new(),
        }
    }

    fn make_unique_temp_dir(tag: &str, files: &[&str]) -> PathBuf {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("wrash_expand_{}_{}_{}", tag, std::process::id(), nanos));
        fs::create_dir_all(&p).expect("create temp dir");
        for file in files {
            fs::File::create(p.join(file)).expect("touch file");
        }
        p
    }

    fn expand_line(line: &str) -> Result<Vec<String>, ExpandError> {
        parse(line).unwrap().expand(test_env)
    }

    #[test]
    fn test_simple_word() {
        assert_eq!(Node::word("abc").expand(&test_env), Ok(vec!["abc".to_string()]));
    }

    #[test]
    fn test_literal_words_are_idempotent() {
        for s in ["status", "--oneline", "HEAD~3", "a/b/c.txt", "key=value", "ünïcode"] {
            assert_eq!(expand_line(s), Ok(vec![s.to_string()]), "word {:?}", s);
        }
    }

    #[test]
    fn test_variable_expansion() {
        assert_eq!(
            Node::variable("SOME_VAR").expand(&test_env),
            Ok(vec!["some value".to_string()])
        );
        assert_eq!(
            Node::variable("NO_EXIST").expand(&test_env),
            Ok(vec![String::new()])
        );
    }

    #[test]
    fn test_single_quote_suppresses_expansion() {
        assert_eq!(expand_line("'$X'"), Ok(vec!["$X".to_string()]));
        assert_eq!(
            Node::single_quote("a'b'c").expand(&test_env),
            Ok(vec!["a'b'c".to_string()])
        );
        assert_eq!(expand_line("'*'"), Ok(vec!["*".to_string()]));
    }

    #[test]
    fn test_double_quote_splices_into_one_string() {
        assert_eq!(expand_line("\"a$X-b\""), Ok(vec!["aY-b".to_string()]));
        assert_eq!(
            expand_line("\"value of SOMETHING: $SOMETHING\""),
            Ok(vec!["value of SOMETHING: something".to_string()])
        );
        assert_eq!(expand_line("\"$NOPE\""), Ok(vec![String::new()]));
    }

    #[test]
    fn test_double_quote_never_globs() {
        assert_eq!(expand_line("\"*\""), Ok(vec!["*".to_string()]));
        assert_eq!(
            Node::quoted_word("no_*_matches").expand(&test_env),
            Ok(vec!["no_*_matches".to_string()])
        );
    }

    #[test]
    fn test_glued_nodes_are_not_joined() {
        assert_eq!(
            expand_line("g'h'j"),
            Ok(vec!["g".to_string(), "h".to_string(), "j".to_string()])
        );
        assert_eq!(
            expand_line("$X\"z\""),
            Ok(vec!["Y".to_string(), "z".to_string()])
        );
    }

    #[test]
    fn test_empty_command_expands_to_nothing() {
        assert_eq!(expand_line(""), Ok(Vec::new()));
    }

    #[test]
    fn test_escapes_are_resolved() {
        assert_eq!(Node::word("a\\*b").expand(&test_env), Ok(vec!["a*b".to_string()]));
        assert_eq!(expand_line("a\\ b"), Ok(vec!["a b".to_string()]));
        assert_eq!(expand_line("end\\"), Ok(vec!["end\\".to_string()]));
    }

    #[test]
    fn test_glob_matches_in_order() {
        let dir = make_unique_temp_dir("order", &["a_file", "another_file", "b_file"]);

        let word = Node::word(dir.join("a*_file").to_string_lossy());
        let expected = vec![
            dir.join("a_file").to_string_lossy().to_string(),
            dir.join("another_file").to_string_lossy().to_string(),
        ];
        assert_eq!(word.expand(&test_env), Ok(expected));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_glob_match_with_space_is_quoted() {
        let dir = make_unique_temp_dir("space", &["my file.txt"]);

        let word = Node::word(dir.join("my*").to_string_lossy());
        let expected = format!("'{}'", dir.join("my file.txt").to_string_lossy());
        assert_eq!(word.expand(&test_env), Ok(vec![expected]));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    #[cfg(unix)]
    fn test_escaped_metacharacter_inside_live_pattern() {
        let dir = make_unique_temp_dir("escaped", &["a*_file1", "ab_file1"]);

        let raw = format!("{}/a\\*_file*", dir.to_string_lossy());
        let expected = vec![dir.join("a*_file1").to_string_lossy().to_string()];
        assert_eq!(Node::word(raw).expand(&test_env), Ok(expected));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_glob_without_matches_fails() {
        let dir = make_unique_temp_dir("nomatch", &[]);
        let raw = dir.join("no_*_matches").to_string_lossy().to_string();

        assert_eq!(
            Node::word(raw.clone()).expand(&test_env),
            Err(ExpandError::NoMatches { pattern: raw })
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let err = Node::word("abcdefg[]").expand(&test_env).unwrap_err();
        assert!(matches!(err, ExpandError::InvalidPattern { .. }));
        assert_eq!(err.clone(), err);
        assert!(err.to_string().starts_with("failed to expand glob 'abcdefg[]': "));
    }

    #[test]
    fn test_failure_aborts_whole_command() {
        let dir = make_unique_temp_dir("abort", &[]);
        let line = format!("ok {}/none_*", dir.to_string_lossy());

        assert!(matches!(expand_line(&line), Err(ExpandError::NoMatches { .. })));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_glob_pattern_translation() {
        assert_eq!(glob_pattern("a\\*b*").unwrap(), "a[*]b*");
        assert_eq!(glob_pattern("a\\?\\[\\]").unwrap(), "a[?][[][]]");
        assert_eq!(glob_pattern("a\\ b*").unwrap(), "a b*");
        assert_eq!(strip_escapes("a\\+b"), Some("a+b".to_string()));
        assert_eq!(strip_escapes("a+b"), None);
    }

    #[test]
    fn test_star_runs_collapse() {
        assert_eq!(glob_pattern("a**").unwrap(), "a*");
        assert_eq!(glob_pattern("src/**/*.rs").unwrap(), "src/*/*.rs");
        assert_eq!(glob_pattern("a\\***").unwrap(), "a[*]*");
        assert_eq!(glob_pattern("[**]").unwrap(), "[**]");
    }

    #[test]
    fn test_bracket_escapes() {
        assert_eq!(glob_pattern("x[a\\]]").unwrap(), "x[]a]");
        assert_eq!(glob_pattern("[a\\-z]").unwrap(), "[az-]");
        assert_eq!(glob_pattern("[\\!a]").unwrap(), "[a!]");
        assert_eq!(glob_pattern("[\\!\\-]").unwrap(), "[-!]");
        assert_eq!(glob_pattern("[\\!]").unwrap(), "!");
        assert_eq!(glob_pattern("[^ab]").unwrap(), "[!ab]");
        assert_eq!(glob_pattern("[!\\]]").unwrap(), "[!]]");
        assert_eq!(glob_pattern("[a-z]?").unwrap(), "[a-z]?");

        assert_eq!(glob_pattern("[ab").unwrap_err().msg, "unterminated character class");
        assert_eq!(glob_pattern("[ab\\").unwrap_err().msg, "unterminated character class");
        assert_eq!(glob_pattern("a[]").unwrap_err().msg, "empty character class");
    }

    #[test]
    #[cfg(unix)]
    fn test_escaped_bracket_member_matches() {
        let dir = make_unique_temp_dir("class", &["x]", "xa", "xb"]);

        let raw = format!("{}/x[a\\]]", dir.to_string_lossy());
        let expected = vec![
            dir.join("x]").to_string_lossy().to_string(),
            dir.join("xa").to_string_lossy().to_string(),
        ];
        assert_eq!(Node::word(raw).expand(&test_env), Ok(expected));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_double_star_matches_one_level() {
        let dir = make_unique_temp_dir("doublestar", &["top.rs", "abc"]);
        fs::create_dir_all(dir.join("sub").join("deep")).expect("create sub dirs");
        fs::File::create(dir.join("sub").join("mid.rs")).expect("touch sub/mid.rs");
        fs::File::create(dir.join("sub").join("deep").join("low.rs")).expect("touch sub/deep/low.rs");

        let nested = Node::word(format!("{}/**/*.rs", dir.to_string_lossy()));
        assert_eq!(
            nested.expand(&test_env),
            Ok(vec![dir.join("sub").join("mid.rs").to_string_lossy().to_string()])
        );

        let trailing = Node::word(format!("{}/a**", dir.to_string_lossy()));
        assert_eq!(
            trailing.expand(&test_env),
            Ok(vec![dir.join("abc").to_string_lossy().to_string()])
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_greedy_identifier_inside_double_quotes() {
        assert_eq!(expand_line("\"a$Xb\""), Ok(vec!["a".to_string()]));
    }
}
