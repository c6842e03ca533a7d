use crate::history::History;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::env as stdenv;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Session state shared with builtins.
///
/// The environment contains:
/// - `vars`: variables used for `$NAME` expansion and passed to the wrapped command.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit` / `exit_code`: set by `exit`, checked by the read loop.
/// - `history`: lines submitted so far, for the `history` builtin.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of session variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, the interactive loop terminates after the current line.
    pub should_exit: bool,
    /// Exit code requested through `exit CODE`.
    pub exit_code: Option<i32>,
    /// History of the running session.
    pub history: History,
}

impl Environment {
    /// Empty environment for `base` rooted at the process working directory.
    pub fn new(base: impl Into<String>) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: HashMap::new(),
            current_dir,
            should_exit: false,
            exit_code: None,
            history: History::new(base, Vec::new()),
        }
    }

    /// Capture the variables of the current process.
    ///
    /// Variables whose name is not a plain identifier are skipped.
    pub fn inherited(base: impl Into<String>) -> Self {
        let mut env = Self::new(base);
        for (key, value) in stdenv::vars_os() {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) if is_identifier(&key) => env.set_var(key, value),
                (key, _) => log::warn!("skipping environment variable {:?}", key),
            }
        }
        env
    }

    /// Get the value of a session variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Value of `name`, or an empty string when it is unset.
    ///
    /// This is the lookup handed to [`crate::Command::expand`].
    pub fn lookup(&self, name: &str) -> String {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    /// Set or override a session variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Variables ordered by name.
    pub fn sorted_vars(&self) -> BTreeMap<&str, &str> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Split `KEY=VALUE` into its parts, rejecting keys that are not plain identifiers.
pub fn split_environ(s: &str) -> anyhow::Result<(&str, &str)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("no '=' found in environment variable '{}'", s))?;

    if !is_identifier(key) {
        anyhow::bail!(
            "invalid identifier '{}', must match pattern {}",
            key,
            identifier_pattern().as_str()
        );
    }

    Ok((key, value))
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[a-zA-Z0-9_]+$").expect("identifier pattern is valid"))
}

fn is_identifier(key: &str) -> bool {
    identifier_pattern().is_match(key)
}

#[cfg(test)]
mod tests {
    use crate::env::{split_environ, Environment};

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::new("git");

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);
        assert_eq!(env.lookup("SOME_RANDOM_ENV_VAR_12345"), "");

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.lookup("KEY"), "VALUE");

        assert_eq!(env.remove_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.lookup("KEY"), "");
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::inherited("git");
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_sorted_vars() {
        let mut env = Environment::new("git");
        env.set_var("B", "2");
        env.set_var("A", "1");

        let keys: Vec<_> = env.sorted_vars().into_keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_split_environ() {
        assert_eq!(split_environ("A=b=c").unwrap(), ("A", "b=c"));
        assert_eq!(split_environ("EMPTY=").unwrap(), ("EMPTY", ""));
        assert!(split_environ("NO_EQUALS").is_err());
        assert!(split_environ("BAD-KEY=x").is_err());
    }
}
