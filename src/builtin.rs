use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Factory};
use crate::env::Environment;
use crate::io_adapters::Io;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::env as stdenv;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Marker that distinguishes a builtin invocation (`!!cd ..`) from a sub-command of
/// the wrapped base command.
pub const BUILTIN_PREFIX: &str = "!!";

/// Whether a raw input line invokes a builtin.
pub fn is_builtin(line: &str) -> bool {
    line.starts_with(BUILTIN_PREFIX)
}

/// A `!!name` command handled by the session itself.
///
/// Arguments are parsed with [`argh`], so every builtin gets `--help` for free, and the
/// command runs in-process against the session environment.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command without the marker, e.g. "cd".
    fn name() -> &'static str;

    /// One-line summary shown by `help` and by completion.
    fn description() -> &'static str;

    /// Run against the session environment. An `Err` is reported on the error stream
    /// and becomes exit code 1.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: &mut Io, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, &mut io.stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(io.stderr, "{}{}: {:#}", BUILTIN_PREFIX, T::name(), e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: &mut Io, _env: &mut Environment) -> Result<ExitCode> {
        if self.is_error {
            io.stderr.write_all(self.output.as_bytes())?;
            Ok(1)
        } else {
            io.stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }

        let invocation = format!("{}{}", BUILTIN_PREFIX, name);
        Some(match T::from_args(&[invocation.as_str()], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Factories for every builtin, in the order they are looked up.
pub(crate) fn default_factories() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Env>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<History>::default()),
    ]
}

/// `(name, description)` of every builtin, sorted by name.
pub fn summaries() -> Vec<(&'static str, &'static str)> {
    let mut summaries = vec![
        (Cd::name(), Cd::description()),
        (Env::name(), Env::description()),
        (Exit::name(), Exit::description()),
        (Help::name(), Help::description()),
        (History::name(), History::description()),
    ];
    summaries.sort();
    summaries
}

#[derive(FromArgs)]
/// Change the working directory of the shell.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    #[argh(positional)]
    /// target directory, relative to the session working directory; $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn description() -> &'static str {
        "change the working directory of the shell"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => anyhow::bail!("no target and HOME not set"),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("could not change directory to {}", new_dir.display()))?;

        stdenv::set_current_dir(&canonical)
            .with_context(|| format!("could not change directory to {}", canonical.display()))?;
        log::debug!("changed directory to {}", canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit code reported when the shell terminates.
    pub code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn description() -> &'static str {
        "exit the shell"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = match &self.code {
            Some(code) => code
                .parse::<ExitCode>()
                .with_context(|| format!("invalid exit code '{}'", code))?,
            None => {
                env.should_exit = true;
                return Ok(0);
            }
        };

        env.should_exit = true;
        env.exit_code = Some(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Set or display environment variables for the current session.
/// `env` and `env show` print every variable; `env set KEY VALUE` sets one and
/// `env set KEY` removes it.
pub struct Env {
    #[argh(positional, greedy)]
    /// sub-command (`show` or `set`) followed by its arguments.
    pub args: Vec<String>,
}

impl BuiltinCommand for Env {
    fn name() -> &'static str {
        "env"
    }

    fn description() -> &'static str {
        "set or display environment variables for the current session"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let Some((action, rest)) = self.args.split_first() else {
            return show_vars(stdout, env);
        };

        match (action.as_str(), rest) {
            ("show", []) => show_vars(stdout, env),
            ("show", extra) => anyhow::bail!("received unexpected arguments: {:?}", extra),
            ("set", []) => Ok(0),
            ("set", [key]) => {
                env.remove_var(key);
                Ok(0)
            }
            ("set", [key, value]) => {
                env.set_var(key.as_str(), value.as_str());
                Ok(0)
            }
            ("set", [_, _, extra @ ..]) => {
                anyhow::bail!("received unexpected arguments: {:?}", extra)
            }
            (other, _) => anyhow::bail!("received unsupported command: {}", other),
        }
    }
}

fn show_vars(stdout: &mut dyn Write, env: &Environment) -> Result<ExitCode> {
    for (key, value) in env.sorted_vars() {
        writeln!(stdout, "{}='{}'", key, value)?;
    }
    Ok(0)
}

#[derive(FromArgs)]
/// View help text.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn description() -> &'static str {
        "view help text"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let summaries = summaries();
        let width = summaries.iter().map(|(name, _)| name.len()).max().unwrap_or(0) + 4;

        write!(
            stdout,
            "Thanks for using WraSh!\n\
             \n\
             WraSh is designed to provide a very minimal interactive wrapper shell around a\n\
             base command. For example if the base command was 'git', you could call\n\
             'add -A' rather then 'git add -A'.\n\
             \n\
             Below is a list of supported builtins, prefix them with '{}' and pass '--help' to\n\
             any of them for more information:",
            BUILTIN_PREFIX
        )?;
        for (name, description) in summaries {
            write!(stdout, "\n   {:<width$}{}", name, description, width = width)?;
        }
        writeln!(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// View the history of the shell.
pub struct History {
    #[argh(positional)]
    /// regular expression the command must match (should not include the base command).
    pub pattern: Option<String>,

    #[argh(option, short = 'n', default = "0")]
    /// limit shown history entries to N (if N is 0, all entries will be shown).
    pub number: usize,

    #[argh(switch, short = 's')]
    /// include the base command in the output.
    pub show: bool,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn description() -> &'static str {
        "view the history of the shell"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let pattern = self.pattern.as_deref().unwrap_or(".*");
        let re = Regex::new(pattern).with_context(|| format!("could not compile pattern '{}'", pattern))?;

        let matched = env.history.matching(&re);
        let skip = match self.number {
            0 => 0,
            n => matched.len().saturating_sub(n),
        };

        for cmd in &matched[skip..] {
            if self.show {
                writeln!(stdout, "{} {}", env.history.base(), cmd)?;
            } else {
                writeln!(stdout, "{}", cmd)?;
            }
        }
        Ok(0)
    }
}
