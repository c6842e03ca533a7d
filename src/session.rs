use crate::builtin::{self, BUILTIN_PREFIX};
use crate::command::{CommandFactory, ExitCode, Factory};
use crate::completion::{CommandSuggestion, WrashHelper};
use crate::env::Environment;
use crate::external::ExternalCommand;
use crate::io_adapters::Io;
use crate::parser;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::io::Write;

/// Exit code of a line that could not be parsed or expanded.
const INVALID_ARGS: ExitCode = 2;
/// Exit code of a line whose command could not be found or started.
const NOT_RUNNABLE: ExitCode = 127;

/// Interactive shell wrapping one base command.
///
/// Every line is parsed, expanded against the session variables, and either run as a
/// builtin (when it starts with the builtin marker) or appended to the base command
/// and executed.
pub struct Session {
    base: String,
    base_argv: Vec<String>,
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    external: Factory<ExternalCommand>,
    io: Io,
    previous_exit_code: ExitCode,
    suggestions: Option<CommandSuggestion>,
}

impl Session {
    /// Session for the already expanded `base_argv` (e.g. `["git"]` or
    /// `["kubectl", "-n", "dev"]`).
    pub fn new(base_argv: Vec<String>, env: Environment) -> Self {
        Self {
            base: base_argv.join(" "),
            base_argv,
            env,
            builtins: builtin::default_factories(),
            external: Factory::default(),
            io: Io::inherited(),
            previous_exit_code: 0,
            suggestions: None,
        }
    }

    pub fn with_io(mut self, io: Io) -> Self {
        self.io = io;
        self
    }

    pub fn with_suggestions(mut self, suggestions: CommandSuggestion) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn previous_exit_code(&self) -> ExitCode {
        self.previous_exit_code
    }

    /// Whether `!!exit` was called.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Run one submitted line and return its exit code.
    ///
    /// Errors never escape: they are reported on the session error stream and
    /// reflected in the exit code.
    pub fn execute(&mut self, line: &str) -> ExitCode {
        if line.trim().is_empty() {
            return self.previous_exit_code;
        }

        self.env.history.add(line);
        self.previous_exit_code = match self.run_line(line) {
            Ok(code) => code,
            Err(report) => {
                let _ = writeln!(self.io.stderr, "{}", report.message);
                report.code
            }
        };
        log::debug!("'{}' exited with {}", line, self.previous_exit_code);
        self.previous_exit_code
    }

    fn run_line(&mut self, line: &str) -> Result<ExitCode, Failure> {
        let command = parser::parse(line)
            .map_err(|err| Failure::new(INVALID_ARGS, format!("could not parse args: {}", err)))?;

        let env = &self.env;
        let args = command
            .expand(|name| env.lookup(name))
            .map_err(|err| Failure::new(INVALID_ARGS, format!("could not expand args: {}", err)))?;

        if builtin::is_builtin(line) {
            log::info!("running builtin {}", command.render());
            self.run_builtin(&args)
        } else {
            self.run_external(&args)
        }
    }

    fn run_builtin(&mut self, args: &[String]) -> Result<ExitCode, Failure> {
        let Some((invocation, rest)) = args.split_first() else {
            return Err(Failure::new(NOT_RUNNABLE, "unknown command: "));
        };
        let name = invocation.strip_prefix(BUILTIN_PREFIX).unwrap_or(invocation.as_str());
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let cmd = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, &rest))
            .ok_or_else(|| Failure::new(NOT_RUNNABLE, format!("unknown command: {}", invocation)))?;

        cmd.execute(&mut self.io, &mut self.env)
            .map_err(|err| Failure::new(NOT_RUNNABLE, format!("could not run command: {:#}", err)))
    }

    fn run_external(&mut self, args: &[String]) -> Result<ExitCode, Failure> {
        let Some((program, base_args)) = self.base_argv.split_first() else {
            return Err(Failure::new(NOT_RUNNABLE, "could not run command: no command provided"));
        };
        let argv: Vec<&str> = base_args
            .iter()
            .chain(args)
            .map(String::as_str)
            .collect();

        let cmd = self
            .external
            .try_create(&self.env, program, &argv)
            .ok_or_else(|| {
                Failure::new(NOT_RUNNABLE, format!("could not run command: command not found: {}", program))
            })?;

        cmd.execute(&mut self.io, &mut self.env)
            .map_err(|err| Failure::new(NOT_RUNNABLE, format!("could not run command: {:#}", err)))
    }

    /// Prompt showing the user, the working directory and the base command.
    pub fn prompt(&self) -> String {
        format!(
            "[{} {}] {} > ",
            self.env.lookup("USER"),
            self.env.current_dir.display(),
            self.base
        )
    }

    /// Read and execute lines until `!!exit` or end of input, then write the history
    /// back. Returns the code requested through `!!exit`.
    pub fn run(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl: Editor<WrashHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(WrashHelper::new(self.suggestions.take())));
        self.run_with(&mut rl)
    }

    /// History is synced whether or not the loop fails.
    fn run_with(&mut self, editor: &mut impl LineEditor) -> anyhow::Result<ExitCode> {
        let result = self.read_lines(editor);
        self.sync_history();
        result.map(|()| self.env.exit_code.unwrap_or(0))
    }

    fn read_lines(&mut self, editor: &mut impl LineEditor) -> anyhow::Result<()> {
        for cmd in self.env.history.recallable() {
            editor.add_history_entry(cmd)?;
        }

        loop {
            match editor.readline(&self.prompt()) {
                Ok(line) => {
                    editor.add_history_entry(&line)?;
                    self.execute(&line);
                    if self.should_exit() {
                        return Ok(());
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn sync_history(&mut self) {
        if let Err(err) = self.env.history.sync() {
            log::error!("could not sync history: {:#}", err);
            let _ = writeln!(self.io.stderr, "could not sync history: {:#}", err);
        }
    }
}

/// The parts of the line editor the read loop drives.
trait LineEditor {
    fn readline(&mut self, prompt: &str) -> rustyline::Result<String>;
    fn add_history_entry(&mut self, line: &str) -> rustyline::Result<bool>;
}

impl LineEditor for Editor<WrashHelper, DefaultHistory> {
    fn readline(&mut self, prompt: &str) -> rustyline::Result<String> {
        Editor::readline(self, prompt)
    }

    fn add_history_entry(&mut self, line: &str) -> rustyline::Result<bool> {
        Editor::add_history_entry(self, line)
    }
}

/// A line that failed before or while starting its command.
struct Failure {
    code: ExitCode,
    message: String,
}

impl Failure {
    fn new(code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
