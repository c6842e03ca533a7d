use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Factory};
use crate::env::Environment;
use crate::io_adapters::Io;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

/// The wrapped base command together with the arguments of one line.
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: OsString, args: Vec<OsString>) -> Self {
        Self { program, args }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let executable = find_command_path(
            OsStr::new(&search_paths),
            &env.current_dir,
            Path::new(name),
        )?;
        Some(Box::new(ExternalCommand::new(
            executable.into_os_string(),
            args.iter().map(|x| x.into()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, io: &mut Io, env: &mut Environment) -> Result<ExitCode> {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);

        log::debug!("running {:?} {:?}", self.program, self.args);

        let exit_status = if io.inherits_terminal() {
            cmd.status()
                .with_context(|| format!("could not run {}", self.program.to_string_lossy()))?
        } else {
            let output = cmd
                .stdin(Stdio::null())
                .output()
                .with_context(|| format!("could not run {}", self.program.to_string_lossy()))?;
            io.stdout.write_all(&output.stdout)?;
            io.stderr.write_all(&output.stderr)?;
            output.status
        };

        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve the base command the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/tool`) or `./`-prefixed: resolved
///   against `current_dir`, returned if it exists.
/// - Single path component: search each directory in `search_paths` (PATH) and return
///   the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, current_dir: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path).map(Path::to_path_buf);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()),
        _ => find_by_path(&current_dir.join(path)).map(Path::to_path_buf),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if let Some(path) = find_by_path(&path) {
            return Some(path.to_owned());
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}
