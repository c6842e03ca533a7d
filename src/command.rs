use crate::env::Environment;
use crate::io_adapters::Io;
use anyhow::Result;

/// Status reported for one session line, following the shell convention: 0 on
/// success, 1 for a failed builtin, 2 for a line that could not be parsed or
/// expanded, 127 when nothing could be run.
pub type ExitCode = i32;

/// Something a session line resolved to: a builtin or the wrapped base command.
pub trait ExecutableCommand {
    /// Run to completion, writing to `io` and updating the session `env`.
    fn execute(self: Box<Self>, io: &mut Io, env: &mut Environment) -> Result<ExitCode>;
}

/// Resolves a command name and its expanded arguments to something runnable.
///
/// `None` means the name belongs to another factory. Builtin factories match on the
/// builtin name; the base command factory resolves the program through `PATH`.
pub trait CommandFactory {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}

/// Stateless factory for the command type `T` of this crate.
pub(crate) struct Factory<T> {
    marker: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}
