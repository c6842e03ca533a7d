use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// History file location override.
pub const HISTORY_FILE_VAR: &str = "WRASH_HISTORY_FILE";
/// Directory holding one `<base>.yaml` suggestion tree per wrapped command.
pub const COMPLETION_DIR_VAR: &str = "WRASH_COMPLETION_DIR";
/// Log file location override.
pub const LOG_FILE_VAR: &str = "WRASH_LOG_FILE";
/// Log level (`off`, `error`, `warn`, `info`, `debug` or `trace`).
pub const LOG_LEVEL_VAR: &str = "WRASH_LOG";

/// File locations and log level of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub history_file: PathBuf,
    pub completion_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
}

impl Config {
    /// Resolve the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary variable lookup.
    ///
    /// Paths default to locations under `$HOME` (or the working directory when HOME is
    /// unset). An unrecognised log level falls back to `warn`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = lookup("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let history_file = lookup(HISTORY_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".wrash_history.yaml"));
        let completion_dir = lookup(COMPLETION_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".wrash_completion"));
        let log_file = lookup(LOG_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/share/wrash/wrash.log"));
        let log_level = lookup(LOG_LEVEL_VAR)
            .and_then(|level| parse_level(&level).ok())
            .unwrap_or(LevelFilter::Warn);

        Self {
            history_file,
            completion_dir,
            log_file,
            log_level,
        }
    }

    /// Suggestion tree file for the wrapped `program`, named after its file name.
    pub fn completion_file_for(&self, program: &str) -> PathBuf {
        let name = Path::new(program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string());
        self.completion_dir.join(format!("{}.yaml", name))
    }
}

/// Parse a log level name, case-insensitively.
pub fn parse_level(level: &str) -> anyhow::Result<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| anyhow::anyhow!("invalid log level '{}', expected one of off, error, warn, info, debug, trace", level))
}
