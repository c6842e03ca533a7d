use anyhow::{Context, Result};
use argh::FromArgs;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use wrash::completion::CommandSuggestion;
use wrash::env::split_environ;
use wrash::{Config, Environment, History, Session, config, find_command_path, logging, parse};

#[derive(FromArgs)]
/// Wrap any command line utility into an interactive shell.
struct Args {
    #[argh(option)]
    /// file where the command history is stored.
    history_file: Option<PathBuf>,

    #[argh(option)]
    /// YAML file describing the sub-commands, flags and arguments of the base command.
    completion_file: Option<PathBuf>,

    #[argh(option)]
    /// one of off, error, warn, info, debug or trace.
    log_level: Option<String>,

    #[argh(option, short = 'e')]
    /// extra session variable as KEY=VALUE, may be repeated.
    env: Vec<String>,

    #[argh(positional, greedy)]
    /// the base command, optionally with leading arguments.
    base: Vec<String>,
}

fn main() {
    let args: Args = argh::from_env();
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("wrash: {:#}", err);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    let mut config = Config::from_env();
    if let Some(path) = args.history_file {
        config.history_file = path;
    }
    if let Some(level) = &args.log_level {
        config.log_level = config::parse_level(level)?;
    }
    logging::init(&config);

    let mut env = Environment::inherited("");
    for environ in &args.env {
        let (key, value) = split_environ(environ)?;
        env.set_var(key, value);
    }

    let line = args.base.join(" ");
    let command = parse(&line).with_context(|| format!("could not parse base command '{}'", line))?;
    let base_argv = command
        .expand(|name| env.lookup(name))
        .with_context(|| format!("could not expand base command '{}'", line))?;

    let Some(program) = base_argv.first() else {
        anyhow::bail!("no command provided");
    };
    let search_paths = env.get_var("PATH").unwrap_or_default();
    if find_command_path(OsStr::new(&search_paths), &env.current_dir, Path::new(program)).is_none() {
        anyhow::bail!("command not found: {}", program);
    }

    let base = base_argv.join(" ");
    env.history = match History::open(base.as_str(), &config.history_file) {
        Ok(history) => history,
        Err(err) => {
            log::warn!("{:#}", err);
            eprintln!("wrash: {:#}, history will not be saved", err);
            History::new(base.as_str(), Vec::new())
        }
    };

    let completion_file = args
        .completion_file
        .unwrap_or_else(|| config.completion_file_for(program));
    let suggestions = if completion_file.exists() {
        match CommandSuggestion::load(&completion_file) {
            Ok(suggestions) => Some(suggestions),
            Err(err) => {
                log::warn!("{:#}", err);
                eprintln!("wrash: {:#}", err);
                None
            }
        }
    } else {
        log::debug!("no suggestions at {}", completion_file.display());
        None
    };

    log::info!("starting session for '{}'", base);
    let mut session = Session::new(base_argv, env);
    if let Some(suggestions) = suggestions {
        session = session.with_suggestions(suggestions);
    }
    session.run()
}
