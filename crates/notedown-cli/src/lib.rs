//! Command-line client for the Notedown language server.
//!
//! The runtime splits leading configuration flags from the command, loads
//! configuration, installs logging and then runs either a single subcommand
//! or the interactive loop against a [`notedown_editor::Notedown`]
//! coordinator. Configuration loading and the IO streams are parameters so
//! tests can substitute both.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use notedown_editor::Notedown;
use notedown_lsp_host::CollectingNotifier;

mod cli;
mod config;
mod errors;
pub mod telemetry;
mod workbench;

#[cfg(test)]
mod tests;

use cli::{Cli, CliCommand};
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use workbench::Workbench;

/// Runs the client with process arguments and streams.
///
/// Failures are reported on `stderr` and turn into a failing exit code.
pub fn run<R, W, E>(
    args: impl IntoIterator<Item = OsString>,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    R: BufRead,
    W: Write,
    E: Write,
{
    run_with_loader(args, &OrthoConfigLoader, stdin, stdout, stderr)
}

pub(crate) fn run_with_loader<R, W, E, L>(
    args: impl IntoIterator<Item = OsString>,
    loader: &L,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let cli = match parse_command(&args) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            return match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let split = split_config_arguments(&args);
    let outcome = loader.load(&split.config_arguments).and_then(|config| {
        telemetry::initialise(&config)?;
        let cwd = std::env::current_dir().map_err(AppError::CurrentDirectory)?;
        let notices = CollectingNotifier::new();
        let notedown = Notedown::from_config(&config, Arc::new(notices.clone()));
        let mut workbench = Workbench::new(notedown, notices, cwd, config.request_timeout());
        dispatch(&mut workbench, cli.command, stdin, stdout, stderr)
    });
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn parse_command(args: &[OsString]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(split_config_arguments(args).command_arguments)
}

/// Runs a parsed subcommand and prints the notices it raised.
pub(crate) fn dispatch<R, W, E>(
    workbench: &mut Workbench,
    command: CliCommand,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let result = match command {
        CliCommand::Repl => workbench.repl(stdin, stdout, stderr),
        CliCommand::Action(action) => workbench.execute(&action, stdout).map(|_| ()),
    };
    workbench.flush_notices(stderr)?;
    result
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    writeln!(stderr, "notedown-client: {error}").ok();
    ExitCode::FAILURE
}
