//! Entry point for the `notedown-client` binary.
//!
//! Delegates to [`notedown_cli::run`], which loads configuration, parses the
//! command and drives the Notedown language server.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    notedown_cli::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
