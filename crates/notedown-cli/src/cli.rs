//! Command-line argument definitions.
//!
//! [`Action`] is the one grammar for client operations. The process
//! arguments parse it through [`Cli`] and every interactive line parses it
//! through [`ReplLine`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notedown_editor::Direction;

/// Client for the Notedown language server.
#[derive(Parser, Debug)]
#[command(name = "notedown-client", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Top-level subcommands: every [`Action`] plus the interactive loop.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    #[command(flatten)]
    Action(Action),
    /// Reads commands from standard input until `quit`.
    Repl,
}

/// One line of the interactive loop, without a program name.
#[derive(Parser, Debug)]
#[command(name = "notedown", no_binary_name = true)]
pub(crate) struct ReplLine {
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) action: Action,
}

/// Operations the client offers. Lines and columns are one-based.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Shows the workspace for a directory and the sessions attached to it.
    Status {
        /// Directory to inspect; defaults to the current directory.
        path: Option<PathBuf>,
    },
    /// Restarts every language server.
    Reload,
    /// Opens a document, re-reading it from disk when already open.
    Open {
        /// Document to open.
        file: PathBuf,
    },
    /// Prints the lines of the list item under a position.
    SelectItem {
        /// Document to inspect.
        file: PathBuf,
        /// Line of the position.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
        /// Column of the position.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        column: u32,
    },
    /// Moves the list item on a line past its sibling and saves the file.
    MoveItem {
        /// Document to edit.
        file: PathBuf,
        /// Line of the item.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
        /// `up` or `down`.
        #[arg(long)]
        direction: Direction,
    },
    /// Runs the code blocks of a document and saves their output into it.
    ExecCode {
        /// Document to run.
        file: PathBuf,
        /// Only run blocks in this language.
        #[arg(long)]
        language: Option<String>,
    },
    /// Prints the spans concealed in a document.
    Conceal {
        /// Document to inspect.
        file: PathBuf,
    },
    /// Prints the fold level of every line of a document.
    Folds {
        /// Document to inspect.
        file: PathBuf,
    },
    /// Lists completion candidates at a position.
    Complete {
        /// Document to inspect.
        file: PathBuf,
        /// Line of the position.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
        /// Column of the position.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        column: u32,
    },
    /// Lists the code actions for a line, or applies one of them.
    CodeActions {
        /// Document to inspect.
        file: PathBuf,
        /// Line to ask about.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
        /// Number of the listed action to apply; the file is saved after.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        apply: Option<u32>,
    },
    /// Ends the interactive loop.
    #[command(alias = "exit")]
    Quit,
}

/// Splits an interactive line into words.
///
/// Whitespace separates words unless it sits inside single or double quotes.
/// Returns `None` for an unterminated quote.
pub(crate) fn split_words(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    for character in line.chars() {
        match quote {
            Some(open) if character == open => quote = None,
            Some(_) => current.push(character),
            None if character == '"' || character == '\'' => {
                quote = Some(character);
                in_word = true;
            }
            None if character.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(character);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return None;
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}
