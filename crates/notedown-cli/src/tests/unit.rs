use std::io::Cursor;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use notedown_config::Config;
use notedown_editor::Direction;
use notedown_lsp_host::NotedownCommand;
use notedown_lsp_host::test_support::{ScriptedResponse, ScriptedServer};
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

use super::support::{
    Bench, CODE_BLOCK, EXECUTION_OUTPUT, FLAT_LIST, StaticConfigLoader, WatchedInput, args,
    bench, bench_with,
};
use crate::cli::{Action, Cli, CliCommand, ReplLine, split_words};
use crate::run_with_loader;
use crate::workbench::Flow;

fn repl_action(line: &str) -> Result<Action, clap::Error> {
    let words = split_words(line).expect("balanced quotes");
    ReplLine::try_parse_from(words).map(|parsed| parsed.action)
}

fn run_repl(bench: &mut Bench, script: &str) -> (String, String) {
    let mut input = Cursor::new(script.as_bytes().to_vec());
    let mut out = Vec::new();
    let mut err = Vec::new();
    bench
        .workbench
        .repl(&mut input, &mut out, &mut err)
        .expect("repl");
    (
        String::from_utf8(out).expect("stdout utf8"),
        String::from_utf8(err).expect("stderr utf8"),
    )
}

#[rstest]
fn status_outside_a_workspace_succeeds_without_a_server() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().to_string_lossy().into_owned();
    let loader = StaticConfigLoader::new(Config::default());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let exit = run_with_loader(
        args(&["status", path.as_str()]),
        &loader,
        &mut Cursor::new(Vec::new()),
        &mut stdout,
        &mut stderr,
    );

    assert_eq!(exit, ExitCode::SUCCESS);
    let stdout = String::from_utf8(stdout).expect("stdout utf8");
    assert!(stdout.contains("no .notedown directory above"), "{stdout}");
    assert!(stdout.contains("no active sessions"), "{stdout}");
}

#[rstest]
fn invalid_configuration_fails_before_running() {
    let loader = StaticConfigLoader::new(Config {
        request_timeout_ms: 0,
        ..Config::default()
    });
    let mut stderr = Vec::new();

    let exit = run_with_loader(
        args(&["status"]),
        &loader,
        &mut Cursor::new(Vec::new()),
        &mut Vec::new(),
        &mut stderr,
    );

    assert_eq!(exit, ExitCode::FAILURE);
    let stderr = String::from_utf8(stderr).expect("stderr utf8");
    assert!(stderr.contains("request timeout must be greater than zero"), "{stderr}");
}

#[rstest]
fn unknown_subcommand_is_a_usage_error() {
    let loader = StaticConfigLoader::new(Config::default());
    let mut stderr = Vec::new();

    let exit = run_with_loader(
        args(&["frobnicate"]),
        &loader,
        &mut Cursor::new(Vec::new()),
        &mut Vec::new(),
        &mut stderr,
    );

    assert_eq!(exit, ExitCode::FAILURE);
    assert!(!stderr.is_empty());
}

#[rstest]
fn help_goes_to_stdout_and_succeeds() {
    let loader = StaticConfigLoader::new(Config::default());
    let mut stdout = Vec::new();

    let exit = run_with_loader(
        args(&["--help"]),
        &loader,
        &mut Cursor::new(Vec::new()),
        &mut stdout,
        &mut Vec::new(),
    );

    assert_eq!(exit, ExitCode::SUCCESS);
    let stdout = String::from_utf8(stdout).expect("stdout utf8");
    assert!(stdout.contains("select-item"), "{stdout}");
    assert!(stdout.contains("code-actions"), "{stdout}");
    assert!(stdout.contains("repl"), "{stdout}");
}

#[rstest]
#[case("select-item todo.md 2 5")]
#[case("move-item todo.md 3 --direction up")]
#[case("exec-code todo.md --language python")]
#[case("complete todo.md 1 7")]
#[case("code-actions todo.md 4 --apply 2")]
#[case("open todo.md")]
#[case("reload")]
#[case("quit")]
fn interactive_lines_share_the_command_line_grammar(#[case] line: &str) {
    let words = split_words(line).expect("balanced quotes");
    let argv: Vec<&str> = words.iter().map(String::as_str).collect();
    let cli = Cli::try_parse_from(args(&argv)).expect("command line parses");

    let action = repl_action(line).expect("interactive line parses");

    assert_eq!(cli.command, CliCommand::Action(action));
}

#[rstest]
#[case("move-item todo.md 3 --direction up", Action::MoveItem { file: PathBuf::from("todo.md"), line: 3, direction: Direction::Up })]
#[case("code-actions todo.md 4 --apply 2", Action::CodeActions { file: PathBuf::from("todo.md"), line: 4, apply: Some(2) })]
#[case("open 'my notes/todo.md'", Action::Open { file: PathBuf::from("my notes/todo.md") })]
#[case("exit", Action::Quit)]
fn interactive_lines_parse_to_actions(#[case] line: &str, #[case] expected: Action) {
    assert_eq!(repl_action(line).expect("parses"), expected);
}

#[rstest]
#[case(&["select-item", "todo.md", "0", "1"])]
#[case(&["code-actions", "todo.md", "1", "--apply", "0"])]
fn zero_is_not_a_line_or_action_number(#[case] argv: &[&str]) {
    assert!(Cli::try_parse_from(args(argv)).is_err());
}

#[rstest]
fn repl_is_not_an_interactive_action() {
    assert!(repl_action("repl").is_err());
}

#[rstest]
#[case("  open   \"a b.md\"  ", Some(vec!["open", "a b.md"]))]
#[case("conceal ''", Some(vec!["conceal", ""]))]
#[case("open \"a.md", None)]
fn words_respect_quotes(#[case] line: &str, #[case] expected: Option<Vec<&str>>) {
    let expected = expected.map(|words| words.into_iter().map(String::from).collect::<Vec<_>>());

    assert_eq!(split_words(line), expected);
}

#[rstest]
fn select_prints_the_item_lines(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::SelectItem {
                file,
                line: 2,
                column: 3,
            },
            &mut bench.out,
        )
        .expect("select");

    assert_eq!(bench.stdout(), "lines 2-2\n- two\n");
}

#[rstest]
fn moving_an_item_saves_the_file(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::MoveItem {
                file,
                line: 1,
                direction: Direction::Down,
            },
            &mut bench.out,
        )
        .expect("move");

    assert_eq!(bench.read("todo.md"), "- two\n- one\n- three\n");
    assert!(bench.stdout().contains("cursor on line 2"), "{}", bench.stdout());
}

#[rstest]
fn moving_the_last_item_down_changes_nothing(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::MoveItem {
                file,
                line: 3,
                direction: Direction::Down,
            },
            &mut bench.out,
        )
        .expect("move");

    assert_eq!(bench.read("todo.md"), FLAT_LIST);
    assert_eq!(bench.stdout(), "nothing to move\n");
}

#[rstest]
fn execution_output_is_written_back(mut bench: Bench) {
    let file = bench.file("run.md", CODE_BLOCK);

    bench
        .workbench
        .execute(
            &Action::ExecCode {
                file,
                language: None,
            },
            &mut bench.out,
        )
        .expect("exec");

    assert_eq!(bench.read("run.md"), format!("{CODE_BLOCK}{EXECUTION_OUTPUT}"));
    assert!(bench.stdout().starts_with("wrote execution output"), "{}", bench.stdout());
}

#[rstest]
fn markdown_outside_a_workspace_cannot_execute() {
    let mut bench = bench_with(ScriptedServer::full);
    let outside = TempDir::new().expect("temp dir");
    let file = outside.path().join("plain.md");
    std::fs::write(&file, CODE_BLOCK).expect("write document");

    bench
        .workbench
        .execute(
            &Action::ExecCode {
                file,
                language: None,
            },
            &mut bench.out,
        )
        .expect("exec");

    assert!(bench.stdout().starts_with("code execution is unavailable"), "{}", bench.stdout());
    assert_eq!(bench.factory.spawn_count(), 0);
}

#[rstest]
fn conceal_lists_wikilink_targets() {
    let mut bench = bench_with(|| {
        ScriptedServer::full().respond(
            NotedownCommand::ConcealRanges.wire_name(),
            ScriptedResponse::Value(json!([{
                "range": {"start": {"line": 0, "character": 6}, "end": {"line": 0, "character": 12}},
                "kind": "wikilink-target"
            }])),
        )
    });
    let file = bench.file("links.md", "see [[target|label]]\n");

    bench
        .workbench
        .execute(&Action::Conceal { file }, &mut bench.out)
        .expect("conceal");

    assert_eq!(bench.stdout(), "1:7-13\n");
}

#[rstest]
fn completion_lists_labels_and_details() {
    let mut bench = bench_with(|| {
        ScriptedServer::full().respond(
            "textDocument/completion",
            ScriptedResponse::Value(json!([
                {"label": "[[inbox]]", "detail": "inbox.md"},
                {"label": "[[journal]]"}
            ])),
        )
    });
    let file = bench.file("links.md", "see [[\n");

    bench
        .workbench
        .execute(
            &Action::Complete {
                file,
                line: 1,
                column: 7,
            },
            &mut bench.out,
        )
        .expect("complete");

    assert_eq!(bench.stdout(), "[[inbox]]\tinbox.md\n[[journal]]\n");
    let server = bench.factory.last_server().expect("server");
    assert_eq!(server.request_count("textDocument/completion"), 1);
}

#[rstest]
fn code_actions_are_numbered(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::CodeActions {
                file,
                line: 2,
                apply: None,
            },
            &mut bench.out,
        )
        .expect("code actions");

    assert_eq!(bench.stdout(), "1. Convert to task\n");
    assert_eq!(bench.read("todo.md"), FLAT_LIST);
}

#[rstest]
fn applying_a_code_action_saves_its_edit(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::CodeActions {
                file,
                line: 2,
                apply: Some(1),
            },
            &mut bench.out,
        )
        .expect("apply");

    assert_eq!(bench.read("todo.md"), "- one\n- [ ] two\n- three\n");
    assert_eq!(bench.stdout(), "applied 'Convert to task'\n");
}

#[rstest]
fn applying_a_missing_code_action_changes_nothing(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);

    bench
        .workbench
        .execute(
            &Action::CodeActions {
                file,
                line: 1,
                apply: Some(3),
            },
            &mut bench.out,
        )
        .expect("apply");

    assert_eq!(bench.read("todo.md"), FLAT_LIST);
    assert_eq!(bench.stdout(), "no code action 3; 1 offered\n");
}

#[rstest]
fn status_lists_the_attached_session(mut bench: Bench) {
    bench
        .workbench
        .execute(&Action::Status { path: None }, &mut bench.out)
        .expect("status");

    let stdout = bench.stdout();
    assert!(stdout.starts_with("workspace "), "{stdout}");
    assert!(stdout.contains("running"), "{stdout}");
    assert_eq!(bench.factory.spawn_count(), 1);
}

#[rstest]
fn reading_a_missing_file_is_an_error(mut bench: Bench) {
    let file = bench.workspace.path().join("absent.md");

    let result = bench
        .workbench
        .execute(&Action::Folds { file }, &mut bench.out);

    assert!(matches!(result, Err(crate::AppError::ReadDocument { .. })));
}

#[rstest]
fn repl_reports_bad_lines_and_stops_at_quit(mut bench: Bench) {
    let file = bench.file("todo.md", FLAT_LIST);
    let script = format!("bogus\nopen \"{}\"\nquit\nstatus\n", file.display());

    let (out, err) = run_repl(&mut bench, &script);

    assert!(err.contains("unrecognized subcommand 'bogus'"), "{err}");
    assert!(out.contains("as notedown"), "{out}");
    assert!(!out.contains("running"), "{out}");
    assert_eq!(bench.workbench.notedown().documents().count(), 1);
}

#[rstest]
fn repl_starts_the_workspace_session_before_reading(mut bench: Bench) {
    let mut input = WatchedInput::new("quit\n", bench.factory.clone());

    bench
        .workbench
        .repl(&mut input, &mut bench.out, &mut bench.err)
        .expect("repl");

    assert_eq!(input.spawned_before_first_read, Some(1));
    assert_eq!(bench.factory.spawn_count(), 1);
    assert_eq!(bench.stderr(), "");
}

#[rstest]
fn repl_reports_a_server_that_fails_to_start(mut bench: Bench) {
    bench.factory.fail_next_spawn("notedown: command not found");

    let (_, err) = run_repl(&mut bench, "quit\n");

    assert!(err.contains("notedown: command not found"), "{err}");
    assert_eq!(bench.factory.spawn_count(), 0);
}

#[rstest]
fn repl_help_lists_actions_on_stdout(mut bench: Bench) {
    let (out, err) = run_repl(&mut bench, "help\nquit\n");

    assert!(out.contains("move-item"), "{out}");
    assert!(out.contains("quit"), "{out}");
    assert!(!err.contains("error"), "{err}");
}

#[rstest]
fn quit_ends_the_loop(mut bench: Bench) {
    let flow = bench
        .workbench
        .execute(&Action::Quit, &mut bench.out)
        .expect("quit");

    assert_eq!(flow, Flow::Quit);
}
