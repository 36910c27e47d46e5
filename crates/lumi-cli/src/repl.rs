//! Interactive REPL: read, dispatch, render.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use nu_ansi_term::{Color, Style};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{CompletionType, Config, Editor, Helper};
use tracing::{debug, info};

use lumi_engine::query::{parse_query, tokenize_query, TokenKind};
use lumi_engine::Database;

use crate::completer::{AutoCompleter, CompleteKind};
use crate::formatter;

/// The REPL prompt shown when waiting for input.
const PROMPT: &str = "lumidb> ";

/// History lives next to the process, not in a home directory.
const HISTORY_FILE: &str = "lumidb_history.txt";

/// Whether a handled line asked the REPL to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// REPL helper wiring completion and highlighting into rustyline.
struct ReplHelper {
    completer: AutoCompleter,
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Find the word being typed.
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',' || c == '|')
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];

        // Inside a string literal, suggest table and field names; everywhere
        // else, function names.
        if let Some(quote) = word.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let matches = self
                .completer
                .complete(CompleteKind::Table, &word[quote.len_utf8()..])
                .into_iter()
                .map(|item| Pair {
                    display: format!("{quote}{}{quote}", item.display),
                    replacement: format!("{quote}{}{quote}", item.completion),
                })
                .collect();
            return Ok((start, matches));
        }

        let mut matches: Vec<Pair> = self
            .completer
            .complete(CompleteKind::Function, word)
            .into_iter()
            .map(|item| Pair {
                display: item.display,
                replacement: item.completion,
            })
            .collect();
        if "exit".starts_with(word) && !word.is_empty() {
            matches.push(Pair {
                display: "exit".to_string(),
                replacement: "exit".to_string(),
            });
        }

        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

fn token_style(kind: TokenKind) -> Option<Style> {
    match kind {
        TokenKind::Identifier => Some(Style::new().fg(Color::Cyan)),
        TokenKind::StringLiteral => Some(Style::new().fg(Color::Green)),
        TokenKind::FloatLiteral => Some(Style::new().fg(Color::Yellow)),
        TokenKind::Pipe => Some(Style::new().fg(Color::LightPurple).bold()),
        _ => None,
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let tokens = tokenize_query(line);
        if tokens.is_empty() {
            return Cow::Borrowed(line);
        }

        // Token spans tile the line, so styling slice-by-slice loses nothing.
        let mut styled = String::with_capacity(line.len() + 16);
        for token in tokens {
            let text = &line[token.span.start..token.span.end];
            match token_style(token.kind) {
                Some(style) => styled.push_str(&style.paint(text).to_string()),
                None => styled.push_str(text),
            }
        }
        Cow::Owned(styled)
    }

    fn highlight_char(&self, line: &str, _pos: usize, _forced: bool) -> bool {
        !line.is_empty()
    }
}

impl Validator for ReplHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        // The query language is single-line.
        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for ReplHelper {}

/// The interactive loop plus the script pre-runner.
pub struct Repl {
    db: Arc<Database>,
    editor: Editor<ReplHelper, DefaultHistory>,
}

impl Repl {
    /// Creates the REPL and loads history from the working directory.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ReplHelper {
            completer: AutoCompleter::new(db.clone()),
        }));

        if Path::new(HISTORY_FILE).exists() {
            let _ = editor.load_history(HISTORY_FILE);
        }

        Ok(Self { db, editor })
    }

    /// Runs the lines of a script through the regular input handler.
    ///
    /// The first failing line aborts the rest of the script; opening the
    /// file is the only error surfaced to the caller.
    pub fn run_script(&mut self, path: &Path) -> Result<Outcome> {
        let file = File::open(path)?;

        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            info!("executing: {line}");
            match self.handle_input(line) {
                Ok(Outcome::Exit) => return Ok(Outcome::Exit),
                Ok(Outcome::Continue) => {}
                Err(e) => {
                    print_error(&e);
                    break;
                }
            }
        }

        Ok(Outcome::Continue)
    }

    /// The interactive read-dispatch-render loop.
    pub fn run(&mut self) {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(&line);

                    match self.handle_input(&line) {
                        Ok(Outcome::Exit) => break,
                        Ok(Outcome::Continue) => {}
                        Err(e) => print_error(&e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    debug!("readline error: {e}");
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(HISTORY_FILE) {
            debug!("failed to save history: {e}");
        }
    }

    /// Handles one input line: `exit`, a `!` shell escape, or a query.
    fn handle_input(&mut self, input: &str) -> lumi_common::Result<Outcome> {
        if input == "exit" {
            return Ok(Outcome::Exit);
        }

        if let Some(command) = input.strip_prefix('!') {
            run_shell_command(command);
            return Ok(Outcome::Continue);
        }

        let query = parse_query(input)?;
        let table = self.db.execute(query).join()?;
        println!("{}", formatter::render_table(&table.read()));
        Ok(Outcome::Continue)
    }
}

fn print_error(e: &lumi_common::Error) {
    eprintln!("{}", Color::Red.paint(format!("[error]: {e}")));
}

#[cfg(unix)]
fn run_shell_command(command: &str) {
    let _ = std::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status();
}

#[cfg(windows)]
fn run_shell_command(command: &str) {
    let _ = std::process::Command::new("cmd")
        .arg("/C")
        .arg(command)
        .status();
}
