//! LumiDB command-line interface.
//!
//! # Usage
//!
//! ```bash
//! # Start the interactive REPL
//! lumidb
//!
//! # Run scripts line-by-line, then drop into the REPL
//! lumidb --in setup.lumi --in seed.lumi
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nu_ansi_term::Color;
use tracing_subscriber::EnvFilter;

mod completer;
mod formatter;
mod repl;

use lumi_engine::Database;
use repl::Repl;

/// A db and a simple student manage system.
#[derive(Parser, Debug)]
#[command(name = "lumidb", version, about)]
struct Args {
    /// The input script file.
    #[arg(long = "in", value_name = "FILE")]
    in_scripts: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let db = match Database::open() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{}", Color::Red.paint(format!("[error]: {e}")));
            return ExitCode::from(1);
        }
    };

    let mut repl = match Repl::new(db) {
        Ok(repl) => repl,
        Err(e) => {
            eprintln!("{}", Color::Red.paint(format!("[error]: {e}")));
            return ExitCode::from(1);
        }
    };

    for script in &args.in_scripts {
        match repl.run_script(script) {
            Ok(repl::Outcome::Exit) => return ExitCode::SUCCESS,
            Ok(repl::Outcome::Continue) => {}
            Err(e) => {
                eprintln!(
                    "{}",
                    Color::Red.paint(format!("failed to open file: {}: {e}", script.display()))
                );
                return ExitCode::from(1);
            }
        }
    }

    repl.run();
    ExitCode::SUCCESS
}
