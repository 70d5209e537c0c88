use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use ariadne::{Color, Label, Report, ReportKind, Source as AriadneSource};
use clap::Parser;
use thiserror::Error;

use musiccoder_core::Source;
use musiccoder_exec::{ExecError, Executor};
use musiccoder_lexer::LexError;
use musiccoder_resolver::{resolve, ResolveError};

#[derive(Parser)]
#[command(name = "musiccoder")]
#[command(about = "Run a MusicCoder source file", long_about = None)]
struct Cli {
    /// Path to a MusicCoder source file
    file: PathBuf,

    /// Print a step-by-step execution trace to stderr
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let content = match std::fs::read_to_string(&cli.file) {
        Ok(content) => content,
        Err(source) => {
            let err = RunError::Io {
                path: cli.file.clone(),
                source,
            };
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let source = Source::new(cli.file.clone(), content);

    match run(&source, cli.debug) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_diagnostic(&source, &err);
            ExitCode::FAILURE
        }
    }
}

fn run(source: &Source, debug: bool) -> Result<(), RunError> {
    let tokens = musiccoder_lexer::lex(source)?;
    let resolution = resolve(&tokens)?;

    let mut executor = Executor::new(&tokens, &resolution, debug);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    executor.run(&mut out, &mut input)?;
    Ok(())
}

fn print_diagnostic(source: &Source, err: &RunError) {
    let filename = source.name.clone();

    let span = match err {
        RunError::Io { .. } => {
            eprintln!("error: {err}");
            return;
        }
        RunError::Lex(e) => e.span(),
        RunError::Resolve(e) => e.span(),
        RunError::Exec(e) => e.span(),
    };

    Report::build(ReportKind::Error, &filename, span.start)
        .with_message(err.to_string())
        .with_label(
            Label::new((&filename, span.start..span.end))
                .with_message(err.to_string())
                .with_color(Color::Red),
        )
        .finish()
        .print((&filename, AriadneSource::from(&source.content)))
        .unwrap();
}
