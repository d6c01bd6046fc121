//! A small command-line front end for the search engine.

use std::{path::PathBuf, process::ExitCode, thread, time::Duration};

use bytetrawl::{
    data::Input,
    query::{Query, TextEncoding},
    scanner::DEFAULT_WINDOW_SIZE,
    session::SearchEngine,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// The idling time between progress polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Searches a file for a byte pattern and prints the offset and length of every match.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The file to search.
    path: PathBuf,
    /// The pattern: literal text unless --regex or --hex is given.
    pattern: String,
    /// Interpret the pattern as a regular expression.
    #[arg(long, conflicts_with = "hex")]
    regex: bool,
    /// Interpret the pattern as hex pairs, where `??` matches any byte.
    #[arg(long)]
    hex: bool,
    /// Match without regard to ASCII case.
    #[arg(long)]
    ignore_case: bool,
    /// Also search the UTF-16 renditions of the pattern.
    #[arg(long, conflicts_with_all = ["regex", "hex"])]
    utf16: bool,
    /// The scan window size in bytes.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> bytetrawl::error::Result<()> {
    let mut query = if args.regex {
        Query::regex(&args.pattern)
    } else if args.hex {
        Query::hex(&args.pattern)
    } else {
        Query::text(&args.pattern, TextEncoding::Utf8)
    };
    if args.ignore_case {
        query = query.case_insensitive();
    }
    if args.utf16 {
        query = query.with_utf16_variants();
    }

    let input = Input::from_path(&args.path)?;
    let mut engine = SearchEngine::with_window_size(args.window_size);
    let mut handle = engine.start(&query, input)?;

    while !handle.state().is_terminal() {
        eprint!(
            "\rsearch {}% complete ({} results)",
            handle.progress(),
            handle.snapshot().matches.len()
        );
        thread::sleep(POLL_INTERVAL);
    }
    eprintln!();

    let matches = handle.await_completion()?;
    for span in &matches {
        println!("{} {}", span.offset().as_u64(), span.len().as_u64());
    }
    eprintln!("{} matches", matches.len());

    Ok(())
}
