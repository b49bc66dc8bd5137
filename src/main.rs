//! cardcode - command-line front end
//!
//! Highlights template files on the terminal and exposes the pair matcher
//! and color conversion for scripting.

use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use tracing::debug;

use cardcode::config::Config;
use cardcode::error::{Error, Result};
use cardcode::external::load_file;
use cardcode::host::Selection;
use cardcode::pairs::find_pair;
use cardcode::render::render_document;
use cardcode::syntax::color::convert_color_to_hex;
use cardcode::syntax::{DocumentHighlighter, LineHighlighter};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    args.retain(|a| a != "-v" && a != "--verbose");
    cardcode::logging::init(verbose);

    let Some(command) = args.first().cloned() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            print_version();
            Ok(())
        }
        "highlight" => highlight(&args[1..]),
        "match" => match_pair(&args[1..]),
        "color" => {
            let value = args
                .get(1)
                .ok_or_else(|| Error::Message("color needs a VALUE".into()))?;
            println!("{}", convert_color_to_hex(value));
            Ok(())
        }
        other => Err(Error::Message(format!("unknown command '{}' (try --help)", other))),
    }
}

fn parse_number(arg: &str) -> Result<usize> {
    arg.parse()
        .map_err(|_| Error::Message(format!("'{}' is not a number", arg)))
}

fn highlight(args: &[String]) -> Result<()> {
    let mut file = None;
    let mut width = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--width" | "-w" => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::Message("--width needs a number".into()))?;
                width = Some(parse_number(value)?);
            }
            _ if file.is_none() => file = Some(PathBuf::from(arg)),
            _ => return Err(Error::Message(format!("unexpected argument '{}'", arg))),
        }
    }
    let file = file.ok_or_else(|| Error::Message("highlight needs a FILE".into()))?;

    let stdout = io::stdout();
    if width.is_none() && stdout.is_terminal() {
        width = crossterm::terminal::size().ok().map(|(cols, _)| cols as usize);
    }

    let config = Config::load();
    let text = load_file(&file)?;
    debug!(file = %file.display(), bytes = text.len(), "highlighting");

    let line_highlighter = LineHighlighter::new(config.build_theme()).with_scan_limit(config.scan_limit);
    let mut highlighter = DocumentHighlighter::new(line_highlighter);
    highlighter.highlight_all(&text);

    let mut out = stdout.lock();
    render_document(&mut out, &text, &highlighter, width)
}

fn match_pair(args: &[String]) -> Result<()> {
    let (file, start) = match args {
        [file, start, ..] => (PathBuf::from(file), parse_number(start)?),
        _ => return Err(Error::Message("match needs FILE START [END]".into())),
    };
    let end = match args.get(2) {
        Some(end) => parse_number(end)?,
        None => start,
    };

    let text = load_file(&file)?;
    match find_pair(&text, Selection::new(start, end)) {
        Some(pair) => println!("{:?} {}..{}", pair.mode, pair.highlight.start, pair.highlight.end),
        None => println!("no match"),
    }
    Ok(())
}

fn print_usage() {
    println!("cardcode {} - code editing support for card templates", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: cardcode [OPTIONS] COMMAND");
    println!();
    println!("Commands:");
    println!("  highlight FILE [--width N]  Print FILE with syntax highlighting");
    println!("  match FILE START [END]      Find the bracket or tag paired with a selection");
    println!("  color VALUE                 Convert rgb()/rgba()/hsl()/hsla() to hex");
    println!();
    println!("Options:");
    println!("  -h, --help     Show this help message");
    println!("  -V, --version  Show version information");
    println!("  -v, --verbose  Debug logging on stderr (RUST_LOG overrides)");
    println!();
    if let Some(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

fn print_version() {
    println!("cardcode {}", env!("CARGO_PKG_VERSION"));
}
