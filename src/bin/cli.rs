use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser as ClapParser};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use trellis::{
    ParseError, ParseStatus, Parser, ParserConfig, RequestEnv, UriClassifier, format_debug,
    format_env, format_json, format_resolution,
};

/// Trellis CLI: resumable HTTP/1.x request-head parser and URI classifier.
///
/// Reads a raw HTTP request from a file, --raw string, or stdin and prints
/// the parsed CGI-style environment in the chosen format.
///
/// Escape sequences (\r, \n, \t, \\) in the --raw value are interpreted so
/// you can pass a full HTTP request as a single shell argument.
#[derive(ClapParser)]
#[command(name = "trellis-cli", version, about, long_about = None)]
struct Cli {
    /// Path to a file containing a raw HTTP request.
    /// Reads from stdin when neither FILE nor --raw is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw HTTP request string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,

    /// Feed the input to the parser this many bytes at a time.
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Register a URI prefix and classify the request path against it.
    /// May be given more than once.
    #[arg(long = "route", value_name = "PREFIX")]
    routes: Vec<String>,

    /// TOML file with parser limits (any subset of the `max_*` keys).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON object keyed by variable name
    Json,
    /// KEY=value lines
    Env,
    /// Human-readable debug output
    Debug,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if cli.file.is_none() && cli.raw.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error reading config {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => ParserConfig::default(),
    };

    let data = match read_input(&cli) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    if data.is_empty() {
        eprintln!("Error: empty input");
        process::exit(1);
    }

    let chunk_size = cli
        .chunk_size
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(data.len());

    let env = match parse_in_chunks(&data, chunk_size, config) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Parse error: {e}");
            process::exit(2);
        }
    };

    let output = match cli.format {
        OutputFormat::Json => format_json(&env, cli.pretty),
        OutputFormat::Env => format_env(&env),
        OutputFormat::Debug => format_debug(&env),
    };
    print!("{output}");

    if !cli.routes.is_empty() {
        let mut classifier = UriClassifier::new();
        for route in &cli.routes {
            if let Err(e) = classifier.register_or_replace(route, route.clone()) {
                eprintln!("Invalid route {route:?}: {e}");
                process::exit(1);
            }
        }

        let path = env.request_path().unwrap_or_default();
        match classifier.resolve(path) {
            Some(hit) => print!("{}", format_resolution(&hit)),
            None => {
                eprintln!("No route matches {path:?}");
                process::exit(3);
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("trellis={default_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> Result<ParserConfig, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    Ok(ParserConfig::from_toml_str(&source)?)
}

/// Feed `data` to a fresh parser `chunk_size` bytes at a time, the way a
/// server appends socket reads to one growing buffer.
fn parse_in_chunks(
    data: &[u8],
    chunk_size: usize,
    config: ParserConfig,
) -> Result<RequestEnv, ParseError> {
    let mut parser = Parser::with_config(config);
    let mut env = RequestEnv::new();
    let mut buf = Vec::with_capacity(data.len());
    let mut nread = 0;

    for chunk in data.chunks(chunk_size) {
        buf.extend_from_slice(chunk);
        nread = parser.execute(&mut env, &buf, nread)?;
        tracing::debug!(buffered = buf.len(), nread, "fed chunk");
        if parser.is_finished() {
            break;
        }
    }

    match parser.finish()? {
        ParseStatus::Complete(_) => Ok(env),
        ParseStatus::Incomplete => Err(ParseError::IncompleteRequest),
    }
}

/// Read raw HTTP bytes from --raw, a file, or stdin.
fn read_input(cli: &Cli) -> Result<Vec<u8>, std::io::Error> {
    if let Some(raw) = &cli.raw {
        return Ok(unescape(raw).into_bytes());
    }
    match &cli.file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
