//! Statecraft CLI Entry Point
//!
//! Compiles shorthand notation from a file or stdin and writes the state
//! machine JSON to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Compile a whole file into one machine
//! statecraft pipeline.yaml
//!
//! # Read from stdin, pretty-printed
//! cat pipeline.yaml | statecraft --pretty
//!
//! # One machine per input line
//! statecraft --stream jobs.ndyaml
//!
//! # Resolve short references through a table, then check the result
//! statecraft pipeline.yaml --resources resources.yaml --validate
//! ```

use std::env;
use std::error::Error;
use std::io;
use std::process::ExitCode;

use colored::Colorize;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};

use statecraft::machine::{validate_branch, Branch};
use statecraft::{read_all, read_stream, Compiler, MapResolver, APP_NAME, VERSION};

/// Input path meaning "read from stdin".
const STDIN_PATH: &str = "-";

type Input = Box<dyn AsyncRead + Unpin + Send>;

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    input_path: String,
    resources_path: Option<String>,
    stream: bool,
    pretty: bool,
    validate: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: STDIN_PATH.to_string(),
            resources_path: None,
            stream: false,
            pretty: false,
            validate: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
///
/// Logs go to stderr so stdout carries only compiled output.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .target(env_logger::Target::Stderr)
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("{} v{}", APP_NAME, VERSION);
    println!();
    println!("Usage: statecraft [OPTIONS] [INPUT_FILE]");
    println!();
    println!("Arguments:");
    println!("  [INPUT_FILE]        Notation source (default: stdin, or '-')");
    println!();
    println!("Options:");
    println!("  --stream            Compile each input line as its own document");
    println!("  --pretty            Pretty-print the JSON output");
    println!("  --resources FILE    YAML/JSON table resolving short references");
    println!("  --validate          Fail on dangling state references");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  statecraft pipeline.yaml --pretty");
    println!("  statecraft --stream jobs.ndyaml --resources resources.yaml");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--stream" => config.stream = true,
            "--pretty" => config.pretty = true,
            "--validate" => config.validate = true,
            "--verbose" | "-v" => config.verbose = true,
            "--resources" => {
                i += 1;
                if i >= args.len() {
                    return Err("--resources requires a file argument".to_string());
                }
                config.resources_path = Some(args[i].clone());
            }
            STDIN_PATH => {
                if positional_index > 0 {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                positional_index += 1;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if positional_index > 0 {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.input_path = arg.clone();
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Builds the compiler, loading the resource table if one was given.
fn build_compiler(config: &Config) -> Result<Compiler, Box<dyn Error>> {
    let compiler = Compiler::new();
    let Some(ref path) = config.resources_path else {
        return Ok(compiler);
    };

    let resolver = MapResolver::load(path)?;
    info!("Loaded {} resource resolution(s)", resolver.len());
    Ok(compiler.with_resolver(resolver))
}

async fn open_input(path: &str) -> Result<Input, Box<dyn Error>> {
    if path == STDIN_PATH {
        debug!("Reading notation from stdin");
        return Ok(Box::new(tokio::io::stdin()));
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("Could not open input '{}': {}", path, e))?;
    debug!("Reading notation from: {}", path);
    Ok(Box::new(file))
}

fn render(branch: &Branch, validate: bool, pretty: bool) -> Result<String, Box<dyn Error>> {
    if validate {
        validate_branch(branch)?;
    }
    let json = if pretty {
        serde_json::to_string_pretty(branch)?
    } else {
        serde_json::to_string(branch)?
    };
    Ok(json)
}

/// Compiles the whole input as one machine.
async fn compile_all(
    compiler: &mut Compiler,
    mut input: Input,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let mut source = String::new();
    input.read_to_string(&mut source).await?;

    let branch = read_all(compiler, &source).await?;
    info!("Compiled {} top-level state(s)", branch.len());

    let mut stdout = tokio::io::stdout();
    stdout.write_all(render(&branch, config.validate, config.pretty)?.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Compiles each input line as its own machine, writing one JSON line each.
async fn compile_stream(
    compiler: &mut Compiler,
    input: Input,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    if config.pretty {
        warn!("--pretty is ignored in stream mode");
    }
    let lines = BufReader::new(input).lines();
    let chunks = Box::pin(stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok::<_, io::Error>(line + "\n"), lines)),
            Ok(None) => None,
            Err(e) => Some((Err(e), lines)),
        }
    }));

    let mut branches = Box::pin(read_stream(compiler, chunks));
    let mut stdout = tokio::io::stdout();
    let mut count = 0usize;

    while let Some(branch) = branches.next().await {
        let mut line = render(&branch?, config.validate, false)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        count += 1;
    }

    info!("Compiled {} document(s)", count);
    Ok(())
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("{} {}", "Error:".red().bold(), e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);
    debug!("Configuration: {:?}", config);

    let mut compiler = build_compiler(&config)?;
    let input = open_input(&config.input_path).await?;

    if config.stream {
        compile_stream(&mut compiler, input, &config).await
    } else {
        compile_all(&mut compiler, input, &config).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
