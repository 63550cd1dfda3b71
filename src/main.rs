mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use caduceus::{DEFAULT_EXEC_FUEL, Options, compile, extract_verbose_with};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Run a Caduceus rule program over a piece of text and print what it
/// extracted.
///
/// Exit codes: 0 success, 1 I/O failure, 2 invalid arguments or rule errors.
#[derive(Parser)]
#[command(name = "caduceus", version)]
#[command(about = "Rule-based information extraction over token streams", long_about = None)]
struct Cli {
    /// Rule program to compile.
    #[arg(short, long, value_name = "FILE")]
    rules: PathBuf,

    /// Input text. If omitted, the trailing arguments are used, or stdin when
    /// there are none.
    #[arg(short, long, value_name = "TEXT", conflicts_with = "text")]
    input: Option<String>,

    /// Force ANSI color output.
    #[arg(long, overrides_with = "no_color")]
    color: bool,

    /// Disable ANSI color output.
    #[arg(long, overrides_with = "color")]
    no_color: bool,

    /// Log engine activity at debug level (overrides CADUCEUS_LOG).
    #[arg(long)]
    debug: bool,

    /// Maximum matcher steps per scan position.
    #[arg(long, value_name = "STEPS", default_value_t = DEFAULT_EXEC_FUEL)]
    fuel: u32,

    /// Scan every sentence with every rule, without literal gating.
    #[arg(long)]
    no_gate: bool,

    #[arg(trailing_var_arg = true, value_name = "TEXT")]
    text: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let source = match std::fs::read_to_string(&cli.rules) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: failed to read {}: {err}", cli.rules.display());
            return ExitCode::from(1);
        }
    };
    let program = match compile(&source) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("{}: {err}", cli.rules.display());
            return ExitCode::from(2);
        }
    };

    let input = match read_input(cli.input, cli.text) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("error: failed to read stdin: {err}");
            return ExitCode::from(1);
        }
    };
    if input.trim().is_empty() {
        eprintln!("error: no input provided");
        return ExitCode::from(2);
    }

    let color = if cli.no_color {
        false
    } else {
        cli.color || io::stdout().is_terminal()
    };
    let options = Options::default().exec_fuel(cli.fuel).gate_rules(!cli.no_gate);
    let res = extract_verbose_with(&program, &input, &options);
    debug_report::print_run(&input, &res, color);
    ExitCode::SUCCESS
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("caduceus=debug")
    } else {
        EnvFilter::try_from_env("CADUCEUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn read_input(input: Option<String>, text: Vec<String>) -> io::Result<String> {
    if let Some(input) = input {
        return Ok(input);
    }
    if !text.is_empty() {
        return Ok(text.join(" "));
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
