//! devlib command-line interface.

mod logger;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devlib_core::SimOptions;
use devlib_core::units::parse_value;
use devlib_devices::DevLib;
use devlib_parser::{Deck, read_deck_file};
use devlib_solver::{assemble_dc, setup, solve_ac, solve_dc_op};

#[derive(Parser)]
#[command(name = "devlib")]
#[command(about = "Parse and analyze SPICE decks of generic sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with simulator options (deck .options override it)
    #[arg(long, global = true, value_name = "FILE")]
    options: Option<PathBuf>,

    /// More log output; repeat for debug
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a deck and print its diagnostics
    Check {
        /// Path to the deck
        deck: PathBuf,
    },

    /// Print the DC Jacobian and RHS at the zero operating point
    Stamps {
        /// Path to the deck
        deck: PathBuf,
    },

    /// Solve the DC operating point
    Op {
        /// Path to the deck
        deck: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Solve the small-signal AC system at one frequency
    Ac {
        /// Path to the deck
        deck: PathBuf,

        /// Frequency in hertz; SPICE suffixes allowed
        #[arg(long, value_parser = parse_frequency)]
        freq: f64,
    },
}

fn parse_frequency(text: &str) -> std::result::Result<f64, String> {
    match parse_value(text) {
        Some(f) if f.is_finite() && f >= 0.0 => Ok(f),
        _ => Err(format!("invalid frequency: {}", text)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(logger::level(cli.verbose, cli.quiet));

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<SimOptions> {
    let Some(path) = path else {
        return Ok(SimOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid options file: {}", path.display()))
}

/// Read a deck, report its diagnostics and set it up for analysis.
fn prepare(path: &Path, lib: &DevLib, options: SimOptions) -> Result<Deck> {
    let mut deck = read_deck_file(path, lib, options)?;
    eprint!("{}", output::diagnostics(&deck));
    deck.check()?;
    setup(lib, &mut deck.models, &mut deck.circuit)
        .with_context(|| format!("Setup failed for {}", path.display()))?;
    Ok(deck)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let lib = DevLib::builtin();
    let options = load_options(cli.options.as_deref())?;

    match &cli.command {
        Commands::Check { deck } => {
            let deck = read_deck_file(deck, &lib, options)?;
            print!("{}", output::diagnostics(&deck));
            println!(
                "{}: {} error(s), {} warning(s)",
                deck.title,
                deck.error_count(),
                deck.warning_count()
            );
            Ok(if deck.error_count() > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Stamps { deck: path } => {
            let mut deck = prepare(path, &lib, options)?;
            let (a, b) = assemble_dc(&lib, &mut deck.models, &mut deck.circuit)?;
            print!("{}", output::stamps(&deck.circuit, &a, &b));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Op { deck: path, json } => {
            let mut deck = prepare(path, &lib, options)?;
            let sol = solve_dc_op(&lib, &mut deck.models, &mut deck.circuit)?;
            if *json {
                let text = serde_json::to_string_pretty(&output::dc_json(&deck, &sol))
                    .context("JSON output failed")?;
                println!("{}", text);
            } else {
                print!("{}", output::dc_solution(&lib, &deck, &sol));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ac { deck: path, freq } => {
            let mut deck = prepare(path, &lib, options)?;
            solve_dc_op(&lib, &mut deck.models, &mut deck.circuit)
                .context("Operating point for AC failed")?;
            let sol = solve_ac(&lib, &mut deck.models, &mut deck.circuit, *freq)?;
            print!("{}", output::ac_solution(&deck.circuit, &sol));
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_suffixes() {
        assert_eq!(parse_frequency("1k"), Ok(1e3));
        assert_eq!(parse_frequency("2.5meg"), Ok(2.5e6));
        assert!(parse_frequency("-1").is_err());
        assert!(parse_frequency("abc").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["devlib", "-vv", "ac", "deck.cir", "--freq", "10k"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Ac { freq, .. } if freq == 1e4));
    }

    #[test]
    fn test_missing_options_file() {
        assert!(load_options(Some(Path::new("/nonexistent/opts.json"))).is_err());
        assert_eq!(load_options(None).unwrap(), SimOptions::default());
    }
}
