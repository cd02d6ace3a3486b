//! # Stockbook Entry Point
//!
//! Command-line front end for the stockbook library. Parses arguments,
//! initializes logging and dispatches to the subcommand handlers in
//! [`cli`].
//!
//! ```bash
//! stockbook guess --file uploaded.csv
//! stockbook --user admin import --file uploaded.csv
//! stockbook list --member 山田
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Command output goes to stdout

mod cli;

use clap::Parser as _;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    stockbook::logging::init()?;

    let cli = cli::Cli::parse();
    cli::run_command(cli)?;
    Ok(())
}
