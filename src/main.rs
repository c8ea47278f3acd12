//! DataGateway CLI entry point
//!
//! Argument parsing, configuration and serving all live in `cli::run`;
//! this only reports the error and sets the exit code.

use datagateway::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
