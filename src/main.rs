use clap::Parser;
use portfolio_analytics::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();
    run(Cli::parse())
}
