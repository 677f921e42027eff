use clap::Parser;
use carteira::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    run(Cli::parse())
}
