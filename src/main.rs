use clap::Parser;

use mr_ledger::cli::{run, Cli};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(_) => std::process::exit(1),
    }
}
