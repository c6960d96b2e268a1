use clap::Parser;
use tracing_subscriber::{fmt, prelude::*};

use mixplan::api::{Cli, log_filter, run};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "mixplan failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
