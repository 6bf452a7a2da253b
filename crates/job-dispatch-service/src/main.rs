//! Binary entry point for the job dispatch service.

use clap::Parser;
use job_dispatch_service::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Logging may not be initialised yet
        eprintln!("job-dispatch: {}", e);
        std::process::exit(e.exit_code());
    }
}
