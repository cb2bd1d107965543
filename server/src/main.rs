use clap::Parser;
use codefix_server::cli::{self, Args};
use codefix_server::serve;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() {
    let args = Args::parse();

    // Load .env before installing the subscriber so RUST_LOG can live there too.
    let dotenv = dotenvy::dotenv();
    codefix_core::init_logging(args.verbose);
    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env file: {e}"),
    }

    if let Err(e) = run(&args).await {
        error!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = cli::initialize(args)? else {
        return Ok(());
    };
    serve(config).await?;
    Ok(())
}
