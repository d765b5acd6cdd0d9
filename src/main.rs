//! greenharvest - resilient field extractor for WIPO Green technology articles.
//!
//! Visits a single article page with a headless Chrome session and produces
//! a normalized record despite the page being a client-rendered SPA with
//! inconsistent labels and no stable machine-readable contract.

mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod output;
mod scrapers;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::SetupError;

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "greenharvest=info"
    } else {
        "greenharvest=warn"
    };

    // Logs go to stderr; stdout carries the final record JSON.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = cli::run().await {
        eprintln!("error: {:#}", err);
        // Setup failures (no usable browser engine) exit with a distinct
        // code so batch callers can tell them apart from run failures.
        let code = if err.downcast_ref::<SetupError>().is_some() {
            2
        } else {
            1
        };
        std::process::exit(code);
    }
}
