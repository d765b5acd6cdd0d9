//! CLI entry point: parse arguments, run one extraction, write outputs.
//!
//! The run is a strictly sequential chain of stages inside one browser
//! session; the session is closed before the writer runs, and on the error
//! path, so a partial record can still be written.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::ArticleRecord;
use crate::normalize::{NameTranslator, Normalizer};
use crate::output::{file_stem, RecordWriter};
use crate::scrapers::dquery::DocumentQuery;
use crate::scrapers::panels::PanelActivator;
use crate::scrapers::pipeline::FieldPipeline;
use crate::scrapers::{diagnostics, precision, reconcile, ArticleSession, ResponseRecorder};

/// Built-in sample article, used when no URL is given.
const DEFAULT_ARTICLE_URL: &str =
    "https://wipogreen.wipo.int/wipogreen-database/articles/176426";

/// Settle time after the last panel activation before the DOM snapshot.
const SNAPSHOT_SETTLE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "greenharvest")]
#[command(about = "Resilient field extractor for WIPO Green technology articles")]
#[command(version)]
pub struct Cli {
    /// Article URL to extract.
    #[arg(default_value = DEFAULT_ARTICLE_URL)]
    url: String,

    /// Directory for the JSON/CSV output files.
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,

    /// Run the browser with a visible window (for debugging).
    #[arg(long)]
    headed: bool,

    /// Initial navigation timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose logging enabled");
    }

    let mut settings = Settings::from_env();
    settings.output_dir = cli.output_dir.clone();
    settings.browser.headless = !cli.headed;
    settings.browser.navigation_timeout = cli.timeout;

    let session = ArticleSession::launch(&settings.browser).await?;

    // The session must be released on every exit path before the record
    // (even a partial one) is written.
    let outcome = extract_article(&session, &cli.url, &settings).await;
    session.close().await;
    let record = outcome?;

    let writer = RecordWriter::new(settings.output_dir.clone());
    let stem = file_stem(&record.id, &cli.url);
    let (json_path, csv_path) = writer.write(&record, &stem)?;

    eprintln!("{} {}", style("Saved:").green().bold(), json_path.display());
    eprintln!("{} {}", style("Saved:").green().bold(), csv_path.display());
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}

/// One full extraction against an open session. Strategy-level failures
/// degrade the record; only an unusable input URL is an error here.
async fn extract_article(
    session: &ArticleSession,
    url: &str,
    settings: &Settings,
) -> Result<ArticleRecord> {
    // Attach before navigation so every response of the session is seen.
    let recorder = match ResponseRecorder::attach(session.page()).await {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!("Response recording unavailable: {}", e);
            None
        }
    };

    session.open_article(url).await?;

    let activator = PanelActivator::new(session);
    activator.reveal_all().await;
    // The two fragile sections are re-activated right before the snapshot.
    activator.reveal("Benefits").await;
    activator.reveal("Additional Information").await;
    tokio::time::sleep(SNAPSHOT_SETTLE).await;

    let payloads = match &recorder {
        Some(recorder) => recorder.snapshot().await,
        None => Vec::new(),
    };
    info!("Captured {} JSON payloads", payloads.len());

    let html = match session.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!("Could not read page content: {}", e);
            String::new()
        }
    };
    let page_url = session
        .current_url()
        .await
        .unwrap_or_else(|| url.to_string());

    // Parse and extract in one block so the document is dropped before the
    // next await.
    let mut record = {
        let doc = DocumentQuery::parse(&html, &page_url);
        let pipeline = FieldPipeline::new();
        let mut record = pipeline.extract(&doc);
        if reconcile::needs_reconciliation(&record) {
            reconcile::reconcile(&mut record, &payloads);
        }
        record
    };

    // Final writer for the two brittle fields, straight off the live DOM.
    let precise = precision::refine(session).await;
    precision::apply(&mut record, &precise);

    let translator = NameTranslator::new(settings.translator.clone());
    let normalizer = Normalizer::new(translator);
    normalizer.apply(&mut record).await;

    if record.benefits.is_empty() {
        let stem = file_stem(&record.id, url);
        if let Some(path) =
            diagnostics::dump_benefits_nodes(session, &settings.output_dir, &stem).await
        {
            info!("Debug snapshot written to {}", path.display());
        }
    }

    Ok(record)
}
