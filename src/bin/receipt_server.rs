use clap::Parser;
use receipt_finder::server::serve;
use receipt_finder::{HttpReceiptEndpoint, ReceiptFinderConfig, ReceiptSearch, DEFAULT_DOCUMENT_URL};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "receipt-server", about = "Receipt number search service")]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// JSON file with the reference table and probe settings
    #[arg(long, env = "RECEIPT_FINDER_CONFIG")]
    config: Option<PathBuf>,

    /// Allowed CORS origin; any origin when unset
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    #[arg(long, env = "RECEIPT_DOCUMENT_URL", default_value = DEFAULT_DOCUMENT_URL)]
    document_url: String,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,receipt_finder=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> receipt_finder::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ReceiptFinderConfig::from_json_file(path)?,
        None => ReceiptFinderConfig::default(),
    };
    log::info!(
        "Loaded {} generic references for meter {}",
        config.references.len(),
        config.reference_meter_id
    );

    let endpoint = HttpReceiptEndpoint::with_base_url(args.document_url)?;
    let search = ReceiptSearch::new(config, Arc::new(endpoint))?;

    serve(search, args.port, args.cors_origin.as_deref()).await
}
