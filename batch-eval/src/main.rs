use anyhow::{bail, Context};
use clap::Parser;
use nlu_batch_eval::{
    BatchConfig, BatchTester, HttpBatchTestClient, LuisConfiguration, Utterance,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Evaluate a LUIS model against a labeled test set using batch evaluation jobs.
#[derive(Debug, Parser)]
#[command(name = "nlu-batch-eval", version)]
struct Args {
    /// JSON file containing an array of labeled utterances
    #[arg(short, long)]
    utterances: PathBuf,

    /// Where to write the labeled results (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overrides LUIS_APP_ID
    #[arg(long)]
    app_id: Option<String>,

    /// Overrides LUIS_BATCH_ENDPOINT
    #[arg(long)]
    batch_endpoint: Option<String>,

    /// Run even when LUIS_USE_BATCH is not set
    #[arg(long)]
    force_batch: bool,

    /// Utterances per evaluation job
    #[arg(long, default_value_t = 500)]
    batch_size: usize,

    /// Seconds between operation status checks
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut luis = LuisConfiguration::from_env()?;
    if let Some(app_id) = args.app_id {
        luis.app_id = Some(app_id);
    }
    if let Some(endpoint) = args.batch_endpoint {
        luis.batch_endpoint = Some(endpoint);
    }
    if args.force_batch {
        luis.use_batch = true;
    }

    let config = BatchConfig {
        batch_size: args.batch_size,
        poll_interval: Duration::from_secs(args.poll_interval),
        ..BatchConfig::default()
    };

    let configuration = Arc::new(luis);
    let client = Arc::new(HttpBatchTestClient::new(configuration.clone(), &config)?);
    let tester = BatchTester::new(configuration, client, config);

    if !tester.is_batch_enabled() {
        bail!("Batch evaluation is disabled; set LUIS_USE_BATCH=true or pass --force-batch");
    }

    let content = tokio::fs::read_to_string(&args.utterances)
        .await
        .with_context(|| format!("Failed to read {}", args.utterances.display()))?;
    let utterances: Vec<Utterance> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", args.utterances.display()))?;

    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling evaluation");
            ctrl_c_token.cancel();
        }
    });

    info!("Loaded {} utterances from {}", utterances.len(), args.utterances.display());

    let results = match tester.evaluate(utterances, &cancellation).await {
        Ok(results) => results,
        Err(e) => {
            error!("Batch evaluation failed: {}", e);
            return Err(e.into());
        }
    };

    let json = serde_json::to_string_pretty(&results)?;
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} results to {}", results.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
